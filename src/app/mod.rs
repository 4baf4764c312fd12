mod config;
mod error;
mod logging;
pub mod runtime;
pub mod upsert;

pub use config::{AppConfig, CliArgs};
pub use error::AppError;

pub fn run() -> Result<(), AppError> {
    logging::init()?;

    let config = AppConfig::from_env()?;

    tracing::info!(
        service_url = %config.service_url,
        broker_url = %config.broker_url,
        stations = config.station_ids.len(),
        prefix_ending = %config.prefix_ending,
        request_timeout_ms = config.request_timeout_ms,
        station_pause_ms = config.station_pause_ms,
        apply_clock_skew_correction = config.apply_clock_skew_correction,
        "application bootstrap initialized"
    );

    runtime::run(config)
}
