use std::sync::{
    Arc,
    atomic::{AtomicBool, Ordering},
};
use std::time::Duration;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::adapters::context_broker::{ContextBroker, HttpContextBroker};
use crate::adapters::weather_service::{FetchError, HttpStationFetcher, StationFetcher};
use crate::app::config::AppConfig;
use crate::app::error::AppError;
use crate::app::upsert::{UpsertError, upsert};
use crate::domain::ngsi::NGSI_LD_CORE_CONTEXT;
use crate::domain::observation::{
    AttributeError, BuildOptions, Clock, build_attributes, normalize_prefix_ending,
    weather_observed_id,
};
use crate::domain::station::StationId;

#[derive(Debug, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[derive(Debug, Clone)]
pub struct PipelineOptions {
    pub build: BuildOptions,
    /// Delay after every station, the last one included.
    pub station_pause: Duration,
    pub context: String,
}

impl Default for PipelineOptions {
    fn default() -> Self {
        Self {
            build: BuildOptions::default(),
            station_pause: Duration::from_secs(1),
            context: NGSI_LD_CORE_CONTEXT.to_string(),
        }
    }
}

#[derive(Debug, Error)]
pub enum RunError {
    #[error("list of stations is empty")]
    EmptyInput,
    #[error("failed to fetch station {station}: {source}")]
    Fetch {
        station: StationId,
        #[source]
        source: FetchError,
    },
    #[error("failed to create attributes for station {station}: {source}")]
    Attributes {
        station: StationId,
        #[source]
        source: AttributeError,
    },
    #[error("failed to upsert station {station}: {source}")]
    Upsert {
        station: StationId,
        #[source]
        source: UpsertError,
    },
    #[error("run cancelled with {remaining} station(s) left")]
    Cancelled { remaining: usize },
}

/// Fetches each station in turn and upserts its WeatherObserved entity.
pub struct StationRunner<F, B, Cl> {
    fetcher: F,
    broker: B,
    clock: Cl,
    options: PipelineOptions,
    stop_flag: Arc<AtomicBool>,
}

impl<F, B, Cl> StationRunner<F, B, Cl>
where
    F: StationFetcher,
    B: ContextBroker,
    Cl: Clock,
{
    pub fn new(
        fetcher: F,
        broker: B,
        clock: Cl,
        options: PipelineOptions,
        stop_flag: Arc<AtomicBool>,
    ) -> Self {
        Self {
            fetcher,
            broker,
            clock,
            options,
            stop_flag,
        }
    }

    /// Stops at the first station that fails and returns its error.
    pub fn run(&self, station_ids: &[StationId], prefix_ending: &str) -> Result<(), RunError> {
        if station_ids.is_empty() {
            return Err(RunError::EmptyInput);
        }

        let prefix_ending = normalize_prefix_ending(prefix_ending);

        for (index, station) in station_ids.iter().enumerate() {
            if self.stop_requested() {
                return Err(RunError::Cancelled {
                    remaining: station_ids.len() - index,
                });
            }

            if let Err(error) = self.sync_station(station, &prefix_ending) {
                tracing::error!(station = %station, error = %error, "station sync failed");
                return Err(error);
            }

            // A stop during the last station still counts as a finished run.
            let remaining = station_ids.len() - index - 1;
            if self.stop_requested() {
                return match remaining {
                    0 => Ok(()),
                    remaining => Err(RunError::Cancelled { remaining }),
                };
            }

            if !self.options.station_pause.is_zero() {
                std::thread::sleep(self.options.station_pause);
            }
        }

        Ok(())
    }

    fn stop_requested(&self) -> bool {
        self.stop_flag.load(Ordering::Relaxed)
    }

    fn sync_station(&self, station: &StationId, prefix_ending: &str) -> Result<(), RunError> {
        tracing::info!(station = %station, "requesting data");
        let reading = self
            .fetcher
            .fetch(station)
            .map_err(|source| RunError::Fetch {
                station: station.clone(),
                source,
            })?;

        let attributes = build_attributes(&reading, self.options.build, &self.clock).map_err(
            |source| RunError::Attributes {
                station: station.clone(),
                source,
            },
        )?;

        let payload_id = if reading.id.trim().is_empty() {
            station.as_str()
        } else {
            reading.id.as_str()
        };
        let entity_id = weather_observed_id(prefix_ending, payload_id);

        let outcome = upsert(
            &self.broker,
            &entity_id,
            attributes,
            &reading,
            &self.options.context,
        )
        .map_err(|source| RunError::Upsert {
            station: station.clone(),
            source,
        })?;

        tracing::info!(station = %station, entity_id = %entity_id, outcome = ?outcome, "station synced");
        Ok(())
    }
}

pub fn run(config: AppConfig) -> Result<(), AppError> {
    let timeout = Duration::from_millis(config.request_timeout_ms);
    let fetcher =
        HttpStationFetcher::new(&config.service_url, timeout).map_err(AppError::runtime)?;
    let broker = HttpContextBroker::new(&config.broker_url, timeout).map_err(AppError::runtime)?;

    let stop_flag = Arc::new(AtomicBool::new(false));
    ctrlc::set_handler({
        let stop_flag = Arc::clone(&stop_flag);
        move || {
            tracing::info!("received Ctrl+C, stopping after the current station");
            stop_flag.store(true, Ordering::Relaxed);
        }
    })
    .map_err(AppError::runtime)?;

    let options = PipelineOptions {
        build: BuildOptions {
            apply_clock_skew_correction: config.apply_clock_skew_correction,
        },
        station_pause: Duration::from_millis(config.station_pause_ms),
        context: config.ngsi_ld_context.clone(),
    };
    let runner = StationRunner::new(fetcher, broker, SystemClock, options, stop_flag);

    runner
        .run(&config.station_ids, &config.prefix_ending)
        .map_err(|error| {
            tracing::error!(error = %error, "weather observation sync failed");
            AppError::runtime(error)
        })?;

    tracing::info!(stations = config.station_ids.len(), "weather observation sync finished");
    Ok(())
}
