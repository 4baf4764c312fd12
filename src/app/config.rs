use argh::FromArgs;

use crate::app::AppError;
use crate::domain::ngsi::NGSI_LD_CORE_CONTEXT;
use crate::domain::station::{StationId, parse_station_list};

#[derive(FromArgs, Debug, Default)]
/// Push the latest Fimbul weather station readings to an NGSI-LD context broker.
pub struct CliArgs {
    /// comma separated station ids, overrides STATION_IDS
    #[argh(option)]
    pub stations: Option<String>,

    /// entity id prefix ending, overrides ENTITY_ID_PREFIX_ENDING
    #[argh(option)]
    pub prefix: Option<String>,
}

#[derive(Debug, Clone)]
pub struct AppConfig {
    pub service_url: String,
    pub broker_url: String,
    pub station_ids: Vec<StationId>,
    pub prefix_ending: String,
    pub request_timeout_ms: u64,
    pub station_pause_ms: u64,
    pub apply_clock_skew_correction: bool,
    pub ngsi_ld_context: String,
}

impl AppConfig {
    pub fn from_env() -> Result<Self, AppError> {
        dotenvy::dotenv().ok();
        let args: CliArgs = argh::from_env();
        Self::from_lookup(args, |key| std::env::var(key).ok())
    }

    fn from_lookup<F>(args: CliArgs, lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let service_url = required(&lookup, "FIMBUL_URL")?;
        let broker_url = required(&lookup, "CONTEXT_BROKER_URL")?;

        let station_ids = args
            .stations
            .or_else(|| lookup("STATION_IDS"))
            .map(|raw| parse_station_list(&raw))
            .unwrap_or_default();

        let prefix_ending = args
            .prefix
            .or_else(|| lookup("ENTITY_ID_PREFIX_ENDING"))
            .map(|v| v.trim().to_string())
            .unwrap_or_default();

        Ok(Self {
            service_url,
            broker_url,
            station_ids,
            prefix_ending,
            request_timeout_ms: parse_or_default(&lookup, "REQUEST_TIMEOUT_MS", 10_000_u64)?,
            station_pause_ms: parse_or_default(&lookup, "STATION_PAUSE_MS", 1_000_u64)?,
            apply_clock_skew_correction: parse_bool_or_default(
                &lookup,
                "APPLY_CLOCK_SKEW_CORRECTION",
                true,
            )?,
            ngsi_ld_context: optional(&lookup, "NGSI_LD_CONTEXT")
                .unwrap_or_else(|| NGSI_LD_CORE_CONTEXT.to_string()),
        })
    }
}

fn optional<F>(lookup: &F, key: &str) -> Option<String>
where
    F: Fn(&str) -> Option<String>,
{
    lookup(key)
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

fn required<F>(lookup: &F, key: &str) -> Result<String, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    optional(lookup, key).ok_or_else(|| AppError::config(format!("{key} is required")))
}

fn parse_or_default<T, F>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    T: std::str::FromStr + Copy,
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key) {
        Some(raw) => raw
            .parse::<T>()
            .map_err(|_| AppError::config(format!("{key} must be a valid number"))),
        None => Ok(default),
    }
}

fn parse_bool_or_default<F>(lookup: &F, key: &str, default: bool) -> Result<bool, AppError>
where
    F: Fn(&str) -> Option<String>,
{
    match optional(lookup, key).map(|v| v.to_ascii_lowercase()).as_deref() {
        None => Ok(default),
        Some("true" | "1" | "yes") => Ok(true),
        Some("false" | "0" | "no") => Ok(false),
        Some(_) => Err(AppError::config(format!("{key} must be true or false"))),
    }
}
