use chrono::{DateTime, Duration, NaiveDateTime, SecondsFormat, Utc};
use thiserror::Error;

use crate::domain::ngsi::{Attribute, AttributeValue, WEATHER_OBSERVED_ID_PREFIX};
use crate::domain::station::StationReading;

const STATION_TIME_FORMAT: &str = "%Y-%m-%d %H:%M:%S";
const STATION_TIME_LAYOUT: &str = "0000-00-00 00:00:00";
const PREFIX_SEPARATOR: char = ':';

pub trait Clock {
    fn now(&self) -> DateTime<Utc>;
}

#[derive(Debug, Clone, Error, PartialEq)]
#[error("failed to parse {field} from {value:?}")]
pub struct ParseError {
    pub field: &'static str,
    pub value: String,
}

#[derive(Debug, Error, PartialEq)]
pub enum AttributeError {
    #[error("weather station {station} response does not contain any log entries")]
    NoData { station: String },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct BuildOptions {
    /// Pull timestamps that read as "in the future" back by whole hours.
    pub apply_clock_skew_correction: bool,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            apply_clock_skew_correction: true,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct ObservationAttributes {
    attributes: Vec<Attribute>,
}

impl ObservationAttributes {
    pub fn as_slice(&self) -> &[Attribute] {
        &self.attributes
    }

    pub fn push(&mut self, attribute: Attribute) {
        self.attributes.push(attribute);
    }

    pub fn get(&self, name: &str) -> Option<&Attribute> {
        self.attributes.iter().find(|attribute| attribute.name == name)
    }

    pub fn number(&self, name: &str) -> Option<f64> {
        match self.get(name)?.value {
            AttributeValue::Number(value) => Some(value),
            _ => None,
        }
    }

    pub fn date_observed(&self) -> Option<&str> {
        match &self.get("dateObserved")?.value {
            AttributeValue::DateTime(value) => Some(value),
            _ => None,
        }
    }

    pub fn len(&self) -> usize {
        self.attributes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.attributes.is_empty()
    }
}

/// Builds the WeatherObserved attribute set from the newest log entry of `reading`.
///
/// Numeric fields get an `observedAt` qualifier matching `dateObserved`.
/// Relative humidity is rounded to a whole percent before being scaled to a
/// 0-1 fraction.
pub fn build_attributes<C: Clock>(
    reading: &StationReading,
    options: BuildOptions,
    clock: &C,
) -> Result<ObservationAttributes, AttributeError> {
    let entry = reading.latest().ok_or_else(|| AttributeError::NoData {
        station: reading.id.clone(),
    })?;

    let temperature = parse_f64("temperature", &entry.temperature)?;
    let wind_speed = parse_f64("windSpeed", &entry.wind_average_speed)?;
    let wind_direction = parse_f64("windDirection", &entry.wind_direction)?;
    let relative_humidity = parse_f64("relativeHumidity", &entry.relative_humidity)?;

    let mut observed = parse_station_time(&entry.date_time)?;
    if options.apply_clock_skew_correction {
        observed = correct_clock_skew(observed, clock.now());
    }
    let observed_at = observed.to_rfc3339_opts(SecondsFormat::Secs, true);

    let attributes = vec![
        Attribute::number("temperature", temperature).observed_at(&observed_at),
        Attribute::number("windSpeed", wind_speed).observed_at(&observed_at),
        Attribute::number("windDirection", wind_direction).observed_at(&observed_at),
        Attribute::number("relativeHumidity", relative_humidity.round() / 100.0)
            .observed_at(&observed_at),
        Attribute::date_time("dateObserved", observed_at),
    ];

    Ok(ObservationAttributes { attributes })
}

/// Parses a finite float. `NaN` and infinities are rejected.
pub fn parse_f64(field: &'static str, raw: &str) -> Result<f64, ParseError> {
    raw.parse::<f64>()
        .ok()
        .filter(|value| value.is_finite())
        .ok_or_else(|| ParseError {
            field,
            value: raw.to_string(),
        })
}

/// Station clocks report naive local time; it is taken as UTC as-is.
fn parse_station_time(raw: &str) -> Result<DateTime<Utc>, ParseError> {
    let error = || ParseError {
        field: "dateObserved",
        value: raw.to_string(),
    };

    if !has_fixed_layout(raw) {
        return Err(error());
    }

    NaiveDateTime::parse_from_str(raw, STATION_TIME_FORMAT)
        .map(|naive| naive.and_utc())
        .map_err(|_| error())
}

/// `%m`, `%d` and friends accept single digits; the station always zero-pads.
fn has_fixed_layout(raw: &str) -> bool {
    raw.len() == STATION_TIME_LAYOUT.len()
        && raw
            .bytes()
            .zip(STATION_TIME_LAYOUT.bytes())
            .all(|(actual, expected)| match expected {
                b'0' => actual.is_ascii_digit(),
                separator => actual == separator,
            })
}

/// Steps `observed` back one hour at a time until it is no later than `now`.
fn correct_clock_skew(observed: DateTime<Utc>, now: DateTime<Utc>) -> DateTime<Utc> {
    if observed <= now {
        return observed;
    }

    let ahead = observed - now;
    let mut hours = ahead.num_hours();
    if ahead > Duration::hours(hours) {
        hours += 1;
    }

    observed - Duration::hours(hours)
}

/// Appends the separator to `prefix_ending` unless it already ends with one.
pub fn normalize_prefix_ending(prefix_ending: &str) -> String {
    if prefix_ending.ends_with(PREFIX_SEPARATOR) {
        prefix_ending.to_string()
    } else {
        format!("{prefix_ending}{PREFIX_SEPARATOR}")
    }
}

/// `prefix_ending` is expected to be normalized already.
pub fn weather_observed_id(prefix_ending: &str, station_id: &str) -> String {
    format!("{WEATHER_OBSERVED_ID_PREFIX}{prefix_ending}{station_id}")
}
