use std::fmt;

use serde::Deserialize;

#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub struct StationId(String);

impl StationId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StationId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for StationId {
    fn from(value: &str) -> Self {
        Self::new(value)
    }
}

/// Splits a comma-separated station list, dropping blank entries.
pub fn parse_station_list(raw: &str) -> Vec<StationId> {
    raw.split(',')
        .map(str::trim)
        .filter(|id| !id.is_empty())
        .map(StationId::from)
        .collect()
}

/// Body of `GET /stations/{id}.last`.
#[derive(Debug, Clone, PartialEq, Deserialize)]
pub struct StationEnvelope {
    pub station: StationReading,
}

/// Latest reading for one station. Every leaf arrives as a string.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default)]
pub struct StationReading {
    #[serde(rename = "STATION_ID")]
    pub id: String,
    #[serde(rename = "NAME")]
    pub name: String,
    #[serde(rename = "CUSTOMER")]
    pub customer: String,
    #[serde(rename = "LAT")]
    pub latitude: String,
    #[serde(rename = "LON")]
    pub longitude: String,
    #[serde(rename = "ELEVATION")]
    pub elevation: String,
    /// Most recent entry first.
    #[serde(rename = "logg")]
    pub log: Vec<LogEntry>,
}

impl StationReading {
    pub fn latest(&self) -> Option<&LogEntry> {
        self.log.first()
    }
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "SCREAMING_SNAKE_CASE")]
pub struct LogEntry {
    #[serde(rename = "MESSAGE_DATE_TIME")]
    pub date_time: String,
    pub wind_minimum_speed: String,
    pub wind_average_speed: String,
    pub wind_maximum_speed: String,
    pub wind_direction: String,
    pub wind_direction_variability: String,
    pub temperature: String,
    pub relative_humidity: String,
}
