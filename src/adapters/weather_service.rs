use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::Client;
use thiserror::Error;

use crate::domain::station::{StationEnvelope, StationId, StationReading};

pub trait StationFetcher {
    fn fetch(&self, station_id: &StationId) -> Result<StationReading, FetchError>;
}

#[derive(Debug, Error)]
pub enum FetchError {
    #[error("failed to build weather service client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("request to {url} failed: {source}")]
    Transport {
        url: String,
        #[source]
        source: reqwest::Error,
    },
    #[error("request to {url} failed, expected status code 200 but got: {status}")]
    HttpStatus { url: String, status: u16 },
    #[error("failed to decode station response from {url}: {source}")]
    Decode {
        url: String,
        #[source]
        source: serde_json::Error,
    },
}

impl FetchError {
    pub fn status(&self) -> Option<u16> {
        match self {
            Self::HttpStatus { status, .. } => Some(*status),
            _ => None,
        }
    }
}

#[derive(Debug, Clone)]
pub struct HttpStationFetcher {
    base_url: String,
    client: Client,
}

impl HttpStationFetcher {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, FetchError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(FetchError::Client)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    pub fn station_url(&self, station_id: &StationId) -> String {
        format!("{}/stations/{station_id}.last", self.base_url)
    }
}

impl StationFetcher for HttpStationFetcher {
    fn fetch(&self, station_id: &StationId) -> Result<StationReading, FetchError> {
        let url = self.station_url(station_id);

        let response = self
            .client
            .get(&url)
            .send()
            .map_err(|source| FetchError::Transport {
                url: url.clone(),
                source,
            })?;

        if response.status() != StatusCode::OK {
            return Err(FetchError::HttpStatus {
                url,
                status: response.status().as_u16(),
            });
        }

        let body = response.text().map_err(|source| FetchError::Transport {
            url: url.clone(),
            source,
        })?;

        let envelope: StationEnvelope =
            serde_json::from_str(&body).map_err(|source| FetchError::Decode { url, source })?;

        Ok(envelope.station)
    }
}
