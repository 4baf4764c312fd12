use std::time::Duration;

use reqwest::StatusCode;
use reqwest::blocking::{Client, RequestBuilder};
use reqwest::header::CONTENT_TYPE;
use thiserror::Error;

use crate::domain::ngsi::{Entity, EntityFragment};

const LD_JSON: &str = "application/ld+json";
const ENTITIES_PATH: &str = "/ngsi-ld/v1/entities";

/// The two NGSI-LD operations the sync needs from a context broker.
pub trait ContextBroker {
    /// Partially updates an existing entity. Fails with [`BrokerError::NotFound`]
    /// when no entity with `entity_id` exists.
    fn merge_entity(&self, entity_id: &str, fragment: &EntityFragment) -> Result<(), BrokerError>;
    fn create_entity(&self, entity: &Entity) -> Result<(), BrokerError>;
}

#[derive(Debug, Error)]
pub enum BrokerError {
    #[error("entity not found")]
    NotFound,
    #[error("failed to build context broker client: {0}")]
    Client(#[source] reqwest::Error),
    #[error("failed to encode request body: {0}")]
    Encode(#[source] serde_json::Error),
    #[error("request to context broker failed: {0}")]
    Transport(#[source] reqwest::Error),
    #[error("context broker responded with status {status}: {body}")]
    Status { status: u16, body: String },
}

impl BrokerError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, Self::NotFound)
    }
}

#[derive(Debug, Clone)]
pub struct HttpContextBroker {
    base_url: String,
    client: Client,
}

impl HttpContextBroker {
    pub fn new(base_url: &str, timeout: Duration) -> Result<Self, BrokerError> {
        let client = Client::builder()
            .timeout(timeout)
            .build()
            .map_err(BrokerError::Client)?;

        Ok(Self {
            base_url: base_url.trim_end_matches('/').to_string(),
            client,
        })
    }

    fn entities_url(&self) -> String {
        format!("{}{ENTITIES_PATH}", self.base_url)
    }

    fn send(&self, request: RequestBuilder, body: Vec<u8>) -> Result<StatusCode, BrokerError> {
        let response = request
            .header(CONTENT_TYPE, LD_JSON)
            .body(body)
            .send()
            .map_err(BrokerError::Transport)?;

        let status = response.status();
        if status.is_success() || status == StatusCode::NOT_FOUND {
            return Ok(status);
        }

        let body = response.text().unwrap_or_default();
        Err(BrokerError::Status {
            status: status.as_u16(),
            body,
        })
    }
}

impl ContextBroker for HttpContextBroker {
    fn merge_entity(&self, entity_id: &str, fragment: &EntityFragment) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(fragment).map_err(BrokerError::Encode)?;
        let url = format!("{}/{entity_id}", self.entities_url());

        match self.send(self.client.patch(url), body)? {
            StatusCode::NOT_FOUND => Err(BrokerError::NotFound),
            _ => Ok(()),
        }
    }

    fn create_entity(&self, entity: &Entity) -> Result<(), BrokerError> {
        let body = serde_json::to_vec(entity).map_err(BrokerError::Encode)?;

        match self.send(self.client.post(self.entities_url()), body)? {
            StatusCode::NOT_FOUND => Err(BrokerError::Status {
                status: StatusCode::NOT_FOUND.as_u16(),
                body: String::new(),
            }),
            _ => Ok(()),
        }
    }
}

#[cfg(test)]
mod tests {
    use std::time::Duration;

    use super::{BrokerError, ContextBroker, HttpContextBroker};
    use crate::domain::ngsi::{Attribute, Entity, EntityFragment, NGSI_LD_CORE_CONTEXT};
    use crate::test_support::{CannedResponse, HttpResponder};

    const ENTITY_ID: &str = "urn:ngsi-ld:WeatherObserved:se:S-1";

    fn broker_for(responder: &HttpResponder) -> HttpContextBroker {
        HttpContextBroker::new(&responder.url(), Duration::from_secs(2))
            .expect("client should build")
    }

    fn fragment() -> EntityFragment {
        EntityFragment::new(&[Attribute::number("temperature", 4.5)], NGSI_LD_CORE_CONTEXT)
            .expect("fragment should build")
    }

    #[test]
    fn merge_patches_entity_with_ld_json() {
        let responder = HttpResponder::start(|_| CannedResponse::new(204, ""));

        broker_for(&responder)
            .merge_entity(ENTITY_ID, &fragment())
            .expect("merge should succeed");

        let requests = responder.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "PATCH");
        assert_eq!(
            requests[0].path,
            format!("/ngsi-ld/v1/entities/{ENTITY_ID}")
        );
        assert_eq!(
            requests[0].content_type.as_deref(),
            Some("application/ld+json")
        );

        let body: serde_json::Value =
            serde_json::from_str(&requests[0].body).expect("body should be json");
        assert_eq!(body["temperature"]["value"], 4.5);
    }

    #[test]
    fn merge_reports_not_found() {
        let responder = HttpResponder::start(|_| CannedResponse::new(404, "{}"));

        let error = broker_for(&responder)
            .merge_entity(ENTITY_ID, &fragment())
            .expect_err("merge should fail");

        assert!(error.is_not_found());
    }

    #[test]
    fn merge_surfaces_other_failures_with_status() {
        let responder = HttpResponder::start(|_| CannedResponse::new(500, "boom"));

        let error = broker_for(&responder)
            .merge_entity(ENTITY_ID, &fragment())
            .expect_err("merge should fail");

        assert!(matches!(
            error,
            BrokerError::Status { status: 500, ref body } if body == "boom"
        ));
    }

    #[test]
    fn create_posts_full_entity() {
        let responder = HttpResponder::start(|_| CannedResponse::new(201, ""));
        let entity = Entity::new(
            ENTITY_ID,
            "WeatherObserved",
            &[Attribute::text("name", "Station")],
            NGSI_LD_CORE_CONTEXT,
        )
        .expect("entity should build");

        broker_for(&responder)
            .create_entity(&entity)
            .expect("create should succeed");

        let requests = responder.requests();
        assert_eq!(requests.len(), 1);
        assert_eq!(requests[0].method, "POST");
        assert_eq!(requests[0].path, "/ngsi-ld/v1/entities");

        let body: serde_json::Value =
            serde_json::from_str(&requests[0].body).expect("body should be json");
        assert_eq!(body["id"], ENTITY_ID);
        assert_eq!(body["type"], "WeatherObserved");
    }

    #[test]
    fn create_conflict_is_an_error() {
        let responder = HttpResponder::start(|_| CannedResponse::new(409, "already exists"));
        let entity = Entity::new(ENTITY_ID, "WeatherObserved", &[], NGSI_LD_CORE_CONTEXT)
            .expect("entity should build");

        let error = broker_for(&responder)
            .create_entity(&entity)
            .expect_err("create should fail");

        assert!(matches!(error, BrokerError::Status { status: 409, .. }));
    }
}
