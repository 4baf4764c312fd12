use std::cell::RefCell;
use std::io::Read;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex};
use std::thread::JoinHandle;

use tiny_http::{Header, Response, Server};

use crate::adapters::context_broker::{BrokerError, ContextBroker};
use crate::domain::ngsi::{Entity, EntityFragment};

#[derive(Debug, Clone, PartialEq)]
pub struct RecordedRequest {
    pub method: String,
    pub path: String,
    pub content_type: Option<String>,
    pub body: String,
}

#[derive(Debug, Clone)]
pub struct CannedResponse {
    pub status: u16,
    pub body: String,
}

impl CannedResponse {
    pub fn new(status: u16, body: impl Into<String>) -> Self {
        Self {
            status,
            body: body.into(),
        }
    }
}

/// Loopback HTTP server that records every request it answers.
pub struct HttpResponder {
    addr: SocketAddr,
    server: Arc<Server>,
    requests: Arc<Mutex<Vec<RecordedRequest>>>,
    handle: Option<JoinHandle<()>>,
}

impl HttpResponder {
    pub fn start<H>(handler: H) -> Self
    where
        H: Fn(&RecordedRequest) -> CannedResponse + Send + 'static,
    {
        let server = Arc::new(Server::http("127.0.0.1:0").expect("responder should bind"));
        let addr = server
            .server_addr()
            .to_ip()
            .expect("responder should listen on an ip address");
        let requests = Arc::new(Mutex::new(Vec::new()));

        let handle = std::thread::spawn({
            let server = Arc::clone(&server);
            let requests = Arc::clone(&requests);
            move || {
                for mut request in server.incoming_requests() {
                    let mut body = String::new();
                    if request.as_reader().read_to_string(&mut body).is_err() {
                        continue;
                    }

                    let recorded = RecordedRequest {
                        method: request.method().to_string(),
                        path: request.url().to_string(),
                        content_type: request
                            .headers()
                            .iter()
                            .find(|header| header.field.equiv("Content-Type"))
                            .map(|header| header.value.as_str().to_string()),
                        body,
                    };

                    let canned = handler(&recorded);
                    requests
                        .lock()
                        .expect("request log lock should be available")
                        .push(recorded);

                    let response = Response::from_string(canned.body)
                        .with_status_code(canned.status)
                        .with_header(
                            Header::from_bytes(&b"Content-Type"[..], &b"application/json"[..])
                                .expect("static header should be valid"),
                        );
                    let _ = request.respond(response);
                }
            }
        });

        Self {
            addr,
            server,
            requests,
            handle: Some(handle),
        }
    }

    pub fn url(&self) -> String {
        format!("http://{}", self.addr)
    }

    pub fn requests(&self) -> Vec<RecordedRequest> {
        self.requests
            .lock()
            .expect("request log lock should be available")
            .clone()
    }
}

impl Drop for HttpResponder {
    fn drop(&mut self) {
        self.server.unblock();
        if let Some(handle) = self.handle.take() {
            let _ = handle.join();
        }
    }
}

pub const STATION_PAYLOAD: &str = r#"{"station":{
    "STATION_ID": "S-vall-01-02",
    "NAME": "Sundsvall Sodra berget",
    "CUSTOMER": "Sundsvall",
    "LAT": "62.36623300",
    "LON": "17.30874500",
    "ELEVATION": "",
    "logg":[{
        "MESSAGE_DATE_TIME": "2023-01-13 15:40:00",
        "WIND_MINIMUM_SPEED": "1.1",
        "WIND_AVERAGE_SPEED": "1.9",
        "WIND_MAXIMUM_SPEED": "3.1",
        "WIND_DIRECTION": "62.0",
        "WIND_DIRECTION_VARIABILITY": "5.0",
        "TEMPERATURE": "-1.0",
        "RELATIVE_HUMIDITY": "100.0"
    }]
}}"#;

#[derive(Debug, Clone, Copy)]
pub enum MergeReply {
    Ok,
    NotFound,
    Status(u16),
}

/// In-memory broker that records every call it receives.
pub struct RecordingBroker {
    merge_reply: MergeReply,
    fail_creates: bool,
    merges: RefCell<Vec<(String, EntityFragment)>>,
    creates: RefCell<Vec<Entity>>,
}

impl RecordingBroker {
    pub fn new(merge_reply: MergeReply) -> Self {
        Self {
            merge_reply,
            fail_creates: false,
            merges: RefCell::new(Vec::new()),
            creates: RefCell::new(Vec::new()),
        }
    }

    pub fn failing_creates(mut self) -> Self {
        self.fail_creates = true;
        self
    }

    pub fn merges(&self) -> Vec<(String, EntityFragment)> {
        self.merges.borrow().clone()
    }

    pub fn creates(&self) -> Vec<Entity> {
        self.creates.borrow().clone()
    }
}

impl ContextBroker for RecordingBroker {
    fn merge_entity(&self, entity_id: &str, fragment: &EntityFragment) -> Result<(), BrokerError> {
        self.merges
            .borrow_mut()
            .push((entity_id.to_string(), fragment.clone()));

        match self.merge_reply {
            MergeReply::Ok => Ok(()),
            MergeReply::NotFound => Err(BrokerError::NotFound),
            MergeReply::Status(status) => Err(BrokerError::Status {
                status,
                body: String::new(),
            }),
        }
    }

    fn create_entity(&self, entity: &Entity) -> Result<(), BrokerError> {
        self.creates.borrow_mut().push(entity.clone());

        if self.fail_creates {
            return Err(BrokerError::Status {
                status: 409,
                body: "already exists".to_string(),
            });
        }
        Ok(())
    }
}
