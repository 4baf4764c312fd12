use std::collections::HashSet;

use serde::Serialize;
use serde_json::{Map, Value, json};
use thiserror::Error;

pub const WEATHER_OBSERVED_TYPE: &str = "WeatherObserved";
pub const WEATHER_OBSERVED_ID_PREFIX: &str = "urn:ngsi-ld:WeatherObserved:";
pub const NGSI_LD_CORE_CONTEXT: &str = "https://uri.etsi.org/ngsi-ld/v1/ngsi-ld-core-context.jsonld";

const RESERVED_KEYS: &[&str] = &["id", "type", "@context"];

#[derive(Debug, Error, PartialEq)]
pub enum EntityError {
    #[error("entity id must not be empty")]
    EmptyId,
    #[error("attribute {0} appears more than once")]
    DuplicateAttribute(String),
    #[error("attribute name {0} is reserved")]
    ReservedAttribute(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum AttributeValue {
    Number(f64),
    DateTime(String),
    Text(String),
    Point { latitude: f64, longitude: f64 },
}

/// A single named property, optionally qualified with the time it was observed.
#[derive(Debug, Clone, PartialEq)]
pub struct Attribute {
    pub name: String,
    pub value: AttributeValue,
    pub observed_at: Option<String>,
}

impl Attribute {
    pub fn number(name: &str, value: f64) -> Self {
        Self::new(name, AttributeValue::Number(value))
    }

    pub fn date_time(name: &str, value: impl Into<String>) -> Self {
        Self::new(name, AttributeValue::DateTime(value.into()))
    }

    pub fn text(name: &str, value: impl Into<String>) -> Self {
        Self::new(name, AttributeValue::Text(value.into()))
    }

    pub fn location(latitude: f64, longitude: f64) -> Self {
        Self::new(
            "location",
            AttributeValue::Point {
                latitude,
                longitude,
            },
        )
    }

    pub fn observed_at(mut self, timestamp: impl Into<String>) -> Self {
        self.observed_at = Some(timestamp.into());
        self
    }

    fn new(name: &str, value: AttributeValue) -> Self {
        Self {
            name: name.to_string(),
            value,
            observed_at: None,
        }
    }

    pub fn to_json(&self) -> Value {
        let mut property = match &self.value {
            AttributeValue::Number(number) => json!({ "type": "Property", "value": number }),
            AttributeValue::Text(text) => json!({ "type": "Property", "value": text }),
            AttributeValue::DateTime(timestamp) => json!({
                "type": "Property",
                "value": { "@type": "DateTime", "@value": timestamp },
            }),
            // GeoJSON orders coordinates longitude first.
            AttributeValue::Point {
                latitude,
                longitude,
            } => json!({
                "type": "GeoProperty",
                "value": { "type": "Point", "coordinates": [longitude, latitude] },
            }),
        };

        if let (Some(observed_at), Some(object)) = (&self.observed_at, property.as_object_mut()) {
            object.insert("observedAt".to_string(), Value::String(observed_at.clone()));
        }

        property
    }
}

/// Partial entity body used for merge requests.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct EntityFragment(Map<String, Value>);

impl EntityFragment {
    pub fn new(attributes: &[Attribute], context: &str) -> Result<Self, EntityError> {
        let mut body = attribute_map(attributes)?;
        body.insert("@context".to_string(), json!([context]));
        Ok(Self(body))
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

/// Complete entity body used for creation.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(transparent)]
pub struct Entity(Map<String, Value>);

impl Entity {
    pub fn new(
        id: &str,
        entity_type: &str,
        attributes: &[Attribute],
        context: &str,
    ) -> Result<Self, EntityError> {
        if id.trim().is_empty() {
            return Err(EntityError::EmptyId);
        }

        let mut body = Map::new();
        body.insert("id".to_string(), Value::String(id.to_string()));
        body.insert("type".to_string(), Value::String(entity_type.to_string()));
        body.extend(attribute_map(attributes)?);
        body.insert("@context".to_string(), json!([context]));

        Ok(Self(body))
    }

    pub fn id(&self) -> Option<&str> {
        self.0.get("id").and_then(Value::as_str)
    }

    pub fn entity_type(&self) -> Option<&str> {
        self.0.get("type").and_then(Value::as_str)
    }

    pub fn attribute(&self, name: &str) -> Option<&Value> {
        self.0.get(name)
    }
}

fn attribute_map(attributes: &[Attribute]) -> Result<Map<String, Value>, EntityError> {
    let mut seen = HashSet::new();
    let mut body = Map::new();

    for attribute in attributes {
        if RESERVED_KEYS.contains(&attribute.name.as_str()) {
            return Err(EntityError::ReservedAttribute(attribute.name.clone()));
        }
        if !seen.insert(attribute.name.as_str()) {
            return Err(EntityError::DuplicateAttribute(attribute.name.clone()));
        }
        body.insert(attribute.name.clone(), attribute.to_json());
    }

    Ok(body)
}
