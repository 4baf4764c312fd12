use thiserror::Error;

use crate::adapters::context_broker::{BrokerError, ContextBroker};
use crate::domain::ngsi::{Attribute, Entity, EntityError, EntityFragment, WEATHER_OBSERVED_TYPE};
use crate::domain::observation::{ObservationAttributes, ParseError, parse_f64};
use crate::domain::station::StationReading;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpsertOutcome {
    Merged,
    Created,
}

#[derive(Debug, Error)]
pub enum UpsertError {
    #[error("failed to merge entity {entity_id}: {source}")]
    Merge {
        entity_id: String,
        #[source]
        source: BrokerError,
    },
    #[error("failed to create entity {entity_id}: {source}")]
    Create {
        entity_id: String,
        #[source]
        source: BrokerError,
    },
    #[error("failed to construct entity {entity_id}: {source}")]
    Entity {
        entity_id: String,
        #[source]
        source: EntityError,
    },
    #[error(transparent)]
    Parse(#[from] ParseError),
}

/// Merges `attributes` into the entity, creating it when the broker has no such entity yet.
///
/// Creation adds `location` and `name` from the station metadata.
pub fn upsert<B: ContextBroker>(
    broker: &B,
    entity_id: &str,
    mut attributes: ObservationAttributes,
    reading: &StationReading,
    context: &str,
) -> Result<UpsertOutcome, UpsertError> {
    let fragment =
        EntityFragment::new(attributes.as_slice(), context).map_err(|source| UpsertError::Entity {
            entity_id: entity_id.to_string(),
            source,
        })?;

    tracing::info!(entity_id, "merging entity");
    match broker.merge_entity(entity_id, &fragment) {
        Ok(()) => return Ok(UpsertOutcome::Merged),
        Err(error) if error.is_not_found() => {
            tracing::info!(entity_id, "entity not found, attempting create");
        }
        Err(source) => {
            return Err(UpsertError::Merge {
                entity_id: entity_id.to_string(),
                source,
            });
        }
    }

    let latitude = parse_f64("latitude", &reading.latitude)?;
    let longitude = parse_f64("longitude", &reading.longitude)?;
    attributes.push(Attribute::location(latitude, longitude));
    attributes.push(Attribute::text("name", reading.name.clone()));

    let entity = Entity::new(
        entity_id,
        WEATHER_OBSERVED_TYPE,
        attributes.as_slice(),
        context,
    )
    .map_err(|source| UpsertError::Entity {
        entity_id: entity_id.to_string(),
        source,
    })?;

    broker
        .create_entity(&entity)
        .map_err(|source| UpsertError::Create {
            entity_id: entity_id.to_string(),
            source,
        })?;

    tracing::info!(entity_id, "entity created");
    Ok(UpsertOutcome::Created)
}
