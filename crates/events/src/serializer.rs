//! Serialization capabilities consumed by the envelope codec.
//!
//! The producer never decides how payloads look on the wire; it asks an
//! [`EventSerializer`] for the type tag and bytes and a [`MetadataSerializer`]
//! for the metadata body. JSON implementations are provided as defaults.

use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;

use crate::event::Event;
use crate::metadata::Metadata;

/// Serialization failure reported by a codec.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("{what} serialization failed: {reason}")]
pub struct SerializationError {
    pub what: &'static str,
    pub reason: String,
}

impl SerializationError {
    pub fn event(reason: impl Into<String>) -> Self {
        Self {
            what: "event",
            reason: reason.into(),
        }
    }

    pub fn metadata(reason: impl Into<String>) -> Self {
        Self {
            what: "metadata",
            reason: reason.into(),
        }
    }
}

/// Output of [`EventSerializer::serialize_event`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SerializedEvent {
    pub event_type: String,
    pub payload: Vec<u8>,
}

/// Turns an application event into a type tag plus payload bytes.
pub trait EventSerializer<E>: Send + Sync {
    fn serialize_event(&self, event: &E) -> Result<SerializedEvent, SerializationError>;

    /// Content type of the payloads this serializer produces.
    fn content_type(&self) -> &str;
}

/// Turns a metadata mapping into bytes.
pub trait MetadataSerializer: Send + Sync {
    fn serialize(&self, metadata: &Metadata) -> Result<Vec<u8>, SerializationError>;
}

impl<E, S> EventSerializer<E> for Arc<S>
where
    S: EventSerializer<E> + ?Sized,
{
    fn serialize_event(&self, event: &E) -> Result<SerializedEvent, SerializationError> {
        (**self).serialize_event(event)
    }

    fn content_type(&self) -> &str {
        (**self).content_type()
    }
}

impl<S> MetadataSerializer for Arc<S>
where
    S: MetadataSerializer + ?Sized,
{
    fn serialize(&self, metadata: &Metadata) -> Result<Vec<u8>, SerializationError> {
        (**self).serialize(metadata)
    }
}

/// Default event serializer: `serde_json` payload, tag from [`Event::event_type`].
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEventSerializer;

impl JsonEventSerializer {
    pub const CONTENT_TYPE: &'static str = "application/json";
}

impl<E> EventSerializer<E> for JsonEventSerializer
where
    E: Event + Serialize,
{
    fn serialize_event(&self, event: &E) -> Result<SerializedEvent, SerializationError> {
        let payload =
            serde_json::to_vec(event).map_err(|e| SerializationError::event(e.to_string()))?;

        Ok(SerializedEvent {
            event_type: event.event_type().to_string(),
            payload,
        })
    }

    fn content_type(&self) -> &str {
        Self::CONTENT_TYPE
    }
}

/// Default metadata serializer: a flat JSON object.
#[derive(Debug, Clone, Copy, Default)]
pub struct JsonMetadataSerializer;

impl MetadataSerializer for JsonMetadataSerializer {
    fn serialize(&self, metadata: &Metadata) -> Result<Vec<u8>, SerializationError> {
        serde_json::to_vec(metadata).map_err(|e| SerializationError::metadata(e.to_string()))
    }
}
