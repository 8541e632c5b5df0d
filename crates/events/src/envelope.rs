//! Transport records and the codec that builds them from produced messages.

use std::sync::Arc;

use thiserror::Error;
use uuid::Uuid;

use eventide_core::MessageId;

use crate::message::ProducedMessage;
use crate::metadata::MetaTags;
use crate::serializer::{
    EventSerializer, JsonEventSerializer, JsonMetadataSerializer, MetadataSerializer,
    SerializationError,
};

/// Transport-ready record appended to a stream.
///
/// This is the unit the store client writes. It is built once per produce
/// call, never mutated, and dropped after submission.
///
/// Notes:
/// - `event_id` is the store's native per-record identity and the canonical
///   source of the message id on read-back.
/// - `metadata` never repeats the message id.
/// - `content_type` always matches the serializer that produced `data`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct EventData {
    event_id: MessageId,
    event_type: String,
    data: Vec<u8>,
    metadata: Vec<u8>,
    content_type: String,
}

impl EventData {
    pub fn new(
        event_id: MessageId,
        event_type: impl Into<String>,
        data: Vec<u8>,
        metadata: Vec<u8>,
        content_type: impl Into<String>,
    ) -> Self {
        Self {
            event_id,
            event_type: event_type.into(),
            data,
            metadata,
            content_type: content_type.into(),
        }
    }

    pub fn event_id(&self) -> Uuid {
        *self.event_id.as_uuid()
    }

    pub fn message_id(&self) -> MessageId {
        self.event_id
    }

    pub fn event_type(&self) -> &str {
        &self.event_type
    }

    pub fn data(&self) -> &[u8] {
        &self.data
    }

    pub fn metadata(&self) -> &[u8] {
        &self.metadata
    }

    pub fn content_type(&self) -> &str {
        &self.content_type
    }
}

/// Failure to turn a message into [`EventData`].
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum EncodeError {
    #[error("message metadata has no `{}` entry", MetaTags::MESSAGE_ID)]
    MissingIdentity,

    #[error("message identity is not a valid id: {0}")]
    InvalidIdentity(String),

    #[error(transparent)]
    Serialization(#[from] SerializationError),
}

/// Builds [`EventData`] from produced messages using injected serializers.
pub struct EnvelopeCodec<E> {
    serializer: Arc<dyn EventSerializer<E>>,
    metadata_serializer: Arc<dyn MetadataSerializer>,
}

impl<E> Clone for EnvelopeCodec<E> {
    fn clone(&self) -> Self {
        Self {
            serializer: self.serializer.clone(),
            metadata_serializer: self.metadata_serializer.clone(),
        }
    }
}

impl<E> core::fmt::Debug for EnvelopeCodec<E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EnvelopeCodec")
            .field("content_type", &self.serializer.content_type())
            .finish_non_exhaustive()
    }
}

impl<E> EnvelopeCodec<E> {
    pub fn new(
        serializer: Arc<dyn EventSerializer<E>>,
        metadata_serializer: Arc<dyn MetadataSerializer>,
    ) -> Self {
        Self {
            serializer,
            metadata_serializer,
        }
    }

    pub fn content_type(&self) -> &str {
        self.serializer.content_type()
    }

    /// Encode one message.
    ///
    /// The message id is read from the metadata and removed from it before the
    /// metadata is serialized; it travels only as the record's `event_id`.
    pub fn encode(&self, produced: ProducedMessage<E>) -> Result<EventData, EncodeError> {
        let (message, mut metadata) = produced.into_parts();

        let serialized = self.serializer.serialize_event(&message)?;

        let event_id = metadata
            .take_message_id()
            .map_err(|e| EncodeError::InvalidIdentity(e.to_string()))?
            .ok_or(EncodeError::MissingIdentity)?;

        let metadata_bytes = self.metadata_serializer.serialize(&metadata)?;

        Ok(EventData::new(
            event_id,
            serialized.event_type,
            serialized.payload,
            metadata_bytes,
            self.serializer.content_type(),
        ))
    }
}

impl<E> Default for EnvelopeCodec<E>
where
    JsonEventSerializer: EventSerializer<E>,
{
    fn default() -> Self {
        Self::new(Arc::new(JsonEventSerializer), Arc::new(JsonMetadataSerializer))
    }
}
