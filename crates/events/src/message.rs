use eventide_core::MessageId;

use crate::metadata::Metadata;

/// A message handed to the producer: the event plus its metadata.
///
/// Construction guarantees the metadata carries a message identity. Both fields
/// stay public so callers can enrich metadata before producing.
#[derive(Debug, Clone, PartialEq)]
pub struct ProducedMessage<E> {
    pub message: E,
    pub metadata: Metadata,
}

impl<E> ProducedMessage<E> {
    /// Wrap an event with fresh metadata and a new message id.
    pub fn new(message: E) -> Self {
        Self::with_metadata(message, Metadata::new())
    }

    /// Wrap an event with caller metadata.
    ///
    /// Metadata without a `message-id` gains a freshly generated one.
    pub fn with_metadata(message: E, mut metadata: Metadata) -> Self {
        if !metadata.contains_key(crate::MetaTags::MESSAGE_ID) {
            metadata = metadata.with_message_id(MessageId::new());
        }
        Self { message, metadata }
    }

    /// Wrap an event under an explicit identity (useful for idempotent retries).
    pub fn with_id(message: E, id: MessageId) -> Self {
        Self {
            message,
            metadata: Metadata::new().with_message_id(id),
        }
    }

    pub fn into_parts(self) -> (E, Metadata) {
        (self.message, self.metadata)
    }
}
