//! Key-value metadata carried next to every produced message.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;

use eventide_core::{CoreError, MessageId};

/// Well-known metadata keys.
pub struct MetaTags;

impl MetaTags {
    /// Identity of the message. Lifted into the record's event id on encode.
    pub const MESSAGE_ID: &'static str = "message-id";
    pub const CORRELATION_ID: &'static str = "$correlationId";
    pub const CAUSATION_ID: &'static str = "$causationId";
}

/// Mutable metadata mapping (string keys, scalar JSON values).
///
/// Keys are kept ordered so serialized metadata is byte-for-byte stable for the
/// same contents.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Metadata(BTreeMap<String, JsonValue>);

impl Metadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Builder-style insert.
    pub fn with(mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Self {
        self.insert(key, value);
        self
    }

    pub fn insert(&mut self, key: impl Into<String>, value: impl Into<JsonValue>) -> Option<JsonValue> {
        self.0.insert(key.into(), value.into())
    }

    pub fn get(&self, key: &str) -> Option<&JsonValue> {
        self.0.get(key)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(JsonValue::as_str)
    }

    pub fn remove(&mut self, key: &str) -> Option<JsonValue> {
        self.0.remove(key)
    }

    pub fn contains_key(&self, key: &str) -> bool {
        self.0.contains_key(key)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &JsonValue)> {
        self.0.iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn with_message_id(mut self, id: MessageId) -> Self {
        self.insert(MetaTags::MESSAGE_ID, id.to_string());
        self
    }

    pub fn with_correlation_id(self, id: impl Into<String>) -> Self {
        self.with(MetaTags::CORRELATION_ID, id.into())
    }

    pub fn with_causation_id(self, id: impl Into<String>) -> Self {
        self.with(MetaTags::CAUSATION_ID, id.into())
    }

    /// Read the message identity.
    ///
    /// `Ok(None)` when the field is absent; an error when it is present but not
    /// a UUID string.
    pub fn message_id(&self) -> Result<Option<MessageId>, CoreError> {
        parse_message_id(self.get(MetaTags::MESSAGE_ID))
    }

    /// Remove the message identity, returning its parsed value.
    pub fn take_message_id(&mut self) -> Result<Option<MessageId>, CoreError> {
        parse_message_id(self.remove(MetaTags::MESSAGE_ID).as_ref())
    }

    pub fn correlation_id(&self) -> Option<&str> {
        self.get_str(MetaTags::CORRELATION_ID)
    }

    pub fn causation_id(&self) -> Option<&str> {
        self.get_str(MetaTags::CAUSATION_ID)
    }
}

fn parse_message_id(value: Option<&JsonValue>) -> Result<Option<MessageId>, CoreError> {
    match value {
        None => Ok(None),
        Some(JsonValue::String(s)) => s.parse().map(Some),
        Some(other) => Err(CoreError::invalid_id(format!(
            "{} must be a UUID string, got {other}",
            MetaTags::MESSAGE_ID
        ))),
    }
}

impl FromIterator<(String, JsonValue)> for Metadata {
    fn from_iter<T: IntoIterator<Item = (String, JsonValue)>>(iter: T) -> Self {
        Self(iter.into_iter().collect())
    }
}
