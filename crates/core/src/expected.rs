//! Optimistic-concurrency expectations for a conditional append.

use serde::{Deserialize, Serialize};

/// Zero-based revision of the last event in a stream.
///
/// The first event appended to a stream has revision `0`.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct StreamRevision(u64);

impl StreamRevision {
    pub const fn new(revision: u64) -> Self {
        Self(revision)
    }

    pub const fn value(self) -> u64 {
        self.0
    }

    /// Revision of the event that would follow this one.
    pub const fn next(self) -> Self {
        Self(self.0 + 1)
    }
}

impl core::fmt::Display for StreamRevision {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        core::fmt::Display::fmt(&self.0, f)
    }
}

impl From<u64> for StreamRevision {
    fn from(value: u64) -> Self {
        Self(value)
    }
}

/// Precondition the store checks before accepting an append.
///
/// A mismatch is terminal for the append: the store rejects it and the caller
/// decides whether to reload and retry.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(tag = "kind", content = "revision", rename_all = "snake_case")]
pub enum ExpectedState {
    /// Skip the check entirely.
    #[default]
    Any,
    /// The stream must already hold at least one event.
    StreamExists,
    /// The stream must not exist yet.
    NoStream,
    /// The stream's last event must be at exactly this revision.
    Exact(StreamRevision),
}

impl ExpectedState {
    pub fn exact(revision: u64) -> Self {
        Self::Exact(StreamRevision::new(revision))
    }

    /// Check the expectation against the stream's current revision
    /// (`None` when the stream does not exist).
    pub fn matches(self, current: Option<StreamRevision>) -> bool {
        match (self, current) {
            (ExpectedState::Any, _) => true,
            (ExpectedState::StreamExists, current) => current.is_some(),
            (ExpectedState::NoStream, current) => current.is_none(),
            (ExpectedState::Exact(expected), Some(actual)) => expected == actual,
            (ExpectedState::Exact(_), None) => false,
        }
    }

    /// Whether this expectation can only be met by an existing stream.
    pub fn requires_existing_stream(self) -> bool {
        matches!(self, ExpectedState::StreamExists | ExpectedState::Exact(_))
    }
}

impl core::fmt::Display for ExpectedState {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match self {
            ExpectedState::Any => f.write_str("any"),
            ExpectedState::StreamExists => f.write_str("stream-exists"),
            ExpectedState::NoStream => f.write_str("no-stream"),
            ExpectedState::Exact(rev) => write!(f, "revision {rev}"),
        }
    }
}
