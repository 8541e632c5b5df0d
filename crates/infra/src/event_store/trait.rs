use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio_util::sync::CancellationToken;

use eventide_core::{ExpectedState, StreamName, StreamRevision};
use eventide_events::EventData;

use crate::config::{ClientSettings, ConfigError};

/// Where a successful append landed.
///
/// - `next_expected_revision`: revision of the last event written (use it as
///   the `Exact` expectation of the next append).
/// - `commit_position`: position in the store's global log after the append.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppendPosition {
    pub next_expected_revision: StreamRevision,
    pub commit_position: u64,
}

/// Store-side append failure.
///
/// The variants keep precondition failures apart from transport problems:
///
/// - **WrongExpectedVersion / StreamNotFound**: the optimistic-concurrency
///   precondition did not hold. Terminal; never retried here.
/// - **Transport / DeadlineExceeded**: the call did not complete. The caller
///   owns the retry policy.
/// - **MaximumAppendSizeExceeded**: the store refused the size of the batch.
/// - **Cancelled**: the caller's cancellation token fired.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AppendError {
    #[error(
        "wrong expected version for stream '{stream}': expected {expected}, actual {}",
        describe_revision(.actual)
    )]
    WrongExpectedVersion {
        stream: StreamName,
        expected: ExpectedState,
        actual: Option<StreamRevision>,
    },

    #[error("stream '{stream}' not found")]
    StreamNotFound { stream: StreamName },

    #[error("maximum append size exceeded: {actual} events (max {max})")]
    MaximumAppendSizeExceeded { max: usize, actual: usize },

    #[error("transport failure: {0}")]
    Transport(String),

    #[error("deadline of {0:?} exceeded")]
    DeadlineExceeded(Duration),

    #[error("append cancelled")]
    Cancelled,
}

fn describe_revision(revision: &Option<StreamRevision>) -> String {
    match revision {
        Some(rev) => rev.to_string(),
        None => "no stream".to_string(),
    }
}

impl AppendError {
    pub fn transport(msg: impl Into<String>) -> Self {
        Self::Transport(msg.into())
    }

    /// The store rejected the append's expected-state precondition.
    pub fn is_precondition_failure(&self) -> bool {
        matches!(
            self,
            AppendError::WrongExpectedVersion { .. } | AppendError::StreamNotFound { .. }
        )
    }

    /// The call may succeed if repeated unchanged.
    pub fn is_transient(&self) -> bool {
        matches!(
            self,
            AppendError::Transport(_) | AppendError::DeadlineExceeded(_)
        )
    }
}

/// Per-call operation settings.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct OperationOptions {
    /// Upper bound on the duration of one append call.
    pub deadline: Option<Duration>,
    /// Only the cluster leader may accept the write.
    pub requires_leader: bool,
}

impl OperationOptions {
    pub fn with_deadline(mut self, deadline: Duration) -> Self {
        self.deadline = Some(deadline);
        self
    }

    pub fn with_requires_leader(mut self, requires_leader: bool) -> Self {
        self.requires_leader = requires_leader;
        self
    }
}

/// Credentials sent with an append.
#[derive(Clone, PartialEq, Eq)]
pub struct UserCredentials {
    username: String,
    password: String,
}

impl UserCredentials {
    pub fn new(username: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            username: username.into(),
            password: password.into(),
        }
    }

    pub fn username(&self) -> &str {
        &self.username
    }

    pub fn password(&self) -> &str {
        &self.password
    }
}

impl core::fmt::Debug for UserCredentials {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("UserCredentials")
            .field("username", &self.username)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Client for an append-only event store.
///
/// This is the only network boundary the producer depends on. One call carries
/// one atomic append: either every event in `events` is written, in order, or
/// none is.
///
/// ## Expected state
///
/// Implementations must check `expected_state` against the stream's current
/// revision before writing and fail with `WrongExpectedVersion` (or
/// `StreamNotFound` when the stream had to exist) instead of writing.
///
/// ## Thread Safety
///
/// The client is shared by every produce call, so it must be `Send + Sync`
/// and safe to use concurrently.
#[async_trait]
pub trait StoreClient: Send + Sync {
    async fn append_to_stream(
        &self,
        stream: &StreamName,
        expected_state: ExpectedState,
        events: Vec<EventData>,
        options: &OperationOptions,
        credentials: Option<&UserCredentials>,
        cancel: &CancellationToken,
    ) -> Result<AppendPosition, AppendError>;
}

#[async_trait]
impl<C> StoreClient for Arc<C>
where
    C: StoreClient + ?Sized,
{
    async fn append_to_stream(
        &self,
        stream: &StreamName,
        expected_state: ExpectedState,
        events: Vec<EventData>,
        options: &OperationOptions,
        credentials: Option<&UserCredentials>,
        cancel: &CancellationToken,
    ) -> Result<AppendPosition, AppendError> {
        (**self)
            .append_to_stream(stream, expected_state, events, options, credentials, cancel)
            .await
    }
}

/// Build a store client from connection settings.
pub trait ConnectFromSettings: Sized {
    fn connect(settings: &ClientSettings) -> Result<Self, ConfigError>;
}
