//! Produce errors, their classification and the success receipt.

use thiserror::Error;

use eventide_core::{CoreError, ExpectedState, StreamName};
use eventide_events::{ChunkError, EncodeError};

use crate::event_store::{AppendError, AppendPosition};

/// Outcome of one produce call.
pub type ProduceResult = Result<ProduceReceipt, ProduceError>;

/// Successful produce: every chunk was appended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceReceipt {
    pub stream: StreamName,
    pub chunks_appended: usize,
    pub messages_appended: usize,
    /// Position after the last append; `None` when the batch was empty.
    pub position: Option<AppendPosition>,
}

impl ProduceReceipt {
    pub(crate) fn empty(stream: StreamName) -> Self {
        Self {
            stream,
            chunks_appended: 0,
            messages_appended: 0,
            position: None,
        }
    }

    pub(crate) fn record(&mut self, messages: usize, position: AppendPosition) {
        self.chunks_appended += 1;
        self.messages_appended += messages;
        self.position = Some(position);
    }
}

/// Where in a batch a failure happened.
///
/// Chunks before `chunk_number` were appended and stay appended: the store has
/// no multi-append transaction, so the batch is partially applied.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ChunkContext {
    pub stream: StreamName,
    /// 1-based number of the failing chunk.
    pub chunk_number: usize,
    /// Messages durably appended before the failing chunk.
    pub appended_messages: usize,
    /// Expectation the failing chunk was submitted (or about to be) with.
    pub expected_state: ExpectedState,
}

impl core::fmt::Display for ChunkContext {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        write!(
            f,
            "stream '{}', chunk {}, {} message(s) already appended, expected {}",
            self.stream, self.chunk_number, self.appended_messages, self.expected_state
        )
    }
}

/// Coarse classification of a [`ProduceError`], used to pick a reaction.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorKind {
    /// Caller input was invalid. Never retried.
    InvalidArgument,
    /// The producer has no store client yet.
    NotReady,
    /// The store rejected the expected-state precondition.
    PreconditionFailed,
    /// Transport or deadline failure. The caller owns the retry policy.
    TransientTransport,
    /// Cooperative cancellation was observed.
    Cancelled,
}

#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ProduceError {
    #[error("invalid argument: {0}")]
    InvalidArgument(String),

    #[error("producer is not ready")]
    NotReady,

    #[error("failed to encode message {message_index} ({context}): {source}")]
    Encode {
        context: ChunkContext,
        /// 0-based index of the message within its chunk.
        message_index: usize,
        #[source]
        source: EncodeError,
    },

    #[error("append failed ({context}): {source}")]
    Append {
        context: ChunkContext,
        #[source]
        source: AppendError,
    },

    #[error("produce cancelled ({context})")]
    Cancelled { context: ChunkContext },
}

impl ProduceError {
    pub fn invalid_argument(msg: impl Into<String>) -> Self {
        Self::InvalidArgument(msg.into())
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            ProduceError::InvalidArgument(_) | ProduceError::Encode { .. } => {
                ErrorKind::InvalidArgument
            }
            ProduceError::NotReady => ErrorKind::NotReady,
            ProduceError::Cancelled { .. } => ErrorKind::Cancelled,
            ProduceError::Append { source, .. } => match source {
                AppendError::WrongExpectedVersion { .. } | AppendError::StreamNotFound { .. } => {
                    ErrorKind::PreconditionFailed
                }
                AppendError::Transport(_) | AppendError::DeadlineExceeded(_) => {
                    ErrorKind::TransientTransport
                }
                AppendError::MaximumAppendSizeExceeded { .. } => ErrorKind::InvalidArgument,
                AppendError::Cancelled => ErrorKind::Cancelled,
            },
        }
    }

    /// Position in the batch, for failures that happened while producing.
    pub fn context(&self) -> Option<&ChunkContext> {
        match self {
            ProduceError::Encode { context, .. }
            | ProduceError::Append { context, .. }
            | ProduceError::Cancelled { context } => Some(context),
            ProduceError::InvalidArgument(_) | ProduceError::NotReady => None,
        }
    }

    pub fn is_cancelled(&self) -> bool {
        self.kind() == ErrorKind::Cancelled
    }
}

impl From<CoreError> for ProduceError {
    fn from(value: CoreError) -> Self {
        match value {
            CoreError::InvalidArgument(msg) | CoreError::InvalidId(msg) => {
                ProduceError::InvalidArgument(msg)
            }
        }
    }
}

impl From<ChunkError> for ProduceError {
    fn from(value: ChunkError) -> Self {
        ProduceError::InvalidArgument(value.to_string())
    }
}
