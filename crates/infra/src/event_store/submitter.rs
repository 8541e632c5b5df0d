//! One conditional append per chunk.

use tokio_util::sync::CancellationToken;
use tracing::debug;

use eventide_core::{ExpectedState, StreamName};
use eventide_events::EventData;

use super::r#trait::{AppendError, AppendPosition, OperationOptions, StoreClient, UserCredentials};

/// Everything an append needs besides the records themselves.
#[derive(Debug, Clone, Copy)]
pub struct AppendRequest<'a> {
    pub stream: &'a StreamName,
    pub expected_state: ExpectedState,
    pub operation: &'a OperationOptions,
    pub credentials: Option<&'a UserCredentials>,
}

/// Issues conditional appends against a [`StoreClient`].
///
/// Each call to [`append`](AppendSubmitter::append) is exactly one store call
/// carrying the whole chunk. Nothing is retried here: precondition failures are
/// terminal and transport failures go back to the caller.
#[derive(Debug, Clone)]
pub struct AppendSubmitter<C> {
    client: C,
}

impl<C> AppendSubmitter<C> {
    pub fn new(client: C) -> Self {
        Self { client }
    }

    pub fn client(&self) -> &C {
        &self.client
    }

    pub fn into_inner(self) -> C {
        self.client
    }
}

impl<C: StoreClient> AppendSubmitter<C> {
    /// Append `records` to `request.stream` under `request.expected_state`.
    ///
    /// - Cancellation is checked before the call and raced against it while it
    ///   is in flight.
    /// - `request.operation.deadline`, when set, bounds the call; expiry maps
    ///   to [`AppendError::DeadlineExceeded`].
    pub async fn append(
        &self,
        request: &AppendRequest<'_>,
        records: Vec<EventData>,
        cancel: &CancellationToken,
    ) -> Result<AppendPosition, AppendError> {
        if cancel.is_cancelled() {
            return Err(AppendError::Cancelled);
        }

        debug!(
            stream = %request.stream,
            expected_state = %request.expected_state,
            events = records.len(),
            "submitting append"
        );

        let call = self.client.append_to_stream(
            request.stream,
            request.expected_state,
            records,
            request.operation,
            request.credentials,
            cancel,
        );

        let bounded = async {
            match request.operation.deadline {
                Some(deadline) => match tokio::time::timeout(deadline, call).await {
                    Ok(result) => result,
                    Err(_) => Err(AppendError::DeadlineExceeded(deadline)),
                },
                None => call.await,
            }
        };

        // A finished append wins over a cancellation observed on the same poll:
        // the records are already committed.
        tokio::select! {
            biased;
            result = bounded => result,
            _ = cancel.cancelled() => Err(AppendError::Cancelled),
        }
    }
}
