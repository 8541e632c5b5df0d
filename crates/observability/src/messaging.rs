//! Traced units of work for messaging operations.
//!
//! Every network call the producer makes runs inside a `produce` span tagged
//! with messaging semantics (system, destination kind, destination, operation).
//! The wrapper is purely observational: it records the outcome on the span and
//! hands the result back untouched.

use core::fmt::Display;
use core::future::Future;

use ::tracing::{Instrument, Span, debug, field, info_span};

/// Span name used for produce operations.
pub const PRODUCE_SPAN: &str = "produce";

/// Messaging tags attached to a produce span.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessagingTags {
    system: &'static str,
    destination_kind: &'static str,
    destination: String,
    operation: &'static str,
}

impl MessagingTags {
    pub const EVENTSTORE_SYSTEM: &'static str = "eventstoredb";
    pub const STREAM_KIND: &'static str = "stream";
    pub const APPEND: &'static str = "append";

    pub fn new(
        system: &'static str,
        destination_kind: &'static str,
        destination: impl Into<String>,
        operation: &'static str,
    ) -> Self {
        Self {
            system,
            destination_kind,
            destination: destination.into(),
            operation,
        }
    }

    /// Tags for an append to an event-store stream.
    pub fn stream_append(stream: impl Into<String>) -> Self {
        Self::new(Self::EVENTSTORE_SYSTEM, Self::STREAM_KIND, stream, Self::APPEND)
    }

    pub fn system(&self) -> &'static str {
        self.system
    }

    pub fn destination_kind(&self) -> &'static str {
        self.destination_kind
    }

    pub fn destination(&self) -> &str {
        &self.destination
    }

    pub fn operation(&self) -> &'static str {
        self.operation
    }

    fn span(&self) -> Span {
        info_span!(
            "produce",
            messaging.system = self.system,
            messaging.destination_kind = self.destination_kind,
            messaging.destination = %self.destination,
            messaging.operation = self.operation,
            otel.status_code = field::Empty,
            error.message = field::Empty,
        )
    }
}

/// Run `work` inside a messaging span.
///
/// The span opens before `work` is first polled and closes once it finished.
/// Failures are recorded as `otel.status_code = "ERROR"` plus the error text,
/// then returned to the caller unchanged.
pub async fn run_traced<F, T, E>(tags: &MessagingTags, work: F) -> Result<T, E>
where
    F: Future<Output = Result<T, E>>,
    E: Display,
{
    let span = tags.span();
    let result = work.instrument(span.clone()).await;

    match &result {
        Ok(_) => {
            span.record("otel.status_code", "OK");
        }
        Err(err) => {
            span.record("otel.status_code", "ERROR");
            span.record("error.message", field::display(err));
            debug!(parent: &span, error = %err, "messaging operation failed");
        }
    }

    result
}
