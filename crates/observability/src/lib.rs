//! Tracing setup and messaging spans shared by the producer.

/// Initialize process-wide observability (tracing/logging).
///
/// This is safe to call multiple times; subsequent calls become no-ops.
pub fn init() {
    tracing::init();
}

/// Tracing configuration (filters, layers).
pub mod tracing;

/// Spans around messaging operations.
pub mod messaging;

pub use messaging::{MessagingTags, run_traced};
