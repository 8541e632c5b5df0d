//! Append-only event store boundary.
//!
//! This module defines the store-client capability the producer consumes, an
//! in-memory implementation for tests/dev, and the submitter that turns one
//! chunk into one conditional append.

pub mod in_memory;
pub mod submitter;
pub mod r#trait;

pub use in_memory::{AppendCall, InMemoryStoreClient, RecordedEvent};
pub use r#trait::{
    AppendError, AppendPosition, ConnectFromSettings, OperationOptions, StoreClient,
    UserCredentials,
};
pub use submitter::{AppendRequest, AppendSubmitter};
