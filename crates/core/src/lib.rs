//! `eventide-core`: addressing and concurrency primitives shared by the producer.
//!
//! This crate has **no I/O**: it only describes streams, message identities and
//! the optimistic-concurrency expectations attached to an append.

pub mod error;
pub mod expected;
pub mod id;

pub use error::{CoreError, CoreResult};
pub use expected::{ExpectedState, StreamRevision};
pub use id::{MessageId, StreamName};
