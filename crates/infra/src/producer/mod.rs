//! Producer façade: validate, chunk, encode and append a batch of messages.

pub mod error;
pub mod event_store_producer;
pub mod options;

pub use error::{ChunkContext, ErrorKind, ProduceError, ProduceReceipt, ProduceResult};
pub use event_store_producer::{EventStoreProducer, ProducerState};
pub use options::{DEFAULT_MAX_APPEND_EVENTS_COUNT, ProduceOptions};
