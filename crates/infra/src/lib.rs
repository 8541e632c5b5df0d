//! Infrastructure layer: store client boundary, append submission, the
//! producer façade and its configuration.

pub mod config;
pub mod event_store;
pub mod producer;

#[cfg(test)]
mod integration_tests;

pub use config::{ClientSettings, ConfigError};
pub use event_store::{
    AppendError, AppendPosition, AppendSubmitter, ConnectFromSettings, InMemoryStoreClient,
    OperationOptions, StoreClient, UserCredentials,
};
pub use producer::{
    ChunkContext, ErrorKind, EventStoreProducer, ProduceError, ProduceOptions, ProduceReceipt,
    ProduceResult, ProducerState,
};
