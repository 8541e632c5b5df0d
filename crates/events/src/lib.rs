//! Messages, metadata and the transport envelope written to the event store.
//!
//! Everything here is pure: turning a [`ProducedMessage`] into [`EventData`]
//! and splitting batches into store-sized chunks never touches the network.

pub mod chunk;
pub mod envelope;
pub mod event;
pub mod message;
pub mod metadata;
pub mod serializer;

pub use chunk::{ChunkError, Chunks, chunk};
pub use envelope::{EncodeError, EnvelopeCodec, EventData};
pub use event::Event;
pub use message::ProducedMessage;
pub use metadata::{MetaTags, Metadata};
pub use serializer::{
    EventSerializer, JsonEventSerializer, JsonMetadataSerializer, MetadataSerializer,
    SerializationError, SerializedEvent,
};
