//! Batch producer over an append-only event store.
//!
//! `EventStoreProducer` turns a batch of [`ProducedMessage`]s into a sequence
//! of conditional appends against a single stream.
//!
//! ## Produce Flow
//!
//! ```text
//! produce(stream, messages, options, cancel)
//!   ↓
//! 1. Readiness check (NotReady until a store client is attached)
//!   ↓
//! 2. Validate the stream name
//!   ↓
//! 3. Resolve options, split the batch into chunks of at most N messages
//!   ↓
//! 4. For each chunk, in order:
//!      cancellation check → encode → traced conditional append
//! ```
//!
//! ## Failure Semantics
//!
//! The store offers no transaction spanning several appends. A failure on
//! chunk `k` stops the batch: chunks `1..k` stay appended, chunk `k` and later
//! are never submitted. The returned [`ChunkContext`] names the failing chunk
//! and how many messages made it in before it.
//!
//! Every chunk is submitted with the caller's expected state as given. The
//! precondition is checked per append, not once for the whole batch, so
//! `NoStream` or `Exact(n)` only holds for the first chunk of a multi-chunk
//! batch.

use std::sync::{Arc, OnceLock};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

use eventide_core::StreamName;
use eventide_events::{
    EnvelopeCodec, EventData, EventSerializer, JsonEventSerializer, MetadataSerializer,
    ProducedMessage, chunk,
};
use eventide_observability::{MessagingTags, run_traced};

use crate::config::{ClientSettings, ConfigError};
use crate::event_store::{AppendError, AppendRequest, AppendSubmitter, ConnectFromSettings, StoreClient};

use super::error::{ChunkContext, ProduceError, ProduceReceipt, ProduceResult};
use super::options::ProduceOptions;

/// Lifecycle of a producer.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ProducerState {
    /// No store client yet; every produce fails with `NotReady`.
    Initializing,
    /// A store client is attached. Terminal.
    Ready,
}

/// Produces batches of messages to event-store streams.
///
/// ## Generic Parameters
///
/// - `C`: store client (any [`StoreClient`], including `Arc<dyn StoreClient>`)
/// - `E`: message type handed to the event serializer
///
/// A producer is shared by reference across tasks. It holds no per-call state;
/// the only mutation is the one-time attachment of the client.
pub struct EventStoreProducer<C, E> {
    submitter: OnceLock<AppendSubmitter<C>>,
    codec: EnvelopeCodec<E>,
    default_options: ProduceOptions,
}

impl<C, E> core::fmt::Debug for EventStoreProducer<C, E> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        f.debug_struct("EventStoreProducer")
            .field("state", &self.state())
            .field("codec", &self.codec)
            .field("default_options", &self.default_options)
            .finish()
    }
}

impl<C, E> EventStoreProducer<C, E>
where
    JsonEventSerializer: EventSerializer<E>,
{
    /// Ready producer with JSON serialization.
    pub fn new(client: C) -> Self {
        Self::with_codec(client, EnvelopeCodec::default())
    }

    /// Build the client from connection settings.
    ///
    /// Default options (append cap, deadline, credentials) come from the
    /// settings too.
    pub fn from_settings(settings: &ClientSettings) -> Result<Self, ConfigError>
    where
        C: ConnectFromSettings,
    {
        let client = C::connect(settings)?;
        Ok(Self::new(client).with_default_options(ProduceOptions::from_settings(settings)))
    }
}

impl<C, E> EventStoreProducer<C, E> {
    /// Ready producer with custom serializers.
    pub fn with_serializers(
        client: C,
        serializer: Arc<dyn EventSerializer<E>>,
        metadata_serializer: Arc<dyn MetadataSerializer>,
    ) -> Self {
        Self::with_codec(client, EnvelopeCodec::new(serializer, metadata_serializer))
    }

    pub fn with_codec(client: C, codec: EnvelopeCodec<E>) -> Self {
        let producer = Self::initializing(codec);
        // A fresh cell is always empty.
        let _ = producer.submitter.set(AppendSubmitter::new(client));
        producer
    }

    /// Producer without a client. Call [`attach`](Self::attach) once the
    /// client is available.
    pub fn initializing(codec: EnvelopeCodec<E>) -> Self {
        Self {
            submitter: OnceLock::new(),
            codec,
            default_options: ProduceOptions::default(),
        }
    }

    /// Options used when `produce` is called without explicit ones.
    pub fn with_default_options(mut self, options: ProduceOptions) -> Self {
        self.default_options = options;
        self
    }

    /// Attach the store client, moving the producer to `Ready`.
    ///
    /// Only the first attach wins; later calls hand their client back.
    pub fn attach(&self, client: C) -> Result<(), C> {
        match self.submitter.set(AppendSubmitter::new(client)) {
            Ok(()) => {
                info!("event-store producer ready");
                Ok(())
            }
            Err(rejected) => Err(rejected.into_inner()),
        }
    }

    pub fn state(&self) -> ProducerState {
        if self.submitter.get().is_some() {
            ProducerState::Ready
        } else {
            ProducerState::Initializing
        }
    }

    pub fn default_options(&self) -> &ProduceOptions {
        &self.default_options
    }

    /// The attached client, once ready.
    pub fn client(&self) -> Option<&C> {
        self.submitter.get().map(AppendSubmitter::client)
    }
}

impl<C: StoreClient, E> EventStoreProducer<C, E> {
    /// Append `messages` to `stream`, in order, in chunks.
    ///
    /// `options` falls back to the producer's defaults. On failure nothing
    /// already appended is rolled back; see [`ProduceError::context`].
    pub async fn produce<I>(
        &self,
        stream: &str,
        messages: I,
        options: Option<&ProduceOptions>,
        cancel: &CancellationToken,
    ) -> ProduceResult
    where
        I: IntoIterator<Item = ProducedMessage<E>>,
    {
        let submitter = self.submitter.get().ok_or(ProduceError::NotReady)?;
        let stream = StreamName::new(stream)?;
        let options = options.unwrap_or(&self.default_options);
        let chunks = chunk(messages, options.max_append_events_count())?;

        let tags = MessagingTags::stream_append(stream.as_str());
        let mut receipt = ProduceReceipt::empty(stream.clone());
        let expected_state = options.expected_state();

        for (index, batch) in chunks.enumerate() {
            let context = ChunkContext {
                stream: stream.clone(),
                chunk_number: index + 1,
                appended_messages: receipt.messages_appended,
                expected_state,
            };

            if cancel.is_cancelled() {
                info!(%context, "produce cancelled before chunk");
                return Err(ProduceError::Cancelled { context });
            }

            let records = self.encode_chunk(batch, &context)?;
            let count = records.len();

            let request = AppendRequest {
                stream: &stream,
                expected_state,
                operation: options.operation(),
                credentials: options.credentials(),
            };

            match run_traced(&tags, submitter.append(&request, records, cancel)).await {
                Ok(position) => {
                    debug!(
                        stream = %stream,
                        chunk = context.chunk_number,
                        events = count,
                        revision = %position.next_expected_revision,
                        "chunk appended"
                    );
                    receipt.record(count, position);
                }
                Err(AppendError::Cancelled) => {
                    info!(%context, "produce cancelled during append");
                    return Err(ProduceError::Cancelled { context });
                }
                Err(source) => {
                    warn!(%context, error = %source, "append failed; aborting remaining chunks");
                    return Err(ProduceError::Append { context, source });
                }
            }
        }

        debug!(
            stream = %receipt.stream,
            chunks = receipt.chunks_appended,
            messages = receipt.messages_appended,
            "produce completed"
        );
        Ok(receipt)
    }

    /// Append a single message.
    pub async fn produce_one(
        &self,
        stream: &str,
        message: ProducedMessage<E>,
        options: Option<&ProduceOptions>,
        cancel: &CancellationToken,
    ) -> ProduceResult {
        self.produce(stream, [message], options, cancel).await
    }

    fn encode_chunk(
        &self,
        batch: Vec<ProducedMessage<E>>,
        context: &ChunkContext,
    ) -> Result<Vec<EventData>, ProduceError> {
        batch
            .into_iter()
            .enumerate()
            .map(|(message_index, message)| {
                self.codec
                    .encode(message)
                    .map_err(|source| ProduceError::Encode {
                        context: context.clone(),
                        message_index,
                        source,
                    })
            })
            .collect()
    }
}
