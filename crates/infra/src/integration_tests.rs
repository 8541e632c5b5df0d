//! Integration tests for the full produce pipeline.
//!
//! Tests: ProducedMessage → chunking → envelope → traced append → InMemoryStoreClient
//!
//! Verifies:
//! - Batches are split into ordered, strictly sequential appends
//! - A failing chunk stops the batch and reports where it stopped
//! - Cancellation, readiness and deadlines surface as the right error kinds
//! - Records carry the message identity natively, never in serialized metadata

#[cfg(test)]
mod tests {
    use std::collections::BTreeMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::{Arc, Mutex};
    use std::time::Duration;

    use async_trait::async_trait;
    use serde::Serialize;
    use tokio_util::sync::CancellationToken;
    use tracing::Subscriber;
    use tracing::field::{Field, Visit};
    use tracing_subscriber::Registry;
    use tracing_subscriber::layer::{Context, Layer, SubscriberExt};
    use tracing_subscriber::registry::LookupSpan;

    use eventide_core::{ExpectedState, MessageId, StreamName, StreamRevision};
    use eventide_events::{EnvelopeCodec, Event, EventData, MetaTags, Metadata, ProducedMessage};

    use crate::event_store::{
        AppendError, AppendPosition, InMemoryStoreClient, OperationOptions, StoreClient,
        UserCredentials,
    };
    use crate::producer::{ErrorKind, EventStoreProducer, ProduceError, ProduceOptions};

    #[derive(Debug, Clone, Serialize)]
    #[serde(tag = "kind", rename_all = "snake_case")]
    enum CartEvent {
        ItemAdded { sku: String, quantity: u32 },
        CheckedOut,
    }

    impl Event for CartEvent {
        fn event_type(&self) -> &'static str {
            match self {
                CartEvent::ItemAdded { .. } => "cart.item_added",
                CartEvent::CheckedOut => "cart.checked_out",
            }
        }
    }

    type Producer<C> = EventStoreProducer<C, CartEvent>;

    fn added(n: usize) -> ProducedMessage<CartEvent> {
        ProducedMessage::new(CartEvent::ItemAdded {
            sku: format!("sku-{n}"),
            quantity: 1,
        })
    }

    fn batch(len: usize) -> Vec<ProducedMessage<CartEvent>> {
        (0..len).map(added).collect()
    }

    fn stream(name: &str) -> StreamName {
        StreamName::new(name).unwrap()
    }

    fn chunked(max: usize) -> ProduceOptions {
        ProduceOptions::default().with_max_append_events_count(max)
    }

    /// Delegates to an in-memory store, but lets another writer append to the
    /// same stream right before the `intrude_on`-th call.
    struct ContendedClient {
        inner: InMemoryStoreClient,
        intrude_on: usize,
        seen: AtomicUsize,
    }

    #[async_trait]
    impl StoreClient for ContendedClient {
        async fn append_to_stream(
            &self,
            stream: &StreamName,
            expected_state: ExpectedState,
            events: Vec<EventData>,
            options: &OperationOptions,
            credentials: Option<&UserCredentials>,
            cancel: &CancellationToken,
        ) -> Result<AppendPosition, AppendError> {
            let call = self.seen.fetch_add(1, Ordering::SeqCst) + 1;
            if call == self.intrude_on {
                let intruder = EventData::new(
                    MessageId::new(),
                    "cart.item_removed",
                    b"{}".to_vec(),
                    b"{}".to_vec(),
                    "application/json",
                );
                self.inner
                    .append_to_stream(stream, ExpectedState::Any, vec![intruder], options, None, cancel)
                    .await?;
            }
            self.inner
                .append_to_stream(stream, expected_state, events, options, credentials, cancel)
                .await
        }
    }

    #[tokio::test]
    async fn batch_is_split_into_ordered_appends() {
        let producer = Producer::new(InMemoryStoreClient::new());
        let messages = batch(7);
        let ids: Vec<MessageId> = messages
            .iter()
            .map(|m| m.metadata.message_id().unwrap().unwrap())
            .collect();

        let receipt = producer
            .produce("cart-42", messages, Some(&chunked(3)), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(receipt.chunks_appended, 3);
        assert_eq!(receipt.messages_appended, 7);
        assert_eq!(
            receipt.position.map(|p| p.next_expected_revision),
            Some(StreamRevision::new(6))
        );

        let client = producer.client().unwrap();
        let sizes: Vec<usize> = client.calls().iter().map(|c| c.event_count).collect();
        assert_eq!(sizes, vec![3, 3, 1]);

        let recorded = client.read_stream(&stream("cart-42"));
        let recorded_ids: Vec<MessageId> = recorded
            .iter()
            .map(|r| MessageId::from_uuid(r.event_id))
            .collect();
        assert_eq!(recorded_ids, ids);
        assert!(recorded
            .iter()
            .enumerate()
            .all(|(i, r)| r.revision == StreamRevision::new(i as u64)));
    }

    #[tokio::test]
    async fn chunks_are_submitted_strictly_in_sequence() {
        let client = InMemoryStoreClient::new().with_latency(Duration::from_millis(5));
        let producer = Producer::new(client);

        producer
            .produce("cart-1", batch(10), Some(&chunked(2)), &CancellationToken::new())
            .await
            .unwrap();

        let calls = producer.client().unwrap().calls();
        assert_eq!(calls.len(), 5);
        for pair in calls.windows(2) {
            assert!(pair[0].finished < pair[1].started);
        }
    }

    #[tokio::test]
    async fn failing_chunk_stops_the_batch() {
        let producer = Producer::new(InMemoryStoreClient::new());
        let options = chunked(2).with_expected_state(ExpectedState::NoStream);

        let err = producer
            .produce("cart-1", batch(6), Some(&options), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::PreconditionFailed);
        let context = err.context().unwrap();
        assert_eq!(context.chunk_number, 2);
        assert_eq!(context.appended_messages, 2);
        assert_eq!(context.expected_state, ExpectedState::NoStream);

        let client = producer.client().unwrap();
        // Chunk 1, then the rejected chunk 2. Chunk 3 never left.
        assert_eq!(client.append_count(), 2);
        assert_eq!(client.read_stream(&stream("cart-1")).len(), 2);
    }

    #[tokio::test]
    async fn stream_exists_survives_an_interleaved_writer() {
        let client = ContendedClient {
            inner: InMemoryStoreClient::new(),
            intrude_on: 3,
            seen: AtomicUsize::new(0),
        };
        let producer = Producer::new(client);
        producer
            .produce_one("cart-1", added(0), None, &CancellationToken::new())
            .await
            .unwrap();

        let options = chunked(1).with_expected_state(ExpectedState::StreamExists);
        let receipt = producer
            .produce("cart-1", batch(2), Some(&options), &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.chunks_appended, 2);

        let client = producer.client().unwrap();
        let sent: Vec<ExpectedState> = client
            .inner
            .calls()
            .iter()
            .map(|c| c.expected_state)
            .collect();
        assert_eq!(
            sent,
            vec![
                ExpectedState::Any,
                ExpectedState::StreamExists,
                ExpectedState::Any,
                ExpectedState::StreamExists,
            ]
        );
        assert_eq!(client.inner.read_stream(&stream("cart-1")).len(), 4);
    }

    /// Commits the append and fires the caller's token, then yields once so the
    /// result and the cancellation are ready on the same poll.
    struct CancelAfterCommit {
        inner: InMemoryStoreClient,
    }

    #[async_trait]
    impl StoreClient for CancelAfterCommit {
        async fn append_to_stream(
            &self,
            stream: &StreamName,
            expected_state: ExpectedState,
            events: Vec<EventData>,
            options: &OperationOptions,
            credentials: Option<&UserCredentials>,
            cancel: &CancellationToken,
        ) -> Result<AppendPosition, AppendError> {
            let position = self
                .inner
                .append_to_stream(stream, expected_state, events, options, credentials, cancel)
                .await?;
            cancel.cancel();
            tokio::task::yield_now().await;
            Ok(position)
        }
    }

    #[tokio::test]
    async fn committed_chunk_is_counted_when_cancellation_races_it() {
        let producer = Producer::new(CancelAfterCommit {
            inner: InMemoryStoreClient::new(),
        });

        let err = producer
            .produce("cart-1", batch(4), Some(&chunked(2)), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        let context = err.context().unwrap();
        assert_eq!(context.chunk_number, 2);
        assert_eq!(context.appended_messages, 2);

        let client = producer.client().unwrap();
        assert_eq!(client.inner.append_count(), 1);
        assert_eq!(client.inner.read_stream(&stream("cart-1")).len(), 2);
    }

    #[tokio::test]
    async fn transport_failure_on_first_chunk_appends_nothing() {
        let client = InMemoryStoreClient::new();
        client.fail_next_with(AppendError::transport("connection reset"));
        let producer = Producer::new(client);

        let err = producer
            .produce("cart-1", batch(4), Some(&chunked(2)), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransientTransport);
        assert_eq!(err.context().map(|c| c.chunk_number), Some(1));
        assert_eq!(err.context().map(|c| c.appended_messages), Some(0));
        assert_eq!(producer.client().unwrap().append_count(), 1);
    }

    #[tokio::test]
    async fn empty_batch_makes_no_calls() {
        let producer = Producer::new(InMemoryStoreClient::new());

        let receipt = producer
            .produce("cart-1", Vec::new(), None, &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(receipt.chunks_appended, 0);
        assert_eq!(receipt.position, None);
        assert_eq!(producer.client().unwrap().append_count(), 0);
    }

    #[tokio::test]
    async fn cancelled_token_makes_no_calls() {
        let producer = Producer::new(InMemoryStoreClient::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let err = producer
            .produce("cart-1", batch(3), None, &cancel)
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::Cancelled);
        assert_eq!(err.context().map(|c| c.chunk_number), Some(1));
        assert_eq!(producer.client().unwrap().append_count(), 0);
    }

    #[tokio::test]
    async fn empty_batch_with_cancelled_token_succeeds() {
        let producer = Producer::new(InMemoryStoreClient::new());
        let cancel = CancellationToken::new();
        cancel.cancel();

        let receipt = producer.produce("cart-1", Vec::new(), None, &cancel).await.unwrap();

        assert_eq!(receipt.chunks_appended, 0);
        assert_eq!(producer.client().unwrap().append_count(), 0);
    }

    #[tokio::test]
    async fn cancellation_during_append_stops_the_batch() {
        let client = InMemoryStoreClient::new().with_latency(Duration::from_millis(500));
        let producer = Producer::new(client);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let err = producer
            .produce("cart-1", batch(4), Some(&chunked(2)), &cancel)
            .await
            .unwrap_err();

        assert!(matches!(err, ProduceError::Cancelled { .. }));
        assert!(producer.client().unwrap().read_stream(&stream("cart-1")).is_empty());
    }

    #[tokio::test]
    async fn blank_stream_name_is_rejected_before_any_call() {
        let producer = Producer::new(InMemoryStoreClient::new());

        for name in ["", "   "] {
            let err = producer
                .produce(name, batch(2), None, &CancellationToken::new())
                .await
                .unwrap_err();
            assert_eq!(err.kind(), ErrorKind::InvalidArgument);
            assert!(err.context().is_none());
        }
        assert_eq!(producer.client().unwrap().append_count(), 0);
    }

    #[tokio::test]
    async fn produce_before_attach_is_not_ready() {
        let producer: Producer<InMemoryStoreClient> =
            EventStoreProducer::initializing(EnvelopeCodec::default());

        let err = producer
            .produce("cart-1", batch(1), None, &CancellationToken::new())
            .await
            .unwrap_err();
        assert_eq!(err, ProduceError::NotReady);

        producer.attach(InMemoryStoreClient::new()).unwrap();

        let receipt = producer
            .produce("cart-1", batch(1), None, &CancellationToken::new())
            .await
            .unwrap();
        assert_eq!(receipt.messages_appended, 1);
    }

    #[tokio::test]
    async fn deadline_maps_to_transient_transport() {
        let client = InMemoryStoreClient::new().with_latency(Duration::from_millis(300));
        let producer = Producer::new(client);
        let options = ProduceOptions::default()
            .with_operation(OperationOptions::default().with_deadline(Duration::from_millis(20)));

        let err = producer
            .produce("cart-1", batch(2), Some(&options), &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(err.kind(), ErrorKind::TransientTransport);
        assert!(matches!(
            err,
            ProduceError::Append {
                source: AppendError::DeadlineExceeded(_),
                ..
            }
        ));
    }

    #[tokio::test]
    async fn credentials_reach_the_store() {
        let producer = Producer::new(InMemoryStoreClient::new());
        let options = ProduceOptions::default().with_credentials(UserCredentials::new("ops", "secret"));

        producer
            .produce("cart-1", batch(1), Some(&options), &CancellationToken::new())
            .await
            .unwrap();

        let calls = producer.client().unwrap().calls();
        assert_eq!(calls[0].username.as_deref(), Some("ops"));
    }

    #[tokio::test]
    async fn identity_travels_as_record_id_not_metadata() {
        let producer = Producer::new(InMemoryStoreClient::new());
        let id = MessageId::new();
        let correlation = MessageId::new();
        let metadata = Metadata::new()
            .with_message_id(id)
            .with_correlation_id(correlation.to_string())
            .with("tenant", "acme");

        producer
            .produce_one(
                "cart-1",
                ProducedMessage::with_metadata(CartEvent::CheckedOut, metadata),
                None,
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        let recorded = producer.client().unwrap().read_stream(&stream("cart-1"));
        let record = &recorded[0];
        assert_eq!(record.event_id, *id.as_uuid());
        assert_eq!(record.event_type, "cart.checked_out");
        assert_eq!(record.content_type, "application/json");

        let stored: serde_json::Map<String, serde_json::Value> =
            serde_json::from_slice(&record.metadata).unwrap();
        assert!(!stored.contains_key(MetaTags::MESSAGE_ID));
        assert_eq!(stored["tenant"], "acme");
        assert_eq!(
            stored[MetaTags::CORRELATION_ID],
            serde_json::Value::String(correlation.to_string())
        );

        let payload: serde_json::Value = serde_json::from_slice(&record.data).unwrap();
        assert_eq!(payload["kind"], "checked_out");
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn concurrent_producers_share_one_client() {
        let client = Arc::new(InMemoryStoreClient::new());
        let producer = Arc::new(Producer::new(client.clone()));

        let mut handles = Vec::new();
        for n in 0..8 {
            let producer = producer.clone();
            handles.push(tokio::spawn(async move {
                let name = format!("cart-{n}");
                let options = chunked(2);
                producer
                    .produce(&name, batch(5), Some(&options), &CancellationToken::new())
                    .await
            }));
        }

        for handle in handles {
            let receipt = handle.await.unwrap().unwrap();
            assert_eq!(receipt.chunks_appended, 3);
        }

        assert_eq!(client.append_count(), 24);
        for n in 0..8 {
            let recorded = client.read_stream(&stream(&format!("cart-{n}")));
            assert_eq!(recorded.len(), 5);
        }
    }

    #[derive(Default)]
    struct ProduceSpans {
        destinations: Mutex<Vec<String>>,
        statuses: Mutex<Vec<String>>,
    }

    struct SpanCapture(Arc<ProduceSpans>);

    struct FieldVisitor(BTreeMap<String, String>);

    impl Visit for FieldVisitor {
        fn record_debug(&mut self, field: &Field, value: &dyn std::fmt::Debug) {
            self.0.insert(field.name().to_string(), format!("{value:?}"));
        }

        fn record_str(&mut self, field: &Field, value: &str) {
            self.0.insert(field.name().to_string(), value.to_string());
        }
    }

    impl<S> Layer<S> for SpanCapture
    where
        S: Subscriber + for<'a> LookupSpan<'a>,
    {
        fn on_new_span(
            &self,
            attrs: &tracing::span::Attributes<'_>,
            _id: &tracing::span::Id,
            _ctx: Context<'_, S>,
        ) {
            if attrs.metadata().name() != "produce" {
                return;
            }
            let mut visitor = FieldVisitor(BTreeMap::new());
            attrs.record(&mut visitor);
            if let Some(dest) = visitor.0.remove("messaging.destination") {
                self.0.destinations.lock().unwrap().push(dest);
            }
        }

        fn on_record(
            &self,
            _id: &tracing::span::Id,
            values: &tracing::span::Record<'_>,
            _ctx: Context<'_, S>,
        ) {
            let mut visitor = FieldVisitor(BTreeMap::new());
            values.record(&mut visitor);
            if let Some(status) = visitor.0.remove("otel.status_code") {
                self.0.statuses.lock().unwrap().push(status);
            }
        }
    }

    #[tokio::test]
    async fn every_chunk_runs_in_its_own_span() {
        let spans = Arc::new(ProduceSpans::default());
        let subscriber = Registry::default().with(SpanCapture(spans.clone()));
        let _guard = tracing::subscriber::set_default(subscriber);

        let client = InMemoryStoreClient::new();
        let producer = Producer::new(client);
        producer
            .produce("cart-7", batch(3), Some(&chunked(2)), &CancellationToken::new())
            .await
            .unwrap();

        let rejected = producer
            .produce(
                "cart-7",
                batch(1),
                Some(&chunked(2).with_expected_state(ExpectedState::NoStream)),
                &CancellationToken::new(),
            )
            .await;
        assert!(rejected.is_err());

        assert_eq!(
            *spans.destinations.lock().unwrap(),
            vec!["cart-7", "cart-7", "cart-7"]
        );
        assert_eq!(*spans.statuses.lock().unwrap(), vec!["OK", "OK", "ERROR"]);
    }
}
