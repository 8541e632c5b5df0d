//! In-memory store client for tests and local development.

use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Mutex, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use eventide_core::{ExpectedState, StreamName, StreamRevision};
use eventide_events::EventData;

use super::r#trait::{
    AppendError, AppendPosition, ConnectFromSettings, OperationOptions, StoreClient,
    UserCredentials,
};
use crate::config::{ClientSettings, ConfigError};

/// An event as recorded by the in-memory store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RecordedEvent {
    pub stream: StreamName,
    pub revision: StreamRevision,
    pub commit_position: u64,
    pub event_id: Uuid,
    pub event_type: String,
    pub content_type: String,
    pub data: Vec<u8>,
    pub metadata: Vec<u8>,
    pub created: DateTime<Utc>,
}

/// One observed `append_to_stream` call.
///
/// `started` and `finished` are ticks of a logical clock shared by all calls,
/// so ordering between calls can be asserted without wall-clock timing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AppendCall {
    pub stream: StreamName,
    pub expected_state: ExpectedState,
    pub event_count: usize,
    pub username: Option<String>,
    pub started: u64,
    pub finished: u64,
    pub succeeded: bool,
}

#[derive(Debug, Default)]
struct LogState {
    streams: HashMap<StreamName, Vec<RecordedEvent>>,
    commit_position: u64,
}

/// In-memory append-only store client.
///
/// Intended for tests/dev. Implements the same optimistic-concurrency rules as
/// a real store, plus a few hooks for exercising failure paths:
/// queued faults, artificial latency and a log of every call.
#[derive(Debug, Default)]
pub struct InMemoryStoreClient {
    log: RwLock<LogState>,
    max_append_size: Option<usize>,
    latency: Option<Duration>,
    faults: Mutex<VecDeque<AppendError>>,
    calls: Mutex<Vec<AppendCall>>,
    clock: AtomicU64,
}

impl InMemoryStoreClient {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reject appends carrying more than `max` events.
    pub fn with_max_append_size(mut self, max: usize) -> Self {
        self.max_append_size = Some(max);
        self
    }

    /// Delay every append by `latency` before it touches the log.
    pub fn with_latency(mut self, latency: Duration) -> Self {
        self.latency = Some(latency);
        self
    }

    /// Make the next append fail with `error` without writing anything.
    ///
    /// Faults queue up; each append consumes at most one.
    pub fn fail_next_with(&self, error: AppendError) {
        if let Ok(mut faults) = self.faults.lock() {
            faults.push_back(error);
        }
    }

    /// Every append call observed so far, in start order.
    pub fn calls(&self) -> Vec<AppendCall> {
        self.calls.lock().map(|c| c.clone()).unwrap_or_default()
    }

    pub fn append_count(&self) -> usize {
        self.calls.lock().map(|c| c.len()).unwrap_or_default()
    }

    /// Full contents of a stream (empty when it does not exist).
    pub fn read_stream(&self, stream: &StreamName) -> Vec<RecordedEvent> {
        self.log
            .read()
            .map(|log| log.streams.get(stream).cloned().unwrap_or_default())
            .unwrap_or_default()
    }

    pub fn current_revision(&self, stream: &StreamName) -> Option<StreamRevision> {
        self.read_stream(stream).last().map(|e| e.revision)
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::SeqCst)
    }

    fn write(
        &self,
        stream: &StreamName,
        expected_state: ExpectedState,
        events: Vec<EventData>,
    ) -> Result<AppendPosition, AppendError> {
        if let Some(fault) = self.faults.lock().ok().and_then(|mut f| f.pop_front()) {
            return Err(fault);
        }

        if let Some(max) = self.max_append_size {
            if events.len() > max {
                return Err(AppendError::MaximumAppendSizeExceeded {
                    max,
                    actual: events.len(),
                });
            }
        }

        let mut log = self
            .log
            .write()
            .map_err(|_| AppendError::transport("lock poisoned"))?;

        let current = log
            .streams
            .get(stream)
            .and_then(|s| s.last())
            .map(|e| e.revision);

        if current.is_none() && expected_state.requires_existing_stream() {
            return Err(AppendError::StreamNotFound {
                stream: stream.clone(),
            });
        }

        if !expected_state.matches(current) {
            return Err(AppendError::WrongExpectedVersion {
                stream: stream.clone(),
                expected: expected_state,
                actual: current,
            });
        }

        // An empty append still validates the precondition but writes nothing.
        if events.is_empty() {
            return Ok(AppendPosition {
                next_expected_revision: current.unwrap_or(StreamRevision::new(0)),
                commit_position: log.commit_position,
            });
        }

        Ok(Self::append_events(&mut log, stream, current, events))
    }

    fn append_events(
        log: &mut LogState,
        stream: &StreamName,
        current: Option<StreamRevision>,
        events: Vec<EventData>,
    ) -> AppendPosition {
        let now = Utc::now();
        let mut next = current.map(StreamRevision::next).unwrap_or(StreamRevision::new(0));
        let mut commit_position = log.commit_position;
        let mut recorded = Vec::with_capacity(events.len());

        for e in events {
            commit_position += 1;
            recorded.push(RecordedEvent {
                stream: stream.clone(),
                revision: next,
                commit_position,
                event_id: e.event_id(),
                event_type: e.event_type().to_string(),
                content_type: e.content_type().to_string(),
                data: e.data().to_vec(),
                metadata: e.metadata().to_vec(),
                created: now,
            });
            next = next.next();
        }

        let last = recorded
            .last()
            .map(|e| e.revision)
            .unwrap_or(StreamRevision::new(0));

        log.commit_position = commit_position;
        log.streams.entry(stream.clone()).or_default().extend(recorded);

        AppendPosition {
            next_expected_revision: last,
            commit_position,
        }
    }
}

#[async_trait]
impl StoreClient for InMemoryStoreClient {
    async fn append_to_stream(
        &self,
        stream: &StreamName,
        expected_state: ExpectedState,
        events: Vec<EventData>,
        _options: &OperationOptions,
        credentials: Option<&UserCredentials>,
        cancel: &CancellationToken,
    ) -> Result<AppendPosition, AppendError> {
        let started = self.tick();
        let event_count = events.len();

        if let Some(latency) = self.latency {
            tokio::select! {
                _ = cancel.cancelled() => return Err(AppendError::Cancelled),
                _ = tokio::time::sleep(latency) => {}
            }
        }

        let result = self.write(stream, expected_state, events);

        let call = AppendCall {
            stream: stream.clone(),
            expected_state,
            event_count,
            username: credentials.map(|c| c.username().to_string()),
            started,
            finished: self.tick(),
            succeeded: result.is_ok(),
        };
        if let Ok(mut calls) = self.calls.lock() {
            calls.push(call);
        }

        result
    }
}

impl ConnectFromSettings for InMemoryStoreClient {
    fn connect(settings: &ClientSettings) -> Result<Self, ConfigError> {
        let mut client = Self::new();
        client.max_append_size = settings.max_append_size();
        Ok(client)
    }
}
