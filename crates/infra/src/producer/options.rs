use eventide_core::ExpectedState;

use crate::config::ClientSettings;
use crate::event_store::{OperationOptions, UserCredentials};

/// Default cap on events per append, matching the store's default limit.
pub const DEFAULT_MAX_APPEND_EVENTS_COUNT: usize = 500;

/// Options applied to one produce call.
///
/// Options are immutable once built and are meant to be shared read-only
/// across many calls (wrap in `Arc` if needed).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProduceOptions {
    max_append_events_count: usize,
    expected_state: ExpectedState,
    operation: OperationOptions,
    credentials: Option<UserCredentials>,
}

impl Default for ProduceOptions {
    fn default() -> Self {
        Self {
            max_append_events_count: DEFAULT_MAX_APPEND_EVENTS_COUNT,
            expected_state: ExpectedState::Any,
            operation: OperationOptions::default(),
            credentials: None,
        }
    }
}

impl ProduceOptions {
    /// Defaults derived from connection settings: append cap, deadline,
    /// leader requirement and credentials.
    pub fn from_settings(settings: &ClientSettings) -> Self {
        Self {
            max_append_events_count: settings
                .max_append_size()
                .unwrap_or(DEFAULT_MAX_APPEND_EVENTS_COUNT),
            operation: settings.operation_options(),
            credentials: settings.default_credentials().cloned(),
            ..Self::default()
        }
    }

    /// Maximum number of messages sent in a single append.
    ///
    /// Zero is accepted here and rejected when producing.
    pub fn with_max_append_events_count(mut self, max: usize) -> Self {
        self.max_append_events_count = max;
        self
    }

    pub fn with_expected_state(mut self, expected_state: ExpectedState) -> Self {
        self.expected_state = expected_state;
        self
    }

    pub fn with_operation(mut self, operation: OperationOptions) -> Self {
        self.operation = operation;
        self
    }

    pub fn with_credentials(mut self, credentials: UserCredentials) -> Self {
        self.credentials = Some(credentials);
        self
    }

    pub fn max_append_events_count(&self) -> usize {
        self.max_append_events_count
    }

    pub fn expected_state(&self) -> ExpectedState {
        self.expected_state
    }

    pub fn operation(&self) -> &OperationOptions {
        &self.operation
    }

    pub fn credentials(&self) -> Option<&UserCredentials> {
        self.credentials.as_ref()
    }
}
