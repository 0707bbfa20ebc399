//! Configuration for sinks, repositories and workers.
//!
//! Every setting is an explicit value handed to a constructor; nothing here is
//! process-wide mutable state.

use std::time::Duration;

use tracing::warn;

/// What an initiation sink does when the repository fails on its first advancement.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum InitiationFailurePolicy {
    /// Log the failure and hand the pipeline a single no-op action, so the
    /// message counts as handled and is not redelivered.
    #[default]
    FailOpen,
    /// Log the failure and hand the pipeline a single action that returns the
    /// repository error when invoked, leaving retry/dead-letter to the invoker.
    FailClosed,
}

/// Dispatch sink configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub struct SinkConfig {
    pub initiation_failure: InitiationFailurePolicy,
}

impl SinkConfig {
    pub fn with_initiation_failure(mut self, policy: InitiationFailurePolicy) -> Self {
        self.initiation_failure = policy;
        self
    }

    pub fn fail_closed() -> Self {
        Self::default().with_initiation_failure(InitiationFailurePolicy::FailClosed)
    }
}

/// What the in-memory repository does when asked to initiate an identifier it already stores.
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum ExistingSagaPolicy {
    /// Fail with `SagaOperationError::AlreadyExists`.
    #[default]
    Reject,
    /// Yield the stored instance as if it had just been initiated.
    Load,
}

/// In-memory saga repository configuration.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct RepositoryConfig {
    pub existing_saga: ExistingSagaPolicy,
    /// How long a cursor waits for another dispatch to release the same saga
    /// before failing with `SagaOperationError::Concurrency`.
    pub claim_timeout: Duration,
}

impl Default for RepositoryConfig {
    fn default() -> Self {
        Self {
            existing_saga: ExistingSagaPolicy::default(),
            claim_timeout: Duration::from_secs(5),
        }
    }
}

impl RepositoryConfig {
    pub fn with_existing_saga(mut self, policy: ExistingSagaPolicy) -> Self {
        self.existing_saga = policy;
        self
    }

    pub fn with_claim_timeout(mut self, timeout: Duration) -> Self {
        self.claim_timeout = timeout;
        self
    }
}

const RECEIVE_TIMEOUT_VAR: &str = "SAGABUS_RECEIVE_TIMEOUT_MS";
const CONCURRENT_CONSUMERS_VAR: &str = "SAGABUS_CONCURRENT_CONSUMERS";

/// Saga worker configuration.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WorkerConfig {
    /// Name for logging and thread names
    pub name: String,
    /// How long the receive loop blocks before checking for shutdown
    pub receive_timeout: Duration,
    /// Number of threads delivering messages concurrently
    pub concurrent_consumer_limit: usize,
}

impl Default for WorkerConfig {
    fn default() -> Self {
        Self {
            name: "saga-worker".to_string(),
            receive_timeout: Duration::from_millis(150),
            concurrent_consumer_limit: 4,
        }
    }
}

impl WorkerConfig {
    pub fn with_name(mut self, name: impl Into<String>) -> Self {
        self.name = name.into();
        self
    }

    pub fn with_receive_timeout(mut self, timeout: Duration) -> Self {
        self.receive_timeout = timeout;
        self
    }

    pub fn with_concurrent_consumer_limit(mut self, limit: usize) -> Self {
        self.concurrent_consumer_limit = limit.max(1);
        self
    }

    /// Defaults overridden by `SAGABUS_RECEIVE_TIMEOUT_MS` / `SAGABUS_CONCURRENT_CONSUMERS`.
    pub fn from_env() -> Self {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Same as [`WorkerConfig::from_env`] with an injectable variable source.
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Self {
        let mut config = Self::default();

        if let Some(raw) = lookup(RECEIVE_TIMEOUT_VAR) {
            match raw.trim().parse::<u64>() {
                Ok(ms) if ms > 0 => config.receive_timeout = Duration::from_millis(ms),
                _ => warn!(var = RECEIVE_TIMEOUT_VAR, value = %raw, "invalid receive timeout; using default"),
            }
        }

        if let Some(raw) = lookup(CONCURRENT_CONSUMERS_VAR) {
            match raw.trim().parse::<usize>() {
                Ok(n) if n > 0 => config.concurrent_consumer_limit = n,
                _ => warn!(var = CONCURRENT_CONSUMERS_VAR, value = %raw, "invalid consumer limit; using default"),
            }
        }

        config
    }
}
