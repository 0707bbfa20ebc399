//! Saga storage error model.

use thiserror::Error;

use crate::id::CorrelationId;

/// Result type used by saga repositories.
pub type SagaResult<T> = Result<T, SagaOperationError>;

/// Repository-level failure while locating, creating or releasing saga instances.
///
/// These are storage concerns, not state-machine failures. Transition errors
/// raised by a saga itself live next to the saga contract.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum SagaOperationError {
    /// The backing store could not be reached (or its lock was poisoned).
    #[error("saga store unavailable: {0}")]
    Unavailable(String),

    /// Another dispatch holds the instance (optimistic concurrency / claim conflict).
    #[error("concurrent saga operation: {0}")]
    Concurrency(String),

    /// Initiation was requested for an identifier that already has a saga.
    #[error("saga already exists: {0}")]
    AlreadyExists(CorrelationId),

    /// A saga was expected but none is stored under the identifier.
    #[error("saga not found: {0}")]
    NotFound(CorrelationId),

    /// Stored saga data could not be materialized.
    #[error("saga data corrupted: {0}")]
    Corrupted(String),

    /// Releasing resources held by a saga cursor failed.
    #[error("failed to release saga resources: {0}")]
    Release(String),
}

impl SagaOperationError {
    pub fn unavailable(msg: impl Into<String>) -> Self {
        Self::Unavailable(msg.into())
    }

    pub fn concurrency(msg: impl Into<String>) -> Self {
        Self::Concurrency(msg.into())
    }

    pub fn corrupted(msg: impl Into<String>) -> Self {
        Self::Corrupted(msg.into())
    }

    pub fn release(msg: impl Into<String>) -> Self {
        Self::Release(msg.into())
    }
}

/// An identifier failed to parse.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid identifier: {kind}: {reason}")]
pub struct InvalidIdentifier {
    kind: &'static str,
    reason: String,
}

impl InvalidIdentifier {
    pub fn new(kind: &'static str, reason: impl core::fmt::Display) -> Self {
        Self {
            kind,
            reason: reason.to_string(),
        }
    }

    pub fn kind(&self) -> &'static str {
        self.kind
    }
}
