use thiserror::Error;

use sagabus_core::{CorrelationId, SagaOperationError};
use sagabus_events::TransitionError;

/// Failure surfaced when a dispatch action is invoked.
#[derive(Debug, Error)]
pub enum DispatchError {
    #[error("saga transition failed: {0}")]
    Transition(#[from] TransitionError),

    #[error("saga repository failed: {0}")]
    Repository(#[from] SagaOperationError),
}

type RaiseFn<M> = Box<dyn FnOnce(&M) -> Result<(), TransitionError> + Send>;

enum ActionKind<M> {
    Noop,
    Raise {
        correlation_id: CorrelationId,
        raise: RaiseFn<M>,
    },
    Failed {
        correlation_id: CorrelationId,
        error: DispatchError,
    },
}

/// A deferred unit of work produced for one inbound message.
///
/// Actions are plain data until [`DispatchAction::invoke`] is called with the
/// message; a raise action then drives exactly one saga instance.
pub struct DispatchAction<M> {
    kind: ActionKind<M>,
}

impl<M> DispatchAction<M> {
    /// An action that does nothing when invoked.
    pub fn noop() -> Self {
        Self {
            kind: ActionKind::Noop,
        }
    }

    pub fn raise<F>(correlation_id: CorrelationId, raise: F) -> Self
    where
        F: FnOnce(&M) -> Result<(), TransitionError> + Send + 'static,
    {
        Self {
            kind: ActionKind::Raise {
                correlation_id,
                raise: Box::new(raise),
            },
        }
    }

    /// An action that reports `error` when invoked.
    pub fn failed(correlation_id: CorrelationId, error: impl Into<DispatchError>) -> Self {
        Self {
            kind: ActionKind::Failed {
                correlation_id,
                error: error.into(),
            },
        }
    }

    pub fn is_noop(&self) -> bool {
        matches!(self.kind, ActionKind::Noop)
    }

    pub fn is_raise(&self) -> bool {
        matches!(self.kind, ActionKind::Raise { .. })
    }

    pub fn is_failed(&self) -> bool {
        matches!(self.kind, ActionKind::Failed { .. })
    }

    /// Saga the action targets (`None` for no-ops).
    pub fn correlation_id(&self) -> Option<CorrelationId> {
        match &self.kind {
            ActionKind::Noop => None,
            ActionKind::Raise { correlation_id, .. } | ActionKind::Failed { correlation_id, .. } => {
                Some(*correlation_id)
            }
        }
    }

    /// Run the action against `message`.
    ///
    /// Transition errors are returned as-is; nothing is retried here.
    pub fn invoke(self, message: &M) -> Result<(), DispatchError> {
        match self.kind {
            ActionKind::Noop => Ok(()),
            ActionKind::Raise { raise, .. } => raise(message).map_err(DispatchError::from),
            ActionKind::Failed { error, .. } => Err(error),
        }
    }
}

impl<M> core::fmt::Debug for DispatchAction<M> {
    fn fmt(&self, f: &mut core::fmt::Formatter<'_>) -> core::fmt::Result {
        match &self.kind {
            ActionKind::Noop => f.write_str("DispatchAction::Noop"),
            ActionKind::Raise { correlation_id, .. } => f
                .debug_struct("DispatchAction::Raise")
                .field("correlation_id", correlation_id)
                .finish_non_exhaustive(),
            ActionKind::Failed {
                correlation_id,
                error,
            } => f
                .debug_struct("DispatchAction::Failed")
                .field("correlation_id", correlation_id)
                .field("error", error)
                .finish(),
        }
    }
}
