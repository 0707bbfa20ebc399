//! Saga state-machine contract (mechanics only, no business rules).
//!
//! - A saga instance is identified by its correlation id
//! - Each instance carries an explicit state and a late-bound bus reference
//! - Transitions are driven by raising typed events with the triggering message
//!
//! How transition tables are authored is up to the implementor; the engine only
//! needs `raise_event` to apply a transition synchronously (including any
//! in-memory effects such as publishing follow-up messages) before returning.

use thiserror::Error;

use sagabus_core::CorrelationId;

use crate::{BusError, BusRef, DataEvent};

/// Failure while applying a transition.
///
/// The dispatch engine never catches these; they propagate to whatever invokes
/// the dispatch action, which owns retry/dead-letter policy.
#[derive(Debug, Error)]
pub enum TransitionError {
    /// The current state has no transition for the event.
    #[error("event '{event}' is not accepted in state {state}")]
    NotAccepted { event: &'static str, state: String },

    /// The saga tried to send before a bus was bound to it.
    #[error("saga {0} has no bus bound")]
    Unbound(CorrelationId),

    /// Publishing a follow-up message failed.
    #[error("failed to publish from saga: {0}")]
    Bus(#[from] BusError),

    /// The saga rejected the message (business rule).
    #[error("rejected: {0}")]
    Rejected(String),

    /// The instance lock was poisoned by a panicking transition.
    #[error("saga instance lock poisoned")]
    Poisoned,
}

impl TransitionError {
    pub fn not_accepted<M>(event: &DataEvent<M>, state: &impl core::fmt::Debug) -> Self {
        Self::NotAccepted {
            event: event.name(),
            state: format!("{state:?}"),
        }
    }

    pub fn rejected(msg: impl Into<String>) -> Self {
        Self::Rejected(msg.into())
    }
}

/// Saga contract.
///
/// Implementors define:
/// - a typed state (encodes the explicit state machine)
/// - how a fresh instance looks for a correlation id
/// - a slot for the bus the instance sends through
pub trait SagaStateMachine: Send + 'static {
    type State: Clone + PartialEq + core::fmt::Debug + Send + 'static;

    /// Stable saga type identifier (e.g. "saga.order_fulfilment").
    fn saga_type() -> &'static str;

    /// Construct a new instance in its initial state.
    fn initiate(correlation_id: CorrelationId) -> Self
    where
        Self: Sized;

    fn correlation_id(&self) -> CorrelationId;

    fn current_state(&self) -> &Self::State;

    /// Bus bound by the last dispatch, if any.
    fn bus(&self) -> Option<&BusRef>;

    /// Bind the bus that delivered the triggering message.
    fn bind_bus(&mut self, bus: BusRef);
}

/// A saga that reacts to events carrying messages of type `M`.
pub trait RaiseEvent<M>: SagaStateMachine {
    /// Apply the transition for `event` given `message`.
    fn raise_event(&mut self, event: &DataEvent<M>, message: &M) -> Result<(), TransitionError>;
}
