//! `sagabus-events`: message, bus and saga contracts.
//!
//! Everything here is mechanics: no storage, no threads. Repositories, sinks
//! and workers live in `sagabus-infra`.

pub mod bus;
pub mod correlation;
pub mod envelope;
pub mod event;
pub mod in_memory_bus;
pub mod message;
pub mod saga;

pub use bus::{BusEnvelope, BusError, BusRef, ServiceBus, Subscription};
pub use correlation::resolve_correlation_id;
pub use envelope::{EnvelopeError, MessageEnvelope};
pub use event::DataEvent;
pub use in_memory_bus::InMemoryServiceBus;
pub use message::{CorrelatedBy, Message};
pub use saga::{RaiseEvent, SagaStateMachine, TransitionError};
