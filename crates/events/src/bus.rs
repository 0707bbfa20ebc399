//! Service bus abstraction (mechanics only).
//!
//! The bus is the **transport collaborator** of the saga engine: it delivers
//! inbound envelopes to receivers and lets saga instances publish follow-up
//! messages once they have been bound to it.
//!
//! ## Design Philosophy
//!
//! - **Transport-agnostic**: works with in-memory channels or real brokers
//! - **At-least-once delivery**: receivers must tolerate duplicates
//! - **Object-safe**: saga instances hold the bus as a shared `Arc<dyn ServiceBus>`
//!   that is bound late, at dispatch time, to whichever bus delivered the
//!   triggering message

use std::sync::Arc;
use std::sync::mpsc::Receiver;
use std::time::Duration;

use serde::Serialize;
use serde_json::Value as JsonValue;
use thiserror::Error;

use crate::{CorrelatedBy, EnvelopeError, MessageEnvelope};

/// Envelope type carried by every bus.
pub type BusEnvelope = MessageEnvelope<JsonValue>;

/// Shared reference to the bus a saga instance sends through.
pub type BusRef = Arc<dyn ServiceBus>;

/// Bus operation error.
#[derive(Debug, Error)]
pub enum BusError {
    /// Internal lock poisoning.
    #[error("bus lock poisoned")]
    Poisoned,

    #[error(transparent)]
    Envelope(#[from] EnvelopeError),
}

/// A subscription to the bus.
///
/// Each subscription gets a copy of every envelope published after it was
/// created (broadcast semantics). Subscriptions are meant for a single
/// consuming thread.
#[derive(Debug)]
pub struct Subscription<M> {
    receiver: Receiver<M>,
}

impl<M> Subscription<M> {
    pub fn new(receiver: Receiver<M>) -> Self {
        Self { receiver }
    }

    /// Block until the next message is available.
    pub fn recv(&self) -> Result<M, std::sync::mpsc::RecvError> {
        self.receiver.recv()
    }

    /// Try to receive a message without blocking.
    pub fn try_recv(&self) -> Result<M, std::sync::mpsc::TryRecvError> {
        self.receiver.try_recv()
    }

    /// Block for up to `timeout` waiting for a message.
    pub fn recv_timeout(&self, timeout: Duration) -> Result<M, std::sync::mpsc::RecvTimeoutError> {
        self.receiver.recv_timeout(timeout)
    }
}

/// Publish/subscribe capability consumed by the saga engine.
///
/// ## Thread Safety
///
/// `Send + Sync` is required: many dispatches bind the same bus onto different
/// saga instances concurrently, and instances publish from whichever worker
/// thread invokes their dispatch action.
pub trait ServiceBus: Send + Sync {
    /// Address identifying this bus (e.g. "mem://orders").
    fn address(&self) -> &str;

    fn publish(&self, envelope: BusEnvelope) -> Result<(), BusError>;

    fn subscribe(&self) -> Subscription<BusEnvelope>;
}

impl dyn ServiceBus {
    /// Wrap a typed message in an envelope sourced from this bus and publish it.
    pub fn publish_message<M>(&self, message: &M) -> Result<(), BusError>
    where
        M: CorrelatedBy + Serialize,
    {
        let envelope = MessageEnvelope::from_message(self.address(), message)?;
        self.publish(envelope)
    }
}

impl<B> ServiceBus for Arc<B>
where
    B: ServiceBus + ?Sized,
{
    fn address(&self) -> &str {
        (**self).address()
    }

    fn publish(&self, envelope: BusEnvelope) -> Result<(), BusError> {
        (**self).publish(envelope)
    }

    fn subscribe(&self) -> Subscription<BusEnvelope> {
        (**self).subscribe()
    }
}
