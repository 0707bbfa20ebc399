//! In-memory service bus for tests/dev.

use std::sync::{Mutex, mpsc};

use tracing::trace;

use crate::bus::{BusEnvelope, BusError, ServiceBus, Subscription};

/// In-memory pub/sub bus.
///
/// - No IO / no async
/// - Best-effort fan-out to every live subscription
/// - At-least-once acceptable (receivers must be idempotent)
#[derive(Debug)]
pub struct InMemoryServiceBus {
    address: String,
    subscribers: Mutex<Vec<mpsc::Sender<BusEnvelope>>>,
}

impl InMemoryServiceBus {
    pub fn new(address: impl Into<String>) -> Self {
        Self {
            address: address.into(),
            subscribers: Mutex::new(Vec::new()),
        }
    }
}

impl ServiceBus for InMemoryServiceBus {
    fn address(&self) -> &str {
        &self.address
    }

    fn publish(&self, envelope: BusEnvelope) -> Result<(), BusError> {
        let mut subs = self.subscribers.lock().map_err(|_| BusError::Poisoned)?;

        trace!(
            bus = %self.address,
            message_type = envelope.message_type(),
            correlation_id = %envelope.correlation_id(),
            subscribers = subs.len(),
            "publishing envelope"
        );

        // Drop any dead subscribers while publishing.
        subs.retain(|tx| tx.send(envelope.clone()).is_ok());

        Ok(())
    }

    fn subscribe(&self) -> Subscription<BusEnvelope> {
        let (tx, rx) = mpsc::channel();

        // If the lock is poisoned, we still return a subscription;
        // it just won't receive messages until the process restarts.
        if let Ok(mut subs) = self.subscribers.lock() {
            subs.push(tx);
        }

        Subscription::new(rx)
    }
}
