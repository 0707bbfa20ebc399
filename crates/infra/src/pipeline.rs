//! Consumer side of a sink: enumerate actions and invoke them in order.

use tracing::debug;

use crate::saga::{DispatchAction, DispatchError};

/// Something that turns an inbound message into dispatch actions.
///
/// Implementations must be lazy: no saga is touched until the returned
/// sequence is advanced.
pub trait MessageSink<M> {
    type Actions<'a>: Iterator<Item = DispatchAction<M>>
    where
        Self: 'a;

    fn enumerate(&self, message: &M) -> Self::Actions<'_>;
}

/// Outcome of delivering one message through a sink.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct DeliveryReport {
    /// Actions invoked (no-ops included).
    pub actions: usize,
    /// Actions that raised an event on a saga instance.
    pub raised: usize,
}

impl DeliveryReport {
    /// Whether the sink produced at least one unit of work.
    pub fn handled(&self) -> bool {
        self.actions > 0
    }
}

/// Enumerate `sink` for `message` and invoke each action as it is produced.
///
/// Stops at the first failing action; dropping the rest of the sequence
/// releases whatever the repository still holds.
pub fn deliver<M, K>(sink: &K, message: &M) -> Result<DeliveryReport, DispatchError>
where
    K: MessageSink<M> + ?Sized,
{
    let mut report = DeliveryReport::default();

    for action in sink.enumerate(message) {
        let raised = action.is_raise();
        action.invoke(message)?;
        report.actions += 1;
        if raised {
            report.raised += 1;
        }
    }

    debug!(actions = report.actions, raised = report.raised, "message delivered");
    Ok(report)
}
