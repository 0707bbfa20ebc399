//! Correlation resolution for inbound messages.

use sagabus_core::CorrelationId;
use tracing::trace;

use crate::CorrelatedBy;

/// Resolve the identifier a message is dispatched under.
///
/// Returns the message's own identifier when it is set. A nil identifier is
/// replaced by a freshly minted, time-ordered one which then names the saga for
/// the rest of its life. Generation touches no state owned by this crate, so
/// concurrent dispatches need no coordination.
pub fn resolve_correlation_id<M>(message: &M) -> CorrelationId
where
    M: CorrelatedBy,
{
    let declared = message.correlation_id();
    let resolved = declared.or_generate();
    if declared.is_nil() {
        trace!(
            message_type = M::message_type(),
            correlation_id = %resolved,
            "generated correlation id for uncorrelated message"
        );
    }
    resolved
}
