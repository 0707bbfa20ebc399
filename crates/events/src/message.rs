use sagabus_core::CorrelationId;

/// A message that travels over the bus.
///
/// Messages are:
/// - **immutable** (the dispatch engine never mutates them)
/// - **owned** (`'static`, no borrowed data) so they can cross worker threads
/// - **named** by a stable type identifier used for routing and decoding
pub trait Message: Clone + core::fmt::Debug + Send + Sync + 'static {
    /// Stable message type identifier (e.g. "orders.order_submitted").
    fn message_type() -> &'static str;
}

/// A message correlated to a saga by exactly one identifier.
///
/// A nil identifier means the sender did not correlate the message; initiation
/// sinks mint a fresh identifier in that case.
pub trait CorrelatedBy: Message {
    fn correlation_id(&self) -> CorrelationId;
}
