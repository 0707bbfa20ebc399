//! Shared fixtures for the crate's tests: an order saga, its messages, a
//! scripted repository and a log capture helper.

use std::fmt;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

use serde::{Deserialize, Serialize};
use tracing::field::{Field, Visit};
use tracing::{Event, Level, Subscriber};
use tracing_subscriber::layer::{Context, Layer, SubscriberExt};

use sagabus_core::{CorrelationId, SagaOperationError, SagaResult};
use sagabus_events::{
    BusRef, CorrelatedBy, DataEvent, Message, RaiseEvent, SagaStateMachine, TransitionError,
};

use crate::saga::{SagaCursor, SagaRef, SagaRepository};

// ---------------------------------------------------------------------------
// Messages
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderSubmitted {
    pub correlation_id: CorrelationId,
    pub order_number: u32,
}

impl OrderSubmitted {
    pub fn uncorrelated(order_number: u32) -> Self {
        Self::correlated(CorrelationId::nil(), order_number)
    }

    pub fn correlated(correlation_id: CorrelationId, order_number: u32) -> Self {
        Self {
            correlation_id,
            order_number,
        }
    }
}

impl Message for OrderSubmitted {
    fn message_type() -> &'static str {
        "orders.order_submitted"
    }
}

impl CorrelatedBy for OrderSubmitted {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceived {
    pub correlation_id: CorrelationId,
    pub amount: u64,
}

impl PaymentReceived {
    pub fn new(correlation_id: CorrelationId, amount: u64) -> Self {
        Self {
            correlation_id,
            amount,
        }
    }
}

impl Message for PaymentReceived {
    fn message_type() -> &'static str {
        "orders.payment_received"
    }
}

impl CorrelatedBy for PaymentReceived {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

/// Published by the saga when it accepts an order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderAccepted {
    pub correlation_id: CorrelationId,
    pub order_number: u32,
}

impl Message for OrderAccepted {
    fn message_type() -> &'static str {
        "orders.order_accepted"
    }
}

impl CorrelatedBy for OrderAccepted {
    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }
}

pub const ORDER_SUBMITTED: DataEvent<OrderSubmitted> = DataEvent::new("order_submitted");
pub const PAYMENT_RECEIVED: DataEvent<PaymentReceived> = DataEvent::new("payment_received");

// ---------------------------------------------------------------------------
// Saga
// ---------------------------------------------------------------------------

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OrderState {
    Initial,
    AwaitingPayment { order_number: u32 },
    Paid,
}

pub struct OrderSaga {
    correlation_id: CorrelationId,
    state: OrderState,
    bus: Option<BusRef>,
    /// Names of the events applied, in order.
    pub raised: Vec<&'static str>,
}

impl OrderSaga {
    pub fn force_state(&mut self, state: OrderState) {
        self.state = state;
    }
}

impl SagaStateMachine for OrderSaga {
    type State = OrderState;

    fn saga_type() -> &'static str {
        "saga.order"
    }

    fn initiate(correlation_id: CorrelationId) -> Self {
        Self {
            correlation_id,
            state: OrderState::Initial,
            bus: None,
            raised: Vec::new(),
        }
    }

    fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    fn current_state(&self) -> &OrderState {
        &self.state
    }

    fn bus(&self) -> Option<&BusRef> {
        self.bus.as_ref()
    }

    fn bind_bus(&mut self, bus: BusRef) {
        self.bus = Some(bus);
    }
}

impl RaiseEvent<OrderSubmitted> for OrderSaga {
    fn raise_event(
        &mut self,
        event: &DataEvent<OrderSubmitted>,
        message: &OrderSubmitted,
    ) -> Result<(), TransitionError> {
        match self.state {
            OrderState::Initial => {
                let bus = self
                    .bus
                    .as_ref()
                    .ok_or(TransitionError::Unbound(self.correlation_id))?;
                bus.publish_message(&OrderAccepted {
                    correlation_id: self.correlation_id,
                    order_number: message.order_number,
                })?;
                self.state = OrderState::AwaitingPayment {
                    order_number: message.order_number,
                };
                self.raised.push(event.name());
                Ok(())
            }
            _ => Err(TransitionError::not_accepted(event, &self.state)),
        }
    }
}

impl RaiseEvent<PaymentReceived> for OrderSaga {
    fn raise_event(
        &mut self,
        event: &DataEvent<PaymentReceived>,
        _message: &PaymentReceived,
    ) -> Result<(), TransitionError> {
        match self.state {
            OrderState::AwaitingPayment { .. } => {
                self.state = OrderState::Paid;
                self.raised.push(event.name());
                Ok(())
            }
            _ => Err(TransitionError::not_accepted(event, &self.state)),
        }
    }
}

// ---------------------------------------------------------------------------
// Scripted repository
// ---------------------------------------------------------------------------

/// What a [`RecordingRepository`] cursor does as it advances.
#[derive(Debug, Clone)]
pub enum Script {
    /// Yield this many fresh instances, then end.
    Yield(usize),
    /// Fail on the first advancement.
    FailFirst(SagaOperationError),
    /// Yield this many instances, then fail.
    FailAfter(usize, SagaOperationError),
}

/// Repository that follows a [`Script`] and counts what the sink did with it.
///
/// Every instance is created under the requested correlation id, which lets
/// tests exercise fan-out to several instances per message.
pub struct RecordingRepository {
    script: Script,
    fail_release: bool,
    advances: AtomicUsize,
    releases: AtomicUsize,
    created: Mutex<Vec<SagaRef<OrderSaga>>>,
}

impl RecordingRepository {
    pub fn new(script: Script) -> Self {
        Self {
            script,
            fail_release: false,
            advances: AtomicUsize::new(0),
            releases: AtomicUsize::new(0),
            created: Mutex::new(Vec::new()),
        }
    }

    /// Make every `close` fail after counting the release.
    pub fn failing_release(mut self) -> Self {
        self.fail_release = true;
        self
    }

    pub fn advances(&self) -> usize {
        self.advances.load(Ordering::SeqCst)
    }

    pub fn releases(&self) -> usize {
        self.releases.load(Ordering::SeqCst)
    }

    pub fn created(&self) -> Vec<SagaRef<OrderSaga>> {
        self.created.lock().unwrap().clone()
    }

    fn cursor(&self, correlation_id: CorrelationId) -> RecordingCursor<'_> {
        RecordingCursor {
            repo: self,
            correlation_id,
            position: 0,
            closed: false,
        }
    }

    fn create(&self, correlation_id: CorrelationId) -> SagaRef<OrderSaga> {
        let saga = Arc::new(Mutex::new(OrderSaga::initiate(correlation_id)));
        self.created.lock().unwrap().push(saga.clone());
        saga
    }
}

impl SagaRepository<OrderSaga> for RecordingRepository {
    type Cursor<'a>
        = RecordingCursor<'a>
    where
        Self: 'a;

    fn initiate_new_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_> {
        self.cursor(correlation_id)
    }

    fn orchestrate_existing_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_> {
        self.cursor(correlation_id)
    }
}

pub struct RecordingCursor<'a> {
    repo: &'a RecordingRepository,
    correlation_id: CorrelationId,
    position: usize,
    closed: bool,
}

impl Iterator for RecordingCursor<'_> {
    type Item = SagaResult<SagaRef<OrderSaga>>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.closed {
            return None;
        }
        self.repo.advances.fetch_add(1, Ordering::SeqCst);
        let position = self.position;
        self.position += 1;

        match &self.repo.script {
            Script::Yield(n) if position < *n => Some(Ok(self.repo.create(self.correlation_id))),
            Script::Yield(_) => None,
            Script::FailFirst(err) if position == 0 => Some(Err(err.clone())),
            Script::FailFirst(_) => None,
            Script::FailAfter(n, _) if position < *n => {
                Some(Ok(self.repo.create(self.correlation_id)))
            }
            Script::FailAfter(n, err) if position == *n => Some(Err(err.clone())),
            Script::FailAfter(..) => None,
        }
    }
}

impl SagaCursor<OrderSaga> for RecordingCursor<'_> {
    fn close(&mut self) -> SagaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.repo.releases.fetch_add(1, Ordering::SeqCst);
        if self.repo.fail_release {
            return Err(SagaOperationError::release("connection reset"));
        }
        Ok(())
    }
}

impl Drop for RecordingCursor<'_> {
    fn drop(&mut self) {
        let _ = self.close();
    }
}

// ---------------------------------------------------------------------------
// Log capture
// ---------------------------------------------------------------------------

#[derive(Debug, Clone)]
pub struct CapturedLog {
    pub level: Level,
    pub message: String,
    /// Non-message fields as `name=value`, space separated.
    pub fields: String,
}

struct CaptureLayer {
    logs: Arc<Mutex<Vec<CapturedLog>>>,
}

impl<S: Subscriber> Layer<S> for CaptureLayer {
    fn on_event(&self, event: &Event<'_>, _ctx: Context<'_, S>) {
        let mut visitor = FieldVisitor::default();
        event.record(&mut visitor);

        if let Ok(mut logs) = self.logs.lock() {
            logs.push(CapturedLog {
                level: *event.metadata().level(),
                message: visitor.message,
                fields: visitor.fields.join(" "),
            });
        }
    }
}

#[derive(Default)]
struct FieldVisitor {
    message: String,
    fields: Vec<String>,
}

impl Visit for FieldVisitor {
    fn record_str(&mut self, field: &Field, value: &str) {
        if field.name() == "message" {
            self.message = value.to_string();
        } else {
            self.fields.push(format!("{}={}", field.name(), value));
        }
    }

    fn record_debug(&mut self, field: &Field, value: &dyn fmt::Debug) {
        if field.name() == "message" {
            self.message = format!("{value:?}");
        } else {
            self.fields.push(format!("{}={:?}", field.name(), value));
        }
    }
}

/// Run `f` with a thread-local subscriber that records every event.
pub fn capture_logs<R>(f: impl FnOnce() -> R) -> (R, Vec<CapturedLog>) {
    let logs = Arc::new(Mutex::new(Vec::new()));
    let subscriber = tracing_subscriber::registry().with(CaptureLayer { logs: logs.clone() });

    let result = tracing::subscriber::with_default(subscriber, f);
    let captured = logs.lock().unwrap().clone();
    (result, captured)
}
