//! Lazy production of dispatch actions over a repository cursor.
//!
//! Shared by the initiation and orchestration sinks. The cursor is opened on
//! the first pull and advanced once per pull afterwards, so repository work
//! happens in lock-step with the consumer. Whatever happens (exhaustion, an
//! error, or the consumer dropping the sequence) the cursor is released.

use tracing::{debug, error, warn};

use sagabus_core::{CorrelationId, SagaOperationError};
use sagabus_events::{BusRef, DataEvent, RaiseEvent, TransitionError};

use crate::config::InitiationFailurePolicy;

use super::{DispatchAction, SagaRef, SagaRepository, ScopedCursor};

/// Which repository query backs the sequence.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum CursorSource {
    Initiate,
    Orchestrate,
}

/// What the sequence produces when the repository has no instance for the message.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub(crate) enum WhenEmpty {
    /// Exactly one no-op, so acknowledgement logic always sees a unit of work.
    Noop,
    /// Nothing; the message is not handled by this sink.
    Nothing,
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
enum Phase {
    Pending,
    Yielding,
    Finished,
}

/// Lazy sequence of dispatch actions for one inbound message.
///
/// Produced by [`InitiateSagaSink`](super::InitiateSagaSink) and
/// [`OrchestrateSagaSink`](super::OrchestrateSagaSink). Nothing touches the
/// repository until the first call to `next`.
pub struct SagaDispatch<'a, S, M, R>
where
    S: RaiseEvent<M>,
    M: 'static,
    R: SagaRepository<S> + 'a,
{
    repository: &'a R,
    bus: &'a BusRef,
    event: DataEvent<M>,
    correlation_id: CorrelationId,
    source: CursorSource,
    when_empty: WhenEmpty,
    on_failure: InitiationFailurePolicy,
    cursor: Option<ScopedCursor<S, R::Cursor<'a>>>,
    phase: Phase,
}

impl<'a, S, M, R> SagaDispatch<'a, S, M, R>
where
    S: RaiseEvent<M>,
    M: 'static,
    R: SagaRepository<S> + 'a,
{
    pub(crate) fn new(
        repository: &'a R,
        bus: &'a BusRef,
        event: DataEvent<M>,
        correlation_id: CorrelationId,
        source: CursorSource,
        when_empty: WhenEmpty,
        on_failure: InitiationFailurePolicy,
    ) -> Self {
        Self {
            repository,
            bus,
            event,
            correlation_id,
            source,
            when_empty,
            on_failure,
            cursor: None,
            phase: Phase::Pending,
        }
    }

    /// Identifier the message is dispatched under.
    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    fn open(&self) -> ScopedCursor<S, R::Cursor<'a>> {
        let repository = self.repository;
        let cursor = match self.source {
            CursorSource::Initiate => repository.initiate_new_saga(self.correlation_id),
            CursorSource::Orchestrate => repository.orchestrate_existing_saga(self.correlation_id),
        };
        ScopedCursor::new(cursor, self.correlation_id)
    }

    fn first(&mut self) -> Option<DispatchAction<M>> {
        let mut cursor = self.open();

        match cursor.advance() {
            Some(Ok(saga)) => {
                let action = self.bind(saga);
                self.cursor = Some(cursor);
                self.phase = Phase::Yielding;
                Some(action)
            }
            Some(Err(err)) => {
                error!(
                    saga_type = S::saga_type(),
                    correlation_id = %self.correlation_id,
                    error = %err,
                    "saga lookup failed"
                );
                self.finish(cursor);
                match self.on_failure {
                    InitiationFailurePolicy::FailOpen => self.empty(),
                    InitiationFailurePolicy::FailClosed => {
                        Some(DispatchAction::failed(self.correlation_id, err))
                    }
                }
            }
            None => {
                debug!(
                    saga_type = S::saga_type(),
                    correlation_id = %self.correlation_id,
                    "no saga instance for message"
                );
                self.finish(cursor);
                self.empty()
            }
        }
    }

    fn following(&mut self) -> Option<DispatchAction<M>> {
        let next = match self.cursor.as_mut() {
            Some(cursor) => cursor.advance(),
            None => None,
        };

        match next {
            Some(Ok(saga)) => Some(self.bind(saga)),
            Some(Err(err)) => {
                // Only the first advancement is covered by the failure policy.
                error!(
                    saga_type = S::saga_type(),
                    correlation_id = %self.correlation_id,
                    error = %err,
                    "saga lookup failed mid-sequence"
                );
                self.release();
                Some(DispatchAction::failed(self.correlation_id, err))
            }
            None => {
                self.release();
                None
            }
        }
    }

    fn empty(&self) -> Option<DispatchAction<M>> {
        match self.when_empty {
            WhenEmpty::Noop => Some(DispatchAction::noop()),
            WhenEmpty::Nothing => None,
        }
    }

    /// Bind the active bus onto the instance and defer the raise.
    fn bind(&self, saga: SagaRef<S>) -> DispatchAction<M> {
        let correlation_id = {
            let mut instance = match saga.lock() {
                Ok(instance) => instance,
                Err(_) => {
                    return DispatchAction::failed(self.correlation_id, TransitionError::Poisoned);
                }
            };
            instance.bind_bus(self.bus.clone());
            instance.correlation_id()
        };

        debug!(
            saga_type = S::saga_type(),
            correlation_id = %correlation_id,
            event = self.event.name(),
            bus = self.bus.address(),
            "bound saga instance for dispatch"
        );

        let event = self.event;
        DispatchAction::raise(correlation_id, move |message: &M| {
            let mut instance = saga.lock().map_err(|_| TransitionError::Poisoned)?;
            instance.raise_event(&event, message)
        })
    }

    fn release(&mut self) {
        if let Some(cursor) = self.cursor.take() {
            self.finish(cursor);
        }
        self.phase = Phase::Finished;
    }

    fn finish(&mut self, mut cursor: ScopedCursor<S, R::Cursor<'a>>) {
        self.phase = Phase::Finished;
        if let Err(err) = cursor.close() {
            log_release_failure(S::saga_type(), self.correlation_id, &err);
        }
    }
}

fn log_release_failure(saga_type: &'static str, correlation_id: CorrelationId, err: &SagaOperationError) {
    warn!(
        saga_type,
        correlation_id = %correlation_id,
        error = %err,
        "failed to release saga cursor"
    );
}

impl<'a, S, M, R> Iterator for SagaDispatch<'a, S, M, R>
where
    S: RaiseEvent<M>,
    M: 'static,
    R: SagaRepository<S> + 'a,
{
    type Item = DispatchAction<M>;

    fn next(&mut self) -> Option<Self::Item> {
        match self.phase {
            Phase::Pending => self.first(),
            Phase::Yielding => self.following(),
            Phase::Finished => None,
        }
    }
}
