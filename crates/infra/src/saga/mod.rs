//! Saga infrastructure: repositories, dispatch sinks and the actions they produce.
//!
//! The repository hands out instances through a **cursor**: a lazy, ordered,
//! disposable sequence. Each element is materialized only when the consumer
//! advances, and whatever the cursor acquired while advancing (claims, locks,
//! transactions) is released by `close`, whether the consumer exhausted it,
//! stopped early, or hit an error.
//!
//! Sinks wrap a cursor in a [`ScopedCursor`] so that release happens on every
//! exit path, including the consumer simply dropping the action sequence.

pub mod action;
pub mod dispatch;
pub mod in_memory;
pub mod initiate;
pub mod orchestrate;

use std::marker::PhantomData;
use std::sync::{Arc, Mutex};

use tracing::warn;

use sagabus_core::{CorrelationId, SagaResult};
use sagabus_events::SagaStateMachine;

pub use action::{DispatchAction, DispatchError};
pub use dispatch::SagaDispatch;
pub use in_memory::{InMemorySagaCursor, InMemorySagaRepository};
pub use initiate::InitiateSagaSink;
pub use orchestrate::OrchestrateSagaSink;

/// Shared handle to a stored saga instance.
///
/// The repository owns storage; dispatches hold a clone only while they run.
pub type SagaRef<S> = Arc<Mutex<S>>;

/// A lazy, disposable sequence of saga instances.
pub trait SagaCursor<S>: Iterator<Item = SagaResult<SagaRef<S>>> {
    /// Release resources acquired while advancing.
    ///
    /// Must be idempotent. Implementations should also release on `Drop`.
    fn close(&mut self) -> SagaResult<()>;
}

/// Saga storage capability.
///
/// Any backing store (in-memory, document, relational) can implement this.
/// Implementations must guarantee **at most one successful initiation per
/// correlation id** under concurrent attempts; sinks rely on it and do not
/// enforce it themselves.
pub trait SagaRepository<S>: Send + Sync
where
    S: SagaStateMachine,
{
    type Cursor<'a>: SagaCursor<S>
    where
        Self: 'a;

    /// Instances to initiate under `correlation_id`.
    fn initiate_new_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_>;

    /// Instances already stored under `correlation_id` (possibly none).
    fn orchestrate_existing_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_>;
}

impl<S, R> SagaRepository<S> for Arc<R>
where
    S: SagaStateMachine,
    R: SagaRepository<S>,
{
    type Cursor<'a>
        = R::Cursor<'a>
    where
        Self: 'a;

    fn initiate_new_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_> {
        (**self).initiate_new_saga(correlation_id)
    }

    fn orchestrate_existing_saga(&self, correlation_id: CorrelationId) -> Self::Cursor<'_> {
        (**self).orchestrate_existing_saga(correlation_id)
    }
}

/// Guard that closes a cursor exactly once, on every exit path.
///
/// An explicit [`ScopedCursor::close`] returns the release error to the caller;
/// a release that happens on drop can only log it.
pub struct ScopedCursor<S, C: SagaCursor<S>> {
    cursor: C,
    correlation_id: CorrelationId,
    closed: bool,
    _saga: PhantomData<fn() -> S>,
}

impl<S, C: SagaCursor<S>> ScopedCursor<S, C> {
    pub fn new(cursor: C, correlation_id: CorrelationId) -> Self {
        Self {
            cursor,
            correlation_id,
            closed: false,
            _saga: PhantomData,
        }
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn is_closed(&self) -> bool {
        self.closed
    }

    /// Advance the underlying cursor. A closed cursor yields nothing.
    pub fn advance(&mut self) -> Option<SagaResult<SagaRef<S>>> {
        if self.closed {
            return None;
        }
        self.cursor.next()
    }

    pub fn close(&mut self) -> SagaResult<()> {
        if self.closed {
            return Ok(());
        }
        self.closed = true;
        self.cursor.close()
    }
}

impl<S, C: SagaCursor<S>> Drop for ScopedCursor<S, C> {
    fn drop(&mut self) {
        if let Err(err) = self.close() {
            warn!(
                correlation_id = %self.correlation_id,
                error = %err,
                "failed to release saga cursor on drop"
            );
        }
    }
}
