//! Initiation dispatch sink: route a starting message to newly initiated sagas.

use std::marker::PhantomData;

use sagabus_events::{BusRef, CorrelatedBy, DataEvent, RaiseEvent, resolve_correlation_id};

use crate::config::SinkConfig;
use crate::pipeline::MessageSink;

use super::SagaRepository;
use super::dispatch::{CursorSource, SagaDispatch, WhenEmpty};

/// Sink that initiates sagas for messages that start a workflow.
///
/// For each message:
///
/// 1. Resolve the correlation id (a nil id gets a fresh one).
/// 2. Ask the repository for the instances to initiate under it.
/// 3. Bind the active bus onto each instance and yield one action per instance
///    that raises the configured event when invoked.
///
/// When the repository yields nothing, or fails on its first advancement under
/// [`InitiationFailurePolicy::FailOpen`](crate::config::InitiationFailurePolicy),
/// exactly one no-op action is produced so the message still counts as handled.
///
/// The sink keeps no per-message state and may be shared across workers.
pub struct InitiateSagaSink<S, M, R> {
    bus: BusRef,
    repository: R,
    event: DataEvent<M>,
    config: SinkConfig,
    _saga: PhantomData<fn() -> S>,
}

impl<S, M, R> InitiateSagaSink<S, M, R>
where
    S: RaiseEvent<M>,
    M: CorrelatedBy,
    R: SagaRepository<S>,
{
    pub fn new(bus: BusRef, repository: R, event: DataEvent<M>) -> Self {
        Self {
            bus,
            repository,
            event,
            config: SinkConfig::default(),
            _saga: PhantomData,
        }
    }

    pub fn with_config(mut self, config: SinkConfig) -> Self {
        self.config = config;
        self
    }

    pub fn bus(&self) -> &BusRef {
        &self.bus
    }

    pub fn repository(&self) -> &R {
        &self.repository
    }

    pub fn event(&self) -> DataEvent<M> {
        self.event
    }

    pub fn config(&self) -> SinkConfig {
        self.config
    }
}

impl<S, M, R> MessageSink<M> for InitiateSagaSink<S, M, R>
where
    S: RaiseEvent<M>,
    M: CorrelatedBy,
    R: SagaRepository<S>,
{
    type Actions<'a>
        = SagaDispatch<'a, S, M, R>
    where
        Self: 'a;

    /// Lazily produce the dispatch actions for `message`.
    ///
    /// No event is raised here; raising happens when the consumer invokes
    /// the actions.
    fn enumerate(&self, message: &M) -> Self::Actions<'_> {
        SagaDispatch::new(
            &self.repository,
            &self.bus,
            self.event,
            resolve_correlation_id(message),
            CursorSource::Initiate,
            WhenEmpty::Noop,
            self.config.initiation_failure,
        )
    }
}
