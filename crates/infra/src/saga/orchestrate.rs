//! Orchestration dispatch sink: route a correlated message to existing sagas.

use std::marker::PhantomData;

use sagabus_events::{BusRef, CorrelatedBy, DataEvent, RaiseEvent};

use crate::config::SinkConfig;
use crate::pipeline::MessageSink;

use super::SagaRepository;
use super::dispatch::{CursorSource, SagaDispatch, WhenEmpty};

/// Sink that continues sagas already stored under the message's correlation id.
///
/// Unlike [`InitiateSagaSink`](super::InitiateSagaSink), the identifier is used
/// verbatim and an unmatched message produces no actions at all.
pub struct OrchestrateSagaSink<S, M, R> {
    bus: BusRef,
    repository: R,
    event: DataEvent<M>,
    config: SinkConfig,
    _saga: PhantomData<fn() -> S>,
}

impl<S, M, R> OrchestrateSagaSink<S, M, R>
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

    pub fn repository(&self) -> &R {
        &self.repository
    }

}

impl<S, M, R> MessageSink<M> for OrchestrateSagaSink<S, M, R>
where
    S: RaiseEvent<M>,
    M: CorrelatedBy,
    R: SagaRepository<S>,
{
    type Actions<'a>
        = SagaDispatch<'a, S, M, R>
    where
        Self: 'a;

    fn enumerate(&self, message: &M) -> Self::Actions<'_> {
        SagaDispatch::new(
            &self.repository,
            &self.bus,
            self.event,
            message.correlation_id(),
            CursorSource::Orchestrate,
            WhenEmpty::Nothing,
            self.config.initiation_failure,
        )
    }
}
