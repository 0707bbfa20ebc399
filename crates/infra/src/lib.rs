//! Saga infrastructure: repositories, dispatch sinks, the delivery pipeline
//! and the workers that drive it from a bus.

pub mod config;
pub mod pipeline;
pub mod saga;
pub mod workers;

#[cfg(test)]
mod test_support;

pub use config::{
    ExistingSagaPolicy, InitiationFailurePolicy, RepositoryConfig, SinkConfig, WorkerConfig,
};
pub use pipeline::{DeliveryReport, MessageSink, deliver};
pub use saga::{
    DispatchAction, DispatchError, InMemorySagaRepository, InitiateSagaSink, OrchestrateSagaSink,
    SagaCursor, SagaDispatch, SagaRef, SagaRepository, ScopedCursor,
};
pub use workers::{SagaWorker, WorkerHandle, WorkerStats};
