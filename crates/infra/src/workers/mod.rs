//! Background workers that drive sinks from a bus.

pub mod saga_worker;

pub use saga_worker::{SagaWorker, WorkerHandle, WorkerStats};
