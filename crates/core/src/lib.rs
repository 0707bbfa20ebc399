//! `sagabus-core`: identifiers and storage error model shared by the bus crates.
//!
//! This crate has no infrastructure concerns.

pub mod error;
pub mod id;

pub use error::{InvalidIdentifier, SagaOperationError, SagaResult};
pub use id::{CorrelationId, MessageId};
