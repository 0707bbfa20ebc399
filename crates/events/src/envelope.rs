use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use serde_json::Value as JsonValue;
use thiserror::Error;

use sagabus_core::{CorrelationId, MessageId};

use crate::{CorrelatedBy, Message};

/// Envelope for a message on the bus, carrying routing + correlation metadata.
///
/// This is the unit a [`ServiceBus`](crate::ServiceBus) publishes.
///
/// Notes:
/// - `correlation_id` is copied from the message when the envelope is built.
/// - `message_type` lets receivers pick the envelopes they can decode.
/// - `payload` is domain-agnostic (JSON on the in-memory bus).
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageEnvelope<P> {
    message_id: MessageId,
    correlation_id: CorrelationId,
    message_type: String,

    /// Address of the bus that sent the message.
    source_address: String,
    sent_at: DateTime<Utc>,

    payload: P,
}

/// Failure to build or read an envelope.
#[derive(Debug, Error)]
pub enum EnvelopeError {
    #[error("payload serialization failed: {0}")]
    Encode(#[source] serde_json::Error),

    #[error("payload deserialization failed: {0}")]
    Decode(#[source] serde_json::Error),

    #[error("message type mismatch (expected: {expected}, found: {found})")]
    TypeMismatch {
        expected: &'static str,
        found: String,
    },
}

impl<P> MessageEnvelope<P> {
    pub fn new(
        message_id: MessageId,
        correlation_id: CorrelationId,
        message_type: impl Into<String>,
        source_address: impl Into<String>,
        sent_at: DateTime<Utc>,
        payload: P,
    ) -> Self {
        Self {
            message_id,
            correlation_id,
            message_type: message_type.into(),
            source_address: source_address.into(),
            sent_at,
            payload,
        }
    }

    pub fn message_id(&self) -> MessageId {
        self.message_id
    }

    pub fn correlation_id(&self) -> CorrelationId {
        self.correlation_id
    }

    pub fn message_type(&self) -> &str {
        &self.message_type
    }

    pub fn source_address(&self) -> &str {
        &self.source_address
    }

    pub fn sent_at(&self) -> DateTime<Utc> {
        self.sent_at
    }

    pub fn payload(&self) -> &P {
        &self.payload
    }

    pub fn into_payload(self) -> P {
        self.payload
    }

    /// Whether this envelope carries a message of type `M`.
    pub fn is<M: Message>(&self) -> bool {
        self.message_type == M::message_type()
    }
}

impl MessageEnvelope<JsonValue> {
    /// Wrap a typed message for publication.
    pub fn from_message<M>(source_address: impl Into<String>, message: &M) -> Result<Self, EnvelopeError>
    where
        M: CorrelatedBy + Serialize,
    {
        let payload = serde_json::to_value(message).map_err(EnvelopeError::Encode)?;
        Ok(Self::new(
            MessageId::new(),
            message.correlation_id(),
            M::message_type(),
            source_address,
            Utc::now(),
            payload,
        ))
    }

    /// Read the payload back as `M`, checking the declared message type first.
    pub fn decode<M>(&self) -> Result<M, EnvelopeError>
    where
        M: Message + DeserializeOwned,
    {
        if !self.is::<M>() {
            return Err(EnvelopeError::TypeMismatch {
                expected: M::message_type(),
                found: self.message_type.clone(),
            });
        }
        serde_json::from_value(self.payload.clone()).map_err(EnvelopeError::Decode)
    }
}
