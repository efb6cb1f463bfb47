use thiserror::Error;

use crate::bus::{PublishError, SubscribeError};
use crate::context::ContextError;

/// Error type returned by user-supplied encoders, decoders and endpoints.
pub type BoxError = Box<dyn std::error::Error + Send + Sync>;

/// Error type for transport operations.
///
/// The publisher returns these to its caller; the subscriber hands them to
/// its error handler and error encoder.
#[derive(Debug, Error)]
pub enum TransportError {
    /// Encoding the request (publisher) or the response (subscriber) failed.
    #[error("encode failed: {0}")]
    Encode(#[source] BoxError),
    /// Decoding the message (subscriber) or publish outcome (publisher) failed.
    #[error("decode failed: {0}")]
    Decode(#[source] BoxError),
    #[error(transparent)]
    Publish(#[from] PublishError),
    #[error(transparent)]
    Subscribe(#[from] SubscribeError),
    /// The endpoint returned an error.
    #[error("endpoint failed: {0}")]
    Endpoint(#[source] BoxError),
    /// The broker did not accept the ack (or nack) for a message.
    #[error("acknowledge result is false (message {uuid}, ack = {ack})")]
    Acknowledge { uuid: String, ack: bool },
    #[error(transparent)]
    Context(#[from] ContextError),
}

impl TransportError {
    /// Whether the error came from the broker rather than from user code.
    pub fn is_broker_error(&self) -> bool {
        matches!(
            self,
            TransportError::Publish(_)
                | TransportError::Subscribe(_)
                | TransportError::Acknowledge { .. }
        )
    }
}
