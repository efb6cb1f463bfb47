//! Publishing side of the broker abstraction.

use std::sync::Arc;

use thiserror::Error;

use super::message::Message;
use crate::error::BoxError;

/// Error type for publish operations.
#[derive(Debug, Error)]
pub enum PublishError {
    /// Connection to the broker failed
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The broker rejected the message
    #[error("message rejected: {0}")]
    Rejected(String),
    /// Timeout waiting for the broker to confirm
    #[error("publish timeout")]
    Timeout,
    /// The broker has been shut down
    #[error("broker closed")]
    Closed,
    #[error("publish error: {0}")]
    Other(#[source] BoxError),
}

/// Trait for publishing messages to a topic.
///
/// Implementations must be safe to call concurrently; a single publisher is
/// shared by every call of a [`PublisherTransport`](crate::transport::PublisherTransport).
///
/// Implementations might include:
/// - `InMemoryBus` - For testing and single-process scenarios
/// - Kafka, NATS, RabbitMQ or cloud pub/sub clients
pub trait Publisher: Send + Sync {
    /// Publish a single message to `topic`.
    fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError>;
}

impl<P: Publisher + ?Sized> Publisher for Arc<P> {
    fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError> {
        (**self).publish(topic, message)
    }
}

impl<P: Publisher + ?Sized> Publisher for &P {
    fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError> {
        (**self).publish(topic, message)
    }
}
