//! Subscribing side of the broker abstraction.

use std::sync::mpsc::Receiver;
use std::sync::Arc;

use thiserror::Error;

use super::message::Message;
use crate::error::BoxError;

/// Sequential stream of delivered messages.
///
/// The stream ends when the broker drops every sender for it; that is the
/// only termination signal a consumption loop gets.
pub type MessageStream = Receiver<Message>;

/// Error type for subscribe operations.
#[derive(Debug, Error)]
pub enum SubscribeError {
    #[error("connection failed: {0}")]
    ConnectionFailed(String),
    /// The broker has been shut down
    #[error("broker closed")]
    Closed,
    #[error("subscribe error: {0}")]
    Other(#[source] BoxError),
}

/// Trait for subscribing to a topic.
///
/// This is a pull-based interface: the returned stream blocks until a
/// message is available. Every message it yields must carry a delivery
/// handle (see [`Message::with_delivery`]) so it can be acked or nacked.
pub trait Subscriber: Send + Sync {
    fn subscribe(&self, topic: &str) -> Result<MessageStream, SubscribeError>;
}

impl<S: Subscriber + ?Sized> Subscriber for Arc<S> {
    fn subscribe(&self, topic: &str) -> Result<MessageStream, SubscribeError> {
        (**self).subscribe(topic)
    }
}
