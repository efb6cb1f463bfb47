//! In-memory broker for testing and single-process scenarios.
//!
//! This module provides a thread-safe in-memory broker that implements
//! `Publisher`, `Subscriber` and `Acknowledge`, useful for:
//! - Unit and integration testing without external dependencies
//! - Single-process applications
//! - Development and prototyping

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::mpsc::{channel, Sender};
use std::sync::{Arc, Mutex, PoisonError, RwLock};

use tracing::debug;

use super::message::{Acknowledge, Message};
use super::publisher::{PublishError, Publisher};
use super::subscriber::{MessageStream, SubscribeError, Subscriber};

/// In-memory broker for testing and single-process scenarios.
///
/// Features:
/// - Thread-safe (can be shared across threads via `Clone`)
/// - Fan-out: every live subscriber of a topic gets its own copy
/// - Every published message is kept in a per-topic log
/// - Ack/nack outcomes are recorded by message UUID
///
/// Messages published to a topic with no subscribers are logged but not
/// delivered. Nacked messages are recorded, not redelivered.
///
/// ## Example
///
/// ```
/// use endpoint_transport::bus::{InMemoryBus, Message, Publisher, Subscriber};
///
/// let bus = InMemoryBus::new();
/// let stream = bus.subscribe("orders").unwrap();
///
/// bus.publish("orders", &Message::with_string_payload(r#"{"id":"123"}"#)).unwrap();
///
/// let msg = stream.recv().unwrap();
/// assert!(msg.ack());
/// assert_eq!(bus.acked(), vec![msg.uuid.clone()]);
/// ```
#[derive(Clone, Default)]
pub struct InMemoryBus {
    state: Arc<BusState>,
}

#[derive(Default)]
struct BusState {
    /// Live subscriber channels per topic
    subscribers: RwLock<HashMap<String, Vec<Sender<Message>>>>,
    /// Every message published, per topic
    log: RwLock<HashMap<String, Vec<Message>>>,
    acked: Mutex<Vec<String>>,
    nacked: Mutex<Vec<String>>,
    closed: AtomicBool,
    fail_acks: AtomicBool,
}

impl InMemoryBus {
    /// Create a new in-memory broker.
    pub fn new() -> Self {
        Self::default()
    }

    /// All messages published to `topic`, in publish order.
    pub fn published(&self, topic: &str) -> Vec<Message> {
        self.state
            .log
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .cloned()
            .unwrap_or_default()
    }

    /// UUIDs of acknowledged messages, in ack order.
    pub fn acked(&self) -> Vec<String> {
        self.state
            .acked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// UUIDs of negatively acknowledged messages, in nack order.
    pub fn nacked(&self) -> Vec<String> {
        self.state
            .nacked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Number of live subscribers on `topic`.
    pub fn subscriber_count(&self, topic: &str) -> usize {
        self.state
            .subscribers
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(topic)
            .map_or(0, Vec::len)
    }

    /// Make the broker reject (or accept again) every ack and nack.
    pub fn fail_acks(&self, fail: bool) {
        self.state.fail_acks.store(fail, Ordering::SeqCst);
    }

    /// Shut the broker down.
    ///
    /// Drops every subscriber channel, so open streams end once drained.
    /// Later publishes and subscribes fail with `Closed`.
    pub fn close(&self) {
        self.state.closed.store(true, Ordering::SeqCst);
        self.state
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .clear();
        debug!("in-memory bus closed");
    }

    pub fn is_closed(&self) -> bool {
        self.state.closed.load(Ordering::SeqCst)
    }
}

impl Publisher for InMemoryBus {
    fn publish(&self, topic: &str, message: &Message) -> Result<(), PublishError> {
        if self.is_closed() {
            return Err(PublishError::Closed);
        }

        let record = message.detached();
        self.state
            .log
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(record.clone());

        let mut subscribers = self
            .state
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner);
        let Some(senders) = subscribers.get_mut(topic) else {
            debug!(topic, uuid = %message.uuid, "message published without subscribers");
            return Ok(());
        };

        let acknowledger: Arc<dyn Acknowledge> = self.state.clone();
        // Drop channels whose stream has gone away
        senders.retain(|sender| {
            sender
                .send(record.clone().with_delivery(Arc::clone(&acknowledger)))
                .is_ok()
        });
        debug!(
            topic,
            uuid = %message.uuid,
            receivers = senders.len(),
            "message published"
        );
        Ok(())
    }
}

impl Subscriber for InMemoryBus {
    fn subscribe(&self, topic: &str) -> Result<MessageStream, SubscribeError> {
        if self.is_closed() {
            return Err(SubscribeError::Closed);
        }

        let (sender, receiver) = channel();
        self.state
            .subscribers
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .entry(topic.to_string())
            .or_default()
            .push(sender);
        debug!(topic, "new subscription created");
        Ok(receiver)
    }
}

impl Acknowledge for BusState {
    fn ack(&self, message: &Message) -> bool {
        if self.fail_acks.load(Ordering::SeqCst) {
            return false;
        }
        self.acked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.uuid.clone());
        debug!(uuid = %message.uuid, "message acked");
        true
    }

    fn nack(&self, message: &Message) -> bool {
        if self.fail_acks.load(Ordering::SeqCst) {
            return false;
        }
        self.nacked
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(message.uuid.clone());
        debug!(uuid = %message.uuid, "message nacked");
        true
    }
}
