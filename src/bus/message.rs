//! Messages flowing through the broker, and their acknowledgement state.

use std::collections::HashMap;
use std::fmt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use uuid::Uuid;

/// String metadata attached to a message (headers, trace ids, etc.).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Metadata {
    entries: HashMap<String, String>,
}

impl Metadata {
    /// Create empty metadata.
    pub fn new() -> Self {
        Self::default()
    }

    /// Get a metadata value by key.
    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(|v| v.as_str())
    }

    /// Set a metadata value, replacing any previous value.
    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.entries.insert(key.into(), value.into());
    }

    /// Check if a key is present.
    pub fn has(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    /// Remove a key, returning its value.
    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.entries.remove(key)
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Iterate over all entries (unordered).
    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }
}

impl From<HashMap<String, String>> for Metadata {
    fn from(entries: HashMap<String, String>) -> Self {
        Self { entries }
    }
}

/// Broker-side acknowledgement of a delivered message.
///
/// Installed on a message by the broker at delivery time and reached
/// through [`Message::ack`] / [`Message::nack`]. Each call returns whether
/// the broker accepted the acknowledgement.
pub trait Acknowledge: Send + Sync {
    /// Mark the message as processed; it will not be redelivered.
    fn ack(&self, message: &Message) -> bool;

    /// Mark the message as failed; it is eligible for redelivery.
    fn nack(&self, message: &Message) -> bool;
}

/// Terminal state of a delivered message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Disposition {
    /// Not yet acknowledged either way.
    Pending,
    Acked,
    Nacked,
}

/// Delivery state. `Settling` while the broker is being asked; the lock is
/// never held across that call.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum State {
    Pending,
    Settling,
    Settled(Disposition),
}

#[derive(Clone)]
struct Delivery {
    acknowledger: Arc<dyn Acknowledge>,
    state: Arc<Mutex<State>>,
}

impl Delivery {
    fn state(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

/// A message: an opaque payload plus string metadata.
///
/// Messages received from a broker carry a delivery handle, so they can be
/// acknowledged exactly once. Clones share that handle: acking any clone
/// settles the delivery for all of them.
#[derive(Clone)]
pub struct Message {
    /// Unique identifier, generated on construction.
    pub uuid: String,
    /// Serialized payload (JSON, bitcode, raw bytes...).
    pub payload: Vec<u8>,
    pub metadata: Metadata,
    delivery: Option<Delivery>,
}

impl Message {
    /// Create a message with a fresh UUID.
    pub fn new(payload: Vec<u8>) -> Self {
        Self::with_uuid(Uuid::new_v4().to_string(), payload)
    }

    /// Create a message with an explicit UUID.
    pub fn with_uuid(uuid: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            uuid: uuid.into(),
            payload,
            metadata: Metadata::new(),
            delivery: None,
        }
    }

    /// Create a message with a string payload.
    pub fn with_string_payload(payload: impl Into<String>) -> Self {
        Self::new(payload.into().into_bytes())
    }

    /// Add a metadata entry.
    pub fn with_metadata(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.metadata.set(key, value);
        self
    }

    /// Attach a broker delivery handle. Called by brokers when handing a
    /// message to a subscriber; resets the disposition to pending.
    pub fn with_delivery(mut self, acknowledger: Arc<dyn Acknowledge>) -> Self {
        self.delivery = Some(Delivery {
            acknowledger,
            state: Arc::new(Mutex::new(State::Pending)),
        });
        self
    }

    /// Copy of this message without its delivery handle.
    pub fn detached(&self) -> Self {
        Self {
            uuid: self.uuid.clone(),
            payload: self.payload.clone(),
            metadata: self.metadata.clone(),
            delivery: None,
        }
    }

    /// Get the payload as a string (if valid UTF-8).
    pub fn payload_str(&self) -> Option<&str> {
        std::str::from_utf8(&self.payload).ok()
    }

    /// Whether this message came from a broker and can be acknowledged.
    pub fn is_delivered(&self) -> bool {
        self.delivery.is_some()
    }

    /// Current acknowledgement state. Undelivered messages, and messages
    /// whose ack or nack is still with the broker, are `Pending`.
    pub fn disposition(&self) -> Disposition {
        match self.delivery.as_ref().map(|delivery| *delivery.state()) {
            Some(State::Settled(settled)) => settled,
            _ => Disposition::Pending,
        }
    }

    /// Acknowledge the message.
    ///
    /// Returns `true` if the broker accepted the ack, or if the message was
    /// already acked. Returns `false` if it was already nacked, if the broker
    /// rejected the ack, if another ack or nack is still in progress, or if
    /// the message has no delivery handle.
    pub fn ack(&self) -> bool {
        self.settle(Disposition::Acked)
    }

    /// Negatively acknowledge the message. Mirror image of [`Message::ack`].
    pub fn nack(&self) -> bool {
        self.settle(Disposition::Nacked)
    }

    fn settle(&self, target: Disposition) -> bool {
        let Some(delivery) = &self.delivery else {
            return false;
        };
        {
            let mut state = delivery.state();
            match *state {
                State::Pending => *state = State::Settling,
                State::Settling => return false,
                State::Settled(settled) => return settled == target,
            }
        }

        let accepted = match target {
            Disposition::Acked => delivery.acknowledger.ack(self),
            _ => delivery.acknowledger.nack(self),
        };
        *delivery.state() = if accepted {
            State::Settled(target)
        } else {
            State::Pending
        };
        accepted
    }
}

impl Default for Message {
    fn default() -> Self {
        Self::new(Vec::new())
    }
}

impl fmt::Debug for Message {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Message")
            .field("uuid", &self.uuid)
            .field("payload_len", &self.payload.len())
            .field("metadata", &self.metadata)
            .field("disposition", &self.disposition())
            .finish()
    }
}
