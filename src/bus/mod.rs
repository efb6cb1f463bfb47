//! Broker abstraction: the publish, subscribe, ack and nack operations the
//! transports consume.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │      PublisherTransport            SubscriberTransport       │
//! │   encode → publish → decode    decode → endpoint → ack/nack  │
//! └─────────────────────────────────────────────────────────────┘
//!                            │
//!                            ▼
//! ┌─────────────────────────────────────────────────────────────┐
//! │                 Broker traits (this module)                  │
//! │  Publisher:   publish(topic, message)                        │
//! │  Subscriber:  subscribe(topic) -> MessageStream              │
//! │  Acknowledge: ack(message) / nack(message)                   │
//! └─────────────────────────────────────────────────────────────┘
//!          │                  │                     │
//!          ▼                  ▼                     ▼
//! ┌─────────────┐    ┌─────────────┐    ┌─────────────────────┐
//! │ InMemoryBus │    │    Kafka    │    │   NATS / AMQP ...   │
//! │ (included)  │    │ (external)  │    │     (external)      │
//! └─────────────┘    └─────────────┘    └─────────────────────┘
//! ```

#[cfg(feature = "in-memory")]
mod in_memory_bus;
mod message;
mod publisher;
mod subscriber;

#[cfg(feature = "in-memory")]
pub use in_memory_bus::InMemoryBus;
pub use message::{Acknowledge, Disposition, Message, Metadata};
pub use publisher::{PublishError, Publisher};
pub use subscriber::{MessageStream, SubscribeError, Subscriber};
