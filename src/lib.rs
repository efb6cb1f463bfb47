//! Request/response endpoints over pub/sub brokers.
//!
//! A [`PublisherTransport`] presents a synchronous call over a
//! fire-and-forget publish; a [`SubscriberTransport`] serves an endpoint
//! from a stream of at-least-once deliveries and acks or nacks every
//! message. The broker itself is reached only through the narrow traits in
//! [`bus`], so any client (or the bundled in-memory broker) can be plugged
//! in.

pub mod bus;
pub mod codec;
pub mod context;
pub mod endpoint;
mod error;
pub mod transport;

pub use context::Context;
pub use endpoint::Endpoint;
pub use error::{BoxError, TransportError};
pub use transport::{PublisherTransport, SubscriberTransport};
