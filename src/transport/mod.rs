//! Transports bridging request/response endpoints to a pub/sub broker.
//!
//! - [`PublisherTransport`] turns a call into one published message and
//!   answers synchronously.
//! - [`SubscriberTransport`] drains a message stream into an endpoint and
//!   acks or nacks every message.
//!
//! Both carry ordered before/after hook chains that thread a [`Context`]
//! and may edit the in-flight message.
//!
//! ## Quick Start
//!
//! ```ignore
//! use endpoint_transport::transport::{PublisherTransport, SubscriberTransport};
//! use endpoint_transport::codec::*;
//!
//! // Caller side
//! let login = PublisherTransport::new(
//!     bus.clone(),
//!     "user",
//!     json_encode_request::<User>,
//!     nop_decode_response,
//! )
//! .timeout(Duration::from_secs(1));
//! login.call(&Context::background(), User { name: "jax".into(), age: 7 })?;
//!
//! // Consumer side
//! let handler = SubscriberTransport::new(
//!     login_endpoint,
//!     json_decode_request::<User>,
//!     bool_ack_response,
//! )
//! .error_encoder(dead_letter(bus.clone(), DEFAULT_DEAD_LETTER_TOPIC));
//! handler.serve_topic(&bus, "user")?;
//! ```
//!
//! [`Context`]: crate::context::Context

mod dead_letter;
mod error_handler;
mod hooks;
mod publisher;
mod subscriber;
mod thread;

pub use dead_letter::{dead_letter, DEFAULT_DEAD_LETTER_TOPIC, ORIGINAL_UUID_KEY, REASON_KEY};
pub use error_handler::{ErrorHandler, LogErrorHandler, NopErrorHandler, MESSAGE_UUID_KEY};
pub use hooks::{Hook, PublishedHook};
pub use publisher::{PublisherOptions, PublisherTransport, DEFAULT_PUBLISH_TIMEOUT};
pub use subscriber::{
    default_acknowledger, nop_error_encoder, AcknowledgerFn, ErrorEncoderFn, Outcome,
    SubscriberOptions, SubscriberTransport,
};
pub use thread::{TransportHandle, TransportStats};
