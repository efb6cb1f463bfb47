//! A synchronous request/response call over a
//! fire-and-forget publish.
//!
//! ## Example
//!
//! ```
//! use endpoint_transport::bus::InMemoryBus;
//! use endpoint_transport::codec::{json_encode_request, uuid_decode_response};
//! use endpoint_transport::context::Context;
//! use endpoint_transport::transport::PublisherTransport;
//!
//! let bus = InMemoryBus::new();
//! let publisher = PublisherTransport::new(
//!     bus.clone(),
//!     "greetings",
//!     json_encode_request::<&'static str>,
//!     uuid_decode_response,
//! )
//! .before(|ctx, msg| {
//!     msg.metadata.set("trace-id", "123456678");
//!     ctx
//! });
//!
//! let uuid = publisher.call(&Context::background(), "hello").unwrap();
//!
//! let published = bus.published("greetings");
//! assert_eq!(published[0].uuid, uuid);
//! assert_eq!(published[0].payload_str(), Some("hello"));
//! ```

use std::sync::Arc;
use std::time::Duration;

use tracing::debug;

use super::hooks::{run_hooks, run_published_hooks, Hook, PublishedHook};
use crate::bus::{Message, PublishError, Publisher};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::{BoxError, TransportError};

/// Timeout applied to every call unless configured otherwise.
pub const DEFAULT_PUBLISH_TIMEOUT: Duration = Duration::from_secs(10);

type EncodeRequestFn<Req> =
    dyn Fn(&Context, &mut Message, Req) -> Result<(), BoxError> + Send + Sync;
type DecodeResponseFn<Resp> =
    dyn Fn(&Context, &Message, Option<&PublishError>) -> Result<Resp, BoxError> + Send + Sync;

/// Optional configuration of a [`PublisherTransport`].
#[derive(Clone)]
pub struct PublisherOptions {
    /// Run in order after encoding, before publishing.
    pub before: Vec<Hook>,
    /// Run in order after a successful publish, before decoding.
    pub after: Vec<PublishedHook>,
    /// Bound on the context of each call. The transport checks it between
    /// steps; the broker is expected to honor it while publishing.
    pub timeout: Duration,
}

impl Default for PublisherOptions {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            timeout: DEFAULT_PUBLISH_TIMEOUT,
        }
    }
}

/// Publishes each request as one message on a fixed topic and answers with
/// whatever the decoder makes of the publish outcome.
///
/// Exactly one publish attempt is made per call; nothing is retried. Every
/// failure is returned to the caller.
pub struct PublisherTransport<Req, Resp> {
    publisher: Arc<dyn Publisher>,
    topic: String,
    encode: Box<EncodeRequestFn<Req>>,
    decode: Box<DecodeResponseFn<Resp>>,
    options: PublisherOptions,
}

impl<Req, Resp> PublisherTransport<Req, Resp> {
    /// Create a publisher transport with default options.
    pub fn new<P, E, D>(publisher: P, topic: impl Into<String>, encode: E, decode: D) -> Self
    where
        P: Publisher + 'static,
        E: Fn(&Context, &mut Message, Req) -> Result<(), BoxError> + Send + Sync + 'static,
        D: Fn(&Context, &Message, Option<&PublishError>) -> Result<Resp, BoxError>
            + Send
            + Sync
            + 'static,
    {
        Self {
            publisher: Arc::new(publisher),
            topic: topic.into(),
            encode: Box::new(encode),
            decode: Box::new(decode),
            options: PublisherOptions::default(),
        }
    }

    /// Register a before-hook. Hooks run in registration order.
    pub fn before<F>(mut self, hook: F) -> Self
    where
        F: Fn(Context, &mut Message) -> Context + Send + Sync + 'static,
    {
        self.options.before.push(Arc::new(hook));
        self
    }

    /// Register an after-hook. Hooks run in registration order.
    pub fn after<F>(mut self, hook: F) -> Self
    where
        F: Fn(Context, &mut Message, Option<&PublishError>) -> Context + Send + Sync + 'static,
    {
        self.options.after.push(Arc::new(hook));
        self
    }

    /// Override the per-call timeout.
    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.options.timeout = timeout;
        self
    }

    /// Replace all options at once.
    pub fn with_options(mut self, options: PublisherOptions) -> Self {
        self.options = options;
        self
    }

    pub fn topic(&self) -> &str {
        &self.topic
    }

    pub fn options(&self) -> &PublisherOptions {
        &self.options
    }

    /// Encode `request`, publish it, and decode the outcome.
    ///
    /// The call runs under a child of `ctx` bounded by the configured
    /// timeout, cancelled again before returning. A done context aborts the
    /// call before the encoder, the publish and the decoder.
    pub fn call(&self, ctx: &Context, request: Req) -> Result<Resp, TransportError> {
        let ctx = ctx.with_timeout(self.options.timeout);
        let _guard = ctx.guard();

        ctx.check()?;
        let mut msg = Message::default();
        (self.encode)(&ctx, &mut msg, request).map_err(TransportError::Encode)?;

        let ctx = run_hooks(&self.options.before, ctx, &mut msg);

        ctx.check()?;
        if let Err(err) = self.publisher.publish(&self.topic, &msg) {
            debug!(topic = %self.topic, uuid = %msg.uuid, error = %err, "publish failed");
            return Err(err.into());
        }
        debug!(topic = %self.topic, uuid = %msg.uuid, "request published");

        let ctx = run_published_hooks(&self.options.after, ctx, &mut msg, None);

        ctx.check()?;
        (self.decode)(&ctx, &msg, None).map_err(TransportError::Decode)
    }
}

impl<Req, Resp> Endpoint<Req, Resp> for PublisherTransport<Req, Resp> {
    fn invoke(&self, ctx: &Context, request: Req) -> Result<Resp, BoxError> {
        self.call(ctx, request).map_err(Into::into)
    }
}
