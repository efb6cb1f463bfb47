//! Drains a message stream into an endpoint and
//! acknowledges each message.
//!
//! Per message: before-hooks → decode → endpoint → after-hooks → encode
//! (response to ack decision) → acknowledger. Any failure is handed to the
//! error handler and the error encoder and ends the handling of that
//! message only; the loop moves on to the next one.
//!
//! ## Example
//!
//! ```
//! use endpoint_transport::bus::{InMemoryBus, Message, Publisher, Subscriber};
//! use endpoint_transport::codec::{bool_ack_response, json_decode_request};
//! use endpoint_transport::context::Context;
//! use endpoint_transport::transport::SubscriberTransport;
//! use endpoint_transport::BoxError;
//!
//! let bus = InMemoryBus::new();
//! let stream = bus.subscribe("logins").unwrap();
//!
//! let subscriber = SubscriberTransport::new(
//!     |_ctx: &Context, name: String| -> Result<bool, BoxError> { Ok(!name.is_empty()) },
//!     json_decode_request::<String>,
//!     bool_ack_response,
//! );
//!
//! bus.publish("logins", &Message::with_string_payload(r#""jax""#)).unwrap();
//! bus.publish("logins", &Message::with_string_payload(r#""""#)).unwrap();
//! bus.close();
//!
//! let stats = subscriber.serve(stream);
//! assert_eq!((stats.acked, stats.nacked), (1, 1));
//! ```

use std::sync::Arc;

use tracing::debug;

use super::error_handler::{ErrorHandler, LogErrorHandler, MESSAGE_UUID_KEY};
use super::hooks::{run_hooks, Hook};
use super::thread::{TransportHandle, TransportStats};
use crate::bus::{Message, Subscriber};
use crate::context::Context;
use crate::endpoint::Endpoint;
use crate::error::{BoxError, TransportError};

type DecodeRequestFn<Req> = dyn Fn(&Context, &Message) -> Result<Req, BoxError> + Send + Sync;
type EncodeResponseFn<Resp> = dyn Fn(&Context, Resp) -> Result<bool, BoxError> + Send + Sync;

/// Turns the ack decision into a broker ack or nack; returns whether the
/// broker accepted it.
pub type AcknowledgerFn = Arc<dyn Fn(&Context, &Message, bool) -> bool + Send + Sync>;

/// Notified of every failure with the message that caused it. This is the
/// place for dead-lettering or retry policies.
pub type ErrorEncoderFn = Arc<dyn Fn(&Context, &Message, &TransportError) + Send + Sync>;

/// Acks the message when `ack` is true, nacks it otherwise.
pub fn default_acknowledger(_ctx: &Context, msg: &Message, ack: bool) -> bool {
    if ack {
        msg.ack()
    } else {
        msg.nack()
    }
}

/// Error encoder that does nothing. Failed messages stay unacknowledged and
/// are left to the broker's redelivery policy.
pub fn nop_error_encoder(_ctx: &Context, _msg: &Message, _err: &TransportError) {}

/// Optional configuration of a [`SubscriberTransport`].
#[derive(Clone)]
pub struct SubscriberOptions {
    /// Run in order on a fresh context, before decoding.
    pub before: Vec<Hook>,
    /// Run in order after the endpoint succeeded, before encoding.
    pub after: Vec<Hook>,
    /// Defaults to [`default_acknowledger`].
    pub acknowledger: AcknowledgerFn,
    /// Defaults to [`LogErrorHandler`].
    pub error_handler: Arc<dyn ErrorHandler>,
    /// Defaults to [`nop_error_encoder`].
    pub error_encoder: ErrorEncoderFn,
}

impl Default for SubscriberOptions {
    fn default() -> Self {
        Self {
            before: Vec::new(),
            after: Vec::new(),
            acknowledger: Arc::new(default_acknowledger),
            error_handler: Arc::new(LogErrorHandler),
            error_encoder: Arc::new(nop_error_encoder),
        }
    }
}

/// What became of one message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Outcome {
    /// The endpoint succeeded and the broker accepted the ack.
    Acked,
    /// The endpoint succeeded, the response asked for a nack, and the broker
    /// accepted it.
    Nacked,
    /// Handling stopped on an error; see the error handler.
    Failed,
}

/// Serves an endpoint from a stream of messages.
///
/// Messages are handled one at a time, in arrival order, each to
/// completion before the next is read. Run several loops (e.g. with
/// [`SubscriberTransport::spawn`]) for parallel consumption; the transport
/// keeps no state between messages.
pub struct SubscriberTransport<Req, Resp> {
    endpoint: Box<dyn Endpoint<Req, Resp>>,
    decode: Box<DecodeRequestFn<Req>>,
    encode: Box<EncodeResponseFn<Resp>>,
    options: SubscriberOptions,
}

impl<Req, Resp> SubscriberTransport<Req, Resp> {
    /// Create a subscriber transport with default options.
    pub fn new<E, D, C>(endpoint: E, decode: D, encode: C) -> Self
    where
        E: Endpoint<Req, Resp> + 'static,
        D: Fn(&Context, &Message) -> Result<Req, BoxError> + Send + Sync + 'static,
        C: Fn(&Context, Resp) -> Result<bool, BoxError> + Send + Sync + 'static,
    {
        Self {
            endpoint: Box::new(endpoint),
            decode: Box::new(decode),
            encode: Box::new(encode),
            options: SubscriberOptions::default(),
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
        F: Fn(Context, &mut Message) -> Context + Send + Sync + 'static,
    {
        self.options.after.push(Arc::new(hook));
        self
    }

    /// Replace the acknowledger.
    pub fn acknowledger<F>(mut self, acknowledger: F) -> Self
    where
        F: Fn(&Context, &Message, bool) -> bool + Send + Sync + 'static,
    {
        self.options.acknowledger = Arc::new(acknowledger);
        self
    }

    /// Replace the error handler.
    pub fn error_handler<H>(mut self, handler: H) -> Self
    where
        H: ErrorHandler + 'static,
    {
        self.options.error_handler = Arc::new(handler);
        self
    }

    /// Replace the error encoder.
    pub fn error_encoder<F>(mut self, encoder: F) -> Self
    where
        F: Fn(&Context, &Message, &TransportError) + Send + Sync + 'static,
    {
        self.options.error_encoder = Arc::new(encoder);
        self
    }

    /// Replace all options at once.
    pub fn with_options(mut self, options: SubscriberOptions) -> Self {
        self.options = options;
        self
    }

    pub fn options(&self) -> &SubscriberOptions {
        &self.options
    }

    /// Handle messages until the stream ends.
    ///
    /// Blocks while the stream has nothing pending. Returns the tally of
    /// this loop once the stream is closed.
    pub fn serve<I>(&self, messages: I) -> TransportStats
    where
        I: IntoIterator<Item = Message>,
    {
        let mut stats = TransportStats::default();
        for msg in messages {
            stats.record(self.handle(msg));
        }
        debug!(
            handled = stats.handled,
            failed = stats.failed,
            "message stream closed"
        );
        stats
    }

    /// Subscribe to `topic` and serve the resulting stream.
    pub fn serve_topic<S>(
        &self,
        subscriber: &S,
        topic: &str,
    ) -> Result<TransportStats, TransportError>
    where
        S: Subscriber + ?Sized,
    {
        let stream = subscriber.subscribe(topic)?;
        debug!(topic, "serving topic");
        Ok(self.serve(stream))
    }

    /// Handle a single message.
    ///
    /// The message gets a fresh cancellable context, cancelled again when
    /// handling completes. Failures are reported through the error handler
    /// and error encoder, never returned.
    pub fn handle(&self, mut msg: Message) -> Outcome {
        let root = Context::background().with_cancel();
        let _guard = root.guard();
        root.insert(MESSAGE_UUID_KEY, msg.uuid.clone());

        let mut ctx = run_hooks(&self.options.before, root.clone(), &mut msg);
        match self.process(&mut ctx, &mut msg) {
            Ok(outcome) => {
                debug!(uuid = %msg.uuid, ?outcome, "message handled");
                outcome
            }
            Err(err) => {
                self.options.error_handler.handle(&ctx, &err);
                (self.options.error_encoder)(&ctx, &msg, &err);
                Outcome::Failed
            }
        }
    }

    fn process(&self, ctx: &mut Context, msg: &mut Message) -> Result<Outcome, TransportError> {
        ctx.check()?;
        let request = (self.decode)(&*ctx, &*msg).map_err(TransportError::Decode)?;

        ctx.check()?;
        let response = self
            .endpoint
            .invoke(&*ctx, request)
            .map_err(TransportError::Endpoint)?;

        *ctx = run_hooks(&self.options.after, ctx.clone(), msg);

        ctx.check()?;
        let ack = (self.encode)(&*ctx, response).map_err(TransportError::Encode)?;

        ctx.check()?;
        if !(self.options.acknowledger)(&*ctx, &*msg, ack) {
            return Err(TransportError::Acknowledge {
                uuid: msg.uuid.clone(),
                ack,
            });
        }

        Ok(if ack { Outcome::Acked } else { Outcome::Nacked })
    }
}

impl<Req: 'static, Resp: 'static> SubscriberTransport<Req, Resp> {
    /// Serve `messages` on a background thread.
    ///
    /// The thread ends when the stream does; join the returned handle to
    /// collect its stats.
    ///
    /// ## Example
    ///
    /// ```
    /// use std::sync::Arc;
    /// use endpoint_transport::bus::{InMemoryBus, Message, Publisher, Subscriber};
    /// use endpoint_transport::codec::{bool_ack_response, json_decode_request};
    /// use endpoint_transport::context::Context;
    /// use endpoint_transport::transport::SubscriberTransport;
    /// use endpoint_transport::BoxError;
    ///
    /// let bus = InMemoryBus::new();
    /// let subscriber = Arc::new(SubscriberTransport::new(
    ///     |_ctx: &Context, _n: u32| -> Result<bool, BoxError> { Ok(true) },
    ///     json_decode_request::<u32>,
    ///     bool_ack_response,
    /// ));
    ///
    /// let handle = subscriber.clone().spawn(bus.subscribe("numbers").unwrap());
    /// bus.publish("numbers", &Message::with_string_payload("7")).unwrap();
    /// bus.close();
    ///
    /// assert_eq!(handle.join().acked, 1);
    /// ```
    pub fn spawn<I>(self: Arc<Self>, messages: I) -> TransportHandle
    where
        I: IntoIterator<Item = Message> + Send + 'static,
    {
        TransportHandle::spawn(move || self.serve(messages))
    }
}
