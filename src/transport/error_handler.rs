//! Error handlers for subscriber failures.

use tracing::warn;

use crate::context::Context;
use crate::error::TransportError;

/// Context key under which the subscriber stores the UUID of the message
/// being handled.
pub const MESSAGE_UUID_KEY: &str = "message_uuid";

/// Observes every failure of a subscriber. Must not panic; the loop keeps
/// going whatever the handler does.
pub trait ErrorHandler: Send + Sync {
    fn handle(&self, ctx: &Context, err: &TransportError);
}

impl<F> ErrorHandler for F
where
    F: Fn(&Context, &TransportError) + Send + Sync,
{
    fn handle(&self, ctx: &Context, err: &TransportError) {
        self(ctx, err)
    }
}

/// Logs every failure at `warn` level. The subscriber default.
#[derive(Debug, Default, Clone, Copy)]
pub struct LogErrorHandler;

impl ErrorHandler for LogErrorHandler {
    fn handle(&self, ctx: &Context, err: &TransportError) {
        let uuid = ctx
            .value(MESSAGE_UUID_KEY)
            .and_then(|v| v.as_str().map(String::from))
            .unwrap_or_default();
        warn!(uuid = %uuid, error = %err, "message handling failed");
    }
}

/// Ignores every failure.
#[derive(Debug, Default, Clone, Copy)]
pub struct NopErrorHandler;

impl ErrorHandler for NopErrorHandler {
    fn handle(&self, _ctx: &Context, _err: &TransportError) {}
}
