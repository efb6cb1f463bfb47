//! Before/after middleware chains.

use std::sync::Arc;

use crate::bus::{Message, PublishError};
use crate::context::Context;

/// Middleware around a message: observes or replaces the context, and may
/// edit the message (e.g. inject a trace id into its metadata).
///
/// Used as publisher before-hooks and as subscriber before- and after-hooks.
pub type Hook = Arc<dyn Fn(Context, &mut Message) -> Context + Send + Sync>;

/// Publisher after-hook; also sees the publish error, if any.
pub type PublishedHook =
    Arc<dyn Fn(Context, &mut Message, Option<&PublishError>) -> Context + Send + Sync>;

/// Apply `hooks` in registration order, each one receiving the context
/// returned by the previous one.
pub(crate) fn run_hooks(hooks: &[Hook], ctx: Context, msg: &mut Message) -> Context {
    hooks.iter().fold(ctx, |ctx, hook| hook(ctx, &mut *msg))
}

pub(crate) fn run_published_hooks(
    hooks: &[PublishedHook],
    ctx: Context,
    msg: &mut Message,
    publish_result: Option<&PublishError>,
) -> Context {
    hooks
        .iter()
        .fold(ctx, |ctx, hook| hook(ctx, &mut *msg, publish_result))
}
