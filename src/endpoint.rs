//! The request/response contract bridged to messaging.

use crate::context::Context;
use crate::error::BoxError;

/// Business logic behind a transport: one request in, one response or
/// error out.
///
/// Any `Fn(&Context, Req) -> Result<Resp, BoxError>` closure is an
/// endpoint, and so is a [`PublisherTransport`](crate::transport::PublisherTransport).
///
/// ## Example
///
/// ```
/// use endpoint_transport::context::Context;
/// use endpoint_transport::endpoint::Endpoint;
/// use endpoint_transport::BoxError;
///
/// let double = |_ctx: &Context, n: i64| -> Result<i64, BoxError> { Ok(n * 2) };
/// assert_eq!(double.invoke(&Context::background(), 21).unwrap(), 42);
/// ```
pub trait Endpoint<Req, Resp>: Send + Sync {
    fn invoke(&self, ctx: &Context, request: Req) -> Result<Resp, BoxError>;
}

impl<Req, Resp, F> Endpoint<Req, Resp> for F
where
    F: Fn(&Context, Req) -> Result<Resp, BoxError> + Send + Sync,
{
    fn invoke(&self, ctx: &Context, request: Req) -> Result<Resp, BoxError> {
        self(ctx, request)
    }
}
