//! Call-scoped context: cancellation, deadline and annotations.

use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, PoisonError, RwLock};
use std::time::{Duration, Instant};

use serde_json::Value;

use super::error::ContextError;

struct Inner {
    parent: Option<Context>,
    deadline: Option<Instant>,
    cancelled: AtomicBool,
    values: RwLock<HashMap<String, Value>>,
}

/// Context threaded through every hook, codec and endpoint of one call.
///
/// `Context` is a cheap handle: clones refer to the same context.
/// Derived contexts (`with_cancel`, `with_timeout`, `with_value`) are
/// children that observe their parent's cancellation and deadline, while
/// cancelling a child leaves the parent untouched.
///
/// ## Example
///
/// ```
/// use std::time::Duration;
/// use endpoint_transport::context::Context;
///
/// let root = Context::background();
/// let ctx = root.with_timeout(Duration::from_secs(5)).with_value("trace-id", "abc");
///
/// let trace_id = ctx.value("trace-id").and_then(|v| v.as_str().map(String::from));
/// assert_eq!(trace_id, Some("abc".into()));
/// assert!(ctx.err().is_none());
///
/// root.cancel();
/// assert!(ctx.is_done());
/// ```
#[derive(Clone)]
pub struct Context {
    inner: Arc<Inner>,
}

impl Context {
    /// A fresh root context: never cancelled unless `cancel` is called on
    /// it, no deadline, no values.
    pub fn background() -> Self {
        Self::derive(None, None)
    }

    fn derive(parent: Option<Context>, deadline: Option<Instant>) -> Self {
        Self {
            inner: Arc::new(Inner {
                parent,
                deadline,
                cancelled: AtomicBool::new(false),
                values: RwLock::new(HashMap::new()),
            }),
        }
    }

    /// Child context that can be cancelled independently of its parent.
    pub fn with_cancel(&self) -> Self {
        Self::derive(Some(self.clone()), None)
    }

    /// Child context that expires after `timeout`.
    ///
    /// The effective deadline never extends past the parent's.
    pub fn with_timeout(&self, timeout: Duration) -> Self {
        let deadline = Instant::now().checked_add(timeout);
        Self::derive(Some(self.clone()), deadline)
    }

    /// Child context that expires at `deadline`.
    pub fn with_deadline(&self, deadline: Instant) -> Self {
        Self::derive(Some(self.clone()), Some(deadline))
    }

    /// Child context carrying one extra annotation.
    pub fn with_value(&self, key: impl Into<String>, value: impl Into<Value>) -> Self {
        let child = Self::derive(Some(self.clone()), None);
        child.insert(key, value);
        child
    }

    /// Set an annotation on this context, visible to every handle and child.
    pub fn insert(&self, key: impl Into<String>, value: impl Into<Value>) {
        self.inner
            .values
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .insert(key.into(), value.into());
    }

    /// Look up an annotation, nearest context first.
    pub fn value(&self, key: &str) -> Option<Value> {
        let own = self
            .inner
            .values
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(key)
            .cloned();
        own.or_else(|| self.inner.parent.as_ref()?.value(key))
    }

    /// Cancel this context and every context derived from it.
    pub fn cancel(&self) {
        self.inner.cancelled.store(true, Ordering::SeqCst);
    }

    /// Guard that cancels this context when dropped.
    #[must_use = "the context is cancelled as soon as the guard is dropped"]
    pub fn guard(&self) -> CancelGuard {
        CancelGuard { ctx: self.clone() }
    }

    /// Earliest deadline along the parent chain.
    pub fn deadline(&self) -> Option<Instant> {
        let parent = self.inner.parent.as_ref().and_then(Context::deadline);
        match (self.inner.deadline, parent) {
            (Some(own), Some(parent)) => Some(own.min(parent)),
            (own, parent) => own.or(parent),
        }
    }

    /// Time left before the deadline, if there is one.
    pub fn remaining(&self) -> Option<Duration> {
        self.deadline()
            .map(|deadline| deadline.saturating_duration_since(Instant::now()))
    }

    fn is_cancelled(&self) -> bool {
        self.inner.cancelled.load(Ordering::SeqCst)
            || self
                .inner
                .parent
                .as_ref()
                .is_some_and(Context::is_cancelled)
    }

    /// Why this context is done, or `None` while it is still live.
    ///
    /// Cancellation wins over an expired deadline.
    pub fn err(&self) -> Option<ContextError> {
        if self.is_cancelled() {
            return Some(ContextError::Cancelled);
        }
        match self.deadline() {
            Some(deadline) if Instant::now() >= deadline => Some(ContextError::DeadlineExceeded),
            _ => None,
        }
    }

    /// Shorthand for `err().is_some()`.
    pub fn is_done(&self) -> bool {
        self.err().is_some()
    }

    /// `Ok(())` while live, the reason otherwise. Convenient with `?`.
    pub fn check(&self) -> Result<(), ContextError> {
        match self.err() {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }

    /// Whether two handles refer to the same context.
    pub fn same(&self, other: &Context) -> bool {
        Arc::ptr_eq(&self.inner, &other.inner)
    }
}

impl Default for Context {
    fn default() -> Self {
        Self::background()
    }
}

impl fmt::Debug for Context {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Context")
            .field("deadline", &self.deadline())
            .field("err", &self.err())
            .finish_non_exhaustive()
    }
}

/// Cancels its context on drop, so every exit path releases it.
pub struct CancelGuard {
    ctx: Context,
}

impl CancelGuard {
    /// The guarded context.
    pub fn context(&self) -> &Context {
        &self.ctx
    }
}

impl Drop for CancelGuard {
    fn drop(&mut self) {
        self.ctx.cancel();
    }
}
