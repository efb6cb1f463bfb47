//! Call context carried through every step of a publish call or of the
//! handling of one inbound message.
//!
//! A context carries a cancellation signal, an optional deadline and
//! arbitrary JSON annotations. Transports create one per call (publisher)
//! or per message (subscriber) and cancel it when the work is done.
//! Collaborators that block (brokers, endpoints) are expected to watch
//! `ctx.err()` / `ctx.remaining()` themselves; transports only check it
//! between steps.

#[allow(clippy::module_inception)]
mod context;
mod error;

pub use context::{CancelGuard, Context};
pub use error::ContextError;
