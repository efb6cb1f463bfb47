//! Background thread running a subscriber loop.

use std::thread::{self, JoinHandle};

use super::subscriber::Outcome;

/// Tally of one consumption loop.
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct TransportStats {
    /// Messages read from the stream.
    pub handled: usize,
    pub acked: usize,
    pub nacked: usize,
    /// Messages whose handling stopped on an error.
    pub failed: usize,
}

impl TransportStats {
    pub(crate) fn record(&mut self, outcome: Outcome) {
        self.handled += 1;
        match outcome {
            Outcome::Acked => self.acked += 1,
            Outcome::Nacked => self.nacked += 1,
            Outcome::Failed => self.failed += 1,
        }
    }
}

/// Handle to a subscriber loop running on a background thread.
///
/// The loop has no stop signal of its own: it ends when its message stream
/// closes (e.g. `InMemoryBus::close`).
pub struct TransportHandle {
    handle: JoinHandle<TransportStats>,
}

impl TransportHandle {
    pub(crate) fn spawn<F>(serve: F) -> Self
    where
        F: FnOnce() -> TransportStats + Send + 'static,
    {
        Self {
            handle: thread::spawn(serve),
        }
    }

    /// Wait for the loop to finish. Returns its stats, or empty stats if
    /// the loop panicked.
    pub fn join(self) -> TransportStats {
        self.handle.join().unwrap_or_default()
    }

    /// Whether the loop has already finished.
    pub fn is_finished(&self) -> bool {
        self.handle.is_finished()
    }
}
