use thiserror::Error;

/// Why a context is done.
#[derive(Debug, Error, Clone, Copy, PartialEq, Eq)]
pub enum ContextError {
    #[error("context cancelled")]
    Cancelled,
    #[error("context deadline exceeded")]
    DeadlineExceeded,
}
