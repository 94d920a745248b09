//! Synchronization error types.

use thiserror::Error;

/// Errors from the lock table and pipeliner.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum SyncError {
    /// The caller's cancellation token fired while waiting.
    #[error("operation cancelled")]
    Cancelled,

    /// The underlying primitive was closed.
    #[error("synchronization primitive closed")]
    Closed,
}

/// Result type for synchronization operations.
pub type SyncResult<T> = Result<T, SyncError>;
