//! Cancellation helper.

use std::future::Future;

use tokio_util::sync::CancellationToken;

use crate::error::{SyncError, SyncResult};

/// Drive `fut` to completion unless `cancel` fires first.
///
/// An already-cancelled token wins over a future that is ready
/// immediately.
///
/// # Errors
///
/// Returns [`SyncError::Cancelled`] if the token fires before the future
/// completes. The future is dropped in that case.
pub async fn cancellable<F>(cancel: &CancellationToken, fut: F) -> SyncResult<F::Output>
where
    F: Future,
{
    tokio::select! {
        biased;
        () = cancel.cancelled() => Err(SyncError::Cancelled),
        out = fut => Ok(out),
    }
}
