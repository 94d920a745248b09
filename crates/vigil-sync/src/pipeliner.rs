//! Bounded-concurrency pipeline of asynchronous work units.
//!
//! The caller drives the pipeline in four steps:
//!
//! 1. [`Pipeliner::wait_for_room`] reserves one of `window` slots.
//! 2. The caller spawns the unit of work on its own task.
//! 3. The unit calls [`Pipeliner::complete_one`] exactly once when done.
//! 4. [`Pipeliner::flush`] waits for every reserved slot to complete and
//!    yields the first error any unit reported.
//!
//! ```
//! use std::num::NonZeroUsize;
//! use std::sync::Arc;
//! use vigil_sync::{CancellationToken, Pipeliner, SyncError};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> Result<(), SyncError> {
//! let pipeliner = Arc::new(Pipeliner::<SyncError>::new(NonZeroUsize::new(4).unwrap()));
//! let cancel = CancellationToken::new();
//!
//! for _ in 0..10 {
//!     pipeliner.wait_for_room(&cancel).await?;
//!     let p = Arc::clone(&pipeliner);
//!     tokio::spawn(async move { p.complete_one(Ok(())) });
//! }
//! pipeliner.flush(&cancel).await?;
//! # Ok(())
//! # }
//! ```

use std::num::NonZeroUsize;
use std::sync::{Mutex, MutexGuard, PoisonError};

use tokio::sync::{Notify, Semaphore};
use tokio_util::sync::CancellationToken;
use tracing::warn;

use crate::error::{SyncError, SyncResult};

#[derive(Debug)]
struct PipelineState<E> {
    outstanding: usize,
    first_error: Option<E>,
}

/// Admits at most `window` concurrently outstanding work units.
#[derive(Debug)]
pub struct Pipeliner<E> {
    window: NonZeroUsize,
    slots: Semaphore,
    state: Mutex<PipelineState<E>>,
    /// Notified whenever the outstanding count returns to zero.
    drained: Notify,
}

impl<E> Pipeliner<E> {
    /// Create a pipeliner with the given window size.
    #[must_use]
    pub fn new(window: NonZeroUsize) -> Self {
        Self {
            window,
            slots: Semaphore::new(window.get()),
            state: Mutex::new(PipelineState {
                outstanding: 0,
                first_error: None,
            }),
            drained: Notify::new(),
        }
    }

    /// Maximum number of concurrently outstanding units.
    #[must_use]
    pub fn window(&self) -> usize {
        self.window.get()
    }

    /// Units reserved but not yet completed.
    #[must_use]
    pub fn outstanding(&self) -> usize {
        self.lock_state().outstanding
    }

    /// Whether a unit has failed since the last [`flush`](Self::flush).
    ///
    /// Producers check this to stop dispatching work whose result is
    /// already decided.
    #[must_use]
    pub fn is_failed(&self) -> bool {
        self.lock_state().first_error.is_some()
    }

    /// Wait until fewer than `window` units are outstanding, then reserve a
    /// slot for one more.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `cancel` fires first; no slot is
    /// reserved in that case.
    pub async fn wait_for_room(&self, cancel: &CancellationToken) -> SyncResult<()> {
        let permit = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(SyncError::Cancelled),
            permit = self.slots.acquire() => permit.map_err(|_| SyncError::Closed)?,
        };
        // The slot now lives in `outstanding` and is handed back to the
        // semaphore by `complete_one`.
        permit.forget();

        let mut state = self.lock_state();
        state.outstanding = state.outstanding.saturating_add(1);
        Ok(())
    }

    /// Mark one reserved unit as finished, recording its error if it is the
    /// first one seen.
    pub fn complete_one(&self, result: Result<(), E>) {
        let drained = {
            let mut state = self.lock_state();
            if state.outstanding == 0 {
                warn!("complete_one called without a reserved slot; ignoring");
                return;
            }
            if let Err(e) = result
                && state.first_error.is_none()
            {
                state.first_error = Some(e);
            }
            state.outstanding = state.outstanding.saturating_sub(1);
            state.outstanding == 0
        };

        self.slots.add_permits(1);
        if drained {
            self.drained.notify_waiters();
        }
    }

    /// Wait for every reserved unit to complete.
    ///
    /// Returns the first error reported through [`complete_one`](Self::complete_one),
    /// clearing it. May be called again after a cancellation; outstanding
    /// units keep running either way.
    ///
    /// # Errors
    ///
    /// Returns the first unit error, or `SyncError::Cancelled` converted into
    /// `E` if `cancel` fires before the pipeline drains.
    pub async fn flush(&self, cancel: &CancellationToken) -> Result<(), E>
    where
        E: From<SyncError>,
    {
        loop {
            let notified = self.drained.notified();
            tokio::pin!(notified);
            // Register before checking so a drain between the check and the
            // await is not missed.
            notified.as_mut().enable();

            {
                let mut state = self.lock_state();
                if state.outstanding == 0 {
                    return match state.first_error.take() {
                        Some(e) => Err(e),
                        None => Ok(()),
                    };
                }
            }

            tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(SyncError::Cancelled.into()),
                () = &mut notified => {},
            }
        }
    }

    // Counters stay consistent across a panicking unit, so poisoning is
    // recovered rather than propagated.
    fn lock_state(&self) -> MutexGuard<'_, PipelineState<E>> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
