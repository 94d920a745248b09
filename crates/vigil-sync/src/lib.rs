//! Vigil Sync - concurrency primitives for the audit engine.
//!
//! This crate provides:
//! - [`LockTable`]: single-flight mutual exclusion keyed by string, with
//!   entries reclaimed once nobody holds or waits on them
//! - [`Pipeliner`]: a bounded window of concurrently running work units
//!   with first-error-wins aggregation and a drain point
//! - [`cancellable`]: run any future against a [`CancellationToken`]
//!
//! Every blocking operation takes a [`CancellationToken`] and fails with
//! [`SyncError::Cancelled`] instead of hanging.
//!
//! # Example
//!
//! ```
//! use vigil_sync::LockTable;
//! use tokio_util::sync::CancellationToken;
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> vigil_sync::SyncResult<()> {
//! let table = LockTable::new();
//! let cancel = CancellationToken::new();
//!
//! let lease = table.acquire("group-a", &cancel).await?;
//! assert_eq!(table.len(), 1);
//! lease.release();
//! assert!(table.is_empty());
//! # Ok(())
//! # }
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod cancel;
mod error;
mod lock_table;
mod pipeliner;

pub use cancel::cancellable;
pub use error::{SyncError, SyncResult};
pub use lock_table::{LockLease, LockTable};
pub use pipeliner::Pipeliner;

/// Re-exported so callers need not depend on `tokio-util` directly.
pub use tokio_util::sync::CancellationToken;
