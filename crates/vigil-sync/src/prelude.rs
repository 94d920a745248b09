//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_sync::prelude::*;` to import all essential types.

pub use crate::{CancellationToken, LockLease, LockTable, Pipeliner, SyncError, SyncResult};
pub use crate::cancellable;
