//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_storage::prelude::*;` to import all essential types.

pub use crate::{KvStore, MemoryKvStore, ScopedKvStore, StorageError, StorageResult};

#[cfg(feature = "kv")]
pub use crate::SurrealKvStore;
