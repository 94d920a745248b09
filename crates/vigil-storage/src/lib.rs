//! Vigil Storage - the durable tier behind the audit cache.
//!
//! Audit histories outlive the process: the in-memory LRU in `vigil-audit`
//! is only a front for the store defined here.
//!
//! - [`KvStore`]: namespaced byte-level storage trait
//! - [`MemoryKvStore`]: ephemeral implementation for tests and embedding
//! - [`SurrealKvStore`]: embedded persistent tree (`kv` feature)
//! - [`ScopedKvStore`]: a namespace-bound view with JSON helpers
//!
//! # Example
//!
//! ```
//! use std::sync::Arc;
//! use vigil_storage::{MemoryKvStore, ScopedKvStore};
//!
//! # #[tokio::main(flavor = "current_thread")]
//! # async fn main() -> vigil_storage::StorageResult<()> {
//! let scoped = ScopedKvStore::new(Arc::new(MemoryKvStore::new()), "audit:groups")?;
//! scoped.set_json("group-a", &vec![1u64, 2, 3]).await?;
//! let back: Option<Vec<u64>> = scoped.get_json("group-a").await?;
//! assert_eq!(back, Some(vec![1, 2, 3]));
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - **`kv`** - `SurrealKV` persistent backend

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod kv;
mod scoped;
#[cfg(feature = "kv")]
mod surreal;

pub use error::{StorageError, StorageResult};
pub use kv::{KvStore, MemoryKvStore};
pub use scoped::ScopedKvStore;

#[cfg(feature = "kv")]
pub use surreal::SurrealKvStore;
