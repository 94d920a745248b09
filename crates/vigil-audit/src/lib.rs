//! Vigil Audit - probabilistic merkle-log audits of group histories.
//!
//! A client that loads a group trusts the group's sigchain only as far as
//! the public log agrees with it. This crate checks that agreement by
//! sampling historical log roots:
//!
//! - [`Auditor`]: runs at most one audit pass per group at a time and skips
//!   passes that would learn nothing new
//! - [`AuditCache`]: bounded LRU memory tier over a durable [`KvStore`],
//!   reset on logout
//! - [`AuditHistory`]: what is remembered per group between passes
//! - [`AuditParams`]: pass tunables, usually built from [`vigil_config`]
//!
//! # Example
//!
//! ```no_run
//! use std::sync::Arc;
//! use vigil_audit::prelude::*;
//! use vigil_core::{ChainLinks, GroupId, LogRoot, MerkleClient, Seqno};
//! use vigil_storage::MemoryKvStore;
//!
//! # async fn run(client: Arc<dyn MerkleClient>, id: GroupId, head: LogRoot, chain: ChainLinks) -> AuditResult<()> {
//! let auditor = Auditor::new(client, Arc::new(MemoryKvStore::new()), AuditParams::default())?;
//! let cancel = CancellationToken::new();
//! auditor
//!     .audit_group(&cancel, &id, id.is_public(), &head, &chain, Seqno(12))
//!     .await?;
//! # Ok(())
//! # }
//! ```
//!
//! # Feature Flags
//!
//! - **`kv`** - open a persistent `SurrealKV` store from `storage.path`
//!
//! [`KvStore`]: vigil_storage::KvStore

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod auditor;
mod cache;
mod error;
mod history;
mod params;
mod probe;
mod store;

pub use auditor::Auditor;
pub use cache::{AUDIT_NAMESPACE, AuditCache, MemoryTier};
pub use error::{AuditError, AuditResult, ErrorKind};
pub use history::{AuditHistory, AuditRecord};
pub use params::AuditParams;
pub use store::open_store;
