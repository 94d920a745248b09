//! Durable store selection.

use std::sync::Arc;

use tracing::info;
use vigil_config::StorageSection;
use vigil_storage::{KvStore, MemoryKvStore};

use crate::error::AuditResult;

/// Open the durable store a [`StorageSection`] describes.
///
/// No path means an in-memory store whose histories die with the process.
///
/// # Errors
///
/// Returns a storage error if the persistent store cannot be opened, or a
/// path is configured but the `kv` feature is off.
pub fn open_store(section: &StorageSection) -> AuditResult<Arc<dyn KvStore>> {
    let Some(path) = &section.path else {
        info!("no storage.path configured, audit histories kept in memory");
        return Ok(Arc::new(MemoryKvStore::new()));
    };
    open_persistent(path)
}

#[cfg(feature = "kv")]
fn open_persistent(path: &std::path::Path) -> AuditResult<Arc<dyn KvStore>> {
    let store = vigil_storage::SurrealKvStore::open(path)?;
    info!(path = %path.display(), "opened audit store");
    Ok(Arc::new(store))
}

#[cfg(not(feature = "kv"))]
fn open_persistent(path: &std::path::Path) -> AuditResult<Arc<dyn KvStore>> {
    Err(vigil_storage::StorageError::Connection(format!(
        "storage.path {} needs the `kv` feature",
        path.display()
    ))
    .into())
}
