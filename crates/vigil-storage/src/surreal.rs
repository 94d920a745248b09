//! Persistent [`KvStore`] backed by an embedded `SurrealKV` tree.

use std::path::Path;

use async_trait::async_trait;
use tracing::debug;

use crate::error::{StorageError, StorageResult};
use crate::kv::{KvStore, validate_key, validate_namespace};

const SEPARATOR: u8 = 0;

/// Key layout: `namespace \0 key`. A namespace's keys therefore occupy the
/// half-open range `[namespace \0, namespace \x01)`.
fn encode_key(namespace: &str, key: &str) -> Vec<u8> {
    let mut buf = namespace_bound(namespace, SEPARATOR);
    buf.extend_from_slice(key.as_bytes());
    buf
}

fn namespace_bound(namespace: &str, last: u8) -> Vec<u8> {
    let mut buf = Vec::with_capacity(namespace.len().saturating_add(1));
    buf.extend_from_slice(namespace.as_bytes());
    buf.push(last);
    buf
}

#[allow(clippy::needless_pass_by_value)]
fn backend(e: surrealkv::Error) -> StorageError {
    StorageError::Internal(e.to_string())
}

/// Durable store on an embedded, transactional LSM tree.
///
/// ```rust,ignore
/// use vigil_storage::SurrealKvStore;
///
/// let store = SurrealKvStore::open("/var/lib/vigil/audit")?;
/// ```
pub struct SurrealKvStore {
    tree: surrealkv::Tree,
}

impl std::fmt::Debug for SurrealKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SurrealKvStore").finish_non_exhaustive()
    }
}

impl SurrealKvStore {
    /// Open (or create) a store in `path`.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Connection`] if the tree cannot be opened.
    pub fn open(path: impl AsRef<Path>) -> StorageResult<Self> {
        let path = path.as_ref();
        let tree = surrealkv::TreeBuilder::new()
            .with_path(path.to_path_buf())
            .build()
            .map_err(|e| StorageError::Connection(e.to_string()))?;
        debug!(path = %path.display(), "opened durable audit store");
        Ok(Self { tree })
    }

    /// Flush pending writes and close the tree.
    ///
    /// # Errors
    ///
    /// Returns [`StorageError::Internal`] if the flush fails.
    pub async fn close(&self) -> StorageResult<()> {
        self.tree.close().await.map_err(backend)
    }

    fn read_tx(&self) -> StorageResult<surrealkv::Transaction> {
        self.tree
            .begin_with_mode(surrealkv::Mode::ReadOnly)
            .map_err(backend)
    }

    fn scan_namespace(
        tx: &surrealkv::Transaction,
        namespace: &str,
    ) -> StorageResult<Vec<Vec<u8>>> {
        let start = namespace_bound(namespace, SEPARATOR);
        let end = namespace_bound(namespace, SEPARATOR.saturating_add(1));
        let mut iter = tx.range(&start, &end).map_err(backend)?;
        iter.seek_first().map_err(backend)?;

        let mut keys = Vec::new();
        while iter.valid() {
            keys.push(iter.key());
            iter.next().map_err(backend)?;
        }
        Ok(keys)
    }
}

#[async_trait]
impl KvStore for SurrealKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        self.read_tx()?
            .get(&encode_key(namespace, key))
            .map_err(backend)
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let mut tx = self.tree.begin().map_err(backend)?;
        tx.set(&encode_key(namespace, key), &value).map_err(backend)?;
        tx.commit().await.map_err(backend)
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        let encoded = encode_key(namespace, key);
        let mut tx = self.tree.begin().map_err(backend)?;
        if tx.get(&encoded).map_err(backend)?.is_none() {
            return Ok(false);
        }
        tx.delete(&encoded).map_err(backend)?;
        tx.commit().await.map_err(backend)?;
        Ok(true)
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        Ok(self.get(namespace, key).await?.is_some())
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let prefix_len = namespace.len().saturating_add(1);
        let tx = self.read_tx()?;
        Ok(Self::scan_namespace(&tx, namespace)?
            .iter()
            .filter_map(|raw| raw.get(prefix_len..))
            .filter(|rest| !rest.is_empty())
            .filter_map(|rest| std::str::from_utf8(rest).ok().map(str::to_owned))
            .collect())
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        validate_namespace(namespace)?;
        let mut tx = self.tree.begin().map_err(backend)?;
        let doomed = Self::scan_namespace(&tx, namespace)?;
        for key in &doomed {
            tx.delete(key).map_err(backend)?;
        }
        if !doomed.is_empty() {
            tx.commit().await.map_err(backend)?;
        }
        Ok(u64::try_from(doomed.len()).unwrap_or(u64::MAX))
    }
}
