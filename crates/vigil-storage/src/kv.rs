//! The [`KvStore`] trait and its in-memory implementation.
//!
//! Every operation is scoped to a namespace. Namespaces and keys are
//! arbitrary non-empty strings without NUL bytes; persistent backends use
//! NUL as the separator of their composite keys.

use std::collections::BTreeMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use async_trait::async_trait;

use crate::error::{StorageError, StorageResult};

pub(crate) fn validate_namespace(namespace: &str) -> StorageResult<()> {
    validate_part("namespace", namespace)
}

pub(crate) fn validate_key(key: &str) -> StorageResult<()> {
    validate_part("key", key)
}

fn validate_part(what: &str, value: &str) -> StorageResult<()> {
    if value.is_empty() {
        return Err(StorageError::InvalidKey(format!("{what} must not be empty")));
    }
    if value.contains('\0') {
        return Err(StorageError::InvalidKey(format!(
            "{what} must not contain null bytes"
        )));
    }
    Ok(())
}

/// Namespaced byte-level key-value store.
///
/// Implementations provide per-key atomic reads and writes; nothing more is
/// assumed by callers.
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Get a value. Returns `None` if the key does not exist.
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>>;

    /// Set a value, overwriting any existing one.
    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()>;

    /// Delete a key. Returns `true` if it existed.
    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// Check whether a key exists.
    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool>;

    /// List every key in a namespace, in ascending order.
    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>>;

    /// Delete every key in a namespace, returning how many were removed.
    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64>;
}

type Slot = (String, String);

/// In-memory [`KvStore`].
///
/// Entries are ordered by `(namespace, key)`, so namespace scans are range
/// queries.
#[derive(Debug, Default)]
pub struct MemoryKvStore {
    data: RwLock<BTreeMap<Slot, Vec<u8>>>,
}

impl MemoryKvStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of entries across all namespaces.
    #[must_use]
    pub fn len(&self) -> usize {
        self.read().len()
    }

    /// Whether the store holds no entries.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    // Every operation leaves the map consistent, so a panicking holder
    // cannot leave it half-written.
    fn read(&self) -> RwLockReadGuard<'_, BTreeMap<Slot, Vec<u8>>> {
        self.data.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, BTreeMap<Slot, Vec<u8>>> {
        self.data.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn slot(namespace: &str, key: &str) -> StorageResult<Slot> {
        validate_namespace(namespace)?;
        validate_key(key)?;
        Ok((namespace.to_owned(), key.to_owned()))
    }

    fn namespace_keys(data: &BTreeMap<Slot, Vec<u8>>, namespace: &str) -> Vec<Slot> {
        data.range((namespace.to_owned(), String::new())..)
            .take_while(|((ns, _), _)| ns == namespace)
            .map(|(slot, _)| slot.clone())
            .collect()
    }
}

#[async_trait]
impl KvStore for MemoryKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        let slot = Self::slot(namespace, key)?;
        let data = self.read();
        Ok(data.get(&slot).cloned())
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        let slot = Self::slot(namespace, key)?;
        let mut data = self.write();
        data.insert(slot, value);
        Ok(())
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let slot = Self::slot(namespace, key)?;
        let mut data = self.write();
        Ok(data.remove(&slot).is_some())
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        let slot = Self::slot(namespace, key)?;
        let data = self.read();
        Ok(data.contains_key(&slot))
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        validate_namespace(namespace)?;
        let data = self.read();
        Ok(Self::namespace_keys(&data, namespace)
            .into_iter()
            .map(|(_, key)| key)
            .collect())
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        validate_namespace(namespace)?;
        let mut data = self.write();
        let doomed = Self::namespace_keys(&data, namespace);
        for slot in &doomed {
            data.remove(slot);
        }
        Ok(u64::try_from(doomed.len()).unwrap_or(u64::MAX))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_get_set_overwrite() {
        let store = MemoryKvStore::new();
        assert!(store.get("audit", "g1").await.unwrap().is_none());

        store.set("audit", "g1", b"v1".to_vec()).await.unwrap();
        store.set("audit", "g1", b"v2".to_vec()).await.unwrap();
        assert_eq!(store.get("audit", "g1").await.unwrap(), Some(b"v2".to_vec()));
        assert_eq!(store.len(), 1);
    }

    #[tokio::test]
    async fn test_delete_and_exists() {
        let store = MemoryKvStore::new();
        store.set("audit", "g1", b"v".to_vec()).await.unwrap();
        assert!(store.exists("audit", "g1").await.unwrap());
        assert!(store.delete("audit", "g1").await.unwrap());
        assert!(!store.delete("audit", "g1").await.unwrap());
        assert!(!store.exists("audit", "g1").await.unwrap());
        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_namespace_scans_do_not_leak() {
        let store = MemoryKvStore::new();
        store.set("a", "x", b"1".to_vec()).await.unwrap();
        store.set("a", "y", b"2".to_vec()).await.unwrap();
        // "ab" sorts after "a" but is a distinct namespace.
        store.set("ab", "z", b"3".to_vec()).await.unwrap();

        assert_eq!(store.list_keys("a").await.unwrap(), vec!["x", "y"]);
        assert_eq!(store.clear_namespace("a").await.unwrap(), 2);
        assert!(store.list_keys("a").await.unwrap().is_empty());
        assert_eq!(store.list_keys("ab").await.unwrap(), vec!["z"]);
    }

    #[tokio::test]
    async fn test_rejects_invalid_parts() {
        let store = MemoryKvStore::new();
        assert!(matches!(
            store.set("", "k", Vec::new()).await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(matches!(
            store.get("ns", "k\0x").await,
            Err(StorageError::InvalidKey(_))
        ));
        assert!(store.list_keys("bad\0ns").await.is_err());
    }

    #[tokio::test]
    async fn test_poisoned_lock_is_recovered() {
        let store = std::sync::Arc::new(MemoryKvStore::new());
        store.set("audit", "g1", b"v".to_vec()).await.unwrap();

        let holder = std::sync::Arc::clone(&store);
        let panicked = std::thread::spawn(move || {
            let _guard = holder.data.write().unwrap();
            panic!("writer died holding the lock");
        })
        .join();
        assert!(panicked.is_err());
        assert!(store.data.is_poisoned());

        assert_eq!(store.get("audit", "g1").await.unwrap(), Some(b"v".to_vec()));
        store.set("audit", "g2", b"w".to_vec()).await.unwrap();
        assert!(store.exists("audit", "g2").await.unwrap());
        assert_eq!(store.list_keys("audit").await.unwrap(), vec!["g1", "g2"]);
        assert_eq!(store.len(), 2);
        assert_eq!(store.clear_namespace("audit").await.unwrap(), 2);
        assert!(!store.delete("audit", "g1").await.unwrap());
    }

    #[test]
    fn test_validate_messages() {
        let err = validate_key("").unwrap_err();
        assert_eq!(err.to_string(), "invalid key: key must not be empty");
        let err = validate_namespace("x\0").unwrap_err();
        assert_eq!(
            err.to_string(),
            "invalid key: namespace must not contain null bytes"
        );
    }
}
