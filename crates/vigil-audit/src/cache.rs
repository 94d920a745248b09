//! Two-tier store of audit histories.
//!
//! The durable store is the system of record. In front of it sits a bounded
//! LRU memory tier that is thrown away wholesale on logout; durable entries
//! survive the reset and refill the new tier on demand.
//!
//! Callers that must not see a tier swap mid-operation capture the handle
//! once with [`AuditCache::tier`] and use [`get_in`](AuditCache::get_in) /
//! [`put_in`](AuditCache::put_in) against it.

use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use lru::LruCache;
use tracing::{debug, trace};
use vigil_core::GroupId;
use vigil_storage::{KvStore, ScopedKvStore, StorageResult};

use crate::history::AuditHistory;

/// Durable namespace holding one JSON document per audited group.
pub const AUDIT_NAMESPACE: &str = "audit:groups";

/// One generation of the memory tier.
#[derive(Debug)]
pub struct MemoryTier {
    entries: Mutex<LruCache<GroupId, Arc<AuditHistory>>>,
}

impl MemoryTier {
    fn new(capacity: NonZeroUsize) -> Self {
        Self {
            entries: Mutex::new(LruCache::new(capacity)),
        }
    }

    // Entries are immutable `Arc`s, so a poisoned lock still guards a
    // consistent map.
    fn lock(&self) -> MutexGuard<'_, LruCache<GroupId, Arc<AuditHistory>>> {
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn get(&self, id: &GroupId) -> Option<Arc<AuditHistory>> {
        self.lock().get(id).cloned()
    }

    fn put(&self, id: &GroupId, history: Arc<AuditHistory>) {
        self.lock().put(id.clone(), history);
    }

    fn purge(&self) {
        self.lock().clear();
    }

    /// Number of histories held.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Whether the tier is empty.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

/// Memory tier plus durable store, keyed by group.
#[derive(Debug)]
pub struct AuditCache {
    /// Guards only the handle swap; never held across an await.
    tier: Mutex<Arc<MemoryTier>>,
    capacity: NonZeroUsize,
    durable: ScopedKvStore,
}

impl AuditCache {
    /// Create a cache over `store` with a memory tier of `capacity`.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store rejects the audit namespace.
    pub fn new(store: Arc<dyn KvStore>, capacity: NonZeroUsize) -> StorageResult<Self> {
        Ok(Self {
            tier: Mutex::new(Arc::new(MemoryTier::new(capacity))),
            capacity,
            durable: ScopedKvStore::new(store, AUDIT_NAMESPACE)?,
        })
    }

    /// Memory-tier capacity.
    #[must_use]
    pub fn capacity(&self) -> NonZeroUsize {
        self.capacity
    }

    /// The current memory tier.
    #[must_use]
    pub fn tier(&self) -> Arc<MemoryTier> {
        Arc::clone(&*self.tier.lock().unwrap_or_else(PoisonError::into_inner))
    }

    /// Look up a group's history in the current tier, then the durable
    /// store.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the durable read fails or the stored
    /// document does not decode.
    pub async fn get(&self, id: &GroupId) -> StorageResult<Option<Arc<AuditHistory>>> {
        let tier = self.tier();
        self.get_in(&tier, id).await
    }

    /// Like [`get`](Self::get), against a previously captured tier. A
    /// durable hit is backfilled into that tier.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the durable read fails or the stored
    /// document does not decode.
    pub async fn get_in(
        &self,
        tier: &MemoryTier,
        id: &GroupId,
    ) -> StorageResult<Option<Arc<AuditHistory>>> {
        if let Some(history) = tier.get(id) {
            trace!(group = %id, "memory tier hit");
            return Ok(Some(history));
        }
        let Some(history) = self.durable.get_json::<AuditHistory>(id.as_str()).await? else {
            return Ok(None);
        };
        debug!(group = %id, "durable hit, backfilling memory tier");
        let history = Arc::new(history);
        tier.put(id, Arc::clone(&history));
        Ok(Some(history))
    }

    /// Store a group's history in the durable store, then the current tier.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the durable write fails. The memory tier
    /// is left untouched in that case.
    pub async fn put(&self, id: &GroupId, history: Arc<AuditHistory>) -> StorageResult<()> {
        let tier = self.tier();
        self.put_in(&tier, id, history).await
    }

    /// Like [`put`](Self::put), against a previously captured tier.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the durable write fails.
    pub async fn put_in(
        &self,
        tier: &MemoryTier,
        id: &GroupId,
        history: Arc<AuditHistory>,
    ) -> StorageResult<()> {
        self.durable.set_json(id.as_str(), history.as_ref()).await?;
        tier.put(id, history);
        Ok(())
    }

    /// Swap in a fresh, empty memory tier and purge the old one.
    ///
    /// Durable entries are untouched. Holders of the old tier keep a valid
    /// (now empty) handle.
    pub fn reset(&self) {
        let fresh = Arc::new(MemoryTier::new(self.capacity));
        let old = {
            let mut slot = self.tier.lock().unwrap_or_else(PoisonError::into_inner);
            std::mem::replace(&mut *slot, fresh)
        };
        old.purge();
        debug!("audit memory tier reset");
    }
}
