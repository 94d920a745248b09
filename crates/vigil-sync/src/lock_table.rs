//! Single-flight locks keyed by name.
//!
//! A [`LockTable`] hands out at most one [`LockLease`] per key at a time.
//! Each key's entry carries a reference count covering the current holder
//! and every waiter; the entry is removed when that count drops to zero, so
//! the table only ever holds keys that are in use.
//!
//! The key map is guarded by its own short-lived std mutex. The per-key
//! exclusion is a tokio mutex that waiters suspend on, so a contended key
//! never blocks acquisitions or releases of other keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use tokio::sync::OwnedMutexGuard;
use tokio_util::sync::CancellationToken;
use tracing::trace;

use crate::error::{SyncError, SyncResult};

type EntryMap = HashMap<String, LockEntry>;

#[derive(Debug)]
struct LockEntry {
    /// Holder plus waiters.
    refs: usize,
    mutex: Arc<tokio::sync::Mutex<()>>,
}

/// Table of named single-flight locks.
#[derive(Debug, Default, Clone)]
pub struct LockTable {
    entries: Arc<Mutex<EntryMap>>,
}

impl LockTable {
    /// Create an empty lock table.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquire the lock for `key`, waiting for any current holder.
    ///
    /// # Errors
    ///
    /// Returns [`SyncError::Cancelled`] if `cancel` fires before the lock is
    /// obtained. The waiter's reference is dropped before returning, as it
    /// is when the returned future is dropped while still waiting.
    pub async fn acquire(
        &self,
        key: impl Into<String>,
        cancel: &CancellationToken,
    ) -> SyncResult<LockLease> {
        let (entry, mutex) = EntryRef::retain(&self.entries, key.into());

        let guard = tokio::select! {
            biased;
            () = cancel.cancelled() => {
                trace!(key = %entry.key, "lock acquisition cancelled");
                return Err(SyncError::Cancelled);
            },
            guard = mutex.lock_owned() => guard,
        };

        trace!(key = %entry.key, "lock acquired");
        Ok(LockLease {
            guard: Some(guard),
            entry,
        })
    }

    /// Number of keys currently held or waited on.
    #[must_use]
    pub fn len(&self) -> usize {
        lock_entries(&self.entries).len()
    }

    /// Whether no key is held or waited on.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        lock_entries(&self.entries).is_empty()
    }
}

/// One counted reference to a key's entry, returned on drop.
#[derive(Debug)]
struct EntryRef {
    entries: Arc<Mutex<EntryMap>>,
    key: String,
}

impl EntryRef {
    fn retain(
        entries: &Arc<Mutex<EntryMap>>,
        key: String,
    ) -> (Self, Arc<tokio::sync::Mutex<()>>) {
        let mutex = {
            let mut map = lock_entries(entries);
            let entry = map.entry(key.clone()).or_insert_with(|| LockEntry {
                refs: 0,
                mutex: Arc::new(tokio::sync::Mutex::new(())),
            });
            entry.refs = entry.refs.saturating_add(1);
            Arc::clone(&entry.mutex)
        };
        let entry = Self {
            entries: Arc::clone(entries),
            key,
        };
        (entry, mutex)
    }
}

impl Drop for EntryRef {
    fn drop(&mut self) {
        let mut map = lock_entries(&self.entries);
        let remove = match map.get_mut(&self.key) {
            Some(entry) => {
                entry.refs = entry.refs.saturating_sub(1);
                entry.refs == 0
            },
            None => false,
        };
        if remove {
            map.remove(&self.key);
        }
    }
}

/// Exclusive hold on one key of a [`LockTable`].
///
/// Released by [`release`](Self::release) or, failing that, on drop.
#[derive(Debug)]
#[must_use = "the lock is released as soon as the lease is dropped"]
pub struct LockLease {
    // Dropped before `entry`, so the key is unlocked before its entry can
    // be removed.
    guard: Option<OwnedMutexGuard<()>>,
    entry: EntryRef,
}

impl LockLease {
    /// The key this lease holds.
    #[must_use]
    pub fn key(&self) -> &str {
        &self.entry.key
    }

    /// Release the lock. Never blocks.
    pub fn release(self) {
        drop(self);
    }
}

impl Drop for LockLease {
    fn drop(&mut self) {
        if let Some(guard) = self.guard.take() {
            drop(guard);
            trace!(key = %self.entry.key, "lock released");
        }
    }
}

// The map only holds counters and handles, which stay consistent even if a
// holder panicked, so a poisoned mutex is recovered rather than propagated.
fn lock_entries(entries: &Mutex<EntryMap>) -> MutexGuard<'_, EntryMap> {
    entries.lock().unwrap_or_else(PoisonError::into_inner)
}
