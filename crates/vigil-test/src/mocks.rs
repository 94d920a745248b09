//! Mock implementations for testing.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use vigil_core::{
    GroupId, LeafTail, LinkId, LogRoot, MerkleClient, MerkleError, MerkleResult, Seqno,
};
use vigil_storage::{KvStore, StorageError, StorageResult};

/// Tracks how many calls are in flight and the highest count seen.
#[derive(Debug, Default)]
struct InFlight {
    current: AtomicUsize,
    peak: AtomicUsize,
    total: AtomicUsize,
}

impl InFlight {
    fn enter(&self) -> InFlightGuard<'_> {
        self.total.fetch_add(1, Ordering::SeqCst);
        let now = self.current.fetch_add(1, Ordering::SeqCst).saturating_add(1);
        self.peak.fetch_max(now, Ordering::SeqCst);
        InFlightGuard(self)
    }
}

struct InFlightGuard<'a>(&'a InFlight);

impl Drop for InFlightGuard<'_> {
    fn drop(&mut self) {
        self.0.current.fetch_sub(1, Ordering::SeqCst);
    }
}

#[derive(Debug)]
struct MerkleState {
    root: LogRoot,
    first_usable: Option<Seqno>,
    /// Log position at which a leaf was published, to the leaf. Positions
    /// between entries see the most recent earlier leaf.
    leaves: BTreeMap<Seqno, LeafTail>,
    fetch_failure: Option<MerkleError>,
    lookup_failure: Option<MerkleError>,
    fetch_delay: Duration,
    lookup_delay: Duration,
    /// How far the log grows after every successful fetch.
    root_step: u64,
}

/// Mock implementation of [`MerkleClient`] for testing.
///
/// The log is modelled as a set of publication points: a leaf added at
/// position `p` is what every root from `p` onward records for the group,
/// until a later publication. All groups share one leaf oracle.
///
/// Uses `std::sync::Mutex` internally so setters work without a runtime.
#[derive(Debug, Clone)]
pub struct MockMerkleClient {
    state: Arc<Mutex<MerkleState>>,
    fetches: Arc<InFlight>,
    lookups: Arc<InFlight>,
}

impl MockMerkleClient {
    /// A client whose fresh root is `root`, with no first usable seqno and
    /// no leaves.
    #[must_use]
    pub fn new(root: LogRoot) -> Self {
        Self {
            state: Arc::new(Mutex::new(MerkleState {
                root,
                first_usable: None,
                leaves: BTreeMap::new(),
                fetch_failure: None,
                lookup_failure: None,
                fetch_delay: Duration::ZERO,
                lookup_delay: Duration::ZERO,
                root_step: 0,
            })),
            fetches: Arc::new(InFlight::default()),
            lookups: Arc::new(InFlight::default()),
        }
    }

    /// Set the first usable seqno.
    #[must_use]
    pub fn with_first_usable(self, seqno: Seqno) -> Self {
        self.state().first_usable = Some(seqno);
        self
    }

    /// Delay every root fetch.
    #[must_use]
    pub fn with_fetch_delay(self, delay: Duration) -> Self {
        self.state().fetch_delay = delay;
        self
    }

    /// Grow the log by `step` after every successful fetch, so consecutive
    /// fetches see ever newer roots.
    #[must_use]
    pub fn with_root_step(self, step: u64) -> Self {
        self.state().root_step = step;
        self
    }

    fn state(&self) -> MutexGuard<'_, MerkleState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Publish `link_id` as the group's chain tip at `chain_seqno`, from log
    /// position `position` on.
    pub fn add_leaf(&self, position: Seqno, chain_seqno: Seqno, link_id: LinkId) {
        self.state().leaves.insert(
            position,
            LeafTail {
                chain_seqno,
                link_id,
            },
        );
    }

    /// Replace the root handed out by the next fetches.
    pub fn set_root(&self, root: LogRoot) {
        self.state().root = root;
    }

    /// Delay every leaf lookup.
    pub fn set_lookup_delay(&self, delay: Duration) {
        self.state().lookup_delay = delay;
    }

    /// Fail every following fetch with `error`.
    pub fn fail_fetch(&self, error: MerkleError) {
        self.state().fetch_failure = Some(error);
    }

    /// Fail every following lookup with `error`.
    pub fn fail_lookups(&self, error: MerkleError) {
        self.state().lookup_failure = Some(error);
    }

    /// Stop injecting failures.
    pub fn clear_failures(&self) {
        let mut state = self.state();
        state.fetch_failure = None;
        state.lookup_failure = None;
    }

    /// Root fetches started so far.
    #[must_use]
    pub fn fetch_count(&self) -> usize {
        self.fetches.total.load(Ordering::SeqCst)
    }

    /// Leaf lookups started so far.
    #[must_use]
    pub fn lookup_count(&self) -> usize {
        self.lookups.total.load(Ordering::SeqCst)
    }

    /// Highest number of fetches that were in flight at once.
    #[must_use]
    pub fn max_concurrent_fetches(&self) -> usize {
        self.fetches.peak.load(Ordering::SeqCst)
    }

    /// Highest number of lookups that were in flight at once.
    #[must_use]
    pub fn max_concurrent_lookups(&self) -> usize {
        self.lookups.peak.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl MerkleClient for MockMerkleClient {
    async fn fetch_root_by_freshness(&self, _max_age: Duration) -> MerkleResult<LogRoot> {
        let _in_flight = self.fetches.enter();
        let delay = self.state().fetch_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let mut state = self.state();
        if let Some(error) = &state.fetch_failure {
            return Err(error.clone());
        }
        let root = state.root.clone();
        if state.root_step > 0 {
            let next = Seqno(root.seqno.0.saturating_add(state.root_step));
            state.root = LogRoot::new(next, root.hash);
        }
        Ok(root)
    }

    fn first_usable_seqno(&self) -> Option<Seqno> {
        self.state().first_usable
    }

    async fn lookup_leaf(
        &self,
        _group: &GroupId,
        position: Seqno,
        _head: &LogRoot,
    ) -> MerkleResult<Option<LeafTail>> {
        let _in_flight = self.lookups.enter();
        let delay = self.state().lookup_delay;
        if !delay.is_zero() {
            tokio::time::sleep(delay).await;
        }
        let state = self.state();
        if let Some(error) = &state.lookup_failure {
            return Err(error.clone());
        }
        Ok(state
            .leaves
            .range(..=position)
            .next_back()
            .map(|(_, tail)| *tail))
    }
}

/// A [`KvStore`] wrapper that counts traffic and can refuse writes.
pub struct FlakyKvStore {
    inner: Arc<dyn KvStore>,
    fail_writes: AtomicBool,
    reads: AtomicUsize,
    writes: AtomicUsize,
}

impl std::fmt::Debug for FlakyKvStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlakyKvStore")
            .field("fail_writes", &self.fail_writes)
            .field("reads", &self.reads)
            .field("writes", &self.writes)
            .finish_non_exhaustive()
    }
}

impl FlakyKvStore {
    /// Wrap `inner`, passing everything through.
    #[must_use]
    pub fn new(inner: Arc<dyn KvStore>) -> Self {
        Self {
            inner,
            fail_writes: AtomicBool::new(false),
            reads: AtomicUsize::new(0),
            writes: AtomicUsize::new(0),
        }
    }

    /// Make writes fail with [`StorageError::Internal`] (or stop doing so).
    pub fn fail_writes(&self, fail: bool) {
        self.fail_writes.store(fail, Ordering::SeqCst);
    }

    /// Reads attempted so far.
    #[must_use]
    pub fn read_count(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }

    /// Writes attempted so far, including refused ones.
    #[must_use]
    pub fn write_count(&self) -> usize {
        self.writes.load(Ordering::SeqCst)
    }

    fn check_write(&self) -> StorageResult<()> {
        self.writes.fetch_add(1, Ordering::SeqCst);
        if self.fail_writes.load(Ordering::SeqCst) {
            return Err(StorageError::Internal("injected write failure".to_string()));
        }
        Ok(())
    }
}

#[async_trait]
impl KvStore for FlakyKvStore {
    async fn get(&self, namespace: &str, key: &str) -> StorageResult<Option<Vec<u8>>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.get(namespace, key).await
    }

    async fn set(&self, namespace: &str, key: &str, value: Vec<u8>) -> StorageResult<()> {
        self.check_write()?;
        self.inner.set(namespace, key, value).await
    }

    async fn delete(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.check_write()?;
        self.inner.delete(namespace, key).await
    }

    async fn exists(&self, namespace: &str, key: &str) -> StorageResult<bool> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.exists(namespace, key).await
    }

    async fn list_keys(&self, namespace: &str) -> StorageResult<Vec<String>> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.inner.list_keys(namespace).await
    }

    async fn clear_namespace(&self, namespace: &str) -> StorageResult<u64> {
        self.check_write()?;
        self.inner.clear_namespace(namespace).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fixtures;
    use vigil_storage::MemoryKvStore;

    #[tokio::test]
    async fn test_leaf_oracle_sees_latest_publication() {
        let client = MockMerkleClient::new(fixtures::root(100));
        client.add_leaf(Seqno(10), Seqno(1), fixtures::link_id(1));
        client.add_leaf(Seqno(20), Seqno(2), fixtures::link_id(2));
        let id = fixtures::group_id(1, false);
        let head = fixtures::root(100);

        assert_eq!(client.lookup_leaf(&id, Seqno(9), &head).await.unwrap(), None);
        let at_15 = client.lookup_leaf(&id, Seqno(15), &head).await.unwrap().unwrap();
        assert_eq!(at_15.chain_seqno, Seqno(1));
        let at_20 = client.lookup_leaf(&id, Seqno(20), &head).await.unwrap().unwrap();
        assert_eq!(at_20.link_id, fixtures::link_id(2));
        assert_eq!(client.lookup_count(), 3);
        assert_eq!(client.max_concurrent_lookups(), 1);
    }

    #[tokio::test]
    async fn test_fetch_failure_injection() {
        let client = MockMerkleClient::new(fixtures::root(5));
        client.fail_fetch(MerkleError::Unavailable("down".into()));
        assert!(client.fetch_root_by_freshness(Duration::from_secs(1)).await.is_err());
        client.clear_failures();
        let root = client.fetch_root_by_freshness(Duration::from_secs(1)).await.unwrap();
        assert_eq!(root.seqno, Seqno(5));
        assert_eq!(client.fetch_count(), 2);
    }

    #[tokio::test]
    async fn test_root_step_grows_the_log() {
        let client = MockMerkleClient::new(fixtures::root(5)).with_root_step(10);
        let max_age = Duration::from_secs(1);
        assert_eq!(client.fetch_root_by_freshness(max_age).await.unwrap().seqno, Seqno(5));
        assert_eq!(client.fetch_root_by_freshness(max_age).await.unwrap().seqno, Seqno(15));
    }

    #[tokio::test]
    async fn test_flaky_store_counts_and_fails() {
        let store = FlakyKvStore::new(Arc::new(MemoryKvStore::new()));
        store.set("ns", "a", vec![1]).await.unwrap();
        store.fail_writes(true);
        assert!(store.set("ns", "b", vec![2]).await.is_err());
        assert_eq!(store.get("ns", "a").await.unwrap(), Some(vec![1]));
        assert_eq!(store.get("ns", "b").await.unwrap(), None);
        assert_eq!(store.write_count(), 2);
        assert_eq!(store.read_count(), 2);
    }
}
