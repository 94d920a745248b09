//! The audit entry point.
//!
//! One call to [`Auditor::audit_group`] runs at most one audit pass for one
//! group:
//!
//! 1. validate the caller's visibility claim
//! 2. take the group's single-flight lock
//! 3. load the cached history
//! 4. stop if the caller's chain has not moved since the last pass
//! 5. fetch a fresh log root
//! 6. stop if the log has not moved far enough since the last pass
//! 7. copy the history (or start one)
//! 8. sample and verify probes
//! 9. append a record and write the history back
//!
//! The lock is released on every exit path.

use std::sync::Arc;

use chrono::Utc;
use tracing::{Instrument, debug, info, info_span, warn};
use vigil_config::Config;
use vigil_core::{ChainLinks, GroupId, LogRoot, MerkleClient, Seqno};
use vigil_storage::KvStore;
use vigil_sync::{CancellationToken, LockTable, Pipeliner, cancellable};

use crate::cache::AuditCache;
use crate::error::{AuditError, AuditResult};
use crate::history::{AuditHistory, AuditRecord};
use crate::params::AuditParams;
use crate::probe::{Probe, ProbeRanges, check_leaf, plan_probes};
use crate::store::open_store;

/// Whether the log has moved too little since `last_merkle` for a new pass.
///
/// A fresh root behind the recorded one counts as recent.
fn is_recent(last_merkle: Seqno, fresh: Seqno, trigger: u64) -> bool {
    fresh < last_merkle || fresh.saturating_distance_from(last_merkle) < trigger
}

/// Everything one probe task needs, shared across the pass.
struct ProbeContext {
    client: Arc<dyn MerkleClient>,
    group: GroupId,
    head: LogRoot,
    chain: ChainLinks,
    max_chain_seqno: Seqno,
}

impl ProbeContext {
    async fn verify(&self, probe: Probe) -> AuditResult<()> {
        let leaf = self
            .client
            .lookup_leaf(&self.group, probe.position, &self.head)
            .await?;
        check_leaf(probe, leaf, &self.chain, self.max_chain_seqno)
    }
}

/// Audits groups against the log, one pass per group at a time.
pub struct Auditor {
    client: Arc<dyn MerkleClient>,
    cache: AuditCache,
    locks: LockTable,
    params: AuditParams,
}

impl std::fmt::Debug for Auditor {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Auditor")
            .field("params", &self.params)
            .field("locks_held", &self.locks.len())
            .finish_non_exhaustive()
    }
}

impl Auditor {
    /// Create an auditor over a log client and a durable store.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store rejects the audit namespace.
    pub fn new(
        client: Arc<dyn MerkleClient>,
        store: Arc<dyn KvStore>,
        params: AuditParams,
    ) -> AuditResult<Self> {
        let cache = AuditCache::new(store, params.cache_capacity)?;
        Ok(Self {
            client,
            cache,
            locks: LockTable::new(),
            params,
        })
    }

    /// Create an auditor from loaded configuration, opening the configured
    /// store.
    ///
    /// # Errors
    ///
    /// Returns a storage error if the store cannot be opened.
    pub fn from_config(client: Arc<dyn MerkleClient>, config: &Config) -> AuditResult<Self> {
        let store = open_store(&config.storage)?;
        Self::new(client, store, AuditParams::from(config))
    }

    /// The parameters this auditor runs with.
    #[must_use]
    pub fn params(&self) -> &AuditParams {
        &self.params
    }

    /// The history cache.
    #[must_use]
    pub fn cache(&self) -> &AuditCache {
        &self.cache
    }

    /// Audit `id` given the caller's view of it: the log root `head` the
    /// caller loaded the group at, its chain links, and the chain seqno it
    /// has verified through.
    ///
    /// Returns `Ok(())` both after a completed pass and when no pass was
    /// needed.
    ///
    /// # Errors
    ///
    /// - [`AuditError::BadVisibility`] before any work if `is_public` does
    ///   not match the id
    /// - [`AuditError::Cancelled`] if `cancel` fires while waiting
    /// - a storage or upstream error, unchanged
    /// - an audit error if a probe contradicts the caller's chain
    pub async fn audit_group(
        &self,
        cancel: &CancellationToken,
        id: &GroupId,
        is_public: bool,
        head: &LogRoot,
        chain: &ChainLinks,
        max_chain_seqno: Seqno,
    ) -> AuditResult<()> {
        if id.is_public() != is_public {
            return Err(AuditError::BadVisibility {
                id: id.clone(),
                asserted: is_public,
                actual: id.is_public(),
            });
        }

        let span = info_span!("audit", group = %id, chain = %max_chain_seqno, head = %head.seqno);
        async {
            let lease = self.locks.acquire(id.as_str(), cancel).await?;
            let result = self
                .audit_locked(cancel, id, is_public, head, chain, max_chain_seqno)
                .await;
            lease.release();
            if let Err(e) = &result {
                warn!(error = %e, kind = ?e.kind(), "audit failed");
            }
            result
        }
        .instrument(span)
        .await
    }

    /// Drop every cached history from memory. Durable copies are kept.
    pub fn on_logout(&self) {
        self.cache.reset();
        info!("audit cache reset on logout");
    }

    async fn audit_locked(
        &self,
        cancel: &CancellationToken,
        id: &GroupId,
        is_public: bool,
        head: &LogRoot,
        chain: &ChainLinks,
        max_chain_seqno: Seqno,
    ) -> AuditResult<()> {
        // A logout during this pass must not refill the fresh tier.
        let tier = self.cache.tier();
        let cached = cancellable(cancel, self.cache.get_in(&tier, id)).await??;

        let last = cached.as_deref().and_then(AuditHistory::last_audit);
        if let Some(last) = last
            && last.max_chain_seqno == max_chain_seqno
        {
            debug!("AUDIT: chain unchanged since last audit, skipping");
            return Ok(());
        }

        let fresh = cancellable(
            cancel,
            self.client.fetch_root_by_freshness(self.params.root_freshness),
        )
        .await??;

        if let Some(last) = last {
            if is_recent(
                last.max_merkle_seqno,
                fresh.seqno,
                self.params.merkle_movement_trigger,
            ) {
                debug!(
                    last = %last.max_merkle_seqno,
                    fresh = %fresh.seqno,
                    "AUDIT: log moved too little since last audit, skipping"
                );
                return Ok(());
            }
            if max_chain_seqno < last.max_chain_seqno {
                return Err(AuditError::ChainRollback {
                    recorded: last.max_chain_seqno,
                    requested: max_chain_seqno,
                });
            }
        }

        let mut history = match cached {
            Some(h) => AuditHistory::clone(&h),
            None => AuditHistory::new(id.clone(), is_public),
        };

        let first = self
            .client
            .first_usable_seqno()
            .ok_or(AuditError::NoFirstSeqno)?;
        let ranges = ProbeRanges {
            first,
            head: head.seqno,
            fresh: fresh.seqno,
        };
        let probes = plan_probes(&mut rand::thread_rng(), &mut history, ranges, &self.params);
        let max_merkle_probe = probes
            .iter()
            .map(|p| p.position)
            .max()
            .unwrap_or_default();
        debug!(probes = probes.len(), first = %first, fresh = %fresh.seqno, "AUDIT: probing");

        let context = Arc::new(ProbeContext {
            client: Arc::clone(&self.client),
            group: id.clone(),
            head: head.clone(),
            chain: chain.clone(),
            max_chain_seqno,
        });
        self.run_probes(cancel, context, probes).await?;

        history.audits.push(AuditRecord {
            max_merkle_seqno: fresh.seqno,
            max_chain_seqno,
            max_merkle_probe,
            time: Utc::now(),
        });
        let pass = history.audits.len();
        cancellable(cancel, self.cache.put_in(&tier, id, Arc::new(history))).await??;
        info!(pass, merkle = %fresh.seqno, "audit pass committed");
        Ok(())
    }

    async fn run_probes(
        &self,
        cancel: &CancellationToken,
        context: Arc<ProbeContext>,
        probes: Vec<Probe>,
    ) -> AuditResult<()> {
        if probes.is_empty() {
            return Ok(());
        }
        let pipeliner = Arc::new(Pipeliner::<AuditError>::new(self.params.probe_concurrency));

        for probe in probes {
            if pipeliner.is_failed() {
                break;
            }
            pipeliner.wait_for_room(cancel).await?;
            if pipeliner.is_failed() {
                // Hand the reserved slot straight back.
                pipeliner.complete_one(Ok(()));
                break;
            }

            let pipeliner = Arc::clone(&pipeliner);
            let context = Arc::clone(&context);
            let cancel = cancel.clone();
            tokio::spawn(async move {
                let result = match cancellable(&cancel, context.verify(probe)).await {
                    Ok(r) => r,
                    Err(e) => Err(e.into()),
                };
                pipeliner.complete_one(result);
            });
        }

        pipeliner.flush(cancel).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::num::NonZeroUsize;
    use std::time::Duration;
    use vigil_core::MerkleError;
    use vigil_storage::MemoryKvStore;
    use vigil_test::{MockMerkleClient, fixtures};

    const GROUP: u8 = 1;

    fn auditor(client: &Arc<MockMerkleClient>, params: AuditParams) -> Auditor {
        Auditor::new(
            Arc::clone(client) as Arc<dyn MerkleClient>,
            Arc::new(MemoryKvStore::new()),
            params,
        )
        .unwrap()
    }

    fn client_with_chain(fresh: u64, chain_len: u64) -> Arc<MockMerkleClient> {
        // Link k lands in the log at position 10 * k.
        let client = MockMerkleClient::new(fixtures::root(fresh)).with_first_usable(Seqno(1));
        for k in 1..=chain_len {
            client.add_leaf(Seqno(k.saturating_mul(10)), Seqno(k), fixtures::link_id(k));
        }
        Arc::new(client)
    }

    #[test]
    fn test_is_recent() {
        assert!(is_recent(Seqno(100), Seqno(1099), 1000));
        assert!(!is_recent(Seqno(100), Seqno(1100), 1000));
        // Rollback of the log root.
        assert!(is_recent(Seqno(100), Seqno(50), 0));
        assert!(!is_recent(Seqno(100), Seqno(100), 0));
    }

    #[tokio::test]
    async fn test_first_pass_records_and_persists() {
        let client = client_with_chain(60, 5);
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();

        auditor
            .audit_group(
                &cancel,
                &id,
                false,
                &fixtures::root(50),
                &fixtures::linear_chain(5),
                Seqno(5),
            )
            .await
            .unwrap();

        let history = auditor.cache().get(&id).await.unwrap().unwrap();
        assert_eq!(history.audits.len(), 1);
        let record = &history.audits[0];
        assert_eq!(record.max_merkle_seqno, Seqno(60));
        assert_eq!(record.max_chain_seqno, Seqno(5));
        // [1, 50] has 50 positions, sample 25; (50, 60] has 10, take all.
        assert_eq!(history.pre_probes.len(), 25);
        assert_eq!(history.post_probes.len(), 10);
        assert!(history.pre_probes.values().all(|pass| *pass == 0));
        assert_eq!(record.max_merkle_probe, Seqno(60));
        assert_eq!(client.fetch_count(), 1);
        assert_eq!(client.lookup_count(), 35);
        assert!(client.max_concurrent_lookups() <= 4);
    }

    #[tokio::test]
    async fn test_bad_visibility_takes_no_lock() {
        let client = client_with_chain(10, 1);
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, true);

        let err = auditor
            .audit_group(
                &CancellationToken::new(),
                &id,
                false,
                &fixtures::root(10),
                &ChainLinks::new(),
                Seqno(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::BadVisibility { asserted: false, actual: true, .. }));
        assert_eq!(client.fetch_count(), 0);
        assert_eq!(auditor.locks.len(), 0);
    }

    #[tokio::test]
    async fn test_unchanged_chain_skips_fetch() {
        let client = client_with_chain(60, 5);
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();
        let chain = fixtures::linear_chain(5);

        for _ in 0..3 {
            auditor
                .audit_group(&cancel, &id, false, &fixtures::root(50), &chain, Seqno(5))
                .await
                .unwrap();
        }
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_recent_root_skips_probes() {
        let client = client_with_chain(60, 6);
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();

        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(50), &fixtures::linear_chain(5), Seqno(5))
            .await
            .unwrap();
        let lookups = client.lookup_count();

        // New chain data, but the log moved by less than the trigger.
        client.set_root(fixtures::root(70));
        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(60), &fixtures::linear_chain(6), Seqno(6))
            .await
            .unwrap();

        assert_eq!(client.fetch_count(), 2);
        assert_eq!(client.lookup_count(), lookups);
        let history = auditor.cache().get(&id).await.unwrap().unwrap();
        assert_eq!(history.audits.len(), 1);
    }

    #[tokio::test]
    async fn test_second_pass_appends_and_avoids_resampling() {
        let client = client_with_chain(60, 6);
        let params = AuditParams {
            merkle_movement_trigger: 5,
            num_pre_probes: 10,
            ..AuditParams::default()
        };
        let auditor = auditor(&client, params);
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();

        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(50), &fixtures::linear_chain(5), Seqno(5))
            .await
            .unwrap();
        client.set_root(fixtures::root(70));
        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(60), &fixtures::linear_chain(6), Seqno(6))
            .await
            .unwrap();

        let history = auditor.cache().get(&id).await.unwrap().unwrap();
        assert_eq!(history.audits.len(), 2);
        assert!(history.audits[0].max_chain_seqno <= history.audits[1].max_chain_seqno);
        assert_eq!(history.pre_probes.len(), 20);
        assert_eq!(history.pre_probes.values().filter(|p| **p == 1).count(), 10);
    }

    #[tokio::test]
    async fn test_chain_rollback_rejected() {
        let client = client_with_chain(60, 5);
        let params = AuditParams {
            merkle_movement_trigger: 1,
            ..AuditParams::default()
        };
        let auditor = auditor(&client, params);
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();

        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(50), &fixtures::linear_chain(5), Seqno(5))
            .await
            .unwrap();
        client.set_root(fixtures::root(80));
        let err = auditor
            .audit_group(&cancel, &id, false, &fixtures::root(30), &fixtures::linear_chain(3), Seqno(3))
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            AuditError::ChainRollback {
                recorded: Seqno(5),
                requested: Seqno(3)
            }
        ));
    }

    #[tokio::test]
    async fn test_no_first_seqno() {
        let client = Arc::new(MockMerkleClient::new(fixtures::root(10)));
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);

        let err = auditor
            .audit_group(
                &CancellationToken::new(),
                &id,
                false,
                &fixtures::root(10),
                &ChainLinks::new(),
                Seqno(1),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::NoFirstSeqno));
        assert!(auditor.cache().get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_upstream_error_propagates_unchanged() {
        let client = client_with_chain(60, 5);
        client.fail_fetch(MerkleError::Stale { max_age_secs: 60 });
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);

        let err = auditor
            .audit_group(
                &CancellationToken::new(),
                &id,
                false,
                &fixtures::root(50),
                &fixtures::linear_chain(5),
                Seqno(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Upstream(MerkleError::Stale { max_age_secs: 60 })));
        assert!(err.is_retryable());
        assert!(auditor.locks.is_empty());
    }

    #[tokio::test]
    async fn test_forged_leaf_fails_without_commit() {
        let client = client_with_chain(60, 5);
        // The log disagrees with the caller about link 5 from position 50 on.
        client.add_leaf(Seqno(50), Seqno(5), fixtures::link_id(500));
        let params = AuditParams {
            num_pre_probes: 100,
            ..AuditParams::default()
        };
        let auditor = auditor(&client, params);
        let id = fixtures::group_id(GROUP, false);

        let err = auditor
            .audit_group(
                &CancellationToken::new(),
                &id,
                false,
                &fixtures::root(50),
                &fixtures::linear_chain(5),
                Seqno(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::ChainMismatch { chain_seqno: Seqno(5), .. }));
        assert!(auditor.cache().get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_failed_probe_stops_dispatch() {
        let client = client_with_chain(60, 5);
        client.fail_lookups(MerkleError::Verification("bad proof".into()));
        let params = AuditParams {
            probe_concurrency: NonZeroUsize::MIN,
            ..AuditParams::default()
        };
        let auditor = auditor(&client, params);
        let id = fixtures::group_id(GROUP, false);

        let err = auditor
            .audit_group(
                &CancellationToken::new(),
                &id,
                false,
                &fixtures::root(50),
                &fixtures::linear_chain(5),
                Seqno(5),
            )
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Upstream(MerkleError::Verification(_))));
        // One probe in flight at a time: only the failing one ran.
        assert_eq!(client.lookup_count(), 1);
        assert!(auditor.cache().get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_cancel_while_probing() {
        let client = client_with_chain(60, 5);
        client.set_lookup_delay(Duration::from_secs(30));
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();

        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });
        let err = auditor
            .audit_group(&cancel, &id, false, &fixtures::root(50), &fixtures::linear_chain(5), Seqno(5))
            .await
            .unwrap_err();
        assert!(matches!(err, AuditError::Cancelled));
        assert!(auditor.locks.is_empty());
        assert!(auditor.cache().get(&id).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_logout_keeps_durable_history() {
        let client = client_with_chain(60, 5);
        let auditor = auditor(&client, AuditParams::default());
        let id = fixtures::group_id(GROUP, false);
        let cancel = CancellationToken::new();
        let chain = fixtures::linear_chain(5);

        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(50), &chain, Seqno(5))
            .await
            .unwrap();
        auditor.on_logout();
        assert!(auditor.cache().tier().is_empty());

        // Still short-circuits: the history comes back from the durable tier.
        auditor
            .audit_group(&cancel, &id, false, &fixtures::root(50), &chain, Seqno(5))
            .await
            .unwrap();
        assert_eq!(client.fetch_count(), 1);
    }

    #[tokio::test]
    async fn test_from_config_in_memory() {
        let client = client_with_chain(10, 1);
        let mut config = Config::default();
        config.cache.capacity = 7;
        let auditor = Auditor::from_config(client as Arc<dyn MerkleClient>, &config).unwrap();
        assert_eq!(auditor.params().cache_capacity.get(), 7);
        assert_eq!(auditor.cache().capacity().get(), 7);
    }
}
