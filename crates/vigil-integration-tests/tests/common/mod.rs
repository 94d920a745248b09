//! Shared test harness for integration tests.

use std::sync::Arc;

use vigil_audit::{AuditParams, AuditResult, Auditor};
use vigil_core::{ChainLinks, GroupId, MerkleClient, Seqno};
use vigil_storage::{KvStore, MemoryKvStore};
use vigil_sync::CancellationToken;
use vigil_test::{FlakyKvStore, MockMerkleClient, fixtures};

/// Log positions between consecutive chain links.
#[allow(dead_code)]
pub const LINK_SPACING: u64 = 10;

/// An auditor wired to a mock log and a fault-injecting in-memory store.
///
/// Link `k` of every group's chain is published at log position
/// `LINK_SPACING * k`.
#[allow(dead_code)]
pub struct AuditHarness {
    /// The auditor under test.
    pub auditor: Arc<Auditor>,
    /// The mock log client.
    pub client: Arc<MockMerkleClient>,
    /// The store behind the auditor's durable tier.
    pub store: Arc<FlakyKvStore>,
    /// The raw store, for building a second auditor over the same data.
    pub backing: Arc<MemoryKvStore>,
    /// Token passed to every call.
    pub cancel: CancellationToken,
}

#[allow(dead_code)]
impl AuditHarness {
    /// A harness with default parameters, a log at `fresh` and `links`
    /// published chain links.
    pub fn new(fresh: u64, links: u64) -> Self {
        Self::with_params(fresh, links, AuditParams::default())
    }

    /// A harness with custom parameters.
    pub fn with_params(fresh: u64, links: u64, params: AuditParams) -> Self {
        Self::with_client(
            MockMerkleClient::new(fixtures::root(fresh)).with_first_usable(Seqno(1)),
            links,
            params,
        )
    }

    /// A harness around a preconfigured client.
    pub fn with_client(client: MockMerkleClient, links: u64, params: AuditParams) -> Self {
        fixtures::init_test_logging();
        let client = Arc::new(client);
        let backing = Arc::new(MemoryKvStore::new());
        let store = Arc::new(FlakyKvStore::new(
            Arc::clone(&backing) as Arc<dyn KvStore>
        ));
        let auditor = Auditor::new(
            Arc::clone(&client) as Arc<dyn MerkleClient>,
            Arc::clone(&store) as Arc<dyn KvStore>,
            params,
        )
        .expect("failed to build auditor");

        let harness = Self {
            auditor: Arc::new(auditor),
            client,
            store,
            backing,
            cancel: CancellationToken::new(),
        };
        harness.publish(1, links);
        harness
    }

    /// Publish links `from..=to` at their log positions.
    pub fn publish(&self, from: u64, to: u64) {
        for k in from..=to {
            let position = Seqno(LINK_SPACING.saturating_mul(k));
            self.client.add_leaf(position, Seqno(k), fixtures::link_id(k));
        }
    }

    /// Audit `group` as a caller that loaded it at log root `head` with a
    /// chain of `links` links.
    pub async fn audit(&self, group: &GroupId, head: u64, links: u64) -> AuditResult<()> {
        audit_with(&self.auditor, &self.cancel, group, head, links).await
    }
}

/// Run one audit against `auditor` with a linear chain of `links` links.
#[allow(dead_code)]
pub async fn audit_with(
    auditor: &Auditor,
    cancel: &CancellationToken,
    group: &GroupId,
    head: u64,
    links: u64,
) -> AuditResult<()> {
    let chain: ChainLinks = fixtures::linear_chain(links);
    auditor
        .audit_group(
            cancel,
            group,
            group.is_public(),
            &fixtures::root(head),
            &chain,
            Seqno(links),
        )
        .await
}
