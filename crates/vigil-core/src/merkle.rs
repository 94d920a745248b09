//! The log client interface consumed by the auditor.

use async_trait::async_trait;
use std::collections::BTreeMap;
use std::time::Duration;

use crate::error::MerkleResult;
use crate::group::GroupId;
use crate::ids::{LinkId, Seqno};
use crate::root::{LeafTail, LogRoot};

/// A group's sigchain as the auditor sees it: chain seqno to link id.
pub type ChainLinks = BTreeMap<Seqno, LinkId>;

/// Client of the tamper-evident log.
///
/// Implementations own transport and proof verification. Everything they
/// return is assumed to be already verified.
#[async_trait]
pub trait MerkleClient: Send + Sync {
    /// Fetch a root no older than `max_age`.
    ///
    /// # Errors
    ///
    /// Returns an error if no sufficiently fresh root can be obtained.
    async fn fetch_root_by_freshness(&self, max_age: Duration) -> MerkleResult<LogRoot>;

    /// The lowest root sequence number this client can still verify
    /// against, if known.
    fn first_usable_seqno(&self) -> Option<Seqno>;

    /// Look up `group`'s leaf in the historical root at `position`,
    /// proven consistent with `head`.
    ///
    /// Returns `None` when the group had no leaf at that root.
    ///
    /// # Errors
    ///
    /// Returns an error if the lookup or its proof fails.
    async fn lookup_leaf(
        &self,
        group: &GroupId,
        position: Seqno,
        head: &LogRoot,
    ) -> MerkleResult<Option<LeafTail>>;
}
