//! Log snapshots.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::{LinkId, RootHash, Seqno};

/// A trusted snapshot of the tamper-evident log.
///
/// Produced by a [`MerkleClient`](crate::MerkleClient); the auditor only
/// reads these.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LogRoot {
    /// Position of this root in the log.
    pub seqno: Seqno,
    /// Root hash committing to every entry up to `seqno`.
    pub hash: RootHash,
    /// When the client obtained this root.
    pub fetched_at: DateTime<Utc>,
}

impl LogRoot {
    /// Create a root fetched now.
    #[must_use]
    pub fn new(seqno: Seqno, hash: RootHash) -> Self {
        Self {
            seqno,
            hash,
            fetched_at: Utc::now(),
        }
    }
}

/// The log's record of a group at some root: the group's latest chain
/// link as of that root.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LeafTail {
    /// Chain sequence number of the latest link.
    pub chain_seqno: Seqno,
    /// Identifier of that link.
    pub link_id: LinkId,
}
