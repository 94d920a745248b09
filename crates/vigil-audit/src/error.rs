//! Audit error types.

use thiserror::Error;
use vigil_core::{GroupId, MerkleError, Seqno};
use vigil_storage::StorageError;
use vigil_sync::SyncError;

/// Broad class of an [`AuditError`], for callers deciding what to do next.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The request itself was malformed.
    Validation,
    /// The log or the caller's chain contradicts the audit history.
    Audit,
    /// The durable store failed.
    Storage,
    /// The log client failed.
    Upstream,
    /// The caller cancelled.
    Cancelled,
}

impl ErrorKind {
    /// Whether repeating the same request may succeed.
    #[must_use]
    pub const fn is_retryable(self) -> bool {
        matches!(self, Self::Storage | Self::Upstream | Self::Cancelled)
    }
}

/// Errors from an audit pass.
#[derive(Debug, Error)]
pub enum AuditError {
    /// The caller's visibility claim disagrees with the one encoded in the id.
    #[error("group {id}: caller asserted public={asserted}, id encodes public={actual}")]
    BadVisibility {
        /// The audited group.
        id: GroupId,
        /// What the caller claimed.
        asserted: bool,
        /// What the id encodes.
        actual: bool,
    },

    /// The log client cannot name a first verifiable root.
    #[error("log client has no usable first seqno")]
    NoFirstSeqno,

    /// The caller's chain is shorter than one already audited.
    #[error("chain rolled back: audited through {recorded}, caller has {requested}")]
    ChainRollback {
        /// Highest chain seqno in the audit history.
        recorded: Seqno,
        /// Chain seqno supplied by the caller.
        requested: Seqno,
    },

    /// The log recorded a different link than the caller's chain holds.
    #[error("log position {position}: link at chain seqno {chain_seqno} differs from the caller's chain")]
    ChainMismatch {
        /// Probed log position.
        position: Seqno,
        /// Chain seqno whose link differs.
        chain_seqno: Seqno,
    },

    /// A historical root records more of the chain than the caller has.
    #[error("log position {position}: leaf at chain seqno {leaf}, ahead of the caller's {max}")]
    LeafAhead {
        /// Probed log position.
        position: Seqno,
        /// Chain seqno recorded by the log.
        leaf: Seqno,
        /// Caller's chain seqno.
        max: Seqno,
    },

    /// A root newer than the caller's head records less of the chain.
    #[error("log position {position}: leaf at chain seqno {leaf}, behind the caller's {max}")]
    LeafBehind {
        /// Probed log position.
        position: Seqno,
        /// Chain seqno recorded by the log.
        leaf: Seqno,
        /// Caller's chain seqno.
        max: Seqno,
    },

    /// A root newer than the caller's head has no leaf for the group.
    #[error("log position {position}: no leaf for the group")]
    MissingLeaf {
        /// Probed log position.
        position: Seqno,
    },

    /// The durable store failed.
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// The log client failed.
    #[error(transparent)]
    Upstream(#[from] MerkleError),

    /// The caller's cancellation token fired.
    #[error("audit cancelled")]
    Cancelled,
}

impl AuditError {
    /// Classify this error.
    #[must_use]
    pub const fn kind(&self) -> ErrorKind {
        match self {
            Self::BadVisibility { .. } => ErrorKind::Validation,
            Self::NoFirstSeqno
            | Self::ChainRollback { .. }
            | Self::ChainMismatch { .. }
            | Self::LeafAhead { .. }
            | Self::LeafBehind { .. }
            | Self::MissingLeaf { .. } => ErrorKind::Audit,
            Self::Storage(_) => ErrorKind::Storage,
            Self::Upstream(_) => ErrorKind::Upstream,
            Self::Cancelled => ErrorKind::Cancelled,
        }
    }

    /// Shorthand for `self.kind().is_retryable()`.
    #[must_use]
    pub const fn is_retryable(&self) -> bool {
        self.kind().is_retryable()
    }
}

impl From<SyncError> for AuditError {
    fn from(e: SyncError) -> Self {
        match e {
            // A closed primitive only happens while tearing down.
            SyncError::Cancelled | SyncError::Closed => Self::Cancelled,
        }
    }
}

/// Result type for audit operations.
pub type AuditResult<T> = Result<T, AuditError>;
