//! Core error types.

use thiserror::Error;

/// Errors raised while parsing or constructing core values.
#[derive(Debug, Error)]
pub enum CoreError {
    /// A group identifier failed to parse.
    #[error("invalid group id {value:?}: {reason}")]
    InvalidGroupId {
        /// The rejected input.
        value: String,
        /// Why it was rejected.
        reason: String,
    },

    /// A digest (link id or root hash) failed to parse.
    #[error("invalid digest: {0}")]
    InvalidDigest(String),
}

/// Result type for core operations.
pub type CoreResult<T> = Result<T, CoreError>;

/// Errors reported by a [`MerkleClient`](crate::MerkleClient).
///
/// The auditor surfaces these to its caller unchanged.
#[derive(Debug, Clone, Error)]
pub enum MerkleError {
    /// The log service could not be reached or refused the request.
    #[error("log service unavailable: {0}")]
    Unavailable(String),

    /// No root satisfying the freshness bound could be obtained.
    #[error("no root fresher than {max_age_secs}s is available")]
    Stale {
        /// The requested maximum age, in seconds.
        max_age_secs: u64,
    },

    /// A proof returned by the log did not verify.
    #[error("proof verification failed: {0}")]
    Verification(String),
}

/// Result type for merkle client operations.
pub type MerkleResult<T> = Result<T, MerkleError>;
