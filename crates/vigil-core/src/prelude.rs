//! Prelude module - commonly used types for convenient import.
//!
//! Use `use vigil_core::prelude::*;` to import all essential types.

// Errors
pub use crate::{CoreError, CoreResult, MerkleError, MerkleResult};

// Identifiers
pub use crate::{GroupId, LinkId, RootHash, Seqno};

// Log snapshots and the client interface
pub use crate::{ChainLinks, LeafTail, LogRoot, MerkleClient};
