//! Vigil Core - shared types for the merkle-audit engine.
//!
//! This crate provides:
//! - [`GroupId`], an audited group's identifier with its visibility encoded
//! - [`Seqno`], [`LinkId`] and [`RootHash`] primitives
//! - [`LogRoot`] and [`LeafTail`], snapshots handed out by the log
//! - The [`MerkleClient`] trait the auditor consumes
//!
//! # Example
//!
//! ```
//! use vigil_core::{GroupId, Seqno};
//!
//! let id: GroupId = "b5bb9d8014a0f9b1d61e21e796d78d2e".parse().unwrap();
//! assert!(id.is_public());
//! assert_eq!(Seqno(10).saturating_distance_from(Seqno(4)), 6);
//! ```

#![deny(unsafe_code)]
#![deny(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]
#![deny(clippy::unwrap_used)]
#![cfg_attr(test, allow(clippy::unwrap_used))]

pub mod prelude;

mod error;
mod group;
mod ids;
mod merkle;
mod root;

pub use error::{CoreError, CoreResult, MerkleError, MerkleResult};
pub use group::GroupId;
pub use ids::{LinkId, RootHash, Seqno};
pub use merkle::{ChainLinks, MerkleClient};
pub use root::{LeafTail, LogRoot};
