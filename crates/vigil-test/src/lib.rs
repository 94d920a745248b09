//! Vigil Test - shared test utilities for the audit engine.
//!
//! This crate provides mock collaborators and fixtures used across the
//! vigil crates as a dev-dependency.
//!
//! # Usage
//!
//! ```rust,ignore
//! use vigil_test::{MockMerkleClient, fixtures};
//! use vigil_core::Seqno;
//!
//! let client = MockMerkleClient::new(fixtures::root(1200))
//!     .with_first_usable(Seqno(1));
//! client.add_leaf(Seqno(40), Seqno(1), fixtures::link_id(1));
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![deny(clippy::all)]
#![warn(unreachable_pub)]

pub mod fixtures;
pub mod mocks;

pub use mocks::*;
