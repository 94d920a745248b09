//! Test fixtures for common types.

use vigil_core::{ChainLinks, GroupId, LinkId, LogRoot, RootHash, Seqno};
use vigil_telemetry::{LogConfig, LogTarget, setup_logging};

/// A deterministic group id distinguished by `n`.
#[must_use]
pub fn group_id(n: u8, public: bool) -> GroupId {
    let mut body = [0u8; 15];
    body[0] = 0x5a;
    body[14] = n;
    GroupId::from_parts(body, public, false)
}

/// A deterministic link id for chain seqno `n`.
#[must_use]
pub fn link_id(n: u64) -> LinkId {
    let mut bytes = [0u8; 32];
    bytes[..8].copy_from_slice(&n.to_be_bytes());
    bytes[31] = 0x1d;
    LinkId::from_bytes(bytes)
}

/// A log root at `seqno`, fetched now.
#[must_use]
pub fn root(seqno: u64) -> LogRoot {
    let mut bytes = [0u8; 32];
    bytes[24..].copy_from_slice(&seqno.to_be_bytes());
    LogRoot::new(Seqno(seqno), RootHash::from_bytes(bytes))
}

/// A chain whose links `1..=len` are [`link_id`] of their seqno.
#[must_use]
pub fn linear_chain(len: u64) -> ChainLinks {
    (1..=len).map(|n| (Seqno(n), link_id(n))).collect()
}

/// Route `tracing` output through the test harness' captured writer.
///
/// `RUST_LOG` overrides the default `debug` level. Safe to call from every
/// test; only the first call installs anything.
pub fn init_test_logging() {
    let level = std::env::var("RUST_LOG").unwrap_or_else(|_| "debug".to_owned());
    let config = LogConfig::new(level)
        .with_target(LogTarget::Test)
        .without_timestamps();
    // Later calls find the subscriber already set.
    let _ = setup_logging(&config);
}
