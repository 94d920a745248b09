//! Tunables of an audit pass.

use std::num::NonZeroUsize;
use std::time::Duration;

use vigil_config::{AuditSection, Config};

/// Parameters the [`Auditor`](crate::Auditor) runs with.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AuditParams {
    /// Maximum age of the log root a pass relies on.
    pub root_freshness: Duration,
    /// Log growth since the last pass below which no new pass is run.
    pub merkle_movement_trigger: u64,
    /// Positions sampled in `[first usable root, caller's head]`.
    pub num_pre_probes: usize,
    /// Positions sampled in `(caller's head, fresh root]`.
    pub num_post_probes: usize,
    /// Probes in flight at once.
    pub probe_concurrency: NonZeroUsize,
    /// Histories kept in the memory tier.
    pub cache_capacity: NonZeroUsize,
}

const DEFAULT_PROBE_CONCURRENCY: NonZeroUsize = non_zero(4);
const DEFAULT_CACHE_CAPACITY: NonZeroUsize = non_zero(10_000);

/// `n`, or 1 when `n` is 0. Validated configs never hold 0.
const fn non_zero(n: usize) -> NonZeroUsize {
    match NonZeroUsize::new(n) {
        Some(n) => n,
        None => NonZeroUsize::MIN,
    }
}

impl Default for AuditParams {
    fn default() -> Self {
        Self {
            root_freshness: Duration::from_secs(60),
            merkle_movement_trigger: 1000,
            num_pre_probes: 25,
            num_post_probes: 25,
            probe_concurrency: DEFAULT_PROBE_CONCURRENCY,
            cache_capacity: DEFAULT_CACHE_CAPACITY,
        }
    }
}

impl From<&AuditSection> for AuditParams {
    fn from(section: &AuditSection) -> Self {
        Self {
            root_freshness: Duration::from_secs(section.root_freshness_secs),
            merkle_movement_trigger: section.merkle_movement_trigger,
            num_pre_probes: section.num_pre_probes,
            num_post_probes: section.num_post_probes,
            probe_concurrency: non_zero(section.probe_concurrency),
            ..Self::default()
        }
    }
}

impl From<&Config> for AuditParams {
    fn from(config: &Config) -> Self {
        Self {
            cache_capacity: non_zero(config.cache.capacity),
            ..Self::from(&config.audit)
        }
    }
}
