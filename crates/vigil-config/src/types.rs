use std::path::PathBuf;

use serde::{Deserialize, Serialize};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Audit pass tuning.
    pub audit: AuditSection,
    /// In-memory history cache.
    pub cache: CacheSection,
    /// Durable history store.
    pub storage: StorageSection,
    /// Logging and tracing.
    pub logging: LoggingSection,
}

// ---------------------------------------------------------------------------
// AuditSection
// ---------------------------------------------------------------------------

/// Thresholds and fan-out of a single audit pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AuditSection {
    /// Maximum age, in seconds, of the log root an audit may rely on.
    pub root_freshness_secs: u64,
    /// How far the log must advance past the last audited root before a new
    /// pass probes again.
    pub merkle_movement_trigger: u64,
    /// Historical roots sampled at or below the caller's head.
    pub num_pre_probes: usize,
    /// Roots sampled between the caller's head and the fresh root.
    pub num_post_probes: usize,
    /// Probes verified concurrently within one pass.
    pub probe_concurrency: usize,
}

impl Default for AuditSection {
    fn default() -> Self {
        Self {
            root_freshness_secs: 60,
            merkle_movement_trigger: 1000,
            num_pre_probes: 25,
            num_post_probes: 25,
            probe_concurrency: 4,
        }
    }
}

// ---------------------------------------------------------------------------
// CacheSection
// ---------------------------------------------------------------------------

/// Memory-tier cache settings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct CacheSection {
    /// Maximum number of group histories kept in memory.
    pub capacity: usize,
}

impl Default for CacheSection {
    fn default() -> Self {
        Self { capacity: 10_000 }
    }
}

// ---------------------------------------------------------------------------
// StorageSection
// ---------------------------------------------------------------------------

/// Durable store settings.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageSection {
    /// Directory of the persistent store. Unset means histories are kept in
    /// process memory only.
    pub path: Option<PathBuf>,
}

// ---------------------------------------------------------------------------
// LoggingSection
// ---------------------------------------------------------------------------

/// Logging and tracing configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingSection {
    /// Global level filter (`"trace"`, `"debug"`, `"info"`, `"warn"`,
    /// `"error"`).
    pub level: String,
    /// `"pretty"`, `"compact"`, `"json"` or `"full"`.
    pub format: String,
    /// Per-crate directives such as `"vigil_audit=debug"`.
    pub directives: Vec<String>,
}

impl Default for LoggingSection {
    fn default() -> Self {
        Self {
            level: "info".to_owned(),
            format: "compact".to_owned(),
            directives: Vec::new(),
        }
    }
}
