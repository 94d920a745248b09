//! Per-group audit state.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use vigil_core::{GroupId, Seqno};

/// Outcome of one completed audit pass.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditRecord {
    /// Seqno of the fresh log root the pass ran against.
    pub max_merkle_seqno: Seqno,
    /// Caller's chain seqno at the time of the pass.
    pub max_chain_seqno: Seqno,
    /// Highest log position probed by the pass, 0 if none.
    pub max_merkle_probe: Seqno,
    /// When the pass completed.
    pub time: DateTime<Utc>,
}

/// Everything remembered about auditing one group.
///
/// `audits` is append-only and chronological. The probe maps record, for
/// every sampled log position, the index in `audits` of the pass that
/// sampled it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AuditHistory {
    /// The audited group.
    pub id: GroupId,
    /// Whether the group is public.
    pub public: bool,
    /// Completed passes, oldest first.
    pub audits: Vec<AuditRecord>,
    /// Positions sampled at or below the caller's head.
    #[serde(default)]
    pub pre_probes: BTreeMap<Seqno, usize>,
    /// Positions sampled between the caller's head and the fresh root.
    #[serde(default)]
    pub post_probes: BTreeMap<Seqno, usize>,
}

impl AuditHistory {
    /// An empty history for a group that was never audited.
    #[must_use]
    pub fn new(id: GroupId, public: bool) -> Self {
        Self {
            id,
            public,
            audits: Vec::new(),
            pre_probes: BTreeMap::new(),
            post_probes: BTreeMap::new(),
        }
    }

    /// The most recent pass, if any.
    #[must_use]
    pub fn last_audit(&self) -> Option<&AuditRecord> {
        self.audits.last()
    }

    /// Index the next pass will be recorded under.
    #[must_use]
    pub fn next_pass(&self) -> usize {
        self.audits.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vigil_test::fixtures;

    #[test]
    fn test_new_history_is_empty() {
        let h = AuditHistory::new(fixtures::group_id(1, false), false);
        assert!(h.last_audit().is_none());
        assert_eq!(h.next_pass(), 0);
    }

    #[test]
    fn test_json_shape() {
        let mut h = AuditHistory::new(fixtures::group_id(7, true), true);
        h.audits.push(AuditRecord {
            max_merkle_seqno: Seqno(1200),
            max_chain_seqno: Seqno(3),
            max_merkle_probe: Seqno(1190),
            time: DateTime::from_timestamp(1_700_000_000, 0).unwrap(),
        });
        h.pre_probes.insert(Seqno(40), 0);
        h.post_probes.insert(Seqno(1190), 0);

        let value = serde_json::to_value(&h).unwrap();
        assert_eq!(value["id"], h.id.as_str());
        assert_eq!(value["audits"][0]["max_merkle_seqno"], 1200);
        assert_eq!(value["pre_probes"]["40"], 0);

        let back: AuditHistory = serde_json::from_value(value).unwrap();
        assert_eq!(back, h);
        assert_eq!(back.next_pass(), 1);
    }

    #[test]
    fn test_probe_maps_default_when_absent() {
        let id = fixtures::group_id(2, false);
        let json = format!(r#"{{"id":"{id}","public":false,"audits":[]}}"#);
        let h: AuditHistory = serde_json::from_str(&json).unwrap();
        assert!(h.pre_probes.is_empty() && h.post_probes.is_empty());
    }
}
