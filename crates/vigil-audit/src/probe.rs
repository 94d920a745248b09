//! Probe selection and leaf checks.
//!
//! A pass samples historical log positions in two ranges:
//!
//! - pre-probes in `[first usable, head]`, where the log may record at most
//!   the caller's chain;
//! - post-probes in `(head, fresh root]`, where the log must record at least
//!   the caller's chain.
//!
//! Positions already sampled by an earlier pass are never sampled again.

use std::collections::{BTreeMap, BTreeSet};

use rand::Rng;
use vigil_core::{ChainLinks, LeafTail, Seqno};

use crate::error::{AuditError, AuditResult};
use crate::history::AuditHistory;
use crate::params::AuditParams;

/// Which range a probe was drawn from.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ProbeKind {
    Pre,
    Post,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) struct Probe {
    pub(crate) kind: ProbeKind,
    pub(crate) position: Seqno,
}

/// Draw up to `target` distinct positions from `[lo, hi]` that are not keys
/// of `taken`, uniformly at random. Returned in ascending order.
pub(crate) fn sample_positions<R: Rng + ?Sized>(
    rng: &mut R,
    lo: Seqno,
    hi: Seqno,
    target: usize,
    taken: &BTreeMap<Seqno, usize>,
) -> Vec<Seqno> {
    if target == 0 || lo > hi {
        return Vec::new();
    }
    let width = hi.0.saturating_sub(lo.0).saturating_add(1);
    let already = u64::try_from(taken.range(lo..=hi).count()).unwrap_or(u64::MAX);
    let available = width.saturating_sub(already);
    let target_u64 = u64::try_from(target).unwrap_or(u64::MAX);

    if available <= target_u64 {
        // Few enough that the range is mostly sampled already; `width` is
        // bounded by `already + target` here.
        return (lo.0..=hi.0)
            .map(Seqno)
            .filter(|p| !taken.contains_key(p))
            .collect();
    }

    let mut chosen = BTreeSet::new();
    while chosen.len() < target {
        let p = Seqno(rng.gen_range(lo.0..=hi.0));
        if !taken.contains_key(&p) {
            chosen.insert(p);
        }
    }
    chosen.into_iter().collect()
}

/// Log positions bounding a pass.
#[derive(Debug, Clone, Copy)]
pub(crate) struct ProbeRanges {
    /// First root the client can verify against.
    pub(crate) first: Seqno,
    /// The caller's head root.
    pub(crate) head: Seqno,
    /// The freshly fetched root.
    pub(crate) fresh: Seqno,
}

/// Choose this pass's probes and record them in `history` under the index
/// the pass will be committed at.
pub(crate) fn plan_probes<R: Rng + ?Sized>(
    rng: &mut R,
    history: &mut AuditHistory,
    ranges: ProbeRanges,
    params: &AuditParams,
) -> Vec<Probe> {
    let pass = history.next_pass();
    let pre = sample_positions(
        rng,
        ranges.first,
        ranges.head,
        params.num_pre_probes,
        &history.pre_probes,
    );
    let post = match ranges.head.checked_next() {
        Some(after_head) => sample_positions(
            rng,
            after_head,
            ranges.fresh,
            params.num_post_probes,
            &history.post_probes,
        ),
        None => Vec::new(),
    };

    let mut probes = Vec::with_capacity(pre.len().saturating_add(post.len()));
    for position in pre {
        history.pre_probes.insert(position, pass);
        probes.push(Probe {
            kind: ProbeKind::Pre,
            position,
        });
    }
    for position in post {
        history.post_probes.insert(position, pass);
        probes.push(Probe {
            kind: ProbeKind::Post,
            position,
        });
    }
    probes
}

/// Check the log's leaf at a probed position against the caller's chain.
pub(crate) fn check_leaf(
    probe: Probe,
    leaf: Option<LeafTail>,
    chain: &ChainLinks,
    max_chain_seqno: Seqno,
) -> AuditResult<()> {
    let position = probe.position;
    let matches_chain = |tail: &LeafTail| match chain.get(&tail.chain_seqno) {
        Some(link) if *link != tail.link_id => Err(AuditError::ChainMismatch {
            position,
            chain_seqno: tail.chain_seqno,
        }),
        _ => Ok(()),
    };

    match (probe.kind, leaf) {
        // The group may not have existed yet at that root.
        (ProbeKind::Pre, None) => Ok(()),
        (ProbeKind::Pre, Some(tail)) => {
            if tail.chain_seqno > max_chain_seqno {
                return Err(AuditError::LeafAhead {
                    position,
                    leaf: tail.chain_seqno,
                    max: max_chain_seqno,
                });
            }
            matches_chain(&tail)
        },
        (ProbeKind::Post, None) => Err(AuditError::MissingLeaf { position }),
        (ProbeKind::Post, Some(tail)) => {
            if tail.chain_seqno < max_chain_seqno {
                return Err(AuditError::LeafBehind {
                    position,
                    leaf: tail.chain_seqno,
                    max: max_chain_seqno,
                });
            }
            // Links past the caller's chain are not ours to check.
            if tail.chain_seqno == max_chain_seqno {
                matches_chain(&tail)
            } else {
                Ok(())
            }
        },
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::history::AuditRecord;
    use rand::SeedableRng;
    use rand::rngs::StdRng;
    use vigil_test::fixtures;

    fn rng() -> StdRng {
        StdRng::seed_from_u64(7)
    }

    #[test]
    fn test_sample_takes_everything_when_range_is_small() {
        let mut taken = BTreeMap::new();
        taken.insert(Seqno(3), 0);
        let got = sample_positions(&mut rng(), Seqno(1), Seqno(5), 25, &taken);
        assert_eq!(got, vec![Seqno(1), Seqno(2), Seqno(4), Seqno(5)]);
    }

    #[test]
    fn test_sample_exact_count_distinct_in_range() {
        let mut taken = BTreeMap::new();
        for p in (100..200).step_by(2) {
            taken.insert(Seqno(p), 0);
        }
        let got = sample_positions(&mut rng(), Seqno(100), Seqno(1099), 25, &taken);
        assert_eq!(got.len(), 25);
        let distinct: BTreeSet<_> = got.iter().copied().collect();
        assert_eq!(distinct.len(), 25);
        for p in &got {
            assert!((100..=1099).contains(&p.0));
            assert!(!taken.contains_key(p));
        }
    }

    #[test]
    fn test_sample_empty_cases() {
        let none = BTreeMap::new();
        assert!(sample_positions(&mut rng(), Seqno(5), Seqno(4), 25, &none).is_empty());
        assert!(sample_positions(&mut rng(), Seqno(1), Seqno(100), 0, &none).is_empty());

        let mut full = BTreeMap::new();
        for p in 1..=10 {
            full.insert(Seqno(p), 0);
        }
        assert!(sample_positions(&mut rng(), Seqno(1), Seqno(10), 5, &full).is_empty());
    }

    #[test]
    fn test_sample_full_u64_range() {
        let got = sample_positions(&mut rng(), Seqno(0), Seqno(u64::MAX), 3, &BTreeMap::new());
        assert_eq!(got.len(), 3);
    }

    fn ranges(first: u64, head: u64, fresh: u64) -> ProbeRanges {
        ProbeRanges {
            first: Seqno(first),
            head: Seqno(head),
            fresh: Seqno(fresh),
        }
    }

    fn counts(num_pre_probes: usize, num_post_probes: usize) -> AuditParams {
        AuditParams {
            num_pre_probes,
            num_post_probes,
            ..AuditParams::default()
        }
    }

    #[test]
    fn test_plan_records_pass_index() {
        let mut history = AuditHistory::new(fixtures::group_id(1, false), false);
        history.pre_probes.insert(Seqno(2), 0);
        history.audits.push(AuditRecord {
            max_merkle_seqno: Seqno(2),
            max_chain_seqno: Seqno(1),
            max_merkle_probe: Seqno(2),
            time: chrono::Utc::now(),
        });

        let probes = plan_probes(&mut rng(), &mut history, ranges(1, 4, 6), &counts(25, 25));
        let pre: Vec<_> = probes
            .iter()
            .filter(|p| p.kind == ProbeKind::Pre)
            .map(|p| p.position)
            .collect();
        let post: Vec<_> = probes
            .iter()
            .filter(|p| p.kind == ProbeKind::Post)
            .map(|p| p.position)
            .collect();
        assert_eq!(pre, vec![Seqno(1), Seqno(3), Seqno(4)]);
        assert_eq!(post, vec![Seqno(5), Seqno(6)]);
        assert_eq!(history.pre_probes[&Seqno(2)], 0);
        assert_eq!(history.pre_probes[&Seqno(3)], 1);
        assert_eq!(history.post_probes[&Seqno(6)], 1);
    }

    #[test]
    fn test_plan_no_post_range_when_root_not_ahead() {
        let mut history = AuditHistory::new(fixtures::group_id(1, false), false);
        let probes = plan_probes(&mut rng(), &mut history, ranges(1, 10, 10), &counts(2, 2));
        assert_eq!(probes.len(), 2);
        assert!(probes.iter().all(|p| p.kind == ProbeKind::Pre));
        assert!(history.post_probes.is_empty());
    }

    fn pre(position: u64) -> Probe {
        Probe {
            kind: ProbeKind::Pre,
            position: Seqno(position),
        }
    }

    fn post(position: u64) -> Probe {
        Probe {
            kind: ProbeKind::Post,
            position: Seqno(position),
        }
    }

    fn tail(chain_seqno: u64) -> LeafTail {
        LeafTail {
            chain_seqno: Seqno(chain_seqno),
            link_id: fixtures::link_id(chain_seqno),
        }
    }

    #[test]
    fn test_pre_probe_checks() {
        let chain = fixtures::linear_chain(5);
        let max = Seqno(5);

        check_leaf(pre(10), None, &chain, max).unwrap();
        check_leaf(pre(10), Some(tail(3)), &chain, max).unwrap();
        assert!(matches!(
            check_leaf(pre(10), Some(tail(6)), &chain, max),
            Err(AuditError::LeafAhead { .. })
        ));

        let forged = LeafTail {
            chain_seqno: Seqno(3),
            link_id: fixtures::link_id(99),
        };
        assert!(matches!(
            check_leaf(pre(10), Some(forged), &chain, max),
            Err(AuditError::ChainMismatch { chain_seqno: Seqno(3), .. })
        ));
    }

    #[test]
    fn test_post_probe_checks() {
        let chain = fixtures::linear_chain(5);
        let max = Seqno(5);

        check_leaf(post(20), Some(tail(5)), &chain, max).unwrap();
        // Newer links than the caller knows about are fine.
        check_leaf(post(20), Some(tail(8)), &chain, max).unwrap();
        assert!(matches!(
            check_leaf(post(20), None, &chain, max),
            Err(AuditError::MissingLeaf { position: Seqno(20) })
        ));
        assert!(matches!(
            check_leaf(post(20), Some(tail(4)), &chain, max),
            Err(AuditError::LeafBehind { .. })
        ));

        let forged = LeafTail {
            chain_seqno: Seqno(5),
            link_id: fixtures::link_id(77),
        };
        assert!(matches!(
            check_leaf(post(20), Some(forged), &chain, max),
            Err(AuditError::ChainMismatch { .. })
        ));
    }
}
