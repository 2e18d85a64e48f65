//! Candidate ranking.
//!
//! A single linear pass scores every successful candidate and keeps the
//! first one with the minimal score. Equal scores never displace an
//! earlier candidate, and a NaN score only wins when nothing finite has
//! been seen.

use hspace_core::{ClusterSnapshot, NodeIdx};
use hspace_placement::{CandidateOutcome, Scorer};
use tracing::trace;

/// The winning candidate of one planning step.
#[derive(Debug, Clone)]
pub struct Selection {
    pub snapshot: ClusterSnapshot,
    pub nodes: Vec<NodeIdx>,
    pub score: f64,
    /// Position of the winner in the allocator's list.
    pub index: usize,
    /// Number of successful candidates considered.
    pub viable: usize,
    /// Best score among the candidates that lost, if any.
    pub runner_up: Option<f64>,
}

/// Pick the lowest-scoring successful candidate, first one on ties.
///
/// Returns `None` when every candidate failed.
pub fn select_best<S: Scorer + ?Sized>(
    scorer: &S,
    candidates: Vec<CandidateOutcome>,
) -> Option<Selection> {
    let mut best: Option<Selection> = None;
    let mut runner_up: Option<f64> = None;
    let mut viable = 0;

    for (index, outcome) in candidates.into_iter().enumerate() {
        let CandidateOutcome::Success { snapshot, nodes } = outcome else {
            continue;
        };
        viable += 1;
        let score = scorer.score(&snapshot);
        trace!(index, ?nodes, score, "candidate scored");

        let wins = best.as_ref().is_none_or(|b| improves(score, b.score));
        if wins {
            if let Some(previous) = best.take() {
                runner_up = Some(lower(runner_up, previous.score));
            }
            best = Some(Selection {
                snapshot,
                nodes,
                score,
                index,
                viable: 0,
                runner_up: None,
            });
        } else {
            runner_up = Some(lower(runner_up, score));
        }
    }

    best.map(|mut selection| {
        selection.viable = viable;
        selection.runner_up = runner_up;
        selection
    })
}

/// Strictly better: lower, or finite against NaN.
fn improves(candidate: f64, incumbent: f64) -> bool {
    candidate < incumbent || (incumbent.is_nan() && !candidate.is_nan())
}

fn lower(current: Option<f64>, score: f64) -> f64 {
    match current {
        Some(c) if !improves(score, c) => c,
        _ => score,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspace_core::{Node, PlacementFailure};

    /// Snapshots distinguishable by a single node's free memory; the
    /// scorer below reads that value back as the score.
    fn success(tag: u64, nodes: Vec<NodeIdx>) -> CandidateOutcome {
        let node = Node::new(0, "n0", 1_000_000, tag, 1, 1);
        CandidateOutcome::Success {
            snapshot: ClusterSnapshot::from_parts(vec![node], Vec::new()).unwrap(),
            nodes,
        }
    }

    fn failed(nodes: Vec<NodeIdx>) -> CandidateOutcome {
        CandidateOutcome::Failed {
            nodes,
            reason: PlacementFailure::N1Violation { node: 0 },
        }
    }

    fn free_memory(snapshot: &ClusterSnapshot) -> f64 {
        snapshot.node(0).map_or(f64::MAX, |n| n.free_memory as f64)
    }

    #[test]
    fn picks_lowest_score() {
        let candidates = vec![
            success(30, vec![0, 1]),
            success(10, vec![1, 2]),
            success(20, vec![2, 0]),
        ];
        let chosen = select_best(&free_memory, candidates).unwrap();
        assert_eq!(chosen.nodes, vec![1, 2]);
        assert_eq!(chosen.score, 10.0);
        assert_eq!(chosen.index, 1);
        assert_eq!(chosen.viable, 3);
        assert_eq!(chosen.runner_up, Some(20.0));
    }

    #[test]
    fn ties_keep_first_seen() {
        let constant = |_: &ClusterSnapshot| 1.0;
        for _ in 0..5 {
            let candidates = vec![
                success(1, vec![2, 1]),
                success(2, vec![0, 1]),
                success(3, vec![1, 0]),
            ];
            let chosen = select_best(&constant, candidates).unwrap();
            assert_eq!(chosen.nodes, vec![2, 1]);
            assert_eq!(chosen.index, 0);
            assert_eq!(chosen.runner_up, Some(1.0));
        }
    }

    #[test]
    fn failed_candidates_ignored() {
        let candidates = vec![
            failed(vec![0, 1]),
            success(50, vec![1, 0]),
            failed(vec![1, 2]),
        ];
        let chosen = select_best(&free_memory, candidates).unwrap();
        assert_eq!(chosen.nodes, vec![1, 0]);
        assert_eq!(chosen.index, 1);
        assert_eq!(chosen.viable, 1);
        assert_eq!(chosen.runner_up, None);
    }

    #[test]
    fn all_failed_selects_nothing() {
        let candidates = vec![failed(vec![0, 1]), failed(vec![1, 0])];
        assert!(select_best(&free_memory, candidates).is_none());
        assert!(select_best(&free_memory, Vec::new()).is_none());
    }

    #[test]
    fn nan_never_beats_finite() {
        let scorer = |s: &ClusterSnapshot| {
            if free_memory(s) == 1.0 {
                f64::NAN
            } else {
                free_memory(s)
            }
        };
        let candidates = vec![success(1, vec![0]), success(5, vec![1]), success(3, vec![2])];
        let chosen = select_best(&scorer, candidates).unwrap();
        assert_eq!(chosen.nodes, vec![2]);
        assert_eq!(chosen.runner_up, Some(5.0));
    }
}
