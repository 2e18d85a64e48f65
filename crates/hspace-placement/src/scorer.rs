//! Cluster balance scoring.
//!
//! Reduces a whole snapshot to one number, lower meaning better balanced.
//! The default [`BalanceScorer`] sums weighted components:
//! - **Memory spread**: std-dev of free-memory ratio across online nodes
//! - **Disk spread**: std-dev of free-disk ratio
//! - **Reservation spread**: std-dev of N+1 reserved-memory ratio
//! - **N+1 failures**: number of online nodes that cannot absorb a peer
//! - **Offline exposure**: instances still touching an offline node

use hspace_core::{ClusterSnapshot, Node};
use serde::{Deserialize, Serialize};

/// Computes a scalar balance score. Implementations must be pure.
pub trait Scorer {
    fn score(&self, snapshot: &ClusterSnapshot) -> f64;
}

impl<F> Scorer for F
where
    F: Fn(&ClusterSnapshot) -> f64,
{
    fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        self(snapshot)
    }
}

/// Weights for the scoring components. Missing fields keep their default
/// of 1.0 when deserialized.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ScoringWeights {
    pub free_memory: f64,
    pub free_disk: f64,
    pub reserved_memory: f64,
    pub n1_failures: f64,
    pub offline_instances: f64,
}

impl Default for ScoringWeights {
    fn default() -> Self {
        Self {
            free_memory: 1.0,
            free_disk: 1.0,
            reserved_memory: 1.0,
            n1_failures: 1.0,
            offline_instances: 1.0,
        }
    }
}

/// Individual score components, unweighted.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize)]
pub struct ScoreBreakdown {
    pub free_memory: f64,
    pub free_disk: f64,
    pub reserved_memory: f64,
    pub n1_failures: f64,
    pub offline_instances: f64,
}

impl ScoreBreakdown {
    pub fn weighted(&self, weights: &ScoringWeights) -> f64 {
        weights.free_memory * self.free_memory
            + weights.free_disk * self.free_disk
            + weights.reserved_memory * self.reserved_memory
            + weights.n1_failures * self.n1_failures
            + weights.offline_instances * self.offline_instances
    }
}

/// Standard-deviation based balance metric.
#[derive(Debug, Clone, Default)]
pub struct BalanceScorer {
    weights: ScoringWeights,
}

impl BalanceScorer {
    pub fn new(weights: ScoringWeights) -> Self {
        Self { weights }
    }

    pub fn weights(&self) -> &ScoringWeights {
        &self.weights
    }

    pub fn breakdown(&self, snapshot: &ClusterSnapshot) -> ScoreBreakdown {
        let online: Vec<&Node> = snapshot.online_nodes().collect();

        let free_memory = std_dev(online.iter().map(|n| ratio(n.free_memory, n.total_memory)));
        let free_disk = std_dev(online.iter().map(|n| ratio(n.free_disk, n.total_disk)));
        let reserved_memory =
            std_dev(online.iter().map(|n| ratio(n.reserved_memory(), n.total_memory)));
        let n1_failures = online.iter().filter(|n| n.fails_n1()).count() as f64;

        let offline_instances = snapshot
            .instances()
            .filter(|i| {
                i.nodes()
                    .iter()
                    .any(|&idx| snapshot.node(idx).is_some_and(|n| n.offline))
            })
            .count() as f64;

        ScoreBreakdown {
            free_memory,
            free_disk,
            reserved_memory,
            n1_failures,
            offline_instances,
        }
    }
}

impl Scorer for BalanceScorer {
    fn score(&self, snapshot: &ClusterSnapshot) -> f64 {
        self.breakdown(snapshot).weighted(&self.weights)
    }
}

fn ratio(part: u64, whole: u64) -> f64 {
    if whole == 0 {
        0.0
    } else {
        part as f64 / whole as f64
    }
}

/// Population standard deviation; zero for empty input.
fn std_dev(values: impl Iterator<Item = f64>) -> f64 {
    let values: Vec<f64> = values.collect();
    if values.is_empty() {
        return 0.0;
    }
    let n = values.len() as f64;
    let mean = values.iter().sum::<f64>() / n;
    let variance = values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / n;
    variance.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspace_core::{InstanceTemplate, Redundancy};

    fn cluster() -> ClusterSnapshot {
        let nodes = (0..3).map(|i| Node::new(i, format!("n{i}"), 4096, 4096, 10_000, 4));
        ClusterSnapshot::from_parts(nodes, Vec::new()).unwrap()
    }

    fn template() -> InstanceTemplate {
        InstanceTemplate {
            memory: 1024,
            disk: 1000,
            vcpus: 1,
        }
    }

    #[test]
    fn empty_uniform_cluster_scores_zero() {
        let scorer = BalanceScorer::default();
        assert_eq!(scorer.score(&cluster()), 0.0);
        assert_eq!(scorer.score(&ClusterSnapshot::default()), 0.0);
    }

    #[test]
    fn spreading_scores_better_than_stacking() {
        let scorer = BalanceScorer::default();
        let base = cluster();
        let first = base
            .place(template().instantiate(0, "a", Redundancy::Single), 0, None)
            .unwrap();

        let stacked = first
            .place(template().instantiate(1, "b", Redundancy::Single), 0, None)
            .unwrap();
        let spread = first
            .place(template().instantiate(1, "b", Redundancy::Single), 1, None)
            .unwrap();

        assert!(
            scorer.score(&spread) < scorer.score(&stacked),
            "spread ({}) should beat stacked ({})",
            scorer.score(&spread),
            scorer.score(&stacked)
        );
    }

    #[test]
    fn scoring_is_pure() {
        let scorer = BalanceScorer::default();
        let snap = cluster()
            .place(template().instantiate(0, "a", Redundancy::Mirrored), 0, Some(1))
            .unwrap();
        let before = snap.clone();
        let s1 = scorer.score(&snap);
        let s2 = scorer.score(&snap);
        assert_eq!(s1.to_bits(), s2.to_bits());
        assert_eq!(snap, before);
    }

    #[test]
    fn counts_n1_failures_and_offline_exposure() {
        let mut nodes: Vec<Node> = (0..2)
            .map(|i| Node::new(i, format!("n{i}"), 4096, 4096, 10_000, 4))
            .collect();
        nodes[1].peer_memory.insert(0, 8192);
        let snap = ClusterSnapshot::from_parts(nodes, Vec::new()).unwrap();
        let breakdown = BalanceScorer::default().breakdown(&snap);
        assert_eq!(breakdown.n1_failures, 1.0);

        let placed = cluster()
            .place(template().instantiate(0, "a", Redundancy::Mirrored), 0, Some(1))
            .unwrap()
            .with_offline(&["n1"])
            .unwrap();
        let breakdown = BalanceScorer::default().breakdown(&placed);
        assert_eq!(breakdown.offline_instances, 1.0);
    }

    #[test]
    fn weights_scale_components() {
        let breakdown = ScoreBreakdown {
            free_memory: 1.0,
            free_disk: 2.0,
            reserved_memory: 3.0,
            n1_failures: 4.0,
            offline_instances: 5.0,
        };
        assert_eq!(breakdown.weighted(&ScoringWeights::default()), 15.0);

        let only_disk = ScoringWeights {
            free_memory: 0.0,
            free_disk: 1.0,
            reserved_memory: 0.0,
            n1_failures: 0.0,
            offline_instances: 0.0,
        };
        assert_eq!(breakdown.weighted(&only_disk), 2.0);
    }

    #[test]
    fn custom_weights_drive_the_score() {
        let snap = cluster().with_offline(&["n0"]).unwrap();
        let inst = template().instantiate(0, "i", Redundancy::Single);
        let placed = snap.place(inst, 1, None).unwrap();

        let weights = ScoringWeights {
            free_memory: 0.0,
            free_disk: 0.0,
            reserved_memory: 0.0,
            n1_failures: 0.0,
            offline_instances: 0.0,
        };
        let scorer = BalanceScorer::new(weights);
        assert_eq!(scorer.weights(), &weights);
        assert_eq!(scorer.score(&placed), 0.0);

        let memory_only = BalanceScorer::new(ScoringWeights {
            free_memory: 2.0,
            ..weights
        });
        let breakdown = memory_only.breakdown(&placed);
        assert!(breakdown.free_memory > 0.0);
        assert_eq!(memory_only.score(&placed), 2.0 * breakdown.free_memory);
    }

    #[test]
    fn closures_are_scorers() {
        let constant = |_: &ClusterSnapshot| 7.5;
        assert_eq!(constant.score(&cluster()), 7.5);
    }

    #[test]
    fn std_dev_of_constant_is_zero() {
        assert_eq!(std_dev([0.5, 0.5, 0.5].into_iter()), 0.0);
        assert!((std_dev([0.0, 1.0].into_iter()) - 0.5).abs() < 1e-12);
    }
}
