//! N+1 redundancy check.

use std::collections::BTreeSet;

use hspace_core::{ClusterSnapshot, NodeIdx};

/// Reports nodes that would be over-committed by a single node failure.
pub trait RedundancyValidator {
    /// Empty means the snapshot is N+1 compliant.
    fn check(&self, snapshot: &ClusterSnapshot) -> BTreeSet<NodeIdx>;
}

/// Checks every online node's free memory against the largest amount it
/// would have to absorb from one failing primary.
#[derive(Debug, Clone, Copy, Default)]
pub struct FailoverValidator;

impl RedundancyValidator for FailoverValidator {
    fn check(&self, snapshot: &ClusterSnapshot) -> BTreeSet<NodeIdx> {
        snapshot
            .online_nodes()
            .filter(|n| n.fails_n1())
            .map(|n| n.idx)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspace_core::{InstanceTemplate, Node, Redundancy};

    fn cluster() -> ClusterSnapshot {
        let nodes = (0..3).map(|i| Node::new(i, format!("n{i}"), 4096, 4096, 10_000, 4));
        ClusterSnapshot::from_parts(nodes, Vec::new()).unwrap()
    }

    #[test]
    fn empty_cluster_is_compliant() {
        assert!(FailoverValidator.check(&cluster()).is_empty());
    }

    #[test]
    fn flags_node_that_cannot_absorb_peer() {
        let snap = cluster().map_nodes(|n| {
            let mut n = n.clone();
            if n.idx == 2 {
                n.free_memory = 100;
                n.peer_memory.insert(0, 2048);
            }
            n
        });
        let failing = FailoverValidator.check(&snap);
        assert_eq!(failing.into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn offline_nodes_are_not_reported() {
        let snap = cluster()
            .map_nodes(|n| {
                let mut n = n.clone();
                n.free_memory = 0;
                n.peer_memory.insert(9, 1);
                n
            })
            .with_offline(&["n0", "n1"])
            .unwrap();
        assert_eq!(FailoverValidator.check(&snap).into_iter().collect::<Vec<_>>(), vec![2]);
    }

    #[test]
    fn check_is_repeatable() {
        let template = InstanceTemplate {
            memory: 2048,
            disk: 100,
            vcpus: 1,
        };
        let snap = cluster()
            .place(template.instantiate(0, "a", Redundancy::Mirrored), 0, Some(1))
            .unwrap();
        let first = FailoverValidator.check(&snap);
        let second = FailoverValidator.check(&snap);
        assert_eq!(first, second);
        assert!(first.is_empty());
    }
}
