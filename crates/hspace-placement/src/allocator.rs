//! Allocation attempts for a single instance.
//!
//! An [`Allocator`] tries every structurally distinct placement of one
//! instance and reports each outcome. It never mutates the snapshot it is
//! given: successful outcomes carry a freshly composed snapshot.

use hspace_core::{ClusterSnapshot, Instance, NodeIdx, PlacementFailure, Redundancy};
use tracing::{debug, trace};

/// Result of trying one structural placement.
#[derive(Debug, Clone, PartialEq)]
pub enum CandidateOutcome {
    /// The instance fits; `snapshot` is the cluster after placement.
    Success {
        snapshot: ClusterSnapshot,
        nodes: Vec<NodeIdx>,
    },
    /// This particular placement was rejected.
    Failed {
        nodes: Vec<NodeIdx>,
        reason: PlacementFailure,
    },
}

impl CandidateOutcome {
    pub fn is_success(&self) -> bool {
        matches!(self, CandidateOutcome::Success { .. })
    }

    /// Nodes the candidate targeted, primary first.
    pub fn nodes(&self) -> &[NodeIdx] {
        match self {
            CandidateOutcome::Success { nodes, .. } | CandidateOutcome::Failed { nodes, .. } => {
                nodes
            }
        }
    }
}

/// Everything an allocator could say about one instance.
#[derive(Debug, Clone, PartialEq)]
pub enum AllocationAttempt {
    /// No structural placement could even be attempted.
    Unavailable { online: usize, required: usize },
    /// One outcome per attempted placement, in enumeration order.
    Candidates(Vec<CandidateOutcome>),
}

/// Places a single instance on a snapshot.
pub trait Allocator {
    fn try_place(
        &self,
        snapshot: &ClusterSnapshot,
        instance: &Instance,
        redundancy: Redundancy,
    ) -> AllocationAttempt;
}

impl<T: Allocator + ?Sized> Allocator for &T {
    fn try_place(
        &self,
        snapshot: &ClusterSnapshot,
        instance: &Instance,
        redundancy: Redundancy,
    ) -> AllocationAttempt {
        (**self).try_place(snapshot, instance, redundancy)
    }
}

/// Exhaustive allocator over online nodes.
///
/// `Single` tries every online node; `Mirrored` tries every ordered pair
/// of distinct online nodes as (primary, secondary). Enumeration follows
/// ascending node identity so results are reproducible.
#[derive(Debug, Clone, Copy, Default)]
pub struct PairAllocator;

impl PairAllocator {
    fn attempt(
        snapshot: &ClusterSnapshot,
        instance: &Instance,
        primary: NodeIdx,
        secondary: Option<NodeIdx>,
    ) -> CandidateOutcome {
        let nodes: Vec<NodeIdx> = std::iter::once(primary).chain(secondary).collect();
        match snapshot.place(instance.clone(), primary, secondary) {
            Ok(next) => CandidateOutcome::Success {
                snapshot: next,
                nodes,
            },
            Err(reason) => {
                trace!(instance = %instance.name, ?nodes, %reason, "placement rejected");
                CandidateOutcome::Failed { nodes, reason }
            }
        }
    }
}

impl Allocator for PairAllocator {
    fn try_place(
        &self,
        snapshot: &ClusterSnapshot,
        instance: &Instance,
        redundancy: Redundancy,
    ) -> AllocationAttempt {
        let online: Vec<NodeIdx> = snapshot.online_nodes().map(|n| n.idx).collect();
        let required = redundancy.node_count();
        if online.len() < required {
            debug!(
                online = online.len(),
                required,
                "too few online nodes for any placement"
            );
            return AllocationAttempt::Unavailable {
                online: online.len(),
                required,
            };
        }

        let outcomes: Vec<CandidateOutcome> = match redundancy {
            Redundancy::Single => online
                .iter()
                .map(|&p| Self::attempt(snapshot, instance, p, None))
                .collect(),
            Redundancy::Mirrored => online
                .iter()
                .flat_map(|&p| {
                    online
                        .iter()
                        .filter(move |&&s| s != p)
                        .map(move |&s| (p, s))
                })
                .map(|(p, s)| Self::attempt(snapshot, instance, p, Some(s)))
                .collect(),
        };

        debug!(
            instance = %instance.name,
            candidates = outcomes.len(),
            viable = outcomes.iter().filter(|o| o.is_success()).count(),
            "allocation attempted"
        );
        AllocationAttempt::Candidates(outcomes)
    }
}
