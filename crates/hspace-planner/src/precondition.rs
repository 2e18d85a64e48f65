//! Gates that run once before a capacity search.
//!
//! The offline adjustment and the N+1 check both abort the run: a search
//! over a cluster that already fails N+1 would report a meaningless count.

use hspace_core::{ClusterSnapshot, InstanceTemplate, ModelError, Redundancy};
use hspace_placement::{Allocator, RedundancyValidator, Scorer};
use tracing::{info, warn};

use crate::error::{PlanError, PlanResult};
use crate::planner::{CapacityPlanner, CapacityResult};

/// Flag the named nodes offline.
pub fn apply_offline<S: AsRef<str>>(
    snapshot: &ClusterSnapshot,
    names: &[S],
) -> PlanResult<ClusterSnapshot> {
    snapshot.with_offline(names).map_err(|err| match err {
        ModelError::UnknownNodes(names) => PlanError::InvalidOfflineName(names),
        other => PlanError::Model(other),
    })
}

/// Fail unless `snapshot` survives any single node failure.
pub fn check_redundancy<V: RedundancyValidator + ?Sized>(
    snapshot: &ClusterSnapshot,
    validator: &V,
) -> PlanResult<()> {
    let failing = validator.check(snapshot);
    if failing.is_empty() {
        return Ok(());
    }

    let names: Vec<String> = failing
        .iter()
        .map(|&idx| {
            snapshot
                .node(idx)
                .map_or_else(|| format!("#{idx}"), |n| n.name.clone())
        })
        .collect();
    warn!(nodes = ?names, "initial cluster is not N+1 compliant");
    Err(PlanError::PreconditionViolated(names))
}

/// Result of a gated planning run.
#[derive(Debug, Clone)]
pub struct PlanOutcome {
    /// Cluster after offline adjustment, before any placement.
    pub initial: ClusterSnapshot,
    pub result: CapacityResult,
}

/// Offline adjustment, N+1 gate, then the capacity search.
pub fn plan<A, S, V, N>(
    planner: &CapacityPlanner<A, S>,
    validator: &V,
    snapshot: &ClusterSnapshot,
    offline: &[N],
    template: &InstanceTemplate,
    redundancy: Redundancy,
) -> PlanResult<PlanOutcome>
where
    A: Allocator,
    S: Scorer,
    V: RedundancyValidator + ?Sized,
    N: AsRef<str>,
{
    let initial = apply_offline(snapshot, offline)?;
    check_redundancy(&initial, validator)?;
    info!(
        nodes = initial.node_count(),
        online = initial.online_nodes().count(),
        instances = initial.instance_count(),
        "cluster passes N+1, starting capacity search"
    );

    let result = planner.compute_capacity(initial.clone(), template, redundancy)?;
    Ok(PlanOutcome { initial, result })
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspace_core::Node;
    use hspace_placement::{BalanceScorer, FailoverValidator, PairAllocator};

    fn cluster() -> ClusterSnapshot {
        let nodes = ["nodeA", "nodeB", "nodeC"]
            .iter()
            .enumerate()
            .map(|(i, name)| Node::new(i as u32, *name, 8192, 8192, 100_000, 8));
        ClusterSnapshot::from_parts(nodes, Vec::new()).unwrap()
    }

    fn template() -> InstanceTemplate {
        InstanceTemplate {
            memory: 2048,
            disk: 10_000,
            vcpus: 1,
        }
    }

    #[test]
    fn unknown_offline_names_are_fatal() {
        let snap = cluster();
        let err = apply_offline(&snap, &["nodeA", "nodeZ"]).unwrap_err();
        match err {
            PlanError::InvalidOfflineName(names) => assert_eq!(names, vec!["nodeZ"]),
            other => panic!("unexpected error: {other}"),
        }
        assert!(snap.nodes().all(|n| !n.offline));
    }

    #[test]
    fn precondition_names_failing_nodes() {
        let snap = cluster().map_nodes(|n| {
            let mut n = n.clone();
            if n.name == "nodeB" {
                n.free_memory = 0;
                n.peer_memory.insert(0, 1024);
            }
            n
        });
        let err = check_redundancy(&snap, &FailoverValidator).unwrap_err();
        match err {
            PlanError::PreconditionViolated(names) => assert_eq!(names, vec!["nodeB"]),
            other => panic!("unexpected error: {other}"),
        }
    }

    #[test]
    fn plan_aborts_before_search_on_violation() {
        let snap = cluster().map_nodes(|n| {
            let mut n = n.clone();
            n.peer_memory.insert(99, 100_000);
            n
        });
        let planner = CapacityPlanner::new(PairAllocator, BalanceScorer::default());
        let err = plan(
            &planner,
            &FailoverValidator,
            &snap,
            &[] as &[&str],
            &template(),
            Redundancy::Mirrored,
        )
        .unwrap_err();
        assert!(matches!(err, PlanError::PreconditionViolated(ref names) if names.len() == 3));
    }

    #[test]
    fn plan_runs_on_offline_adjusted_cluster() {
        let planner = CapacityPlanner::new(PairAllocator, BalanceScorer::default());
        let outcome = plan(
            &planner,
            &FailoverValidator,
            &cluster(),
            &["nodeC"],
            &template(),
            Redundancy::Mirrored,
        )
        .unwrap();

        assert!(outcome.initial.node_by_name("nodeC").unwrap().offline);
        assert!(outcome.result.depth >= 1);
        let offline = outcome.initial.node_by_name("nodeC").unwrap().idx;
        assert!(
            outcome
                .result
                .snapshot
                .instances()
                .all(|i| !i.nodes().contains(&offline))
        );
    }
}
