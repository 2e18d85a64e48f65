//! Human-readable and JSON capacity reports.

use serde::Serialize;

use hspace_core::{ClusterSnapshot, ClusterTotals, InstanceTemplate, Node, Redundancy};
use hspace_planner::{PlacementStep, PlanOutcome, StopReason};

/// Everything printed at the end of a run.
#[derive(Debug, Serialize)]
pub struct CapacityReport {
    pub depth: usize,
    pub stop_reason: StopReason,
    pub stop_description: &'static str,
    pub template: InstanceTemplate,
    pub redundancy: Redundancy,
    pub before: ClusterTotals,
    pub after: ClusterTotals,
    pub allocated: Allocated,
    pub steps: Vec<PlacementStep>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes_before: Option<Vec<NodeRow>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub nodes_after: Option<Vec<NodeRow>>,
}

/// Resources consumed by the new instances.
#[derive(Debug, Clone, Copy, Serialize)]
pub struct Allocated {
    pub memory: u64,
    pub disk: u64,
    pub vcpus: u64,
}

/// One line of a node table.
#[derive(Debug, Clone, Serialize)]
pub struct NodeRow {
    pub name: String,
    pub offline: bool,
    pub fails_n1: bool,
    pub total_memory: u64,
    pub free_memory: u64,
    pub reserved_memory: u64,
    pub total_disk: u64,
    pub free_disk: u64,
    pub primaries: usize,
    pub secondaries: usize,
}

impl From<&Node> for NodeRow {
    fn from(node: &Node) -> Self {
        Self {
            name: node.name.clone(),
            offline: node.offline,
            fails_n1: node.fails_n1(),
            total_memory: node.total_memory,
            free_memory: node.free_memory,
            reserved_memory: node.reserved_memory(),
            total_disk: node.total_disk,
            free_disk: node.free_disk,
            primaries: node.primaries.len(),
            secondaries: node.secondaries.len(),
        }
    }
}

fn rows(snapshot: &ClusterSnapshot) -> Vec<NodeRow> {
    snapshot.nodes().map(NodeRow::from).collect()
}

impl CapacityReport {
    pub fn new(
        outcome: &PlanOutcome,
        template: InstanceTemplate,
        redundancy: Redundancy,
        with_nodes: bool,
    ) -> Self {
        let result = &outcome.result;
        let before = outcome.initial.totals();
        let after = result.snapshot.totals();
        Self {
            depth: result.depth,
            stop_reason: result.stop_reason,
            stop_description: result.stop_reason.describe(),
            template,
            redundancy,
            before,
            after,
            allocated: Allocated {
                memory: before.free_memory.saturating_sub(after.free_memory),
                disk: before.free_disk.saturating_sub(after.free_disk),
                vcpus: after.used_vcpus.saturating_sub(before.used_vcpus),
            },
            steps: result.steps.clone(),
            nodes_before: with_nodes.then(|| rows(&outcome.initial)),
            nodes_after: with_nodes.then(|| rows(&result.snapshot)),
        }
    }
}

pub fn format_report(report: &CapacityReport) -> String {
    let mut out = String::new();

    if let Some(nodes) = &report.nodes_before {
        out.push_str("Initial cluster:\n");
        out.push_str(&format_nodes(nodes));
        out.push('\n');
    }

    out.push_str(&format!(
        "Instance shape: {} MiB memory, {} MiB disk, {} vcpu(s), {} node(s)\n",
        report.template.memory,
        report.template.disk,
        report.template.vcpus,
        report.redundancy.node_count()
    ));
    out.push_str(&format!(
        "Allocated {} instance(s), stopped: {}\n",
        report.depth, report.stop_description
    ));
    if let Some(last) = report.steps.last() {
        out.push_str(&format!("Final balance score: {:.6}\n", last.score));
    }
    out.push('\n');

    if let Some(nodes) = &report.nodes_after {
        out.push_str("Final cluster:\n");
        out.push_str(&format_nodes(nodes));
        out.push('\n');
    }

    let (b, a) = (&report.before, &report.after);
    out.push_str(&format!(
        "Cluster resources ({} of {} nodes online):\n",
        b.online_nodes, b.nodes
    ));
    out.push_str(&format!("  {:<18}{:>14}{:>14}\n", "", "before", "after"));
    out.push_str(&format!("  {:<18}{:>14}{:>14}\n", "instances", b.instances, a.instances));
    out.push_str(&format!("  {:<18}{:>14}{:>14}\n", "free memory", b.free_memory, a.free_memory));
    out.push_str(&format!(
        "  {:<18}{:>14}{:>14}\n",
        "reserved memory", b.reserved_memory, a.reserved_memory
    ));
    out.push_str(&format!("  {:<18}{:>14}{:>14}\n", "free disk", b.free_disk, a.free_disk));
    out.push_str(&format!("  {:<18}{:>14}{:>14}\n", "used vcpus", b.used_vcpus, a.used_vcpus));
    out.push_str(&format!(
        "New instances use {} MiB memory, {} MiB disk, {} vcpu(s)\n",
        report.allocated.memory, report.allocated.disk, report.allocated.vcpus
    ));

    out
}

fn format_nodes(nodes: &[NodeRow]) -> String {
    let mut out = String::new();
    out.push_str(&format!(
        "  {:<16} {:>3} {:>3} {:>9} {:>9} {:>9} {:>10} {:>10} {:>4} {:>4}\n",
        "Name", "Off", "N1", "t_mem", "f_mem", "r_mem", "t_dsk", "f_dsk", "pri", "sec"
    ));
    for n in nodes {
        out.push_str(&format!(
            "  {:<16} {:>3} {:>3} {:>9} {:>9} {:>9} {:>10} {:>10} {:>4} {:>4}\n",
            n.name,
            flag(n.offline),
            flag(n.fails_n1),
            n.total_memory,
            n.free_memory,
            n.reserved_memory,
            n.total_disk,
            n.free_disk,
            n.primaries,
            n.secondaries
        ));
    }
    out
}

fn flag(set: bool) -> &'static str {
    if set { "Y" } else { "-" }
}

#[cfg(test)]
mod tests {
    use super::*;
    use hspace_placement::{BalanceScorer, FailoverValidator, PairAllocator};
    use hspace_planner::{CapacityPlanner, plan};

    fn outcome() -> PlanOutcome {
        let nodes = (0..2).map(|i| Node::new(i, format!("node{i}"), 4096, 4096, 100_000, 4));
        let snapshot = ClusterSnapshot::from_parts(nodes, Vec::new()).unwrap();
        let planner = CapacityPlanner::new(PairAllocator, BalanceScorer::default());
        plan(
            &planner,
            &FailoverValidator,
            &snapshot,
            &[] as &[&str],
            &template(),
            Redundancy::Mirrored,
        )
        .unwrap()
    }

    fn template() -> InstanceTemplate {
        InstanceTemplate {
            memory: 1024,
            disk: 10_000,
            vcpus: 1,
        }
    }

    #[test]
    fn totals_reflect_new_instances() {
        let report = CapacityReport::new(&outcome(), template(), Redundancy::Mirrored, false);
        assert_eq!(report.depth, 4);
        assert_eq!(report.allocated.memory, 4 * 1024);
        assert_eq!(report.allocated.disk, 4 * 2 * 10_000);
        assert_eq!(report.allocated.vcpus, 4);
        assert!(report.nodes_before.is_none());
    }

    #[test]
    fn text_report_mentions_depth_and_tables() {
        let report = CapacityReport::new(&outcome(), template(), Redundancy::Mirrored, true);
        let text = format_report(&report);
        assert!(text.contains("Allocated 4 instance(s)"));
        assert!(text.contains("Initial cluster:"));
        assert!(text.contains("Final cluster:"));
        assert!(text.contains("node1"));
    }

    #[test]
    fn json_report_skips_absent_tables() {
        let report = CapacityReport::new(&outcome(), template(), Redundancy::Mirrored, false);
        let value = serde_json::to_value(&report).unwrap();
        assert_eq!(value["depth"], 4);
        assert_eq!(value["stop_reason"], "all_attempts_failed");
        assert!(value.get("nodes_before").is_none());
        assert_eq!(value["steps"].as_array().unwrap().len(), 4);
    }
}
