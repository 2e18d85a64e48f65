//! Immutable cluster snapshots.
//!
//! A [`ClusterSnapshot`] pairs the node and instance collections at one
//! point of a capacity search. Operations never modify a snapshot; they
//! compose a new one, so callers can keep the previous state around for
//! comparison or reporting. Nodes and instances are held behind `Arc`, so
//! a derived snapshot shares every entry it did not change.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use serde::Serialize;
use tracing::debug;

use crate::error::{ModelError, ModelResult, PlacementFailure};
use crate::types::{Admission, Instance, InstanceIdx, Node, NodeIdx};

/// Nodes plus instances, keyed by identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ClusterSnapshot {
    nodes: BTreeMap<NodeIdx, Arc<Node>>,
    instances: BTreeMap<InstanceIdx, Arc<Instance>>,
}

/// Aggregate resources over the online nodes of a snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize)]
pub struct ClusterTotals {
    pub nodes: usize,
    pub online_nodes: usize,
    pub instances: usize,
    pub total_memory: u64,
    pub free_memory: u64,
    pub reserved_memory: u64,
    pub total_disk: u64,
    pub free_disk: u64,
    pub cpus: u64,
    pub used_vcpus: u64,
}

impl ClusterSnapshot {
    /// Build a snapshot from already-accounted nodes and instances.
    ///
    /// Identities and names must be unique within each collection.
    pub fn from_parts(
        nodes: impl IntoIterator<Item = Node>,
        instances: impl IntoIterator<Item = Instance>,
    ) -> ModelResult<Self> {
        let mut snapshot = Self::default();
        let mut node_names = BTreeSet::new();
        for node in nodes {
            if !node_names.insert(node.name.clone()) {
                return Err(ModelError::Duplicate {
                    kind: "node",
                    name: node.name,
                });
            }
            if snapshot.nodes.contains_key(&node.idx) {
                return Err(ModelError::DuplicateIdentity {
                    kind: "node",
                    idx: node.idx,
                });
            }
            snapshot.nodes.insert(node.idx, Arc::new(node));
        }

        let mut instance_names = BTreeSet::new();
        for instance in instances {
            if !instance_names.insert(instance.name.clone()) {
                return Err(ModelError::Duplicate {
                    kind: "instance",
                    name: instance.name,
                });
            }
            if snapshot.instances.contains_key(&instance.idx) {
                return Err(ModelError::DuplicateIdentity {
                    kind: "instance",
                    idx: instance.idx,
                });
            }
            snapshot.instances.insert(instance.idx, Arc::new(instance));
        }
        Ok(snapshot)
    }

    /// All nodes in ascending identity order.
    pub fn nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes.values().map(Arc::as_ref)
    }

    /// All instances in ascending identity order.
    pub fn instances(&self) -> impl Iterator<Item = &Instance> {
        self.instances.values().map(Arc::as_ref)
    }

    pub fn online_nodes(&self) -> impl Iterator<Item = &Node> {
        self.nodes().filter(|n| !n.offline)
    }

    pub fn node(&self, idx: NodeIdx) -> Option<&Node> {
        self.nodes.get(&idx).map(Arc::as_ref)
    }

    pub fn node_by_name(&self, name: &str) -> Option<&Node> {
        self.nodes().find(|n| n.name == name)
    }

    pub fn instance(&self, idx: InstanceIdx) -> Option<&Instance> {
        self.instances.get(&idx).map(Arc::as_ref)
    }

    pub fn instance_by_name(&self, name: &str) -> Option<&Instance> {
        self.instances().find(|i| i.name == name)
    }

    pub fn node_count(&self) -> usize {
        self.nodes.len()
    }

    pub fn instance_count(&self) -> usize {
        self.instances.len()
    }

    /// Smallest instance identity greater than every identity in use, or
    /// `None` once `InstanceIdx::MAX` is taken.
    pub fn next_instance_idx(&self) -> Option<InstanceIdx> {
        match self.instances.keys().next_back() {
            Some(idx) => idx.checked_add(1),
            None => Some(0),
        }
    }

    /// Apply `f` to every node, producing a new snapshot.
    ///
    /// `f` must preserve node identities.
    pub fn map_nodes(&self, mut f: impl FnMut(&Node) -> Node) -> Self {
        let nodes = self
            .nodes()
            .map(|n| {
                let mapped = f(n);
                debug_assert_eq!(mapped.idx, n.idx, "map_nodes changed a node identity");
                (n.idx, Arc::new(mapped))
            })
            .collect();
        Self {
            nodes,
            instances: self.instances.clone(),
        }
    }

    /// Return a copy with the named nodes flagged offline.
    ///
    /// Every name must match an existing node; otherwise the unmatched
    /// names are reported (in the order given, without repeats) and no
    /// snapshot is produced.
    pub fn with_offline<S: AsRef<str>>(&self, names: &[S]) -> ModelResult<Self> {
        let mut unknown: Vec<String> = Vec::new();
        let mut wanted = BTreeSet::new();
        for name in names {
            let name = name.as_ref();
            if self.node_by_name(name).is_some() {
                wanted.insert(name);
            } else if !unknown.iter().any(|u| u == name) {
                unknown.push(name.to_string());
            }
        }
        if !unknown.is_empty() {
            return Err(ModelError::UnknownNodes(unknown));
        }

        Ok(self.map_nodes(|n| {
            let mut node = n.clone();
            if wanted.contains(n.name.as_str()) {
                debug!(node = %n.name, "marking node offline");
                node.offline = true;
            }
            node
        }))
    }

    /// Place `instance` on `primary` (and `secondary`, if mirrored),
    /// returning the resulting snapshot.
    ///
    /// Targets must be online and stay N+1 safe after the placement.
    pub fn place(
        &self,
        instance: Instance,
        primary: NodeIdx,
        secondary: Option<NodeIdx>,
    ) -> Result<Self, PlacementFailure> {
        self.insert_instance(instance, primary, secondary, Admission::Strict)
    }

    /// Account an existing inventory instance. Only hard memory/disk
    /// limits are enforced; N+1 compliance is left to the validator.
    pub(crate) fn load(
        &self,
        instance: Instance,
        primary: NodeIdx,
        secondary: Option<NodeIdx>,
    ) -> Result<Self, PlacementFailure> {
        self.insert_instance(instance, primary, secondary, Admission::Inventory)
    }

    fn insert_instance(
        &self,
        mut instance: Instance,
        primary: NodeIdx,
        secondary: Option<NodeIdx>,
        admission: Admission,
    ) -> Result<Self, PlacementFailure> {
        let got = 1 + usize::from(secondary.is_some());
        let expected = instance.redundancy.node_count();
        if got != expected {
            return Err(PlacementFailure::RedundancyMismatch { expected, got });
        }
        if self.instances.contains_key(&instance.idx) {
            return Err(PlacementFailure::IdentityInUse { idx: instance.idx });
        }
        if secondary == Some(primary) {
            return Err(PlacementFailure::SameNode { node: primary });
        }

        instance.primary = Some(primary);
        instance.secondary = secondary;

        let mut next = self.clone();
        let pnode = self
            .node(primary)
            .ok_or(PlacementFailure::UnknownNode { node: primary })?
            .assign_primary(&instance, admission)?;
        next.nodes.insert(primary, Arc::new(pnode));

        if let Some(sidx) = secondary {
            let snode = self
                .node(sidx)
                .ok_or(PlacementFailure::UnknownNode { node: sidx })?
                .assign_secondary(&instance, primary, admission)?;
            next.nodes.insert(sidx, Arc::new(snode));
        }

        next.instances.insert(instance.idx, Arc::new(instance));
        Ok(next)
    }

    /// Aggregate resources over online nodes.
    pub fn totals(&self) -> ClusterTotals {
        let mut totals = ClusterTotals {
            nodes: self.nodes.len(),
            instances: self.instances.len(),
            ..ClusterTotals::default()
        };
        for node in self.online_nodes() {
            totals.online_nodes += 1;
            totals.total_memory += node.total_memory;
            totals.free_memory += node.free_memory;
            totals.reserved_memory += node.reserved_memory();
            totals.total_disk += node.total_disk;
            totals.free_disk += node.free_disk;
            totals.cpus += u64::from(node.cpus);
            totals.used_vcpus += u64::from(node.used_vcpus);
        }
        totals
    }
}
