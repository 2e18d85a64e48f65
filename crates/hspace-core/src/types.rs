//! Domain types for the cluster model.
//!
//! Nodes and instances are plain values keyed by integer identities.
//! Nothing here mutates in place: every placement helper returns a new
//! [`Node`] so that snapshots stay immutable once built.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult, PlacementFailure};

/// Identity of a node within a snapshot.
pub type NodeIdx = u32;

/// Identity of an instance within a snapshot.
pub type InstanceIdx = u32;

// ── Redundancy ────────────────────────────────────────────────────

/// How many distinct nodes an instance must span.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Redundancy {
    /// Primary only, no mirror.
    Single,
    /// Primary plus a mirrored secondary.
    Mirrored,
}

impl Redundancy {
    /// Number of nodes a placement must occupy.
    pub fn node_count(self) -> usize {
        match self {
            Redundancy::Single => 1,
            Redundancy::Mirrored => 2,
        }
    }
}

impl TryFrom<u8> for Redundancy {
    type Error = ModelError;

    fn try_from(value: u8) -> ModelResult<Self> {
        match value {
            1 => Ok(Redundancy::Single),
            2 => Ok(Redundancy::Mirrored),
            other => Err(ModelError::InvalidRedundancy(other)),
        }
    }
}

// ── Instance ──────────────────────────────────────────────────────

/// Administrative state of an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum InstanceState {
    #[default]
    Running,
    Down,
    /// Administratively offline: keeps its disks but no memory.
    Offline,
}

impl InstanceState {
    pub fn uses_memory(self) -> bool {
        !matches!(self, InstanceState::Offline)
    }
}

/// A schedulable workload.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Instance {
    pub idx: InstanceIdx,
    pub name: String,
    /// Memory requirement in MiB.
    pub memory: u64,
    /// Disk requirement in MiB.
    pub disk: u64,
    pub vcpus: u32,
    pub redundancy: Redundancy,
    pub state: InstanceState,
    pub primary: Option<NodeIdx>,
    pub secondary: Option<NodeIdx>,
}

impl Instance {
    /// Nodes this instance occupies, primary first.
    pub fn nodes(&self) -> Vec<NodeIdx> {
        self.primary.into_iter().chain(self.secondary).collect()
    }

    pub fn is_placed(&self) -> bool {
        self.primary.is_some()
    }

    /// Memory this instance holds on its primary (and reserves on its
    /// secondary).
    pub fn effective_memory(&self) -> u64 {
        if self.state.uses_memory() {
            self.memory
        } else {
            0
        }
    }
}

/// Resource shape used to fabricate synthetic instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct InstanceTemplate {
    /// Memory per instance in MiB.
    pub memory: u64,
    /// Disk per instance in MiB.
    pub disk: u64,
    pub vcpus: u32,
}

impl InstanceTemplate {
    /// Reject templates that could never exhaust a cluster.
    pub fn validate(&self) -> ModelResult<()> {
        if self.memory == 0 && self.disk == 0 {
            return Err(ModelError::EmptyTemplate);
        }
        Ok(())
    }

    /// Build an unplaced, running instance of this shape.
    pub fn instantiate(
        &self,
        idx: InstanceIdx,
        name: impl Into<String>,
        redundancy: Redundancy,
    ) -> Instance {
        Instance {
            idx,
            name: name.into(),
            memory: self.memory,
            disk: self.disk,
            vcpus: self.vcpus,
            redundancy,
            state: InstanceState::Running,
            primary: None,
            secondary: None,
        }
    }
}

// ── Node ──────────────────────────────────────────────────────────

/// A physical cluster member.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Node {
    pub idx: NodeIdx,
    pub name: String,
    /// Total memory in MiB.
    pub total_memory: u64,
    /// Memory not held by the host or by primary instances.
    pub free_memory: u64,
    /// Total disk in MiB.
    pub total_disk: u64,
    pub free_disk: u64,
    pub cpus: u32,
    pub used_vcpus: u32,
    pub offline: bool,
    pub primaries: Vec<InstanceIdx>,
    pub secondaries: Vec<InstanceIdx>,
    /// Primary node → memory this node must absorb if that primary fails.
    pub peer_memory: BTreeMap<NodeIdx, u64>,
}

/// Whether N+1 safety is enforced while adding an instance.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum Admission {
    /// New placements: target must be online and stay N+1 safe.
    Strict,
    /// Existing inventory: only hard capacity is checked.
    Inventory,
}

impl Node {
    /// Create an empty online node with `free_memory` already net of any
    /// host reservation.
    pub fn new(
        idx: NodeIdx,
        name: impl Into<String>,
        total_memory: u64,
        free_memory: u64,
        total_disk: u64,
        cpus: u32,
    ) -> Self {
        Self {
            idx,
            name: name.into(),
            total_memory,
            free_memory,
            total_disk,
            free_disk: total_disk,
            cpus,
            used_vcpus: 0,
            offline: false,
            primaries: Vec::new(),
            secondaries: Vec::new(),
            peer_memory: BTreeMap::new(),
        }
    }

    /// Memory held back to restart the largest failing peer's instances.
    pub fn reserved_memory(&self) -> u64 {
        self.peer_memory.values().copied().max().unwrap_or(0)
    }

    /// True if the failure of some peer would over-commit this node.
    pub fn fails_n1(&self) -> bool {
        !self.offline && self.free_memory < self.reserved_memory()
    }

    /// Return a copy of this node with `instance` added as primary.
    pub fn add_primary(&self, instance: &Instance) -> Result<Node, PlacementFailure> {
        self.assign_primary(instance, Admission::Strict)
    }

    /// Return a copy of this node with `instance` added as secondary of
    /// `primary`.
    pub fn add_secondary(
        &self,
        instance: &Instance,
        primary: NodeIdx,
    ) -> Result<Node, PlacementFailure> {
        self.assign_secondary(instance, primary, Admission::Strict)
    }

    pub(crate) fn assign_primary(
        &self,
        instance: &Instance,
        admission: Admission,
    ) -> Result<Node, PlacementFailure> {
        if admission == Admission::Strict && self.offline {
            return Err(PlacementFailure::Offline { node: self.idx });
        }
        let needed = instance.effective_memory();
        let free_memory = self.free_memory.checked_sub(needed).ok_or(
            PlacementFailure::InsufficientMemory {
                node: self.idx,
                needed,
                free: self.free_memory,
            },
        )?;
        let free_disk = self.take_disk(instance.disk)?;

        let mut node = self.clone();
        node.free_memory = free_memory;
        node.free_disk = free_disk;
        node.used_vcpus = node.used_vcpus.saturating_add(instance.vcpus);
        node.primaries.push(instance.idx);

        if admission == Admission::Strict && node.fails_n1() {
            return Err(PlacementFailure::N1Violation { node: self.idx });
        }
        Ok(node)
    }

    pub(crate) fn assign_secondary(
        &self,
        instance: &Instance,
        primary: NodeIdx,
        admission: Admission,
    ) -> Result<Node, PlacementFailure> {
        if admission == Admission::Strict && self.offline {
            return Err(PlacementFailure::Offline { node: self.idx });
        }
        let free_disk = self.take_disk(instance.disk)?;

        let mut node = self.clone();
        node.free_disk = free_disk;
        *node.peer_memory.entry(primary).or_insert(0) += instance.effective_memory();
        node.secondaries.push(instance.idx);

        if admission == Admission::Strict && node.fails_n1() {
            return Err(PlacementFailure::N1Violation { node: self.idx });
        }
        Ok(node)
    }

    fn take_disk(&self, needed: u64) -> Result<u64, PlacementFailure> {
        self.free_disk
            .checked_sub(needed)
            .ok_or(PlacementFailure::InsufficientDisk {
                node: self.idx,
                needed,
                free: self.free_disk,
            })
    }
}
