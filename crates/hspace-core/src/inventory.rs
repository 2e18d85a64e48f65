//! Cluster inventory file parser.
//!
//! An inventory is a TOML document listing nodes and the instances
//! already running on them:
//!
//! ```toml
//! [[node]]
//! name = "node1"
//! memory = 65536
//! disk = 1048576
//! cpus = 16
//! reserved_memory = 2048
//!
//! [[instance]]
//! name = "web1"
//! memory = 4096
//! disk = 20480
//! vcpus = 2
//! primary = "node1"
//! secondary = "node2"
//! ```
//!
//! Identities are assigned in file order, starting at zero.

use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::error::{ModelError, ModelResult};
use crate::snapshot::ClusterSnapshot;
use crate::types::{Instance, InstanceState, Node, NodeIdx, Redundancy};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Inventory {
    #[serde(rename = "node", default)]
    pub nodes: Vec<NodeEntry>,
    #[serde(rename = "instance", default)]
    pub instances: Vec<InstanceEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NodeEntry {
    pub name: String,
    /// Total memory in MiB.
    pub memory: u64,
    /// Total disk in MiB.
    pub disk: u64,
    #[serde(default)]
    pub cpus: u32,
    /// Memory held by the host itself, never available to instances.
    #[serde(default)]
    pub reserved_memory: u64,
    #[serde(default)]
    pub offline: bool,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct InstanceEntry {
    pub name: String,
    pub memory: u64,
    pub disk: u64,
    #[serde(default = "default_vcpus")]
    pub vcpus: u32,
    pub primary: String,
    pub secondary: Option<String>,
    #[serde(default)]
    pub state: InstanceState,
}

fn default_vcpus() -> u32 {
    1
}

impl Inventory {
    pub fn from_file(path: &Path) -> ModelResult<Self> {
        let content = std::fs::read_to_string(path).map_err(|source| ModelError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&content)
    }

    pub fn from_toml_str(content: &str) -> ModelResult<Self> {
        Ok(toml::from_str(content)?)
    }

    /// Build the initial snapshot, accounting every listed instance
    /// against its nodes.
    pub fn into_snapshot(self) -> ModelResult<ClusterSnapshot> {
        let mut nodes = Vec::with_capacity(self.nodes.len());
        for (idx, entry) in self.nodes.into_iter().enumerate() {
            let free_memory = entry.memory.checked_sub(entry.reserved_memory).ok_or_else(|| {
                ModelError::InvalidNode {
                    name: entry.name.clone(),
                    reason: format!(
                        "reserved memory {} MiB exceeds total {} MiB",
                        entry.reserved_memory, entry.memory
                    ),
                }
            })?;
            let mut node = Node::new(
                identity("node", idx)?,
                entry.name,
                entry.memory,
                free_memory,
                entry.disk,
                entry.cpus,
            );
            node.offline = entry.offline;
            nodes.push(node);
        }
        let mut snapshot = ClusterSnapshot::from_parts(nodes, Vec::new())?;

        let unknown = unknown_node_names(&snapshot, &self.instances);
        if !unknown.is_empty() {
            return Err(ModelError::UnknownNodes(unknown));
        }

        for (idx, entry) in self.instances.into_iter().enumerate() {
            if snapshot.instance_by_name(&entry.name).is_some() {
                return Err(ModelError::Duplicate {
                    kind: "instance",
                    name: entry.name,
                });
            }
            let primary = resolve(&snapshot, &entry.primary)?;
            let secondary = entry
                .secondary
                .as_deref()
                .map(|name| resolve(&snapshot, name))
                .transpose()?;
            let redundancy = if secondary.is_some() {
                Redundancy::Mirrored
            } else {
                Redundancy::Single
            };

            let name = entry.name;
            let instance = Instance {
                idx: identity("instance", idx)?,
                name: name.clone(),
                memory: entry.memory,
                disk: entry.disk,
                vcpus: entry.vcpus,
                redundancy,
                state: entry.state,
                primary: None,
                secondary: None,
            };
            snapshot = snapshot
                .load(instance, primary, secondary)
                .map_err(|reason| ModelError::InvalidPlacement {
                    instance: name,
                    reason,
                })?;
        }

        debug!(
            nodes = snapshot.node_count(),
            instances = snapshot.instance_count(),
            "inventory loaded"
        );
        Ok(snapshot)
    }
}

/// Position in the inventory file as a `u32` identity.
fn identity(kind: &'static str, position: usize) -> ModelResult<u32> {
    u32::try_from(position).map_err(|_| ModelError::TooMany { kind, count: position })
}

fn resolve(snapshot: &ClusterSnapshot, name: &str) -> ModelResult<NodeIdx> {
    snapshot
        .node_by_name(name)
        .map(|n| n.idx)
        .ok_or_else(|| ModelError::UnknownNodes(vec![name.to_string()]))
}

fn unknown_node_names(snapshot: &ClusterSnapshot, instances: &[InstanceEntry]) -> Vec<String> {
    let mut unknown: Vec<String> = Vec::new();
    let referenced = instances
        .iter()
        .flat_map(|i| std::iter::once(i.primary.as_str()).chain(i.secondary.as_deref()));
    for name in referenced {
        if snapshot.node_by_name(name).is_none() && !unknown.iter().any(|u| u == name) {
            unknown.push(name.to_string());
        }
    }
    unknown
}
