//! Error types for the cluster model.

use std::path::PathBuf;

use serde::Serialize;
use thiserror::Error;

use crate::types::{InstanceIdx, NodeIdx};

/// Result type alias for cluster model operations.
pub type ModelResult<T> = Result<T, ModelError>;

/// Errors raised while building or adjusting a cluster model.
#[derive(Debug, Error)]
pub enum ModelError {
    #[error("failed to read inventory {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse inventory: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("duplicate {kind} name: {name}")]
    Duplicate { kind: &'static str, name: String },

    #[error("duplicate {kind} identity: {idx}")]
    DuplicateIdentity { kind: &'static str, idx: u32 },

    #[error("too many {kind} entries: position {count} exceeds the identity range")]
    TooMany { kind: &'static str, count: usize },

    #[error("unknown node name(s): {}", .0.join(", "))]
    UnknownNodes(Vec<String>),

    #[error("invalid node {name}: {reason}")]
    InvalidNode { name: String, reason: String },

    #[error("instance {instance} cannot be placed: {reason}")]
    InvalidPlacement {
        instance: String,
        reason: PlacementFailure,
    },

    #[error("instance template must request memory or disk")]
    EmptyTemplate,

    #[error("unsupported redundancy factor {0} (expected 1 or 2)")]
    InvalidRedundancy(u8),
}

/// Why a single structural placement was rejected.
///
/// These are not fatal: the allocator attaches one to every failed
/// candidate and the planner simply drops that candidate.
#[derive(Debug, Clone, PartialEq, Eq, Error, Serialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum PlacementFailure {
    #[error("node {node} is offline")]
    Offline { node: NodeIdx },

    #[error("node {node} does not exist")]
    UnknownNode { node: NodeIdx },

    #[error("node {node} lacks memory (need {needed} MiB, free {free} MiB)")]
    InsufficientMemory { node: NodeIdx, needed: u64, free: u64 },

    #[error("node {node} lacks disk (need {needed} MiB, free {free} MiB)")]
    InsufficientDisk { node: NodeIdx, needed: u64, free: u64 },

    #[error("node {node} would no longer survive a peer failure")]
    N1Violation { node: NodeIdx },

    #[error("primary and secondary are both node {node}")]
    SameNode { node: NodeIdx },

    #[error("instance needs {expected} node(s), got {got}")]
    RedundancyMismatch { expected: usize, got: usize },

    #[error("instance identity {idx} already in use")]
    IdentityInUse { idx: InstanceIdx },
}
