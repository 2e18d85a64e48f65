//! hspace-core: the in-memory cluster model.
//!
//! Nodes and instances keyed by stable integer identities, grouped into
//! immutable [`ClusterSnapshot`]s. The capacity planner and its
//! collaborators only ever read a snapshot or derive a new one from it.
//!
//! # Components
//!
//! - **`types`**: `Node`, `Instance`, `InstanceTemplate`, `Redundancy`
//! - **`snapshot`**: `ClusterSnapshot`, offline adjustment, placement
//! - **`inventory`**: TOML inventory parsing into a snapshot

pub mod error;
pub mod inventory;
pub mod snapshot;
pub mod types;

pub use error::{ModelError, ModelResult, PlacementFailure};
pub use inventory::Inventory;
pub use snapshot::{ClusterSnapshot, ClusterTotals};
pub use types::*;
