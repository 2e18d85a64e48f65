//! hspace-planner: how many more instances fit?
//!
//! Given a cluster snapshot and an instance shape, the planner places
//! synthetic copies one at a time, always keeping the best-balanced
//! outcome, until no further copy fits. The count of accepted copies is
//! the cluster's remaining capacity for that shape.
//!
//! # Architecture
//!
//! ```text
//! plan()
//!   ├── apply_offline      (name list → offline flags, unknown names fatal)
//!   ├── check_redundancy   (RedundancyValidator, violation fatal)
//!   └── CapacityPlanner::compute_capacity
//!         ├── Allocator    (candidate placements per depth)
//!         ├── select_best  (Scorer, first minimal score wins)
//!         └── StopReason   (unavailable / all failed / depth limit)
//! ```

pub mod error;
pub mod planner;
pub mod precondition;
pub mod selection;

pub use error::{PlanError, PlanResult};
pub use planner::{CapacityPlanner, CapacityResult, PlacementStep, PlannerConfig, StopReason};
pub use precondition::{PlanOutcome, apply_offline, check_redundancy, plan};
pub use selection::{Selection, select_best};
