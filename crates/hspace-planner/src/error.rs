//! Planner error types.
//!
//! Only conditions that must abort a planning run live here. The normal
//! ways a capacity search ends are [`StopReason`](crate::StopReason)s.

use hspace_core::ModelError;
use thiserror::Error;

/// Errors that abort a planning run.
#[derive(Debug, Error)]
pub enum PlanError {
    #[error("unknown offline node name(s): {}", .0.join(", "))]
    InvalidOfflineName(Vec<String>),

    #[error("cluster is not N+1 compliant, failing node(s): {}", .0.join(", "))]
    PreconditionViolated(Vec<String>),

    #[error("allocator attempted no placement for the first instance")]
    NoCandidates,

    #[error("instance identity space exhausted at depth {0}")]
    IdentityExhausted(usize),

    #[error(transparent)]
    Model(#[from] ModelError),
}

pub type PlanResult<T> = Result<T, PlanError>;
