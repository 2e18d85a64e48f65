//! Capacity search.
//!
//! Repeatedly asks the allocator to place one more synthetic instance,
//! keeps the best-balanced outcome and moves on, until the allocator can
//! no longer produce a single viable placement. The search is greedy: it
//! never backtracks, so each depth is locally optimal for the scorer
//! rather than globally optimal for the final count.

use hspace_core::{ClusterSnapshot, InstanceIdx, InstanceTemplate, NodeIdx, Redundancy};
use hspace_placement::{AllocationAttempt, Allocator, Scorer};
use serde::Serialize;
use tracing::{debug, info};

use crate::error::{PlanError, PlanResult};
use crate::selection::select_best;

/// Why a capacity search ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StopReason {
    /// The allocator could not attempt any placement.
    AllocatorUnavailable,
    /// Every attempted placement failed.
    AllAttemptsFailed,
    /// The configured depth limit was reached.
    DepthLimit,
    /// Every instance identity is taken; nothing more can be named.
    IdentitiesExhausted,
}

impl StopReason {
    pub fn describe(self) -> &'static str {
        match self {
            StopReason::AllocatorUnavailable => "not enough online nodes for the requested redundancy",
            StopReason::AllAttemptsFailed => "no node (pair) can host another instance",
            StopReason::DepthLimit => "depth limit reached",
            StopReason::IdentitiesExhausted => "instance identity space exhausted",
        }
    }
}

/// One accepted placement.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PlacementStep {
    /// Depth before this placement (the `n` in `new-n`).
    pub depth: usize,
    pub instance: InstanceIdx,
    pub name: String,
    pub nodes: Vec<NodeIdx>,
    pub score: f64,
    /// Candidates returned by the allocator.
    pub candidates: usize,
    /// Candidates that placed successfully.
    pub viable: usize,
    /// Best score among the rejected successful candidates.
    pub runner_up: Option<f64>,
}

/// Outcome of a capacity search.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CapacityResult {
    /// Cluster after the last accepted placement.
    pub snapshot: ClusterSnapshot,
    /// Number of synthetic instances placed.
    pub depth: usize,
    pub stop_reason: StopReason,
    pub steps: Vec<PlacementStep>,
}

/// Tunables for a capacity search.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PlannerConfig {
    /// Stop after this many placements.
    pub max_depth: Option<usize>,
}

/// Greedy capacity planner over a pluggable allocator and scorer.
#[derive(Debug, Clone)]
pub struct CapacityPlanner<A, S> {
    allocator: A,
    scorer: S,
    config: PlannerConfig,
}

impl<A: Allocator, S: Scorer> CapacityPlanner<A, S> {
    pub fn new(allocator: A, scorer: S) -> Self {
        Self {
            allocator,
            scorer,
            config: PlannerConfig::default(),
        }
    }

    pub fn with_config(mut self, config: PlannerConfig) -> Self {
        self.config = config;
        self
    }

    /// Place copies of `template` until no further copy fits.
    ///
    /// Synthetic instances are named `new-<depth>` and take identities
    /// from a counter seeded just past the highest identity in `initial`,
    /// so they never collide with existing or earlier synthetic ones.
    /// A snapshot with no free identity at all is an error; running out
    /// mid-search ends it with [`StopReason::IdentitiesExhausted`].
    pub fn compute_capacity(
        &self,
        initial: ClusterSnapshot,
        template: &InstanceTemplate,
        redundancy: Redundancy,
    ) -> PlanResult<CapacityResult> {
        template.validate()?;

        let mut next_idx = Some(
            initial
                .next_instance_idx()
                .ok_or(PlanError::IdentityExhausted(0))?,
        );
        let mut current = initial;
        let mut depth = 0usize;
        let mut steps = Vec::new();

        let stop_reason = loop {
            if self.config.max_depth.is_some_and(|max| depth >= max) {
                break StopReason::DepthLimit;
            }
            let Some(idx) = next_idx else {
                debug!(depth, "no instance identity left");
                break StopReason::IdentitiesExhausted;
            };

            let instance = template.instantiate(idx, format!("new-{depth}"), redundancy);
            let candidates = match self.allocator.try_place(&current, &instance, redundancy) {
                AllocationAttempt::Unavailable { online, required } => {
                    debug!(depth, online, required, "allocator unavailable");
                    break StopReason::AllocatorUnavailable;
                }
                AllocationAttempt::Candidates(candidates) => candidates,
            };

            if candidates.is_empty() && depth == 0 {
                return Err(PlanError::NoCandidates);
            }

            let tried = candidates.len();
            let Some(selection) = select_best(&self.scorer, candidates) else {
                debug!(depth, candidates = tried, "all candidates failed");
                break StopReason::AllAttemptsFailed;
            };

            info!(
                depth,
                instance = %instance.name,
                nodes = ?selection.nodes,
                score = selection.score,
                candidates = tried,
                viable = selection.viable,
                "instance placed"
            );
            steps.push(PlacementStep {
                depth,
                instance: instance.idx,
                name: instance.name,
                nodes: selection.nodes,
                score: selection.score,
                candidates: tried,
                viable: selection.viable,
                runner_up: selection.runner_up,
            });

            current = selection.snapshot;
            depth += 1;
            next_idx = idx.checked_add(1);
        };

        info!(depth, reason = ?stop_reason, "capacity search finished");
        Ok(CapacityResult {
            snapshot: current,
            depth,
            stop_reason,
            steps,
        })
    }
}
