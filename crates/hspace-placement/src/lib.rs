//! hspace-placement: collaborators consumed by the capacity planner.
//!
//! Each concern sits behind a small trait so the planner can be driven
//! by alternative strategies (or scripted ones in tests).
//!
//! # Components
//!
//! - **`allocator`**: `Allocator` trait, exhaustive `PairAllocator`
//! - **`scorer`**: `Scorer` trait, std-dev based `BalanceScorer`
//! - **`validator`**: `RedundancyValidator` trait, `FailoverValidator`

pub mod allocator;
pub mod scorer;
pub mod validator;

pub use allocator::{AllocationAttempt, Allocator, CandidateOutcome, PairAllocator};
pub use scorer::{BalanceScorer, ScoreBreakdown, Scorer, ScoringWeights};
pub use validator::{FailoverValidator, RedundancyValidator};
