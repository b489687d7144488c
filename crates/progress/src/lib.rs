//! Progress Tracking
//!
//! Goal progress state machine, period decomposition and catch-up guidance,
//! and streak derivation. Everything here is a pure function of its inputs;
//! "now" is always passed in.

#![warn(missing_docs)]

pub mod error;
pub mod tracker;
pub mod period;
pub mod streak;

pub use error::{ProgressError, Result};
pub use tracker::{ProgressCalculator, ProgressOutcome};
pub use period::{
    GoalInsight, Granularity, PeriodBucket, PeriodDecomposer, Suggestion, SuggestionKind,
};
pub use streak::{StreakState, StreakStatus, StreakTracker, DEFAULT_STREAK_MILESTONES};
