//! Errors raised by goal state changes.

use studytrack_core::{GoalId, GoalStatus, SubTaskId, ValidationError};

/// Result alias for progress operations.
pub type Result<T> = std::result::Result<T, ProgressError>;

/// Why a goal mutation was rejected. A rejected call never mutates the goal.
#[derive(Debug, Clone, PartialEq, thiserror::Error)]
pub enum ProgressError {
    /// Progress submitted to a goal that is not active
    #[error("goal {goal} is {status}; progress rejected")]
    NotActive {
        /// Goal
        goal: GoalId,
        /// Its status
        status: GoalStatus,
    },

    /// Status change not allowed by the lifecycle
    #[error("cannot move goal from {from} to {to}")]
    InvalidTransition {
        /// Current status
        from: GoalStatus,
        /// Requested status
        to: GoalStatus,
    },

    /// Unknown subtask id
    #[error("subtask {0} not found")]
    SubTaskNotFound(SubTaskId),

    /// Delta was NaN or infinite
    #[error("progress delta must be a finite number")]
    NonFiniteDelta,

    /// Malformed milestone or subtask input
    #[error(transparent)]
    Validation(#[from] ValidationError),
}
