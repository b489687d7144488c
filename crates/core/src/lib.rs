//! studytrack core data models.
//!
//! This crate defines the data structures shared by the goal progress and
//! rewards engine: goals and their audit trail, the reward catalog, and the
//! per-user reward state.

#![warn(missing_docs)]

// Core identities
mod id;
mod error;

// Goals
mod goal;

// Activity and rewards
mod session;
mod reward;
mod notification;

/// Calendar window helpers.
pub mod calendar;

// Re-exports
pub use id::*;
pub use error::ValidationError;

pub use goal::{
    Goal, GoalFilter, GoalSpec, GoalStatus, Milestone, MilestoneSpec, Period, ProgressEntry, ProgressSource,
    SharedGuardian, SubTask, Visibility,
};
pub use session::SessionCompleted;
pub use reward::{
    BonusGrant, Criteria, CriterionType, EarnedReward, LifetimeStats, Rarity, Reward, RewardType,
    StreakData, Timeframe, UserRewards, WindowStats,
};
pub use notification::{Notification, NotificationKind};

/// Timestamp type
pub type Time = chrono::DateTime<chrono::Utc>;
