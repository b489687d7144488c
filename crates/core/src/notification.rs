//! Queued notification records. Delivery happens elsewhere.

use crate::id::{GoalId, NotificationId, RewardId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A notification waiting to be delivered to the user.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Notification {
    /// Unique identifier
    pub id: NotificationId,

    /// What happened
    pub kind: NotificationKind,

    /// Human-readable message
    pub message: String,

    /// When queued
    pub created_at: Time,
}

/// Notification payloads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum NotificationKind {
    /// A reward was unlocked
    RewardEarned {
        /// Reward id
        reward_id: RewardId,
        /// Points credited
        points: u64,
    },
    /// A goal reached its target
    GoalCompleted {
        /// Goal id
        goal_id: GoalId,
    },
    /// The user reached a new level
    LevelUp {
        /// New level
        level: u32,
    },
    /// A streak milestone was reached
    StreakMilestone {
        /// Streak length
        days: u32,
    },
}

impl Notification {
    /// Create a notification.
    pub fn new(kind: NotificationKind, message: impl Into<String>, created_at: Time) -> Self {
        Self {
            id: NotificationId::new(),
            kind,
            message: message.into(),
            created_at,
        }
    }
}
