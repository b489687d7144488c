//! Reward catalog and per-user reward state.

use std::collections::BTreeSet;
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use crate::calendar;
use crate::id::{GoalId, RewardId, UserId};
use crate::notification::Notification;
use crate::Time;

/// A catalog entry. Reference data, read-only at runtime.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Reward {
    /// Stable slug
    pub id: RewardId,
    /// Display name
    pub name: String,
    /// Short description
    #[serde(default)]
    pub description: String,
    /// Badge or achievement
    #[serde(rename = "type")]
    pub kind: RewardType,
    /// Grouping for display
    pub category: String,
    /// Points granted on unlock
    pub points_value: u64,
    /// Rarity tier
    pub rarity: Rarity,
    /// Unlock rule
    pub criteria: Criteria,
}

/// Reward type.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RewardType {
    /// Visible badge
    Badge,
    /// Achievement
    Achievement,
}

/// Rarity tier.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Rarity {
    /// Most users get it
    Common,
    /// Some effort
    Uncommon,
    /// Dedicated users
    Rare,
    /// Very few users
    Epic,
    /// Hall of fame
    Legendary,
}

/// Unlock rule for a reward.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Criteria {
    /// Which statistic is compared
    #[serde(rename = "type")]
    pub kind: CriterionType,
    /// Minimum value of the statistic
    pub threshold: f64,
    /// Window the statistic is scoped to
    #[serde(default)]
    pub timeframe: Timeframe,
    /// Flag name for `custom` criteria
    #[serde(default)]
    pub key: Option<String>,
}

/// The closed set of criterion types.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CriterionType {
    /// Current streak length in days
    StreakDays,
    /// Number of completed sessions
    SessionsCount,
    /// Hours studied
    StudyHours,
    /// Goals completed
    GoalsCompleted,
    /// Sessions started early in the morning
    EarlyBird,
    /// Sessions started late at night
    NightOwl,
    /// Upstream-computed perfect week flag
    PerfectWeek,
    /// Upstream-computed named flag
    Custom,
}

/// Window a statistic or leaderboard is scoped to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Timeframe {
    /// No window
    #[default]
    Alltime,
    /// Current ISO week
    Weekly,
    /// Current calendar month
    Monthly,
}

impl Timeframe {
    /// First day of the window containing `date`, or None for all-time.
    pub fn window_start(self, date: NaiveDate) -> Option<NaiveDate> {
        match self {
            Timeframe::Alltime => None,
            Timeframe::Weekly => Some(calendar::week_start(date)),
            Timeframe::Monthly => Some(calendar::month_start(date)),
        }
    }

    /// Whether `at` falls in the window containing `as_of`.
    pub fn contains(self, at: Time, as_of: Time) -> bool {
        match self.window_start(as_of.date_naive()) {
            None => true,
            Some(start) => {
                let day = at.date_naive();
                day >= start && day <= as_of.date_naive()
            }
        }
    }
}

impl std::str::FromStr for Timeframe {
    type Err = crate::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "alltime" | "all" => Ok(Timeframe::Alltime),
            "weekly" | "week" => Ok(Timeframe::Weekly),
            "monthly" | "month" => Ok(Timeframe::Monthly),
            other => Err(crate::ValidationError::Invalid(format!(
                "unknown timeframe '{other}'"
            ))),
        }
    }
}

/// Monotonic lifetime counters.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct LifetimeStats {
    /// Completed sessions
    pub total_sessions: u64,
    /// Hours studied
    pub total_study_hours: f64,
    /// Goals completed
    pub total_goals_completed: u64,
    /// Early-morning sessions
    pub early_bird_count: u64,
    /// Late-night sessions
    pub night_owl_count: u64,
}

impl LifetimeStats {
    /// Field-wise maximum, so counters never decrease.
    pub fn merge_max(&mut self, other: &LifetimeStats) {
        self.total_sessions = self.total_sessions.max(other.total_sessions);
        self.total_study_hours = self.total_study_hours.max(other.total_study_hours);
        self.total_goals_completed = self.total_goals_completed.max(other.total_goals_completed);
        self.early_bird_count = self.early_bird_count.max(other.early_bird_count);
        self.night_owl_count = self.night_owl_count.max(other.night_owl_count);
    }
}

/// Counters scoped to one calendar window (week or month).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct WindowStats {
    /// First day of the window these counters belong to
    pub window_start: Option<NaiveDate>,
    /// Sessions in the window
    pub sessions: u64,
    /// Hours in the window
    pub study_hours: f64,
    /// Goals completed in the window
    pub goals_completed: u64,
    /// Early-bird sessions in the window
    pub early_bird: u64,
    /// Night-owl sessions in the window
    pub night_owl: u64,
}

impl WindowStats {
    /// Move the counters forward to the window starting at `window_start`.
    ///
    /// Returns whether the counters now belong to that window. Windows only
    /// move forward: an older `window_start` leaves them untouched and
    /// returns false.
    pub fn roll_to(&mut self, window_start: NaiveDate) -> bool {
        match self.window_start {
            Some(current) if current == window_start => true,
            Some(current) if current > window_start => false,
            _ => {
                *self = WindowStats {
                    window_start: Some(window_start),
                    ..Default::default()
                };
                true
            }
        }
    }

    /// Field-wise maximum of the session counters. Goal completions are
    /// credited separately and left as they are.
    pub fn merge_sessions_max(&mut self, other: &WindowStats) {
        self.sessions = self.sessions.max(other.sessions);
        self.study_hours = self.study_hours.max(other.study_hours);
        self.early_bird = self.early_bird.max(other.early_bird);
        self.night_owl = self.night_owl.max(other.night_owl);
    }

    /// The counters if they belong to `window_start`, zeros otherwise.
    pub fn scoped(&self, window_start: NaiveDate) -> WindowStats {
        if self.window_start == Some(window_start) {
            self.clone()
        } else {
            WindowStats {
                window_start: Some(window_start),
                ..Default::default()
            }
        }
    }
}

/// Cached streak summary.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct StreakData {
    /// Consecutive active days ending today or yesterday
    pub current_streak: u32,
    /// Longest run ever observed
    pub longest_streak: u32,
    /// Last day with activity
    pub last_active_date: Option<NaiveDate>,
}

/// A reward a user holds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EarnedReward {
    /// Catalog id
    pub reward_id: RewardId,
    /// When unlocked
    pub earned_at: Time,
    /// Points credited at unlock time
    pub points: u64,
}

/// An administrative point grant.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BonusGrant {
    /// Points granted
    pub points: u64,
    /// Why
    pub reason: String,
    /// When
    pub granted_at: Time,
}

/// Per-user reward state. Mutated additively.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct UserRewards {
    /// Owner
    pub user_id: UserId,
    /// Sum of earned reward points plus bonus grants
    pub total_points: u64,
    /// Level derived from `total_points`
    pub current_level: u32,
    /// Percentage toward the next level
    pub level_progress: f64,
    /// Unlocked rewards, no duplicate ids
    pub earned_rewards: Vec<EarnedReward>,
    /// Administrative grants
    #[serde(default)]
    pub bonus_grants: Vec<BonusGrant>,
    /// Lifetime counters
    pub lifetime_stats: LifetimeStats,
    /// Current ISO week counters
    #[serde(default)]
    pub weekly_stats: WindowStats,
    /// Current month counters
    #[serde(default)]
    pub monthly_stats: WindowStats,
    /// Streak summary
    pub streak_data: StreakData,
    /// Queued, undelivered events
    pub pending_notifications: Vec<Notification>,
    /// Goals already counted in `goals_completed`
    #[serde(default)]
    pub credited_goals: BTreeSet<GoalId>,
    /// Storage version used for optimistic concurrency
    #[serde(default)]
    pub version: u64,
}

impl UserRewards {
    /// Fresh state for a user.
    pub fn new(user_id: UserId) -> Self {
        Self {
            user_id,
            total_points: 0,
            current_level: 1,
            level_progress: 0.0,
            earned_rewards: Vec::new(),
            bonus_grants: Vec::new(),
            lifetime_stats: LifetimeStats::default(),
            weekly_stats: WindowStats::default(),
            monthly_stats: WindowStats::default(),
            streak_data: StreakData::default(),
            pending_notifications: Vec::new(),
            credited_goals: BTreeSet::new(),
            version: 0,
        }
    }

    /// Whether the reward is already held.
    pub fn has_earned(&self, reward_id: &RewardId) -> bool {
        self.earned_rewards.iter().any(|r| &r.reward_id == reward_id)
    }

    /// Points from earned rewards.
    pub fn earned_points(&self) -> u64 {
        self.earned_rewards.iter().map(|r| r.points).sum()
    }

    /// Points from bonus grants.
    pub fn bonus_points(&self) -> u64 {
        self.bonus_grants.iter().map(|g| g.points).sum()
    }

    /// Whether `total_points` matches its audit trail.
    pub fn points_balanced(&self) -> bool {
        self.total_points == self.earned_points() + self.bonus_points()
    }

    /// Roll the windowed counters forward to the windows containing `date`.
    pub fn roll_windows(&mut self, date: NaiveDate) {
        self.weekly_stats.roll_to(calendar::week_start(date));
        self.monthly_stats.roll_to(calendar::month_start(date));
    }

    /// The windowed counters `date` falls in, rolled forward as needed. A
    /// date before a window's current start yields nothing for that window.
    pub fn windows_for(&mut self, date: NaiveDate) -> Vec<&mut WindowStats> {
        let mut windows = Vec::with_capacity(2);
        if self.weekly_stats.roll_to(calendar::week_start(date)) {
            windows.push(&mut self.weekly_stats);
        }
        if self.monthly_stats.roll_to(calendar::month_start(date)) {
            windows.push(&mut self.monthly_stats);
        }
        windows
    }

    /// Count a completed goal. Each goal id counts once, however often it is
    /// reopened and completed again. Returns false when already counted.
    pub fn credit_goal(&mut self, goal_id: GoalId, completed_at: Time) -> bool {
        if !self.credited_goals.insert(goal_id) {
            return false;
        }
        self.lifetime_stats.total_goals_completed += 1;
        for window in self.windows_for(completed_at.date_naive()) {
            window.goals_completed += 1;
        }
        true
    }
}
