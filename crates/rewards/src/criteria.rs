//! Reward criteria evaluation.
//!
//! Each criterion type maps to exactly one statistic; a reward qualifies when
//! that statistic reaches its threshold. Evaluation never consumes the
//! statistics, it only checks `earned_rewards` membership, so re-running it on
//! an unchanged snapshot awards nothing.

use std::collections::HashSet;
use serde::Serialize;
use studytrack_core::calendar::{month_start, week_start};
use studytrack_core::{
    Criteria, CriterionType, EarnedReward, Notification, NotificationKind, Reward, RewardId,
    Time, Timeframe, UserRewards, WindowStats,
};
use tracing::{debug, info, warn};
use crate::LevelCurve;

/// Inputs that are not part of the stored reward state.
#[derive(Debug, Clone)]
pub struct EvaluationContext {
    /// Evaluation time; scopes weekly/monthly counters and stamps awards
    pub as_of: Time,
    /// Upstream-computed perfect week flag
    pub perfect_week: bool,
    /// Upstream-computed flags for `custom` criteria
    pub custom_flags: HashSet<String>,
}

impl EvaluationContext {
    /// Context with no upstream flags.
    pub fn new(as_of: Time) -> Self {
        Self {
            as_of,
            perfect_week: false,
            custom_flags: HashSet::new(),
        }
    }

    /// Set the perfect week flag.
    pub fn with_perfect_week(mut self, perfect_week: bool) -> Self {
        self.perfect_week = perfect_week;
        self
    }

    /// Raise a custom flag.
    pub fn with_flag(mut self, flag: impl Into<String>) -> Self {
        self.custom_flags.insert(flag.into());
        self
    }
}

/// A reward unlocked by an evaluation call.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct NewlyEarnedReward {
    /// Catalog id
    pub reward_id: RewardId,
    /// Display name
    pub name: String,
    /// Points credited
    pub points: u64,
}

/// Evaluates the catalog against a user's statistics.
#[derive(Debug, Clone, Default)]
pub struct CriteriaEvaluator {
    curve: LevelCurve,
}

impl CriteriaEvaluator {
    /// Evaluator using the given level curve.
    pub fn new(curve: LevelCurve) -> Self {
        Self { curve }
    }

    /// The statistic a criterion compares, scoped to its timeframe.
    pub fn stat_value(&self, rewards: &UserRewards, criteria: &Criteria, ctx: &EvaluationContext) -> f64 {
        let day = ctx.as_of.date_naive();
        let window = |tf: Timeframe| -> Option<WindowStats> {
            match tf {
                Timeframe::Alltime => None,
                Timeframe::Weekly => Some(rewards.weekly_stats.scoped(week_start(day))),
                Timeframe::Monthly => Some(rewards.monthly_stats.scoped(month_start(day))),
            }
        };
        let lifetime = &rewards.lifetime_stats;

        match criteria.kind {
            CriterionType::StreakDays => rewards.streak_data.current_streak as f64,
            CriterionType::SessionsCount => match window(criteria.timeframe) {
                Some(w) => w.sessions as f64,
                None => lifetime.total_sessions as f64,
            },
            CriterionType::StudyHours => match window(criteria.timeframe) {
                Some(w) => w.study_hours,
                None => lifetime.total_study_hours,
            },
            CriterionType::GoalsCompleted => match window(criteria.timeframe) {
                Some(w) => w.goals_completed as f64,
                None => lifetime.total_goals_completed as f64,
            },
            CriterionType::EarlyBird => match window(criteria.timeframe) {
                Some(w) => w.early_bird as f64,
                None => lifetime.early_bird_count as f64,
            },
            CriterionType::NightOwl => match window(criteria.timeframe) {
                Some(w) => w.night_owl as f64,
                None => lifetime.night_owl_count as f64,
            },
            CriterionType::PerfectWeek => flag(ctx.perfect_week),
            CriterionType::Custom => {
                let key = criteria.key.as_deref().unwrap_or_default();
                flag(!key.is_empty() && ctx.custom_flags.contains(key))
            }
        }
    }

    /// Whether a reward's criterion is met. Flag criteria use threshold 1.
    pub fn qualifies(&self, rewards: &UserRewards, reward: &Reward, ctx: &EvaluationContext) -> bool {
        let threshold = match reward.criteria.kind {
            CriterionType::PerfectWeek | CriterionType::Custom => 1.0,
            _ => reward.criteria.threshold,
        };
        self.stat_value(rewards, &reward.criteria, ctx) >= threshold
    }

    /// Catalog entries not yet held that now qualify, in catalog order.
    pub fn qualifying<'a>(
        &self,
        rewards: &UserRewards,
        catalog: &'a [Reward],
        ctx: &EvaluationContext,
    ) -> Vec<&'a Reward> {
        let mut seen: HashSet<RewardId> = HashSet::new();
        catalog
            .iter()
            .filter(|r| !rewards.has_earned(&r.id))
            .filter(|r| seen.insert(r.id.clone()))
            .filter(|r| self.qualifies(rewards, r, ctx))
            .collect()
    }

    /// Award every newly qualifying reward in one state transition.
    ///
    /// Credits points, appends to `earned_rewards`, recomputes the level and
    /// queues notifications.
    pub fn evaluate(
        &self,
        rewards: &mut UserRewards,
        catalog: &[Reward],
        ctx: &EvaluationContext,
    ) -> Vec<NewlyEarnedReward> {
        let qualifying = self.qualifying(rewards, catalog, ctx);
        if qualifying.is_empty() {
            debug!(user = %rewards.user_id, "no new rewards");
            return Vec::new();
        }

        let mut earned = Vec::with_capacity(qualifying.len());
        for reward in qualifying {
            let Some(total) = rewards.total_points.checked_add(reward.points_value) else {
                warn!(user = %rewards.user_id, reward = %reward.id, "point total would overflow; reward left unearned");
                continue;
            };
            rewards.total_points = total;
            rewards.earned_rewards.push(EarnedReward {
                reward_id: reward.id.clone(),
                earned_at: ctx.as_of,
                points: reward.points_value,
            });
            rewards.pending_notifications.push(Notification::new(
                NotificationKind::RewardEarned {
                    reward_id: reward.id.clone(),
                    points: reward.points_value,
                },
                format!("You earned \"{}\" (+{} points)", reward.name, reward.points_value),
                ctx.as_of,
            ));
            info!(user = %rewards.user_id, reward = %reward.id, points = reward.points_value, "reward earned");
            earned.push(NewlyEarnedReward {
                reward_id: reward.id.clone(),
                name: reward.name.clone(),
                points: reward.points_value,
            });
        }

        if let Some(level) = self.curve.apply(rewards) {
            rewards.pending_notifications.push(Notification::new(
                NotificationKind::LevelUp { level },
                format!("Level up! You reached level {level}"),
                ctx.as_of,
            ));
            info!(user = %rewards.user_id, level, "level up");
        }

        earned
    }
}

fn flag(set: bool) -> f64 {
    if set { 1.0 } else { 0.0 }
}
