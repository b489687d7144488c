//! The study engine - turns activity into goal progress, streaks and rewards.

use std::collections::BTreeSet;
use std::sync::Arc;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use studytrack_core::calendar::{month_start, next_month_start, week_start};
use studytrack_core::{
    Goal, GoalFilter, GoalId, GoalSpec, GoalStatus, MilestoneId, MilestoneSpec, Notification,
    NotificationKind, ProgressSource, Reward, SessionCompleted, SessionId, SubTaskId, Time,
    Timeframe, UserId, UserRewards, ValidationError, WindowStats,
};
use studytrack_progress::{
    GoalInsight, Granularity, PeriodBucket, PeriodDecomposer, ProgressCalculator, ProgressOutcome,
    StreakState, StreakStatus, StreakTracker, Suggestion,
};
use studytrack_rewards::{
    default_catalog, CriteriaEvaluator, EvaluationContext, LeaderboardEntry, LevelCurve,
    NewlyEarnedReward, RankPosition, Ranker, Tip, TipPicker, WeightedSelector,
};
use studytrack_storage::Storage;
use tokio::sync::Mutex;
use tracing::{debug, info, warn};
use crate::activity::{ActivitySource, StoredActivitySource};
use crate::notify::NotificationSink;
use crate::{EngineConfig, EngineError, Result};

const MAX_SESSION_SECONDS: u64 = 24 * 60 * 60;

/// A goal after a progress submission.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressUpdate {
    /// The saved goal
    pub goal: Goal,
    /// Change to `current_progress` after clamping
    pub applied_delta: f64,
    /// Milestones completed by this submission
    pub completed_milestones: Vec<MilestoneId>,
    /// Whether this submission completed the goal
    pub just_completed: bool,
}

impl ProgressUpdate {
    fn new(goal: Goal, outcome: ProgressOutcome) -> Self {
        Self {
            goal,
            applied_delta: outcome.applied_delta,
            completed_milestones: outcome.completed_milestones,
            just_completed: outcome.just_completed,
        }
    }
}

/// Catch-up advice for one of a user's goals.
#[derive(Debug, Clone, Serialize)]
pub struct GoalSuggestion {
    /// Goal
    pub goal_id: GoalId,
    /// Goal title
    pub title: String,
    /// The advice
    pub suggestion: Suggestion,
}

/// How a session moved one goal.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalProgress {
    /// Goal
    pub goal_id: GoalId,
    /// Change to `current_progress` after clamping
    pub applied_delta: f64,
    /// Milestones completed by the session
    pub completed_milestones: Vec<MilestoneId>,
    /// Whether the session completed the goal
    pub just_completed: bool,
}

/// Everything a completed session changed.
#[derive(Debug, Clone, Serialize)]
pub struct SessionOutcome {
    /// Session
    pub session_id: SessionId,
    /// The session had already been processed; nothing changed
    pub duplicate: bool,
    /// Goals the session contributed to
    pub goals: Vec<GoalProgress>,
    /// Streak after the session, when the reward step succeeded
    pub streak: Option<StreakState>,
    /// Rewards unlocked by the session
    pub newly_earned: Vec<NewlyEarnedReward>,
    /// Whether the reward state was updated
    pub rewards_updated: bool,
}

/// The study engine.
///
/// Chains activity through the pure components:
/// ```text
/// Session → Goal progress (per goal) → Stats + Streak → Reward evaluation
/// ```
/// Goal and reward state are separate aggregates, each saved with an
/// optimistic version check and retried on conflict.
pub struct StudyEngine<S: Storage + 'static> {
    storage: Arc<S>,
    config: EngineConfig,
    activity: Option<Arc<dyn ActivitySource>>,
    sink: Option<Arc<dyn NotificationSink>>,
    calculator: ProgressCalculator,
    decomposer: PeriodDecomposer,
    ranker: Ranker,
    tips: TipPicker,
    selector: Mutex<WeightedSelector>,
}

impl<S: Storage + 'static> StudyEngine<S> {
    /// Create an engine over `storage`.
    pub fn new(storage: S) -> Self {
        Self::from_arc(Arc::new(storage))
    }

    /// Create an engine over shared storage.
    pub fn from_arc(storage: Arc<S>) -> Self {
        Self {
            storage,
            config: EngineConfig::default(),
            activity: None,
            sink: None,
            calculator: ProgressCalculator::new(),
            decomposer: PeriodDecomposer::new(),
            ranker: Ranker::new(),
            tips: TipPicker::default(),
            selector: Mutex::new(WeightedSelector::from_entropy()),
        }
    }

    /// Set the configuration.
    pub fn with_config(mut self, config: EngineConfig) -> Self {
        self.config = config;
        self
    }

    /// Read activity from an external source instead of stored sessions.
    pub fn with_activity(mut self, activity: Arc<dyn ActivitySource>) -> Self {
        self.activity = Some(activity);
        self
    }

    /// Forward queued notifications to a sink.
    pub fn with_sink(mut self, sink: Arc<dyn NotificationSink>) -> Self {
        self.sink = Some(sink);
        self
    }

    /// Replace the tip list.
    pub fn with_tips(mut self, tips: TipPicker) -> Self {
        self.tips = tips;
        self
    }

    /// Make tip selection reproducible.
    pub fn with_seed(mut self, seed: u64) -> Self {
        self.selector = Mutex::new(WeightedSelector::seeded(seed));
        self
    }

    /// The configuration in use.
    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Get a reference to the storage.
    pub fn storage(&self) -> &S {
        &self.storage
    }

    // === Goals ===

    /// Create a goal for `user_id`.
    pub async fn create_goal(&self, user_id: &UserId, spec: GoalSpec, now: Time) -> Result<Goal> {
        let mut goal = Goal::from_spec(user_id.clone(), spec, now)?;
        for m in goal.unreachable_milestones() {
            warn!(goal = %goal.id, milestone = %m.id, target = m.target, "milestone above goal target");
        }
        goal.version = self.storage.save_goal(&goal).await?;
        info!(goal = %goal.id, user = %user_id, "goal created");
        Ok(goal)
    }

    /// Load a goal.
    pub async fn get_goal(&self, goal_id: GoalId) -> Result<Goal> {
        self.storage
            .load_goal(goal_id)
            .await?
            .ok_or_else(|| EngineError::not_found("goal", goal_id))
    }

    /// A user's goals, optionally restricted to some statuses.
    pub async fn list_goals(&self, user_id: &UserId, status: Option<Vec<GoalStatus>>) -> Result<Vec<Goal>> {
        let mut filter = GoalFilter::for_user(user_id.clone());
        filter.status = status;
        Ok(self.storage.list_goals(&filter).await?)
    }

    /// Apply a manual progress delta to a goal.
    ///
    /// Completing the goal also credits the user's reward state. That second
    /// step is best effort: its failure is logged and never undoes the goal
    /// update.
    pub async fn apply_progress(&self, goal_id: GoalId, delta: f64, notes: &str, now: Time) -> Result<ProgressUpdate> {
        let calculator = self.calculator;
        let (goal, outcome) = self
            .update_goal(goal_id, |g| {
                calculator
                    .apply_progress(g, delta, ProgressSource::Manual, None, notes, now)
                    .map_err(EngineError::from)
            })
            .await?;

        if outcome.just_completed {
            self.credit_completions(&goal.user_id, now).await;
        }
        Ok(ProgressUpdate::new(goal, outcome))
    }

    /// Append a milestone.
    pub async fn add_milestone(&self, goal_id: GoalId, spec: MilestoneSpec, now: Time) -> Result<Goal> {
        let calculator = self.calculator;
        let (goal, _) = self
            .update_goal(goal_id, |g| {
                calculator.add_milestone(g, spec.clone(), now).map_err(EngineError::from)
            })
            .await?;
        Ok(goal)
    }

    /// Append a subtask.
    pub async fn add_subtask(&self, goal_id: GoalId, title: &str, now: Time) -> Result<(Goal, SubTaskId)> {
        let calculator = self.calculator;
        self.update_goal(goal_id, |g| calculator.add_subtask(g, title, now).map_err(EngineError::from))
            .await
    }

    /// Flip a subtask's done flag.
    pub async fn toggle_subtask(&self, goal_id: GoalId, subtask_id: SubTaskId, now: Time) -> Result<Goal> {
        let calculator = self.calculator;
        let (goal, done) = self
            .update_goal(goal_id, |g| {
                calculator.toggle_subtask(g, subtask_id, now).map_err(EngineError::from)
            })
            .await?;
        debug!(goal = %goal_id, subtask = %subtask_id, done, "subtask toggled");
        Ok(goal)
    }

    /// Pause, resume, cancel or complete a goal.
    pub async fn set_status(&self, goal_id: GoalId, status: GoalStatus, now: Time) -> Result<Goal> {
        let calculator = self.calculator;
        let (goal, just_completed) = self
            .update_goal(goal_id, |g| calculator.transition(g, status, now).map_err(EngineError::from))
            .await?;
        if just_completed {
            self.credit_completions(&goal.user_id, now).await;
        }
        Ok(goal)
    }

    /// Administrative reset of a completed or cancelled goal.
    pub async fn reopen_goal(&self, goal_id: GoalId, now: Time) -> Result<Goal> {
        let calculator = self.calculator;
        let (goal, _) = self
            .update_goal(goal_id, |g| calculator.reopen(g, now).map_err(EngineError::from))
            .await?;
        Ok(goal)
    }

    /// Hard-delete a goal.
    pub async fn delete_goal(&self, goal_id: GoalId) -> Result<()> {
        self.get_goal(goal_id).await?;
        self.storage.delete_goal(goal_id).await?;
        info!(goal = %goal_id, "goal deleted");
        Ok(())
    }

    /// Derived pace fields for a goal.
    pub async fn goal_insight(&self, goal_id: GoalId, as_of: Time) -> Result<GoalInsight> {
        let goal = self.get_goal(goal_id).await?;
        Ok(self.decomposer.insight(&goal, as_of))
    }

    /// Target and actual progress per calendar week or month.
    pub async fn period_breakdown(
        &self,
        goal_id: GoalId,
        granularity: Granularity,
        as_of: Time,
    ) -> Result<Vec<PeriodBucket>> {
        let goal = self.get_goal(goal_id).await?;
        Ok(self.decomposer.period_breakdown(&goal, granularity, as_of))
    }

    /// Catch-up advice across a user's active goals.
    pub async fn get_catch_up_suggestions(&self, user_id: &UserId, as_of: Time) -> Result<Vec<GoalSuggestion>> {
        let goals = self.list_goals(user_id, Some(vec![GoalStatus::Active])).await?;
        Ok(goals
            .iter()
            .flat_map(|goal| {
                self.decomposer
                    .catch_up_suggestions(goal, as_of)
                    .into_iter()
                    .map(move |suggestion| GoalSuggestion {
                        goal_id: goal.id,
                        title: goal.title.clone(),
                        suggestion,
                    })
            })
            .collect())
    }

    // === Sessions ===

    /// Process a completed study session.
    ///
    /// Moves every matching active goal, records the session, then updates
    /// counters, streak and rewards. Re-delivering the same session changes
    /// nothing.
    pub async fn on_session_completed(&self, event: SessionCompleted) -> Result<SessionOutcome> {
        if event.duration_seconds == 0 {
            return Err(ValidationError::Invalid("session duration must be > 0".to_string()).into());
        }
        if event.duration_seconds > MAX_SESSION_SECONDS {
            return Err(ValidationError::Invalid("session longer than 24 hours".to_string()).into());
        }

        let user_id = event.user_id.clone();
        let known = self.storage.list_sessions(&user_id).await?;
        if known.iter().any(|s| s.session_id == event.session_id) {
            debug!(session = %event.session_id, "session already processed");
            return Ok(SessionOutcome {
                session_id: event.session_id,
                duplicate: true,
                goals: Vec::new(),
                streak: Some(self.get_streak(&user_id, event.started_at).await?),
                newly_earned: Vec::new(),
                rewards_updated: false,
            });
        }

        let ended_at = event.ended_at();
        let goals = self.apply_session_to_goals(&event, ended_at).await?;
        self.storage.save_session(&event).await?;
        info!(session = %event.session_id, user = %user_id, goals = goals.len(), "session recorded");

        let (streak, newly_earned, rewards_updated) =
            match self.apply_session_rewards(&event, ended_at).await {
                Ok((streak, earned)) => (Some(streak), earned, true),
                Err(e) => {
                    warn!(session = %event.session_id, user = %user_id, error = %e, "reward update failed; goal progress kept");
                    (None, Vec::new(), false)
                }
            };

        Ok(SessionOutcome {
            session_id: event.session_id,
            duplicate: false,
            goals,
            streak,
            newly_earned,
            rewards_updated,
        })
    }

    async fn apply_session_to_goals(&self, event: &SessionCompleted, ended_at: Time) -> Result<Vec<GoalProgress>> {
        let calculator = self.calculator;
        let session_id = event.session_id;
        let notes = event.subject.clone().unwrap_or_default();
        let active = self.list_goals(&event.user_id, Some(vec![GoalStatus::Active])).await?;

        let mut moved = Vec::new();
        for goal in active {
            let Some(value) = goal.session_contribution(event) else {
                continue;
            };
            if value <= 0.0 {
                continue;
            }
            let (_, outcome) = self
                .update_goal(goal.id, |g| {
                    let seen = g.entries.iter().any(|e| e.session_id == Some(session_id));
                    if seen || !g.is_active() {
                        return Ok(None);
                    }
                    calculator
                        .apply_progress(g, value, ProgressSource::Session, Some(session_id), notes.as_str(), ended_at)
                        .map(Some)
                        .map_err(EngineError::from)
                })
                .await?;

            if let Some(outcome) = outcome {
                moved.push(GoalProgress {
                    goal_id: goal.id,
                    applied_delta: outcome.applied_delta,
                    completed_milestones: outcome.completed_milestones,
                    just_completed: outcome.just_completed,
                });
            }
        }
        Ok(moved)
    }

    async fn apply_session_rewards(
        &self,
        event: &SessionCompleted,
        ended_at: Time,
    ) -> Result<(StreakState, Vec<NewlyEarnedReward>)> {
        let user_id = &event.user_id;
        let clock = self.config.clock();
        let activity = self.activity();
        let (today, days) = self.activity_days(user_id, event.started_at).await?;
        let source_stats = activity.lifetime_stats(user_id).await?;

        let day = ended_at.date_naive();
        let week = week_start(day);
        let month = month_start(day);
        let source_week = activity.window_stats(user_id, week, week + Duration::days(6)).await?;
        let month_end = next_month_start(day) - Duration::days(1);
        let source_month = activity.window_stats(user_id, month, month_end).await?;

        let completed = self.completed_goals(user_id).await?;
        let tracker = self.tracker();
        let state = tracker.compute(&days, today);
        let catalog = self.storage.load_catalog().await?;
        let evaluator = self.evaluator();
        let ctx = EvaluationContext::new(ended_at).with_perfect_week(is_perfect_week(&days, today));

        let tally = WindowStats {
            window_start: None,
            sessions: 1,
            study_hours: event.hours(),
            goals_completed: 0,
            early_bird: u64::from(clock.is_early_bird(event.started_at)),
            night_owl: u64::from(clock.is_night_owl(event.started_at)),
        };

        let (_, (earned, fresh)) = self
            .update_rewards(user_id, |r| {
                let before = r.pending_notifications.len();

                // A late session from an older window leaves that window alone
                if r.weekly_stats.roll_to(week) {
                    record_session(&mut r.weekly_stats, source_week.as_ref(), &tally);
                }
                if r.monthly_stats.roll_to(month) {
                    record_session(&mut r.monthly_stats, source_month.as_ref(), &tally);
                }
                let life = &mut r.lifetime_stats;
                // Source counters already include this session
                match &source_stats {
                    Some(stats) => life.merge_max(stats),
                    None => {
                        life.total_sessions += 1;
                        life.total_study_hours += tally.study_hours;
                        life.early_bird_count += tally.early_bird;
                        life.night_owl_count += tally.night_owl;
                    }
                }

                credit_completed(r, &completed, ended_at);

                if let Some(milestone) = tracker.newly_reached(r.streak_data.current_streak, state.current_streak) {
                    r.pending_notifications.push(Notification::new(
                        NotificationKind::StreakMilestone { days: milestone },
                        format!("{milestone} day streak! Keep it going"),
                        ended_at,
                    ));
                    info!(user = %r.user_id, days = milestone, "streak milestone");
                }
                r.streak_data = state.to_data();

                let earned = evaluator.evaluate(r, &catalog, &ctx);
                Ok((earned, r.pending_notifications[before..].to_vec()))
            })
            .await?;

        self.forward(user_id, &fresh).await;
        Ok((state, earned))
    }

    // === Streaks and rewards ===

    /// Streak state on the local day containing `as_of`.
    pub async fn get_streak(&self, user_id: &UserId, as_of: Time) -> Result<StreakState> {
        let (today, days) = self.activity_days(user_id, as_of).await?;
        Ok(self.tracker().compute(&days, today))
    }

    /// A user's reward state; a fresh one when nothing was recorded yet.
    pub async fn user_rewards(&self, user_id: &UserId) -> Result<UserRewards> {
        Ok(self
            .storage
            .load_user_rewards(user_id)
            .await?
            .unwrap_or_else(|| UserRewards::new(user_id.clone())))
    }

    /// The evaluation context for `as_of`, with the perfect week flag derived
    /// from activity.
    pub async fn evaluation_context(&self, user_id: &UserId, as_of: Time) -> Result<EvaluationContext> {
        let (today, days) = self.activity_days(user_id, as_of).await?;
        Ok(EvaluationContext::new(as_of).with_perfect_week(is_perfect_week(&days, today)))
    }

    /// Award every catalog reward the user now qualifies for.
    ///
    /// Completed goals not yet counted, for instance because an earlier
    /// reward update failed, are credited first.
    pub async fn evaluate_rewards(&self, user_id: &UserId, ctx: &EvaluationContext) -> Result<Vec<NewlyEarnedReward>> {
        let catalog = self.storage.load_catalog().await?;
        let completed = self.completed_goals(user_id).await?;
        let evaluator = self.evaluator();
        let (_, (earned, fresh)) = self
            .update_rewards(user_id, |r| {
                let before = r.pending_notifications.len();
                r.roll_windows(ctx.as_of.date_naive());
                credit_completed(r, &completed, ctx.as_of);
                let earned = evaluator.evaluate(r, &catalog, ctx);
                Ok((earned, r.pending_notifications[before..].to_vec()))
            })
            .await?;
        self.forward(user_id, &fresh).await;
        Ok(earned)
    }

    /// Grant administrative bonus points.
    pub async fn grant_bonus(&self, user_id: &UserId, points: u64, reason: &str, now: Time) -> Result<UserRewards> {
        if points == 0 {
            return Err(ValidationError::Invalid("bonus points must be > 0".to_string()).into());
        }
        if reason.trim().is_empty() {
            return Err(ValidationError::MissingField("reason").into());
        }

        let curve = LevelCurve::new(self.config.level_base_points);
        let (rewards, fresh) = self
            .update_rewards(user_id, |r| {
                let total = r.total_points.checked_add(points).ok_or_else(|| {
                    EngineError::InvalidState(format!("bonus of {points} points overflows the point total"))
                })?;
                let before = r.pending_notifications.len();
                r.bonus_grants.push(studytrack_core::BonusGrant {
                    points,
                    reason: reason.to_string(),
                    granted_at: now,
                });
                r.total_points = total;
                if let Some(level) = curve.apply(r) {
                    r.pending_notifications.push(Notification::new(
                        NotificationKind::LevelUp { level },
                        format!("Level up! You reached level {level}"),
                        now,
                    ));
                }
                Ok(r.pending_notifications[before..].to_vec())
            })
            .await?;
        info!(user = %user_id, points, reason, "bonus granted");
        self.forward(user_id, &fresh).await;
        Ok(rewards)
    }

    /// Take every queued notification.
    pub async fn drain_notifications(&self, user_id: &UserId) -> Result<Vec<Notification>> {
        match self.storage.load_user_rewards(user_id).await? {
            Some(r) if !r.pending_notifications.is_empty() => {}
            _ => return Ok(Vec::new()),
        }
        let (_, drained) = self
            .update_rewards(user_id, |r| Ok(std::mem::take(&mut r.pending_notifications)))
            .await?;
        Ok(drained)
    }

    /// Leaderboard for the timeframe containing `as_of`, best first.
    pub async fn get_leaderboard(&self, timeframe: Timeframe, limit: usize, as_of: Time) -> Result<Vec<LeaderboardEntry>> {
        let all = self.storage.list_user_rewards().await?;
        let mut board = self.ranker.rank(&all, timeframe, as_of);
        board.truncate(limit);
        Ok(board)
    }

    /// One user's rank in the timeframe containing `as_of`.
    pub async fn get_rank(&self, user_id: &UserId, timeframe: Timeframe, as_of: Time) -> Result<RankPosition> {
        let all = self.storage.list_user_rewards().await?;
        self.ranker
            .rank_of(user_id, &all, timeframe, as_of)
            .ok_or_else(|| EngineError::not_found("user", user_id))
    }

    /// The reward catalog.
    pub async fn catalog(&self) -> Result<Vec<Reward>> {
        Ok(self.storage.load_catalog().await?)
    }

    /// Install the built-in catalog when the store has none. Returns the
    /// number of rewards installed.
    pub async fn seed_catalog(&self) -> Result<usize> {
        if !self.storage.load_catalog().await?.is_empty() {
            return Ok(0);
        }
        let catalog = default_catalog();
        for reward in &catalog {
            self.storage.save_reward(reward).await?;
        }
        info!(rewards = catalog.len(), "reward catalog seeded");
        Ok(catalog.len())
    }

    /// A motivational tip fitted to the user's situation.
    pub async fn pick_tip(&self, user_id: &UserId, as_of: Time) -> Result<Tip> {
        let streak = self.get_streak(user_id, as_of).await?;
        let goals = self.list_goals(user_id, Some(vec![GoalStatus::Active])).await?;
        let behind = goals.iter().any(|g| self.decomposer.is_overdue(g, as_of));
        let at_risk = streak.status == StreakStatus::AtRisk;

        let mut selector = self.selector.lock().await;
        let tip = self.tips.pick(&mut *selector, at_risk, behind)?;
        Ok(tip.clone())
    }

    // === Internals ===

    fn activity(&self) -> Arc<dyn ActivitySource> {
        match &self.activity {
            Some(activity) => activity.clone(),
            None => Arc::new(StoredActivitySource::new(self.storage.clone(), self.config.clock())),
        }
    }

    fn tracker(&self) -> StreakTracker {
        StreakTracker::new().with_milestones(self.config.streak_milestones.clone())
    }

    fn evaluator(&self) -> CriteriaEvaluator {
        CriteriaEvaluator::new(LevelCurve::new(self.config.level_base_points))
    }

    async fn activity_days(&self, user_id: &UserId, as_of: Time) -> Result<(NaiveDate, BTreeSet<NaiveDate>)> {
        let today = self.config.clock().local_date(as_of);
        let start = today - Duration::days(self.config.activity_history_days.max(1));
        let days = self.activity().activity_dates(user_id, start, today).await?;
        Ok((today, days))
    }

    /// Completed goals of a user with their completion time.
    async fn completed_goals(&self, user_id: &UserId) -> Result<Vec<(GoalId, Time)>> {
        let goals = self.list_goals(user_id, Some(vec![GoalStatus::Completed])).await?;
        Ok(goals
            .iter()
            .filter_map(|g| g.completed_at.map(|at| (g.id, at)))
            .collect())
    }

    /// Best-effort bookkeeping for goals completed outside a session. Goals
    /// missed here are picked up by the next session or evaluation.
    async fn credit_completions(&self, user_id: &UserId, now: Time) {
        if let Err(e) = self.try_credit_completions(user_id, now).await {
            warn!(user = %user_id, error = %e, "goal completion not credited to rewards");
        }
    }

    async fn try_credit_completions(&self, user_id: &UserId, now: Time) -> Result<()> {
        let ctx = self.evaluation_context(user_id, now).await?;
        let catalog = self.storage.load_catalog().await?;
        let completed = self.completed_goals(user_id).await?;
        let evaluator = self.evaluator();

        let (_, fresh) = self
            .update_rewards(user_id, |r| {
                let before = r.pending_notifications.len();
                r.roll_windows(now.date_naive());
                credit_completed(r, &completed, now);
                evaluator.evaluate(r, &catalog, &ctx);
                Ok(r.pending_notifications[before..].to_vec())
            })
            .await?;
        self.forward(user_id, &fresh).await;
        Ok(())
    }

    async fn forward(&self, user_id: &UserId, notifications: &[Notification]) {
        let Some(sink) = &self.sink else {
            return;
        };
        for n in notifications {
            if let Err(e) = sink.enqueue(user_id, n).await {
                warn!(user = %user_id, id = %n.id, error = %e, "notification sink rejected record");
            }
        }
    }

    /// Load, mutate and save a goal, retrying on version conflicts.
    async fn update_goal<T, F>(&self, goal_id: GoalId, mut op: F) -> Result<(Goal, T)>
    where
        F: FnMut(&mut Goal) -> Result<T> + Send,
        T: Send,
    {
        let mut attempt = 0u32;
        loop {
            let mut goal = self.get_goal(goal_id).await?;
            let out = op(&mut goal)?;
            match self.storage.save_goal(&goal).await {
                Ok(version) => {
                    goal.version = version;
                    return Ok((goal, out));
                }
                Err(e) if e.is_conflict() => {
                    attempt += 1;
                    if attempt > self.config.max_conflict_retries {
                        return Err(EngineError::Conflict {
                            kind: "goal",
                            id: goal_id.to_string(),
                            attempts: attempt,
                        });
                    }
                    warn!(goal = %goal_id, attempt, "version conflict, retrying");
                    tokio::time::sleep(self.config.backoff(attempt - 1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }

    /// Load (or lazily create), mutate and save a user's reward state,
    /// retrying on version conflicts.
    async fn update_rewards<T, F>(&self, user_id: &UserId, mut op: F) -> Result<(UserRewards, T)>
    where
        F: FnMut(&mut UserRewards) -> Result<T> + Send,
        T: Send,
    {
        let mut attempt = 0u32;
        loop {
            let mut rewards = self.user_rewards(user_id).await?;
            let out = op(&mut rewards)?;
            match self.storage.save_user_rewards(&rewards).await {
                Ok(version) => {
                    rewards.version = version;
                    return Ok((rewards, out));
                }
                Err(e) if e.is_conflict() => {
                    attempt += 1;
                    if attempt > self.config.max_conflict_retries {
                        return Err(EngineError::Conflict {
                            kind: "rewards",
                            id: user_id.to_string(),
                            attempts: attempt,
                        });
                    }
                    warn!(user = %user_id, attempt, "version conflict, retrying");
                    tokio::time::sleep(self.config.backoff(attempt - 1)).await;
                }
                Err(e) => return Err(e.into()),
            }
        }
    }
}

/// Count every completed goal not counted yet and queue its notification.
fn credit_completed(rewards: &mut UserRewards, completed: &[(GoalId, Time)], now: Time) {
    for (goal_id, completed_at) in completed {
        if rewards.credit_goal(*goal_id, *completed_at) {
            rewards.pending_notifications.push(goal_completed(*goal_id, now));
        }
    }
}

/// Add one session to a window, or take the source's view of the window.
fn record_session(window: &mut WindowStats, reported: Option<&WindowStats>, tally: &WindowStats) {
    match reported {
        Some(stats) => window.merge_sessions_max(stats),
        None => {
            window.sessions += tally.sessions;
            window.study_hours += tally.study_hours;
            window.early_bird += tally.early_bird;
            window.night_owl += tally.night_owl;
        }
    }
}

fn goal_completed(goal_id: GoalId, at: Time) -> Notification {
    Notification::new(
        NotificationKind::GoalCompleted { goal_id },
        "Goal completed! Nice work",
        at,
    )
}

/// Every day of the calendar week containing `today` has activity.
fn is_perfect_week(days: &BTreeSet<NaiveDate>, today: NaiveDate) -> bool {
    let monday = week_start(today);
    (0..7).all(|i| days.contains(&(monday + Duration::days(i))))
}
