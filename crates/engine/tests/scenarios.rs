//! End-to-end behaviour of the study engine over in-memory storage.

use std::sync::{Arc, Mutex};
use async_trait::async_trait;
use chrono::{Duration, NaiveDate, TimeZone, Utc};
use studytrack_core::{
    GoalSpec, GoalStatus, MilestoneSpec, Notification, NotificationKind, Period, RewardId,
    SessionCompleted, Time, Timeframe, UserId,
};
use studytrack_engine::{EngineError, NotificationSink, StudyEngine};
use studytrack_progress::{Granularity, StreakStatus, SuggestionKind};
use studytrack_rewards::TipPicker;
use studytrack_storage::MemoryStorage;

fn at(day: u32, hour: u32) -> Time {
    Utc.with_ymd_and_hms(2024, 5, day, hour, 0, 0).unwrap()
}

fn user() -> UserId {
    UserId::new("ada")
}

async fn seeded_engine() -> StudyEngine<MemoryStorage> {
    let engine = StudyEngine::new(MemoryStorage::new()).with_seed(17);
    engine.seed_catalog().await.unwrap();
    engine
}

fn goal_spec(target: f64, unit: &str, period: Period) -> GoalSpec {
    GoalSpec {
        title: "Chemistry".to_string(),
        target: Some(target),
        progress_unit: Some(unit.to_string()),
        period: Some(period),
        ..Default::default()
    }
}

fn session(day: u32, hour: u32, seconds: u64) -> SessionCompleted {
    SessionCompleted::new(user(), seconds, at(day, hour))
}

#[derive(Default)]
struct CollectingSink {
    seen: Mutex<Vec<NotificationKind>>,
}

#[async_trait]
impl NotificationSink for CollectingSink {
    async fn enqueue(&self, _user_id: &UserId, notification: &Notification) -> studytrack_engine::Result<()> {
        self.seen.lock().unwrap().push(notification.kind.clone());
        Ok(())
    }
}

#[tokio::test]
async fn test_milestone_and_completion_in_one_call() {
    let engine = seeded_engine().await;
    let mut spec = goal_spec(60.0, "pages", Period::Weekly);
    spec.milestones.push(MilestoneSpec {
        title: "Halfway".to_string(),
        target: 50.0,
        ..Default::default()
    });
    let goal = engine.create_goal(&user(), spec, at(13, 8)).await.unwrap();

    let update = engine.apply_progress(goal.id, 60.0, "big push", at(14, 8)).await.unwrap();
    assert_eq!(update.completed_milestones.len(), 1);
    assert!(update.just_completed);
    assert_eq!(update.goal.status, GoalStatus::Completed);
    assert_eq!(update.goal.completion_rate, 100.0);
    assert_eq!(update.goal.completed_at, Some(at(14, 8)));

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_goals_completed, 1);
    assert!(rewards.has_earned(&RewardId::new("first_goal")));
    assert_eq!(rewards.total_points, 25);
    assert!(rewards.points_balanced());
    assert!(rewards
        .pending_notifications
        .iter()
        .any(|n| n.kind == NotificationKind::GoalCompleted { goal_id: goal.id }));
}

#[tokio::test]
async fn test_completed_goal_rejects_progress_without_mutation() {
    let engine = seeded_engine().await;
    let goal = engine.create_goal(&user(), goal_spec(10.0, "pages", Period::Daily), at(13, 8)).await.unwrap();
    engine.apply_progress(goal.id, 10.0, "", at(13, 9)).await.unwrap();

    let err = engine.apply_progress(goal.id, 5.0, "", at(13, 10)).await.unwrap_err();
    assert!(matches!(err, EngineError::InvalidState(_)));

    let stored = engine.get_goal(goal.id).await.unwrap();
    assert_eq!(stored.entries.len(), 1);
    assert_eq!(stored.current_progress, 10.0);

    // Completion is only credited once
    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_goals_completed, 1);
}

#[tokio::test]
async fn test_lifecycle_and_admin_reset() {
    let engine = seeded_engine().await;
    let goal = engine.create_goal(&user(), goal_spec(10.0, "pages", Period::Daily), at(13, 8)).await.unwrap();

    let paused = engine.set_status(goal.id, GoalStatus::Paused, at(13, 9)).await.unwrap();
    assert_eq!(paused.status, GoalStatus::Paused);
    assert!(engine.apply_progress(goal.id, 1.0, "", at(13, 9)).await.is_err());

    let resumed = engine.set_status(goal.id, GoalStatus::Active, at(13, 10)).await.unwrap();
    assert_eq!(resumed.status, GoalStatus::Active);

    let cancelled = engine.set_status(goal.id, GoalStatus::Cancelled, at(13, 11)).await.unwrap();
    assert_eq!(cancelled.status, GoalStatus::Cancelled);
    assert!(matches!(
        engine.set_status(goal.id, GoalStatus::Active, at(13, 12)).await,
        Err(EngineError::InvalidState(_))
    ));

    let reopened = engine.reopen_goal(goal.id, at(13, 12)).await.unwrap();
    assert_eq!(reopened.status, GoalStatus::Active);

    engine.delete_goal(goal.id).await.unwrap();
    assert!(matches!(
        engine.get_goal(goal.id).await,
        Err(EngineError::NotFound { kind: "goal", .. })
    ));
    assert!(matches!(engine.delete_goal(goal.id).await, Err(EngineError::NotFound { .. })));
}

#[tokio::test]
async fn test_create_goal_validation() {
    let engine = seeded_engine().await;
    let mut spec = goal_spec(10.0, "pages", Period::Daily);
    spec.target = None;
    assert!(matches!(
        engine.create_goal(&user(), spec, at(13, 8)).await,
        Err(EngineError::Validation(_))
    ));

    let custom = goal_spec(10.0, "pages", Period::Custom);
    assert!(matches!(
        engine.create_goal(&user(), custom, at(13, 8)).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn test_subtasks_and_milestones() {
    let engine = seeded_engine().await;
    let goal = engine.create_goal(&user(), goal_spec(100.0, "pages", Period::Monthly), at(13, 8)).await.unwrap();

    let (_, subtask) = engine.add_subtask(goal.id, "Chapter 1", at(13, 9)).await.unwrap();
    let toggled = engine.toggle_subtask(goal.id, subtask, at(13, 10)).await.unwrap();
    assert!(toggled.subtasks[0].completed);
    // Subtasks never move numeric progress
    assert_eq!(toggled.current_progress, 0.0);

    let unknown = studytrack_core::SubTaskId::new();
    assert!(matches!(
        engine.toggle_subtask(goal.id, unknown, at(13, 10)).await,
        Err(EngineError::NotFound { kind: "subtask", .. })
    ));

    engine.apply_progress(goal.id, 30.0, "", at(13, 11)).await.unwrap();
    let with_milestone = engine
        .add_milestone(
            goal.id,
            MilestoneSpec {
                title: "First quarter".to_string(),
                target: 25.0,
                ..Default::default()
            },
            at(13, 12),
        )
        .await
        .unwrap();
    // Already reached, so credited straight away
    assert!(with_milestone.milestones[0].completed);
}

#[tokio::test]
async fn test_catch_up_scenario() {
    let engine = seeded_engine().await;
    let spec = GoalSpec {
        start_date: Some(at(1, 0)),
        due_date: Some(at(11, 0)),
        ..goal_spec(100.0, "pages", Period::Custom)
    };
    let goal = engine.create_goal(&user(), spec, at(1, 0)).await.unwrap();
    engine.apply_progress(goal.id, 40.0, "", at(2, 0)).await.unwrap();

    let insight = engine.goal_insight(goal.id, at(6, 0)).await.unwrap();
    assert_eq!(insight.expected_progress, 50.0);
    assert!(insight.is_overdue);
    assert_eq!(insight.days_remaining, 5);
    assert_eq!(insight.catch_up_suggestions[0].kind, SuggestionKind::DailyRate);
    assert_eq!(insight.catch_up_suggestions[0].daily_rate, 12.0);

    let all = engine.get_catch_up_suggestions(&user(), at(6, 0)).await.unwrap();
    assert_eq!(all[0].goal_id, goal.id);
    assert_eq!(all[0].suggestion.daily_rate, 12.0);

    let buckets = engine.period_breakdown(goal.id, Granularity::Month, at(6, 0)).await.unwrap();
    assert_eq!(buckets.len(), 1);
    assert_eq!(buckets[0].actual_for_period, 40.0);
}

#[tokio::test]
async fn test_session_moves_matching_goals_and_unlocks_rewards() {
    let engine = seeded_engine().await;
    let spec = GoalSpec {
        subject: Some("maths".to_string()),
        ..goal_spec(10.0, "hours", Period::Monthly)
    };
    let goal = engine.create_goal(&user(), spec, at(1, 8)).await.unwrap();

    let first = session(15, 9, 7200).with_subject("Maths");
    let outcome = engine.on_session_completed(first.clone()).await.unwrap();
    assert!(!outcome.duplicate);
    assert!(outcome.rewards_updated);
    assert_eq!(outcome.goals.len(), 1);
    assert_eq!(outcome.goals[0].applied_delta, 2.0);
    let streak = outcome.streak.unwrap();
    assert_eq!(streak.current_streak, 1);
    assert_eq!(streak.status, StreakStatus::CompletedToday);
    let earned: Vec<&str> = outcome.newly_earned.iter().map(|r| r.reward_id.as_str()).collect();
    assert_eq!(earned, vec!["first_session"]);

    // Another subject does not count toward the goal
    let other = engine.on_session_completed(session(15, 13, 3600).with_subject("history")).await.unwrap();
    assert!(other.goals.is_empty());

    // Redelivery is a no-op
    let again = engine.on_session_completed(first).await.unwrap();
    assert!(again.duplicate);

    let stored = engine.get_goal(goal.id).await.unwrap();
    assert_eq!(stored.current_progress, 2.0);
    assert_eq!(stored.entries.len(), 1);

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_sessions, 2);
    assert_eq!(rewards.lifetime_stats.total_study_hours, 3.0);
    assert_eq!(rewards.weekly_stats.sessions, 2);
}

#[tokio::test]
async fn test_late_session_keeps_current_week() {
    let engine = seeded_engine().await;
    engine.on_session_completed(session(14, 9, 1800)).await.unwrap();
    engine.on_session_completed(session(15, 9, 1800)).await.unwrap();
    // Delivered late, from the week before
    engine.on_session_completed(session(10, 9, 1800)).await.unwrap();

    let rewards = engine.user_rewards(&user()).await.unwrap();
    let monday = NaiveDate::from_ymd_opt(2024, 5, 13).unwrap();
    assert_eq!(rewards.weekly_stats.window_start, Some(monday));
    assert_eq!(rewards.weekly_stats.sessions, 2);

    engine.on_session_completed(session(16, 9, 1800)).await.unwrap();
    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.weekly_stats.window_start, Some(monday));
    assert_eq!(rewards.weekly_stats.sessions, 3);
    assert_eq!(rewards.weekly_stats.study_hours, 1.5);
    assert_eq!(rewards.monthly_stats.sessions, 4);
    assert_eq!(rewards.lifetime_stats.total_sessions, 4);
}

#[tokio::test]
async fn test_recompleting_reopened_goal_counts_once() {
    let engine = seeded_engine().await;
    let goal = engine.create_goal(&user(), goal_spec(10.0, "pages", Period::Monthly), at(13, 8)).await.unwrap();
    engine.apply_progress(goal.id, 10.0, "", at(13, 9)).await.unwrap();

    engine.reopen_goal(goal.id, at(14, 9)).await.unwrap();
    let again = engine.apply_progress(goal.id, 1.0, "", at(14, 10)).await.unwrap();
    assert!(again.just_completed);

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_goals_completed, 1);
    assert_eq!(rewards.weekly_stats.goals_completed, 1);
    let completions = rewards
        .pending_notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::GoalCompleted { goal_id: goal.id })
        .count();
    assert_eq!(completions, 1);
}

#[tokio::test]
async fn test_session_validation() {
    let engine = seeded_engine().await;
    assert!(matches!(
        engine.on_session_completed(session(15, 9, 0)).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.on_session_completed(session(15, 9, 2 * 24 * 3600)).await,
        Err(EngineError::Validation(_))
    ));
}

#[tokio::test]
async fn test_streak_milestone_and_rewards() {
    let engine = seeded_engine().await;
    for day in 13..=15 {
        engine.on_session_completed(session(day, 10, 1800)).await.unwrap();
    }

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.streak_data.current_streak, 3);
    assert!(rewards.has_earned(&RewardId::new("streak_3")));
    assert!(rewards
        .pending_notifications
        .iter()
        .any(|n| n.kind == NotificationKind::StreakMilestone { days: 3 }));

    let at_risk = engine.get_streak(&user(), at(16, 12)).await.unwrap();
    assert_eq!(at_risk.status, StreakStatus::AtRisk);
    assert_eq!(at_risk.current_streak, 3);

    let broken = engine.get_streak(&user(), at(17, 12)).await.unwrap();
    assert_eq!(broken.status, StreakStatus::Broken);
    assert_eq!(broken.current_streak, 0);
    assert_eq!(broken.longest_streak, 3);
}

#[tokio::test]
async fn test_perfect_week() {
    let engine = seeded_engine().await;
    // 2024-05-13 is a Monday
    for day in 13..=19 {
        engine.on_session_completed(session(day, 10, 1800)).await.unwrap();
    }
    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert!(rewards.has_earned(&RewardId::new("perfect_week")));
    assert!(rewards.has_earned(&RewardId::new("streak_7")));
    assert!(rewards.points_balanced());
}

#[tokio::test]
async fn test_early_bird_sessions() {
    let engine = seeded_engine().await;
    for day in 13..=17 {
        engine.on_session_completed(session(day, 6, 1800)).await.unwrap();
    }
    engine.on_session_completed(session(18, 23, 1800)).await.unwrap();

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.early_bird_count, 5);
    assert_eq!(rewards.lifetime_stats.night_owl_count, 1);
    assert!(rewards.has_earned(&RewardId::new("early_bird")));
    assert!(!rewards.has_earned(&RewardId::new("night_owl")));
}

#[tokio::test]
async fn test_leaderboard_dense_ranks() {
    let engine = seeded_engine().await;
    for (name, points) in [("a", 100), ("b", 100), ("c", 80)] {
        engine.grant_bonus(&UserId::new(name), points, "contest", at(15, 9)).await.unwrap();
    }

    let board = engine.get_leaderboard(Timeframe::Alltime, 10, at(15, 12)).await.unwrap();
    let ranks: Vec<u32> = board.iter().map(|e| e.rank).collect();
    assert_eq!(ranks, vec![1, 1, 2]);

    let top = engine.get_leaderboard(Timeframe::Alltime, 2, at(15, 12)).await.unwrap();
    assert_eq!(top.len(), 2);

    let c = engine.get_rank(&UserId::new("c"), Timeframe::Alltime, at(15, 12)).await.unwrap();
    assert_eq!(c.rank, 2);
    assert_eq!(c.points, 80);

    assert!(matches!(
        engine.get_rank(&UserId::new("nobody"), Timeframe::Alltime, at(15, 12)).await,
        Err(EngineError::NotFound { kind: "user", .. })
    ));
}

#[tokio::test]
async fn test_bonus_grants_are_audited() {
    let engine = seeded_engine().await;
    assert!(matches!(
        engine.grant_bonus(&user(), 0, "nothing", at(15, 9)).await,
        Err(EngineError::Validation(_))
    ));
    assert!(matches!(
        engine.grant_bonus(&user(), 5, "  ", at(15, 9)).await,
        Err(EngineError::Validation(_))
    ));

    engine.on_session_completed(session(15, 9, 1800)).await.unwrap();
    let rewards = engine.grant_bonus(&user(), 150, "tutoring", at(15, 12)).await.unwrap();
    assert_eq!(rewards.total_points, 160);
    assert_eq!(rewards.bonus_points(), 150);
    assert!(rewards.points_balanced());
    assert_eq!(rewards.current_level, 2);
    assert!(rewards
        .pending_notifications
        .iter()
        .any(|n| n.kind == NotificationKind::LevelUp { level: 2 }));
}

#[tokio::test]
async fn test_bonus_that_overflows_points_is_rejected() {
    let engine = seeded_engine().await;
    engine.grant_bonus(&user(), u64::MAX, "jackpot", at(15, 9)).await.unwrap();

    assert!(matches!(
        engine.grant_bonus(&user(), 1, "one more", at(15, 10)).await,
        Err(EngineError::InvalidState(_))
    ));
    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.total_points, u64::MAX);
    assert_eq!(rewards.bonus_grants.len(), 1);
    assert!(rewards.points_balanced());
}

#[tokio::test]
async fn test_drain_notifications_empties_queue() {
    let engine = seeded_engine().await;
    assert!(engine.drain_notifications(&user()).await.unwrap().is_empty());

    engine.on_session_completed(session(15, 9, 1800)).await.unwrap();
    let drained = engine.drain_notifications(&user()).await.unwrap();
    assert!(!drained.is_empty());
    assert!(engine.drain_notifications(&user()).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_sink_receives_forwarded_notifications() {
    let sink = Arc::new(CollectingSink::default());
    let engine = StudyEngine::new(MemoryStorage::new()).with_sink(sink.clone());
    engine.seed_catalog().await.unwrap();

    let goal = engine.create_goal(&user(), goal_spec(5.0, "pages", Period::Daily), at(15, 8)).await.unwrap();
    engine.apply_progress(goal.id, 5.0, "", at(15, 9)).await.unwrap();

    let seen = sink.seen.lock().unwrap().clone();
    assert!(seen.contains(&NotificationKind::GoalCompleted { goal_id: goal.id }));
    assert!(seen.contains(&NotificationKind::RewardEarned {
        reward_id: RewardId::new("first_goal"),
        points: 25,
    }));
}

#[tokio::test]
async fn test_evaluate_rewards_with_custom_flag() {
    let engine = seeded_engine().await;
    let ctx = engine.evaluation_context(&user(), at(15, 9)).await.unwrap();
    // Empty stats earn nothing, and asking twice is harmless
    assert!(engine.evaluate_rewards(&user(), &ctx).await.unwrap().is_empty());
    assert!(engine.evaluate_rewards(&user(), &ctx).await.unwrap().is_empty());
}

#[tokio::test]
async fn test_pick_tip() {
    let engine = seeded_engine().await;
    engine.on_session_completed(session(14, 9, 1800)).await.unwrap();
    let tip = engine.pick_tip(&user(), at(15, 9)).await.unwrap();
    assert!(TipPicker::default().tips().contains(&tip));

    let bare = StudyEngine::new(MemoryStorage::new()).with_tips(TipPicker::new(Vec::new()));
    assert!(matches!(
        bare.pick_tip(&user(), at(15, 9)).await,
        Err(EngineError::InvalidState(_))
    ));
}

#[tokio::test]
async fn test_seed_catalog_only_once() {
    let engine = StudyEngine::new(MemoryStorage::new());
    let installed = engine.seed_catalog().await.unwrap();
    assert!(installed > 0);
    assert_eq!(engine.seed_catalog().await.unwrap(), 0);
    assert_eq!(engine.catalog().await.unwrap().len(), installed);
}

#[tokio::test]
async fn test_local_offset_buckets_days() {
    let config = studytrack_engine::EngineConfig {
        utc_offset_minutes: -300,
        ..Default::default()
    };
    let engine = StudyEngine::new(MemoryStorage::new()).with_config(config);
    // 02:00 UTC on the 16th is still the 15th at UTC-5
    engine
        .on_session_completed(SessionCompleted::new(user(), 1800, at(16, 2)))
        .await
        .unwrap();
    let streak = engine.get_streak(&user(), at(15, 20)).await.unwrap();
    assert_eq!(streak.status, StreakStatus::CompletedToday);

    let later = engine.get_streak(&user(), at(15, 20) + Duration::days(1)).await.unwrap();
    assert_eq!(later.status, StreakStatus::AtRisk);
}
