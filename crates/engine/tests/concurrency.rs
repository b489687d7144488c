//! Conflict retry, per-user serialization and failure isolation.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use async_trait::async_trait;
use chrono::{TimeZone, Utc};
use studytrack_core::{
    Goal, GoalFilter, GoalId, GoalSpec, GoalStatus, NotificationKind, Period, Reward, RewardId,
    SessionCompleted, Time, UserId, UserRewards,
};
use studytrack_engine::{EngineConfig, EngineError, StudyEngine};
use studytrack_storage::{JsonStorage, MemoryStorage, Storage, StorageError};

type StoreResult<T> = std::result::Result<T, StorageError>;

/// Memory storage whose writes can be made to fail on demand.
#[derive(Default)]
struct FlakyStorage {
    inner: MemoryStorage,
    goal_conflicts: AtomicBool,
    rewards_down: AtomicBool,
}

#[async_trait]
impl Storage for FlakyStorage {
    async fn save_goal(&self, goal: &Goal) -> StoreResult<u64> {
        if self.goal_conflicts.load(Ordering::SeqCst) {
            return Err(StorageError::VersionConflict {
                kind: "goals",
                id: goal.id.to_string(),
                expected: goal.version,
                found: goal.version + 1,
            });
        }
        self.inner.save_goal(goal).await
    }

    async fn load_goal(&self, id: GoalId) -> StoreResult<Option<Goal>> {
        self.inner.load_goal(id).await
    }

    async fn list_goals(&self, filter: &GoalFilter) -> StoreResult<Vec<Goal>> {
        self.inner.list_goals(filter).await
    }

    async fn delete_goal(&self, id: GoalId) -> StoreResult<()> {
        self.inner.delete_goal(id).await
    }

    async fn save_user_rewards(&self, rewards: &UserRewards) -> StoreResult<u64> {
        if self.rewards_down.load(Ordering::SeqCst) {
            return Err(StorageError::Other("reward store unavailable".to_string()));
        }
        self.inner.save_user_rewards(rewards).await
    }

    async fn load_user_rewards(&self, user_id: &UserId) -> StoreResult<Option<UserRewards>> {
        self.inner.load_user_rewards(user_id).await
    }

    async fn list_user_rewards(&self) -> StoreResult<Vec<UserRewards>> {
        self.inner.list_user_rewards().await
    }

    async fn save_reward(&self, reward: &Reward) -> StoreResult<()> {
        self.inner.save_reward(reward).await
    }

    async fn load_catalog(&self) -> StoreResult<Vec<Reward>> {
        self.inner.load_catalog().await
    }

    async fn save_session(&self, session: &SessionCompleted) -> StoreResult<()> {
        self.inner.save_session(session).await
    }

    async fn list_sessions(&self, user_id: &UserId) -> StoreResult<Vec<SessionCompleted>> {
        self.inner.list_sessions(user_id).await
    }
}

fn now() -> Time {
    Utc.with_ymd_and_hms(2024, 5, 15, 9, 0, 0).unwrap()
}

fn user() -> UserId {
    UserId::new("ada")
}

fn patient() -> EngineConfig {
    EngineConfig {
        max_conflict_retries: 200,
        retry_backoff_ms: 1,
        ..Default::default()
    }
}

fn spec(target: f64, unit: &str) -> GoalSpec {
    GoalSpec {
        title: "Revision".to_string(),
        target: Some(target),
        progress_unit: Some(unit.to_string()),
        period: Some(Period::Monthly),
        ..Default::default()
    }
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_progress_loses_no_updates() {
    let engine = Arc::new(StudyEngine::new(MemoryStorage::new()).with_config(patient()));
    let goal = engine.create_goal(&user(), spec(100.0, "pages"), now()).await.unwrap();

    let handles: Vec<_> = (0..20)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.apply_progress(goal.id, 1.0, "", now()).await })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let stored = engine.get_goal(goal.id).await.unwrap();
    assert_eq!(stored.current_progress, 20.0);
    assert_eq!(stored.entries.len(), 20);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_progress_on_json_storage_loses_no_updates() {
    let dir = tempfile::tempdir().unwrap();
    let storage = JsonStorage::new(dir.path()).await.unwrap();
    // Each conflict means another writer committed, so 49 retries always suffice
    let config = EngineConfig {
        max_conflict_retries: 64,
        retry_backoff_ms: 0,
        ..Default::default()
    };
    let engine = Arc::new(StudyEngine::new(storage).with_config(config));
    let goal = engine.create_goal(&user(), spec(100.0, "pages"), now()).await.unwrap();

    let handles: Vec<_> = (0..50)
        .map(|_| {
            let engine = engine.clone();
            tokio::spawn(async move { engine.apply_progress(goal.id, 1.0, "", now()).await })
        })
        .collect();
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let stored = engine.get_goal(goal.id).await.unwrap();
    assert_eq!(stored.current_progress, 50.0);
    assert_eq!(stored.entries.len(), 50);
    assert_eq!(stored.version, 51);
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_sessions_count_each_once() {
    let engine = Arc::new(StudyEngine::new(MemoryStorage::new()).with_config(patient()));
    engine.seed_catalog().await.unwrap();
    let goal = engine.create_goal(&user(), spec(100.0, "sessions"), now()).await.unwrap();

    let handles: Vec<_> = (0..10)
        .map(|i| {
            let engine = engine.clone();
            let started = now() + chrono::Duration::minutes(i);
            tokio::spawn(async move {
                engine
                    .on_session_completed(SessionCompleted::new(user(), 600, started))
                    .await
            })
        })
        .collect();
    for h in handles {
        assert!(h.await.unwrap().unwrap().rewards_updated);
    }

    let stored = engine.get_goal(goal.id).await.unwrap();
    assert_eq!(stored.current_progress, 10.0);

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_sessions, 10);
    let first: Vec<_> = rewards
        .earned_rewards
        .iter()
        .filter(|r| r.reward_id == RewardId::new("first_session"))
        .collect();
    assert_eq!(first.len(), 1);
    assert!(rewards.points_balanced());
}

#[tokio::test(flavor = "multi_thread", worker_threads = 4)]
async fn test_concurrent_evaluation_and_bonus_never_double_award() {
    let engine = Arc::new(StudyEngine::new(MemoryStorage::new()).with_config(patient()));
    // Record stats before the catalog exists, so the reward is still pending
    engine
        .on_session_completed(SessionCompleted::new(user(), 1800, now()))
        .await
        .unwrap();
    engine.seed_catalog().await.unwrap();

    let mut handles = Vec::new();
    for i in 0..10 {
        let engine = engine.clone();
        handles.push(tokio::spawn(async move {
            if i % 2 == 0 {
                match engine.evaluation_context(&user(), now()).await {
                    Ok(ctx) => engine.evaluate_rewards(&user(), &ctx).await.map(|_| ()),
                    Err(e) => Err(e),
                }
            } else {
                engine.grant_bonus(&user(), 10, "streak party", now()).await.map(|_| ())
            }
        }));
    }
    for h in handles {
        h.await.unwrap().unwrap();
    }

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.earned_rewards.len(), 1);
    assert_eq!(rewards.bonus_grants.len(), 5);
    assert_eq!(rewards.total_points, 10 + 50);
    assert!(rewards.points_balanced());
}

#[tokio::test]
async fn test_conflict_surfaces_after_retry_budget() {
    let storage = Arc::new(FlakyStorage::default());
    let config = EngineConfig {
        max_conflict_retries: 2,
        retry_backoff_ms: 1,
        ..Default::default()
    };
    let engine = StudyEngine::from_arc(storage.clone()).with_config(config);
    let goal = engine.create_goal(&user(), spec(10.0, "pages"), now()).await.unwrap();

    storage.goal_conflicts.store(true, Ordering::SeqCst);
    let err = engine.apply_progress(goal.id, 1.0, "", now()).await.unwrap_err();
    assert!(matches!(err, EngineError::Conflict { kind: "goal", attempts: 3, .. }));

    storage.goal_conflicts.store(false, Ordering::SeqCst);
    let stored = engine.get_goal(goal.id).await.unwrap();
    assert!(stored.entries.is_empty());
}

#[tokio::test]
async fn test_reward_failure_keeps_goal_progress() {
    let storage = Arc::new(FlakyStorage::default());
    let engine = StudyEngine::from_arc(storage.clone());
    engine.seed_catalog().await.unwrap();
    let goal = engine.create_goal(&user(), spec(1.0, "sessions"), now()).await.unwrap();

    storage.rewards_down.store(true, Ordering::SeqCst);
    let outcome = engine
        .on_session_completed(SessionCompleted::new(user(), 1800, now()))
        .await
        .unwrap();
    assert!(!outcome.rewards_updated);
    assert!(outcome.goals[0].just_completed);

    let stored = engine.get_goal(goal.id).await.unwrap();
    assert_eq!(stored.status, GoalStatus::Completed);
    assert!(storage.load_user_rewards(&user()).await.unwrap().is_none());

    // Manual completion is also kept when crediting fails
    let other = engine.create_goal(&user(), spec(2.0, "pages"), now()).await.unwrap();
    let update = engine.apply_progress(other.id, 2.0, "", now()).await.unwrap();
    assert!(update.just_completed);
}

#[tokio::test]
async fn test_stats_reconcile_from_activity_source() {
    let storage = Arc::new(FlakyStorage::default());
    let engine = StudyEngine::from_arc(storage.clone());

    // Sessions recorded while the reward store was down are picked up later
    storage.rewards_down.store(true, Ordering::SeqCst);
    for minutes in [0, 60] {
        let started = now() + chrono::Duration::minutes(minutes);
        engine
            .on_session_completed(SessionCompleted::new(user(), 1800, started))
            .await
            .unwrap();
    }
    storage.rewards_down.store(false, Ordering::SeqCst);
    engine
        .on_session_completed(SessionCompleted::new(user(), 1800, now() + chrono::Duration::hours(3)))
        .await
        .unwrap();

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_sessions, 3);
    assert_eq!(rewards.lifetime_stats.total_study_hours, 1.5);
}

#[tokio::test]
async fn test_goal_completed_while_rewards_down_is_credited_later() {
    let storage = Arc::new(FlakyStorage::default());
    let engine = StudyEngine::from_arc(storage.clone());
    engine.seed_catalog().await.unwrap();
    let goal = engine.create_goal(&user(), spec(1.0, "sessions"), now()).await.unwrap();

    storage.rewards_down.store(true, Ordering::SeqCst);
    let outcome = engine
        .on_session_completed(SessionCompleted::new(user(), 1800, now()))
        .await
        .unwrap();
    assert!(outcome.goals[0].just_completed);
    assert!(!outcome.rewards_updated);

    storage.rewards_down.store(false, Ordering::SeqCst);
    engine
        .on_session_completed(SessionCompleted::new(user(), 1800, now() + chrono::Duration::hours(2)))
        .await
        .unwrap();

    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_goals_completed, 1);
    assert_eq!(rewards.weekly_stats.goals_completed, 1);
    assert!(rewards.has_earned(&RewardId::new("first_goal")));
    let completions = rewards
        .pending_notifications
        .iter()
        .filter(|n| n.kind == NotificationKind::GoalCompleted { goal_id: goal.id })
        .count();
    assert_eq!(completions, 1);

    // Later updates do not count it again
    let ctx = engine.evaluation_context(&user(), now()).await.unwrap();
    engine.evaluate_rewards(&user(), &ctx).await.unwrap();
    let rewards = engine.user_rewards(&user()).await.unwrap();
    assert_eq!(rewards.lifetime_stats.total_goals_completed, 1);
}
