//! In-memory storage for tests and embedding.
//!
//! Thread-safe via `tokio::sync::RwLock`. Data is lost when the store is
//! dropped.

use std::collections::{BTreeMap, HashMap};
use async_trait::async_trait;
use studytrack_core::{Goal, GoalFilter, GoalId, Reward, RewardId, SessionCompleted, UserId, UserRewards};
use tokio::sync::RwLock;
use super::{Result, Storage, StorageError};

/// In-memory storage backend.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    goals: RwLock<HashMap<GoalId, Goal>>,
    rewards: RwLock<HashMap<UserId, UserRewards>>,
    catalog: RwLock<BTreeMap<RewardId, Reward>>,
    sessions: RwLock<HashMap<UserId, Vec<SessionCompleted>>>,
}

impl MemoryStorage {
    /// Create a new empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn save_goal(&self, goal: &Goal) -> Result<u64> {
        let mut goals = self.goals.write().await;
        let found = goals.get(&goal.id).map(|g| g.version).unwrap_or(0);
        if found != goal.version {
            return Err(StorageError::VersionConflict {
                kind: "goals",
                id: goal.id.to_string(),
                expected: goal.version,
                found,
            });
        }
        let mut stored = goal.clone();
        stored.version = found + 1;
        goals.insert(goal.id, stored);
        Ok(found + 1)
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        Ok(self.goals.read().await.get(&id).cloned())
    }

    async fn list_goals(&self, filter: &GoalFilter) -> Result<Vec<Goal>> {
        let goals = self.goals.read().await;
        let mut out: Vec<Goal> = goals.values().filter(|g| filter.matches(g)).cloned().collect();
        out.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(out)
    }

    async fn delete_goal(&self, id: GoalId) -> Result<()> {
        self.goals.write().await.remove(&id);
        Ok(())
    }

    async fn save_user_rewards(&self, rewards: &UserRewards) -> Result<u64> {
        let mut all = self.rewards.write().await;
        let found = all.get(&rewards.user_id).map(|r| r.version).unwrap_or(0);
        if found != rewards.version {
            return Err(StorageError::VersionConflict {
                kind: "rewards",
                id: rewards.user_id.to_string(),
                expected: rewards.version,
                found,
            });
        }
        let mut stored = rewards.clone();
        stored.version = found + 1;
        all.insert(rewards.user_id.clone(), stored);
        Ok(found + 1)
    }

    async fn load_user_rewards(&self, user_id: &UserId) -> Result<Option<UserRewards>> {
        Ok(self.rewards.read().await.get(user_id).cloned())
    }

    async fn list_user_rewards(&self) -> Result<Vec<UserRewards>> {
        let all = self.rewards.read().await;
        let mut out: Vec<UserRewards> = all.values().cloned().collect();
        out.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(out)
    }

    async fn save_reward(&self, reward: &Reward) -> Result<()> {
        self.catalog.write().await.insert(reward.id.clone(), reward.clone());
        Ok(())
    }

    async fn load_catalog(&self) -> Result<Vec<Reward>> {
        Ok(self.catalog.read().await.values().cloned().collect())
    }

    async fn save_session(&self, session: &SessionCompleted) -> Result<()> {
        let mut sessions = self.sessions.write().await;
        let list = sessions.entry(session.user_id.clone()).or_default();
        list.retain(|s| s.session_id != session.session_id);
        list.push(session.clone());
        list.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(())
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionCompleted>> {
        Ok(self.sessions.read().await.get(user_id).cloned().unwrap_or_default())
    }
}
