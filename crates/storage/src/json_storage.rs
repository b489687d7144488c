//! JSON file storage implementation.
//!
//! Stores data as JSON files under a root directory (`.studytrack` by default).
//! Each goal and reward record carries its own version, and every file is
//! replaced atomically (write to a temp file, then rename), so a reader sees
//! either the old record with its version or the new one.

use std::path::{Path, PathBuf};
use serde::{de::DeserializeOwned, Deserialize, Serialize};
use studytrack_core::{Goal, GoalFilter, GoalId, Reward, SessionCompleted, UserId, UserRewards};
use super::{Storage, StorageError, Result};
use tokio::fs;
use tokio::sync::Mutex;
use tracing::debug;

/// File-based JSON storage backend.
pub struct JsonStorage {
    root: PathBuf,
    // Serializes version check + write pairs within this process.
    write_lock: Mutex<()>,
}

/// Only the version of a stored record.
#[derive(Deserialize)]
struct Versioned {
    #[serde(default)]
    version: u64,
}

impl JsonStorage {
    /// Create storage and the subdirectories it writes to.
    pub async fn new(root: impl AsRef<Path>) -> Result<Self> {
        let root = root.as_ref().to_path_buf();

        fs::create_dir_all(root.join("goals")).await?;
        fs::create_dir_all(root.join("rewards")).await?;
        fs::create_dir_all(root.join("catalog")).await?;
        fs::create_dir_all(root.join("sessions")).await?;

        Ok(Self {
            root,
            write_lock: Mutex::new(()),
        })
    }

    /// Root directory.
    pub fn root(&self) -> &Path {
        &self.root
    }

    fn goal_path(&self, id: GoalId) -> PathBuf {
        self.root.join("goals").join(format!("{}.json", id))
    }
    fn rewards_path(&self, user_id: &UserId) -> PathBuf {
        self.root.join("rewards").join(format!("{}.json", file_key(user_id.as_str())))
    }
    fn catalog_path(&self, reward: &Reward) -> PathBuf {
        self.root.join("catalog").join(format!("{}.json", file_key(reward.id.as_str())))
    }
    fn sessions_dir(&self, user_id: &UserId) -> PathBuf {
        self.root.join("sessions").join(file_key(user_id.as_str()))
    }

    /// Write `record` at `path` with the next version if the stored version
    /// still equals `expected`. Must be called with `write_lock` held.
    async fn check_and_write<T: Serialize>(
        &self,
        kind: &'static str,
        id: &str,
        path: &Path,
        expected: u64,
        record: &T,
    ) -> Result<u64> {
        let found = read_json::<Versioned>(path).await?.map_or(0, |v| v.version);
        if found != expected {
            return Err(StorageError::VersionConflict {
                kind,
                id: id.to_string(),
                expected,
                found,
            });
        }
        let version = found + 1;
        let mut value = serde_json::to_value(record)?;
        if let Some(obj) = value.as_object_mut() {
            obj.insert("version".to_string(), version.into());
        }
        write_atomic(path, &value).await?;
        Ok(version)
    }
}

#[async_trait::async_trait]
impl Storage for JsonStorage {
    async fn save_goal(&self, goal: &Goal) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let id = goal.id.to_string();
        let version = self
            .check_and_write("goals", &id, &self.goal_path(goal.id), goal.version, goal)
            .await?;
        debug!(goal = %goal.id, version, "saved goal");
        Ok(version)
    }

    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>> {
        read_json(&self.goal_path(id)).await
    }

    async fn list_goals(&self, filter: &GoalFilter) -> Result<Vec<Goal>> {
        let mut goals: Vec<Goal> = list_dir::<Goal>(&self.root.join("goals"))
            .await?
            .into_iter()
            .filter(|g| filter.matches(g))
            .collect();
        goals.sort_by(|a, b| a.created_at.cmp(&b.created_at).then_with(|| a.id.cmp(&b.id)));
        Ok(goals)
    }

    async fn delete_goal(&self, id: GoalId) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        remove_if_exists(&self.goal_path(id)).await
    }

    async fn save_user_rewards(&self, rewards: &UserRewards) -> Result<u64> {
        let _guard = self.write_lock.lock().await;
        let key = file_key(rewards.user_id.as_str());
        let path = self.rewards_path(&rewards.user_id);
        let version = self
            .check_and_write("rewards", &key, &path, rewards.version, rewards)
            .await?;
        debug!(user = %rewards.user_id, version, "saved user rewards");
        Ok(version)
    }

    async fn load_user_rewards(&self, user_id: &UserId) -> Result<Option<UserRewards>> {
        read_json(&self.rewards_path(user_id)).await
    }

    async fn list_user_rewards(&self) -> Result<Vec<UserRewards>> {
        let mut out: Vec<UserRewards> = list_dir(&self.root.join("rewards")).await?;
        out.sort_by(|a, b| a.user_id.cmp(&b.user_id));
        Ok(out)
    }

    async fn save_reward(&self, reward: &Reward) -> Result<()> {
        let _guard = self.write_lock.lock().await;
        write_atomic(&self.catalog_path(reward), reward).await
    }

    async fn load_catalog(&self) -> Result<Vec<Reward>> {
        let mut catalog: Vec<Reward> = list_dir(&self.root.join("catalog")).await?;
        catalog.sort_by(|a, b| a.id.cmp(&b.id));
        Ok(catalog)
    }

    async fn save_session(&self, session: &SessionCompleted) -> Result<()> {
        let dir = self.sessions_dir(&session.user_id);
        let _guard = self.write_lock.lock().await;
        fs::create_dir_all(&dir).await?;
        write_atomic(&dir.join(format!("{}.json", session.session_id)), session).await
    }

    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionCompleted>> {
        let dir = self.sessions_dir(user_id);
        if fs::metadata(&dir).await.is_err() {
            return Ok(Vec::new());
        }
        let mut sessions: Vec<SessionCompleted> = list_dir(&dir).await?;
        sessions.sort_by(|a, b| a.started_at.cmp(&b.started_at));
        Ok(sessions)
    }
}

/// Escape an arbitrary id into a safe file stem.
fn file_key(id: &str) -> String {
    let mut out = String::with_capacity(id.len());
    for b in id.bytes() {
        if b.is_ascii_alphanumeric() || b == b'-' || b == b'_' {
            out.push(b as char);
        } else {
            out.push_str(&format!("%{:02X}", b));
        }
    }
    out
}

/// Replace `path` with the JSON of `value`. The temp file ends in `.tmp`, so
/// directory listings never pick up a half-written record.
async fn write_atomic<T: Serialize + ?Sized>(path: &Path, value: &T) -> Result<()> {
    let json = serde_json::to_string_pretty(value)?;
    let tmp = path.with_extension("json.tmp");
    fs::write(&tmp, json.as_bytes()).await?;
    fs::rename(&tmp, path).await?;
    Ok(())
}

async fn remove_if_exists(path: &Path) -> Result<()> {
    fs::remove_file(path).await.or_else(|e| {
        if e.kind() == std::io::ErrorKind::NotFound { Ok(()) } else { Err(e) }
    })?;
    Ok(())
}

async fn read_json<T: DeserializeOwned>(path: &Path) -> Result<Option<T>> {
    match fs::read_to_string(path).await {
        Ok(json) => {
            let value = serde_json::from_str(&json)?;
            Ok(Some(value))
        }
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => Ok(None),
        Err(e) => Err(e.into()),
    }
}

async fn list_dir<T: DeserializeOwned>(dir: &Path) -> Result<Vec<T>> {
    let mut items = Vec::new();
    let mut rd = fs::read_dir(dir).await?;
    while let Some(entry) = rd.next_entry().await? {
        if entry.path().extension().and_then(|s| s.to_str()) != Some("json") {
            continue;
        }
        if let Ok(Some(item)) = read_json(&entry.path()).await {
            items.push(item);
        }
    }
    Ok(items)
}
