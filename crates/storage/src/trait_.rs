//! Storage trait abstraction.

use async_trait::async_trait;
use studytrack_core::{Goal, GoalFilter, GoalId, Reward, SessionCompleted, UserId, UserRewards};

/// Error type for storage operations.
pub type Result<T> = std::result::Result<T, StorageError>;

/// Errors that can occur during storage operations.
#[derive(Debug, thiserror::Error)]
pub enum StorageError {
    /// I/O error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Serialization/deserialization error
    #[error("JSON error: {0}")]
    Json(#[from] serde_json::Error),

    /// Item not found
    #[error("Not found: {0}")]
    NotFound(String),

    /// The stored version moved since the caller loaded the object
    #[error("Version conflict on {kind} {id}: expected {expected}, found {found}")]
    VersionConflict {
        /// Object kind
        kind: &'static str,
        /// Object id
        id: String,
        /// Version the caller loaded
        expected: u64,
        /// Version currently stored
        found: u64,
    },

    /// Other error
    #[error("{0}")]
    Other(String),
}

impl StorageError {
    /// Whether a reload-and-retry can resolve this error.
    pub fn is_conflict(&self) -> bool {
        matches!(self, StorageError::VersionConflict { .. })
    }
}

/// Storage abstraction for studytrack data.
///
/// Saves of goals and user rewards are compare-and-set: the object's
/// `version` must equal the stored version (0 when absent), and the call
/// returns the new version.
#[async_trait]
pub trait Storage: Send + Sync {
    // === Goal operations ===

    /// Save a goal if its version is current. Returns the new version.
    async fn save_goal(&self, goal: &Goal) -> Result<u64>;

    /// Load a goal by ID.
    async fn load_goal(&self, id: GoalId) -> Result<Option<Goal>>;

    /// List goals matching the filter.
    async fn list_goals(&self, filter: &GoalFilter) -> Result<Vec<Goal>>;

    /// Hard-delete a goal.
    async fn delete_goal(&self, id: GoalId) -> Result<()>;

    // === Reward state operations ===

    /// Save a user's reward state if its version is current. Returns the new version.
    async fn save_user_rewards(&self, rewards: &UserRewards) -> Result<u64>;

    /// Load a user's reward state.
    async fn load_user_rewards(&self, user_id: &UserId) -> Result<Option<UserRewards>>;

    /// List every user's reward state.
    async fn list_user_rewards(&self) -> Result<Vec<UserRewards>>;

    // === Catalog operations ===

    /// Save a catalog entry.
    async fn save_reward(&self, reward: &Reward) -> Result<()>;

    /// Load the whole catalog, ordered by id.
    async fn load_catalog(&self) -> Result<Vec<Reward>>;

    // === Session operations ===

    /// Record a completed session.
    async fn save_session(&self, session: &SessionCompleted) -> Result<()>;

    /// List a user's sessions, oldest first.
    async fn list_sessions(&self, user_id: &UserId) -> Result<Vec<SessionCompleted>>;
}
