//! Engine error taxonomy.

use studytrack_core::ValidationError;
use studytrack_progress::ProgressError;
use studytrack_rewards::SelectionError;
use studytrack_storage::StorageError;

/// Result alias for engine operations.
pub type Result<T> = std::result::Result<T, EngineError>;

/// Errors surfaced by [`crate::StudyEngine`].
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Unknown goal, user, subtask or reward
    #[error("{kind} not found: {id}")]
    NotFound {
        /// Object kind
        kind: &'static str,
        /// Requested id
        id: String,
    },

    /// Operation not allowed in the object's current state
    #[error("invalid state: {0}")]
    InvalidState(String),

    /// Concurrent updates kept winning until the retry budget ran out
    #[error("{kind} {id} still conflicting after {attempts} attempts")]
    Conflict {
        /// Object kind
        kind: &'static str,
        /// Object id
        id: String,
        /// Attempts made
        attempts: u32,
    },

    /// Malformed input
    #[error(transparent)]
    Validation(#[from] ValidationError),

    /// Storage collaborator failure
    #[error("storage error: {0}")]
    Storage(#[source] StorageError),
}

impl EngineError {
    /// Shorthand for [`EngineError::NotFound`].
    pub fn not_found(kind: &'static str, id: impl ToString) -> Self {
        EngineError::NotFound {
            kind,
            id: id.to_string(),
        }
    }
}

impl From<StorageError> for EngineError {
    fn from(e: StorageError) -> Self {
        match e {
            StorageError::NotFound(id) => EngineError::NotFound { kind: "object", id },
            StorageError::VersionConflict { kind, id, .. } => EngineError::Conflict { kind, id, attempts: 1 },
            other => EngineError::Storage(other),
        }
    }
}

impl From<ProgressError> for EngineError {
    fn from(e: ProgressError) -> Self {
        match e {
            ProgressError::SubTaskNotFound(id) => EngineError::not_found("subtask", id),
            ProgressError::Validation(v) => EngineError::Validation(v),
            other => EngineError::InvalidState(other.to_string()),
        }
    }
}

impl From<SelectionError> for EngineError {
    fn from(e: SelectionError) -> Self {
        EngineError::InvalidState(e.to_string())
    }
}
