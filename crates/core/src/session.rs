//! Study session events - the raw activity the engine consumes.

use crate::id::{SessionId, UserId};
use crate::Time;
use serde::{Deserialize, Serialize};

/// A completed study session, as reported by the activity source.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionCompleted {
    /// Session identifier
    pub session_id: SessionId,

    /// Who studied
    pub user_id: UserId,

    /// Length of the session
    pub duration_seconds: u64,

    /// When the session started (UTC)
    pub started_at: Time,

    /// Subject studied
    pub subject: Option<String>,
}

impl SessionCompleted {
    /// Create a session event.
    pub fn new(user_id: UserId, duration_seconds: u64, started_at: Time) -> Self {
        Self {
            session_id: SessionId::new(),
            user_id,
            duration_seconds,
            started_at,
            subject: None,
        }
    }

    /// Attach a subject.
    pub fn with_subject(mut self, subject: impl Into<String>) -> Self {
        self.subject = Some(subject.into());
        self
    }

    /// When the session ended.
    pub fn ended_at(&self) -> Time {
        let seconds = u32::try_from(self.duration_seconds).unwrap_or(u32::MAX);
        self.started_at + chrono::Duration::seconds(i64::from(seconds))
    }

    /// Session length in hours.
    pub fn hours(&self) -> f64 {
        self.duration_seconds as f64 / 3600.0
    }
}
