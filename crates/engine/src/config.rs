//! Engine configuration.

use chrono::{Duration, NaiveDate, NaiveDateTime, Timelike};
use serde::{Deserialize, Serialize};
use studytrack_core::Time;
use studytrack_progress::DEFAULT_STREAK_MILESTONES;

/// Configuration for the study engine.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Reload-and-retry attempts after a version conflict
    pub max_conflict_retries: u32,
    /// First backoff delay; doubled on every further attempt
    pub retry_backoff_ms: u64,
    /// User-local timezone as an offset from UTC
    pub utc_offset_minutes: i32,
    /// Sessions starting before this local hour are early-bird sessions
    pub early_bird_hour: u32,
    /// Sessions starting at or after this local hour are night-owl sessions
    pub night_owl_hour: u32,
    /// Streak lengths that raise a notification
    pub streak_milestones: Vec<u32>,
    /// Base of the level curve
    pub level_base_points: u64,
    /// How far back streak history is read
    pub activity_history_days: i64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            max_conflict_retries: 5,
            retry_backoff_ms: 10,
            utc_offset_minutes: 0,
            early_bird_hour: 7,
            night_owl_hour: 22,
            streak_milestones: DEFAULT_STREAK_MILESTONES.to_vec(),
            level_base_points: 100,
            activity_history_days: 3650,
        }
    }
}

impl EngineConfig {
    /// The local clock derived from this configuration.
    pub fn clock(&self) -> SessionClock {
        SessionClock {
            utc_offset_minutes: self.utc_offset_minutes,
            early_bird_hour: self.early_bird_hour,
            night_owl_hour: self.night_owl_hour,
        }
    }

    /// Backoff before retry number `attempt` (0-based).
    pub fn backoff(&self, attempt: u32) -> std::time::Duration {
        let factor = 1u64.checked_shl(attempt.min(16)).unwrap_or(u64::MAX);
        std::time::Duration::from_millis(self.retry_backoff_ms.saturating_mul(factor))
    }
}

/// Converts UTC timestamps to the user's calendar and classifies sessions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SessionClock {
    /// Offset from UTC
    pub utc_offset_minutes: i32,
    /// Early-bird cutoff hour
    pub early_bird_hour: u32,
    /// Night-owl start hour
    pub night_owl_hour: u32,
}

impl SessionClock {
    /// Wall-clock time in the user's timezone.
    pub fn local(&self, at: Time) -> NaiveDateTime {
        at.naive_utc() + Duration::minutes(self.utc_offset_minutes as i64)
    }

    /// Calendar day in the user's timezone.
    pub fn local_date(&self, at: Time) -> NaiveDate {
        self.local(at).date()
    }

    /// Started strictly before the early-bird hour.
    pub fn is_early_bird(&self, started_at: Time) -> bool {
        self.local(started_at).hour() < self.early_bird_hour
    }

    /// Started at or after the night-owl hour.
    pub fn is_night_owl(&self, started_at: Time) -> bool {
        self.local(started_at).hour() >= self.night_owl_hour
    }
}
