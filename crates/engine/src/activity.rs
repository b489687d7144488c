//! Activity source: per-day activity presence and lifetime counters.

use std::collections::BTreeSet;
use std::sync::Arc;
use async_trait::async_trait;
use chrono::NaiveDate;
use studytrack_core::{LifetimeStats, UserId, WindowStats};
use studytrack_storage::Storage;
use crate::config::SessionClock;
use crate::Result;

/// Where completed-session activity comes from.
#[async_trait]
pub trait ActivitySource: Send + Sync {
    /// Local calendar days in `[start, end]` with at least one completed session.
    async fn activity_dates(&self, user_id: &UserId, start: NaiveDate, end: NaiveDate) -> Result<BTreeSet<NaiveDate>>;

    /// Lifetime counters as the source sees them, if it tracks any.
    async fn lifetime_stats(&self, user_id: &UserId) -> Result<Option<LifetimeStats>>;

    /// Session counters for sessions ending (UTC date) in `[start, end]`, if
    /// the source tracks them. Goal completions are not part of the result.
    async fn window_stats(&self, _user_id: &UserId, _start: NaiveDate, _end: NaiveDate) -> Result<Option<WindowStats>> {
        Ok(None)
    }
}

/// Activity derived from the sessions recorded in storage.
pub struct StoredActivitySource<S: Storage> {
    storage: Arc<S>,
    clock: SessionClock,
}

impl<S: Storage> StoredActivitySource<S> {
    /// Source over `storage`, bucketing days with `clock`.
    pub fn new(storage: Arc<S>, clock: SessionClock) -> Self {
        Self { storage, clock }
    }
}

#[async_trait]
impl<S: Storage> ActivitySource for StoredActivitySource<S> {
    async fn activity_dates(&self, user_id: &UserId, start: NaiveDate, end: NaiveDate) -> Result<BTreeSet<NaiveDate>> {
        let sessions = self.storage.list_sessions(user_id).await?;
        Ok(sessions
            .iter()
            .map(|s| self.clock.local_date(s.started_at))
            .filter(|d| *d >= start && *d <= end)
            .collect())
    }

    async fn lifetime_stats(&self, user_id: &UserId) -> Result<Option<LifetimeStats>> {
        let sessions = self.storage.list_sessions(user_id).await?;
        if sessions.is_empty() {
            return Ok(None);
        }
        let mut stats = LifetimeStats::default();
        for s in &sessions {
            stats.total_sessions += 1;
            stats.total_study_hours += s.hours();
            if self.clock.is_early_bird(s.started_at) {
                stats.early_bird_count += 1;
            }
            if self.clock.is_night_owl(s.started_at) {
                stats.night_owl_count += 1;
            }
        }
        Ok(Some(stats))
    }

    async fn window_stats(&self, user_id: &UserId, start: NaiveDate, end: NaiveDate) -> Result<Option<WindowStats>> {
        let sessions = self.storage.list_sessions(user_id).await?;
        if sessions.is_empty() {
            return Ok(None);
        }
        let mut stats = WindowStats {
            window_start: Some(start),
            ..Default::default()
        };
        for s in sessions.iter().filter(|s| {
            let day = s.ended_at().date_naive();
            day >= start && day <= end
        }) {
            stats.sessions += 1;
            stats.study_hours += s.hours();
            stats.early_bird += u64::from(self.clock.is_early_bird(s.started_at));
            stats.night_owl += u64::from(self.clock.is_night_owl(s.started_at));
        }
        Ok(Some(stats))
    }
}
