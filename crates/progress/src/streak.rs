//! Streak derivation from per-day activity presence.

use std::collections::BTreeSet;
use chrono::{Duration, NaiveDate};
use serde::Serialize;
use studytrack_core::StreakData;

/// Default streak milestones in days.
pub const DEFAULT_STREAK_MILESTONES: [u32; 5] = [3, 7, 14, 30, 100];

/// Where the user's streak stands on `as_of`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum StreakStatus {
    /// Activity recorded today
    CompletedToday,
    /// No activity today yet, but yesterday had some
    AtRisk,
    /// History exists but the last two days are empty
    Broken,
    /// No activity ever
    None,
}

/// Computed streak state.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct StreakState {
    /// Consecutive active days ending today (or yesterday while at risk)
    pub current_streak: u32,
    /// Longest run in the whole history, always >= `current_streak`
    pub longest_streak: u32,
    /// Status on `as_of`
    pub status: StreakStatus,
    /// Most recent active day
    pub last_active_date: Option<NaiveDate>,
    /// Milestones already reached by the current streak
    pub reached_milestones: Vec<u32>,
    /// Next milestone ahead of the current streak
    pub next_milestone: Option<u32>,
}

impl StreakState {
    /// Summary stored on the user's reward state.
    pub fn to_data(&self) -> StreakData {
        StreakData {
            current_streak: self.current_streak,
            longest_streak: self.longest_streak,
            last_active_date: self.last_active_date,
        }
    }
}

/// Computes streaks; the milestone ladder is configurable.
#[derive(Debug, Clone)]
pub struct StreakTracker {
    milestones: Vec<u32>,
}

impl Default for StreakTracker {
    fn default() -> Self {
        Self::new()
    }
}

impl StreakTracker {
    /// Tracker with the default milestones.
    pub fn new() -> Self {
        Self {
            milestones: DEFAULT_STREAK_MILESTONES.to_vec(),
        }
    }

    /// Replace the milestone ladder.
    pub fn with_milestones(mut self, mut milestones: Vec<u32>) -> Self {
        milestones.sort_unstable();
        milestones.dedup();
        self.milestones = milestones;
        self
    }

    /// Milestone ladder.
    pub fn milestones(&self) -> &[u32] {
        &self.milestones
    }

    /// Derive the streak state on `as_of` from the set of active days.
    ///
    /// Days after `as_of` are ignored. The longest run is recomputed from the
    /// full history so retroactive edits are tolerated.
    pub fn compute(&self, activity: &BTreeSet<NaiveDate>, as_of: NaiveDate) -> StreakState {
        let history: Vec<NaiveDate> = activity.range(..=as_of).copied().collect();
        let last_active_date = history.last().copied();

        let yesterday = as_of - Duration::days(1);
        let (anchor, status) = if activity.contains(&as_of) {
            (Some(as_of), StreakStatus::CompletedToday)
        } else if activity.contains(&yesterday) {
            (Some(yesterday), StreakStatus::AtRisk)
        } else if history.is_empty() {
            (None, StreakStatus::None)
        } else {
            (None, StreakStatus::Broken)
        };

        let mut current_streak = 0u32;
        if let Some(mut day) = anchor {
            while activity.contains(&day) {
                current_streak += 1;
                day -= Duration::days(1);
            }
        }

        let longest_streak = longest_run(&history).max(current_streak);

        StreakState {
            current_streak,
            longest_streak,
            status,
            last_active_date,
            reached_milestones: self
                .milestones
                .iter()
                .copied()
                .filter(|m| *m <= current_streak)
                .collect(),
            next_milestone: self.milestones.iter().copied().find(|m| *m > current_streak),
        }
    }

    /// The highest milestone crossed going from `previous` to `current`, if any.
    pub fn newly_reached(&self, previous: u32, current: u32) -> Option<u32> {
        self.milestones
            .iter()
            .copied()
            .filter(|m| previous < *m && *m <= current)
            .max()
    }
}

/// Longest run of consecutive days in a sorted, de-duplicated list.
pub fn longest_run(days: &[NaiveDate]) -> u32 {
    let mut best = 0u32;
    let mut run = 0u32;
    let mut prev: Option<NaiveDate> = None;
    for &day in days {
        run = match prev {
            Some(p) if day - p == Duration::days(1) => run + 1,
            _ => 1,
        };
        best = best.max(run);
        prev = Some(day);
    }
    best
}
