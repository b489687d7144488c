//! Points aggregation and dense ranking.

use std::cmp::Ordering;
use std::collections::BTreeSet;
use serde::Serialize;
use studytrack_core::{Time, Timeframe, UserId, UserRewards};

/// One row of the leaderboard.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LeaderboardEntry {
    /// User
    pub user_id: UserId,
    /// Points in the timeframe
    pub points: u64,
    /// Dense rank, 1-based
    pub rank: u32,
    /// When the user reached these points (latest qualifying award)
    pub qualified_at: Option<Time>,
}

/// A single user's standing.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct RankPosition {
    /// Dense rank, 1-based
    pub rank: u32,
    /// Points in the timeframe
    pub points: u64,
}

/// Computes points per timeframe and dense ranks.
#[derive(Debug, Clone, Copy, Default)]
pub struct Ranker;

impl Ranker {
    /// Create a ranker.
    pub fn new() -> Self {
        Self
    }

    /// Points in the timeframe containing `as_of`, and when they were reached.
    ///
    /// All-time points are `total_points` (bonus grants included). Weekly and
    /// monthly points are derived from `earned_at` of earned rewards.
    pub fn points(&self, rewards: &UserRewards, timeframe: Timeframe, as_of: Time) -> (u64, Option<Time>) {
        let earned = rewards
            .earned_rewards
            .iter()
            .filter(|r| r.earned_at <= as_of && timeframe.contains(r.earned_at, as_of));

        match timeframe {
            Timeframe::Alltime => {
                let latest = earned
                    .map(|r| r.earned_at)
                    .chain(rewards.bonus_grants.iter().map(|g| g.granted_at))
                    .max();
                (rewards.total_points, latest)
            }
            _ => earned.fold((0, None), |(sum, latest): (u64, Option<Time>), r| {
                (sum + r.points, latest.max(Some(r.earned_at)))
            }),
        }
    }

    /// The full leaderboard, best first.
    ///
    /// Ties share a rank and the next distinct value takes the next rank.
    /// Within a tie, rows are ordered by earliest `qualified_at`, then user id.
    pub fn rank(&self, all: &[UserRewards], timeframe: Timeframe, as_of: Time) -> Vec<LeaderboardEntry> {
        let mut rows: Vec<LeaderboardEntry> = all
            .iter()
            .map(|r| {
                let (points, qualified_at) = self.points(r, timeframe, as_of);
                LeaderboardEntry {
                    user_id: r.user_id.clone(),
                    points,
                    rank: 0,
                    qualified_at,
                }
            })
            .collect();

        rows.sort_by(|a, b| {
            b.points
                .cmp(&a.points)
                .then_with(|| earliest_first(a.qualified_at, b.qualified_at))
                .then_with(|| a.user_id.cmp(&b.user_id))
        });

        let mut rank = 0u32;
        let mut previous: Option<u64> = None;
        for row in rows.iter_mut() {
            if previous != Some(row.points) {
                rank += 1;
                previous = Some(row.points);
            }
            row.rank = rank;
        }
        rows
    }

    /// One user's dense rank without sorting the population: one plus the
    /// number of distinct point values strictly above theirs.
    pub fn rank_of(
        &self,
        user_id: &UserId,
        all: &[UserRewards],
        timeframe: Timeframe,
        as_of: Time,
    ) -> Option<RankPosition> {
        let me = all.iter().find(|r| &r.user_id == user_id)?;
        let (points, _) = self.points(me, timeframe, as_of);

        let higher: BTreeSet<u64> = all
            .iter()
            .map(|r| self.points(r, timeframe, as_of).0)
            .filter(|p| *p > points)
            .collect();

        Some(RankPosition {
            rank: higher.len() as u32 + 1,
            points,
        })
    }
}

fn earliest_first(a: Option<Time>, b: Option<Time>) -> Ordering {
    match (a, b) {
        (Some(a), Some(b)) => a.cmp(&b),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => Ordering::Equal,
    }
}
