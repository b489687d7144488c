//! Level curve: monotonic mapping from points to level.

use serde::{Deserialize, Serialize};
use studytrack_core::UserRewards;

const MAX_LEVEL: u32 = 10_000;

/// Reaching level `n` takes `base * n * (n - 1) / 2` points; level 1 is free.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct LevelCurve {
    base_points: u64,
}

impl Default for LevelCurve {
    fn default() -> Self {
        Self::new(100)
    }
}

impl LevelCurve {
    /// Curve with the given base. A zero base is treated as 1.
    pub fn new(base_points: u64) -> Self {
        Self {
            base_points: base_points.max(1),
        }
    }

    /// Points needed to reach `level`.
    pub fn threshold(&self, level: u32) -> u64 {
        let n = level.max(1) as u64;
        self.base_points.saturating_mul(n * (n - 1) / 2)
    }

    /// Level for a point total.
    pub fn level_for(&self, points: u64) -> u32 {
        let mut level = 1u32;
        while level < MAX_LEVEL && self.threshold(level + 1) <= points {
            level += 1;
        }
        level
    }

    /// Percentage of the way from the current level to the next.
    pub fn progress(&self, points: u64) -> f64 {
        let level = self.level_for(points);
        let floor = self.threshold(level);
        let ceiling = self.threshold(level + 1);
        if ceiling <= floor {
            return 100.0;
        }
        ((points - floor) as f64 / (ceiling - floor) as f64 * 100.0).clamp(0.0, 100.0)
    }

    /// Recompute `current_level` and `level_progress`. Returns the new level
    /// when it went up.
    pub fn apply(&self, rewards: &mut UserRewards) -> Option<u32> {
        let before = rewards.current_level;
        rewards.current_level = self.level_for(rewards.total_points);
        rewards.level_progress = self.progress(rewards.total_points);
        (rewards.current_level > before).then_some(rewards.current_level)
    }
}
