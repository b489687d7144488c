//! Rewards
//!
//! Criteria evaluation over lifetime statistics, the level curve, leaderboard
//! ranking, and weighted random selection.

#![warn(missing_docs)]

pub mod catalog;
pub mod criteria;
pub mod levels;
pub mod leaderboard;
pub mod selector;
pub mod tips;

pub use catalog::default_catalog;
pub use criteria::{CriteriaEvaluator, EvaluationContext, NewlyEarnedReward};
pub use levels::LevelCurve;
pub use leaderboard::{LeaderboardEntry, RankPosition, Ranker};
pub use selector::{SelectionError, Weighted, WeightedSelector};
pub use tips::{Tip, TipCategory, TipPicker};
