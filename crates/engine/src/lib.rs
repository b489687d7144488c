//! Study engine - goal progress, streaks, rewards and leaderboards over a
//! storage backend.

#![warn(missing_docs)]

pub mod activity;
pub mod config;
pub mod engine;
pub mod error;
pub mod notify;

pub use activity::{ActivitySource, StoredActivitySource};
pub use config::{EngineConfig, SessionClock};
pub use engine::{GoalProgress, GoalSuggestion, ProgressUpdate, SessionOutcome, StudyEngine};
pub use error::{EngineError, Result};
pub use notify::{LogSink, NotificationSink};
