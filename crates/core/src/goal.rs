//! Goal model - a numeric study target with progress tracking.

use serde::{Deserialize, Serialize};
use crate::id::{EntryId, GoalId, MilestoneId, SessionId, SubTaskId, UserId};
use crate::session::SessionCompleted;
use crate::{Time, ValidationError};

/// A goal is a user-defined numeric target tracked via incremental progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Goal {
    /// Unique identifier
    pub id: GoalId,

    /// Owner
    pub user_id: UserId,

    /// Goal title
    pub title: String,

    /// Detailed description
    #[serde(default)]
    pub description: String,

    /// Numeric target, always > 0
    pub target: f64,

    /// Free-form unit label, e.g. "hours"
    pub progress_unit: String,

    /// Window the pace is judged against
    pub period: Period,

    /// Only sessions on this subject count toward the goal (None = any)
    #[serde(default)]
    pub subject: Option<String>,

    /// Start of a custom window
    pub start_date: Option<Time>,

    /// End of a custom window
    pub due_date: Option<Time>,

    /// Current progress, clamped to `[0, target]`
    pub current_progress: f64,

    /// `min(100, current_progress / target * 100)`
    pub completion_rate: f64,

    /// Lifecycle status
    pub status: GoalStatus,

    /// When the goal reached its target
    pub completed_at: Option<Time>,

    /// Ordered sub-targets
    pub milestones: Vec<Milestone>,

    /// Ordered checklist items
    pub subtasks: Vec<SubTask>,

    /// Append-only progress history
    pub entries: Vec<ProgressEntry>,

    /// Who may see the goal
    pub visibility: Visibility,

    /// Guardians the goal is shared with
    #[serde(default)]
    pub shared_guardians: Vec<SharedGuardian>,

    /// When created
    pub created_at: Time,

    /// Last updated
    pub updated_at: Time,

    /// Storage version used for optimistic concurrency
    #[serde(default)]
    pub version: u64,
}

/// Goal status.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum GoalStatus {
    /// Goal is accepting progress
    Active,
    /// Goal reached its target
    Completed,
    /// Goal paused by the user
    Paused,
    /// Goal soft-deleted
    Cancelled,
}

impl GoalStatus {
    /// Whether a user-driven transition from `self` to `next` is allowed.
    ///
    /// Reopening a completed goal is an administrative reset and does not go
    /// through this table.
    pub fn can_transition_to(self, next: GoalStatus) -> bool {
        matches!(
            (self, next),
            (GoalStatus::Active, GoalStatus::Completed)
                | (GoalStatus::Active, GoalStatus::Paused)
                | (GoalStatus::Active, GoalStatus::Cancelled)
                | (GoalStatus::Paused, GoalStatus::Active)
        )
    }

    /// Lowercase label.
    pub fn as_str(&self) -> &'static str {
        match self {
            GoalStatus::Active => "active",
            GoalStatus::Completed => "completed",
            GoalStatus::Paused => "paused",
            GoalStatus::Cancelled => "cancelled",
        }
    }
}

impl std::fmt::Display for GoalStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for GoalStatus {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "active" => Ok(GoalStatus::Active),
            "completed" => Ok(GoalStatus::Completed),
            "paused" => Ok(GoalStatus::Paused),
            "cancelled" | "canceled" => Ok(GoalStatus::Cancelled),
            other => Err(ValidationError::Invalid(format!("unknown status '{other}'"))),
        }
    }
}

/// The time window a goal's pace is judged against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Period {
    /// Current calendar day
    Daily,
    /// Current ISO week
    Weekly,
    /// Current calendar month
    Monthly,
    /// Explicit start/due window
    Custom,
}

impl std::str::FromStr for Period {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "daily" => Ok(Period::Daily),
            "weekly" => Ok(Period::Weekly),
            "monthly" => Ok(Period::Monthly),
            "custom" => Ok(Period::Custom),
            other => Err(ValidationError::Invalid(format!("unknown period '{other}'"))),
        }
    }
}

/// Goal visibility.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Visibility {
    /// Only the owner
    #[default]
    Private,
    /// Owner and consenting guardians
    Guardians,
    /// Everyone
    Public,
}

/// A guardian the goal is shared with. Consumed by the sharing layer only.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SharedGuardian {
    /// Guardian user id
    pub guardian_id: UserId,
    /// e.g. "view" or "comment"
    pub access_level: String,
    /// Whether the owner consented
    pub consent: bool,
}

/// A sub-target inside a goal's progress range.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Milestone {
    /// Unique identifier
    pub id: MilestoneId,
    /// Title
    pub title: String,
    /// Progress value at which the milestone completes
    pub target: f64,
    /// Whether reached
    pub completed: bool,
    /// When reached
    pub completed_at: Option<Time>,
    /// Optional deadline
    pub due_date: Option<Time>,
    /// Reward label shown to the user
    pub reward: Option<String>,
}

/// A checklist item with no link to numeric progress.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SubTask {
    /// Unique identifier
    pub id: SubTaskId,
    /// Title
    pub title: String,
    /// Done flag
    pub completed: bool,
    /// When last checked
    pub completed_at: Option<Time>,
}

/// Where a progress delta came from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ProgressSource {
    /// Manual submission or correction
    Manual,
    /// Completed study session
    Session,
}

/// One entry in a goal's progress audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProgressEntry {
    /// Unique identifier
    pub id: EntryId,
    /// Delta as submitted (may be negative)
    pub value: f64,
    /// Origin
    pub source: ProgressSource,
    /// Session that produced it
    pub session_id: Option<SessionId>,
    /// Free-form note
    pub notes: String,
    /// When recorded
    pub timestamp: Time,
}

/// Input for creating a goal.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GoalSpec {
    /// Title
    pub title: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Numeric target
    pub target: Option<f64>,
    /// Unit label
    pub progress_unit: Option<String>,
    /// Period
    pub period: Option<Period>,
    /// Subject filter for sessions
    #[serde(default)]
    pub subject: Option<String>,
    /// Custom window start
    #[serde(default)]
    pub start_date: Option<Time>,
    /// Custom window end
    #[serde(default)]
    pub due_date: Option<Time>,
    /// Initial milestones
    #[serde(default)]
    pub milestones: Vec<MilestoneSpec>,
    /// Initial subtask titles
    #[serde(default)]
    pub subtasks: Vec<String>,
    /// Visibility
    #[serde(default)]
    pub visibility: Visibility,
}

/// Input for adding a milestone.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MilestoneSpec {
    /// Title
    pub title: String,
    /// Progress threshold
    pub target: f64,
    /// Optional deadline
    #[serde(default)]
    pub due_date: Option<Time>,
    /// Reward label
    #[serde(default)]
    pub reward: Option<String>,
}

impl MilestoneSpec {
    /// Validate a milestone definition.
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.title.trim().is_empty() {
            return Err(ValidationError::MissingField("milestone.title"));
        }
        if !self.target.is_finite() || self.target <= 0.0 {
            return Err(ValidationError::NonPositiveTarget(self.target));
        }
        Ok(())
    }

    /// Build the milestone.
    pub fn into_milestone(self) -> Milestone {
        Milestone {
            id: MilestoneId::new(),
            title: self.title,
            target: self.target,
            completed: false,
            completed_at: None,
            due_date: self.due_date,
            reward: self.reward,
        }
    }
}

/// Filter for listing goals.
#[derive(Debug, Clone, Default)]
pub struct GoalFilter {
    /// Only goals owned by this user
    pub user_id: Option<UserId>,
    /// Only goals in one of these statuses
    pub status: Option<Vec<GoalStatus>>,
}

impl GoalFilter {
    /// Goals of one user.
    pub fn for_user(user_id: UserId) -> Self {
        Self {
            user_id: Some(user_id),
            status: None,
        }
    }

    /// Restrict to the given statuses.
    pub fn with_status(mut self, status: Vec<GoalStatus>) -> Self {
        self.status = Some(status);
        self
    }

    /// Whether `goal` passes the filter.
    pub fn matches(&self, goal: &Goal) -> bool {
        if let Some(user) = &self.user_id {
            if &goal.user_id != user {
                return false;
            }
        }
        if let Some(statuses) = &self.status {
            if !statuses.contains(&goal.status) {
                return false;
            }
        }
        true
    }
}

impl Goal {
    /// Create a goal from a spec, rejecting malformed input.
    pub fn from_spec(user_id: UserId, spec: GoalSpec, now: Time) -> Result<Self, ValidationError> {
        if spec.title.trim().is_empty() {
            return Err(ValidationError::MissingField("title"));
        }
        let target = spec.target.ok_or(ValidationError::MissingField("target"))?;
        if !target.is_finite() || target <= 0.0 {
            return Err(ValidationError::NonPositiveTarget(target));
        }
        let progress_unit = spec
            .progress_unit
            .filter(|u| !u.trim().is_empty())
            .ok_or(ValidationError::MissingField("progress_unit"))?;
        let period = spec.period.ok_or(ValidationError::MissingField("period"))?;

        if period == Period::Custom {
            match (spec.start_date, spec.due_date) {
                (Some(start), Some(due)) if due <= start => {
                    return Err(ValidationError::InvertedWindow)
                }
                (Some(_), Some(_)) => {}
                _ => return Err(ValidationError::MissingCustomWindow),
            }
        }

        let mut milestones = Vec::with_capacity(spec.milestones.len());
        for m in spec.milestones {
            m.validate()?;
            milestones.push(m.into_milestone());
        }

        let subtasks = spec
            .subtasks
            .into_iter()
            .filter(|t| !t.trim().is_empty())
            .map(|title| SubTask {
                id: SubTaskId::new(),
                title,
                completed: false,
                completed_at: None,
            })
            .collect();

        Ok(Self {
            id: GoalId::new(),
            user_id,
            title: spec.title,
            description: spec.description,
            target,
            progress_unit,
            period,
            subject: spec.subject.filter(|s| !s.trim().is_empty()),
            start_date: spec.start_date,
            due_date: spec.due_date,
            current_progress: 0.0,
            completion_rate: 0.0,
            status: GoalStatus::Active,
            completed_at: None,
            milestones,
            subtasks,
            entries: Vec::new(),
            visibility: spec.visibility,
            shared_guardians: Vec::new(),
            created_at: now,
            updated_at: now,
            version: 0,
        })
    }

    /// Whether the goal currently accepts progress.
    pub fn is_active(&self) -> bool {
        self.status == GoalStatus::Active
    }

    /// How much a completed session contributes to this goal, if anything.
    ///
    /// Only time- and count-based units move from sessions; everything else
    /// is tracked through manual entries.
    pub fn session_contribution(&self, session: &SessionCompleted) -> Option<f64> {
        if let Some(subject) = &self.subject {
            let matches = session
                .subject
                .as_deref()
                .is_some_and(|s| s.eq_ignore_ascii_case(subject));
            if !matches {
                return None;
            }
        }

        let secs = session.duration_seconds as f64;
        match self.progress_unit.trim().to_lowercase().as_str() {
            "hour" | "hours" | "hr" | "hrs" | "h" => Some(secs / 3600.0),
            "minute" | "minutes" | "min" | "mins" | "m" => Some(secs / 60.0),
            "session" | "sessions" => Some(1.0),
            _ => None,
        }
    }

    /// Milestones whose target can never be reached with this goal's target.
    pub fn unreachable_milestones(&self) -> impl Iterator<Item = &Milestone> {
        self.milestones.iter().filter(move |m| m.target > self.target)
    }
}
