//! Goal progress state machine.
//!
//! Every operation validates first and mutates second, so a rejected call
//! leaves the goal untouched.

use studytrack_core::{
    EntryId, Goal, GoalStatus, MilestoneId, MilestoneSpec, ProgressEntry, ProgressSource,
    SessionId, SubTask, SubTaskId, Time,
};
use tracing::{debug, info, warn};
use crate::{ProgressError, Result};

/// What a progress submission changed.
#[derive(Debug, Clone, PartialEq)]
pub struct ProgressOutcome {
    /// The audit entry appended
    pub entry_id: EntryId,
    /// Change to `current_progress` after clamping
    pub applied_delta: f64,
    /// Milestones completed by this submission, in declaration order
    pub completed_milestones: Vec<MilestoneId>,
    /// True exactly once, on the call that completed the goal
    pub just_completed: bool,
}

/// Applies progress and lifecycle changes to a single goal.
#[derive(Debug, Clone, Copy, Default)]
pub struct ProgressCalculator;

impl ProgressCalculator {
    /// Create a calculator.
    pub fn new() -> Self {
        Self
    }

    /// Apply a progress delta.
    ///
    /// The delta may be negative; the resulting progress is clamped to
    /// `[0, target]`. Reaching the target completes the goal.
    pub fn apply_progress(
        &self,
        goal: &mut Goal,
        delta: f64,
        source: ProgressSource,
        session_id: Option<SessionId>,
        notes: impl Into<String>,
        now: Time,
    ) -> Result<ProgressOutcome> {
        if !goal.is_active() {
            return Err(ProgressError::NotActive {
                goal: goal.id,
                status: goal.status,
            });
        }
        if !delta.is_finite() {
            return Err(ProgressError::NonFiniteDelta);
        }

        let entry = ProgressEntry {
            id: EntryId::new(),
            value: delta,
            source,
            session_id,
            notes: notes.into(),
            timestamp: now,
        };
        let entry_id = entry.id;
        goal.entries.push(entry);

        let before = goal.current_progress;
        goal.current_progress = (before + delta).clamp(0.0, goal.target);
        goal.completion_rate = completion_rate(goal.current_progress, goal.target);
        goal.updated_at = now;

        let completed_milestones = self.evaluate_milestones(goal, now);

        let just_completed = goal.current_progress >= goal.target;
        if just_completed {
            goal.status = GoalStatus::Completed;
            goal.completed_at = Some(now);
            info!(goal = %goal.id, user = %goal.user_id, "goal completed");
            let open = goal.milestones.iter().filter(|m| !m.completed).count();
            if open > 0 {
                warn!(goal = %goal.id, open, "goal completed with milestones above its target");
            }
        }

        debug!(
            goal = %goal.id,
            delta,
            progress = goal.current_progress,
            rate = goal.completion_rate,
            "applied progress"
        );

        Ok(ProgressOutcome {
            entry_id,
            applied_delta: goal.current_progress - before,
            completed_milestones,
            just_completed,
        })
    }

    /// Mark every open milestone whose target has been reached, in declaration order.
    pub fn evaluate_milestones(&self, goal: &mut Goal, now: Time) -> Vec<MilestoneId> {
        let progress = goal.current_progress;
        let mut completed = Vec::new();
        for milestone in goal.milestones.iter_mut() {
            if !milestone.completed && milestone.target <= progress {
                milestone.completed = true;
                milestone.completed_at = Some(now);
                completed.push(milestone.id);
            }
        }
        completed
    }

    /// Append a milestone. Active goals immediately credit it if already reached.
    pub fn add_milestone(&self, goal: &mut Goal, spec: MilestoneSpec, now: Time) -> Result<MilestoneId> {
        if goal.status == GoalStatus::Cancelled {
            return Err(ProgressError::NotActive {
                goal: goal.id,
                status: goal.status,
            });
        }
        spec.validate()?;

        let milestone = spec.into_milestone();
        let id = milestone.id;
        goal.milestones.push(milestone);
        goal.updated_at = now;
        if goal.is_active() {
            self.evaluate_milestones(goal, now);
        }
        Ok(id)
    }

    /// Append a subtask.
    pub fn add_subtask(&self, goal: &mut Goal, title: impl Into<String>, now: Time) -> Result<SubTaskId> {
        let title = title.into();
        if title.trim().is_empty() {
            return Err(studytrack_core::ValidationError::MissingField("subtask.title").into());
        }
        if goal.status == GoalStatus::Cancelled {
            return Err(ProgressError::NotActive {
                goal: goal.id,
                status: goal.status,
            });
        }
        let id = SubTaskId::new();
        goal.subtasks.push(SubTask {
            id,
            title,
            completed: false,
            completed_at: None,
        });
        goal.updated_at = now;
        Ok(id)
    }

    /// Flip a subtask's done flag. Returns the new state.
    pub fn toggle_subtask(&self, goal: &mut Goal, subtask_id: SubTaskId, now: Time) -> Result<bool> {
        if goal.status == GoalStatus::Cancelled {
            return Err(ProgressError::NotActive {
                goal: goal.id,
                status: goal.status,
            });
        }
        let subtask = goal
            .subtasks
            .iter_mut()
            .find(|s| s.id == subtask_id)
            .ok_or(ProgressError::SubTaskNotFound(subtask_id))?;

        subtask.completed = !subtask.completed;
        subtask.completed_at = subtask.completed.then_some(now);
        let state = subtask.completed;
        goal.updated_at = now;
        Ok(state)
    }

    /// Move the goal through the user-driven lifecycle.
    ///
    /// Returns true when this call completed the goal.
    pub fn transition(&self, goal: &mut Goal, next: GoalStatus, now: Time) -> Result<bool> {
        if !goal.status.can_transition_to(next) {
            return Err(ProgressError::InvalidTransition {
                from: goal.status,
                to: next,
            });
        }
        info!(goal = %goal.id, from = %goal.status, to = %next, "goal status change");
        goal.status = next;
        goal.updated_at = now;
        if next == GoalStatus::Completed {
            goal.completed_at = Some(now);
            return Ok(true);
        }
        Ok(false)
    }

    /// Administrative reset of a completed or cancelled goal back to active.
    pub fn reopen(&self, goal: &mut Goal, now: Time) -> Result<()> {
        if !matches!(goal.status, GoalStatus::Completed | GoalStatus::Cancelled) {
            return Err(ProgressError::InvalidTransition {
                from: goal.status,
                to: GoalStatus::Active,
            });
        }
        info!(goal = %goal.id, from = %goal.status, "goal reopened");
        goal.status = GoalStatus::Active;
        goal.completed_at = None;
        goal.updated_at = now;
        Ok(())
    }
}

/// `min(100, progress / target * 100)`.
pub fn completion_rate(progress: f64, target: f64) -> f64 {
    if target <= 0.0 {
        return 0.0;
    }
    (progress / target * 100.0).min(100.0)
}
