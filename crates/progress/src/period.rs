//! Period decomposition: expected pace, catch-up guidance and per-week or
//! per-month breakdowns of a goal's target.
//!
//! Custom goals are paced over their whole start..due window. Daily, weekly
//! and monthly goals are paced over the calendar window containing `as_of`,
//! so check-ins stay meaningful for open-ended goals. All windows are UTC.

use chrono::{Duration, NaiveDate};
use serde::Serialize;
use studytrack_core::calendar::{self, days_in_month, month_start, next_month_start, week_start};
use studytrack_core::{Goal, GoalStatus, Period, Time};

const SECONDS_PER_DAY: f64 = 86_400.0;

/// Bucket size for [`PeriodDecomposer::period_breakdown`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Granularity {
    /// ISO weeks, Monday first
    Week,
    /// Calendar months
    Month,
}

impl std::str::FromStr for Granularity {
    type Err = studytrack_core::ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "week" | "weekly" => Ok(Granularity::Week),
            "month" | "monthly" => Ok(Granularity::Month),
            other => Err(studytrack_core::ValidationError::Invalid(format!(
                "unknown granularity '{other}'"
            ))),
        }
    }
}

/// One bucket of a breakdown. `period_end` is exclusive.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct PeriodBucket {
    /// First day of the bucket
    pub period_start: NaiveDate,
    /// Day after the last day of the bucket
    pub period_end: NaiveDate,
    /// Share of the goal's target falling in this bucket
    pub target_for_period: f64,
    /// Sum of progress entries recorded in this bucket
    pub actual_for_period: f64,
}

/// Kind of catch-up advice.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum SuggestionKind {
    /// Required amount per day
    DailyRate,
    /// Required amount per week, for longer horizons
    WeeklyRate,
    /// The due date has passed
    DeadlinePassed,
}

/// Advisory catch-up text with the numbers behind it. Never persisted.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Suggestion {
    /// What kind of advice
    pub kind: SuggestionKind,
    /// Human-readable text
    pub message: String,
    /// Required progress per day
    pub daily_rate: f64,
    /// `target - current_progress`
    pub remaining_target: f64,
    /// Whole days left, at least 1
    pub remaining_days: i64,
}

/// Derived, read-time view of a goal's pace.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct GoalInsight {
    /// Progress expected by `as_of`
    pub expected_progress: f64,
    /// Behind pace and still active
    pub is_overdue: bool,
    /// Days until the due date (or pace window end); negative once past due
    pub days_remaining: i64,
    /// Catch-up advice, empty when on track
    pub catch_up_suggestions: Vec<Suggestion>,
}

/// Derives pace expectations from a goal's target, period and dates.
#[derive(Debug, Clone, Copy, Default)]
pub struct PeriodDecomposer;

impl PeriodDecomposer {
    /// Create a decomposer.
    pub fn new() -> Self {
        Self
    }

    /// The window pace is judged over at `as_of`: `[start, end)`.
    pub fn pace_window(&self, goal: &Goal, as_of: Time) -> (Time, Time) {
        let day = as_of.date_naive();
        match goal.period {
            Period::Custom => match (goal.start_date, goal.due_date) {
                (Some(start), Some(due)) => (start, due),
                _ => (goal.created_at, goal.created_at),
            },
            Period::Daily => (
                calendar::start_of_day(day),
                calendar::start_of_day(day + Duration::days(1)),
            ),
            Period::Weekly => {
                let start = week_start(day);
                (
                    calendar::start_of_day(start),
                    calendar::start_of_day(start + Duration::days(7)),
                )
            }
            Period::Monthly => (
                calendar::start_of_day(month_start(day)),
                calendar::start_of_day(next_month_start(day)),
            ),
        }
    }

    /// Fraction of the pace window elapsed at `as_of`, clamped to `[0, 1]`.
    pub fn elapsed_fraction(&self, goal: &Goal, as_of: Time) -> f64 {
        let (start, end) = self.pace_window(goal, as_of);
        let total = (end - start).num_seconds() as f64;
        if total <= 0.0 {
            return 1.0;
        }
        let elapsed = (as_of - start).num_seconds() as f64;
        (elapsed / total).clamp(0.0, 1.0)
    }

    /// `target * elapsed_fraction`.
    pub fn expected_progress(&self, goal: &Goal, as_of: Time) -> f64 {
        goal.target * self.elapsed_fraction(goal, as_of)
    }

    /// Behind pace while active.
    pub fn is_overdue(&self, goal: &Goal, as_of: Time) -> bool {
        goal.status == GoalStatus::Active && goal.current_progress < self.expected_progress(goal, as_of)
    }

    /// Whole days (rounded up) from `as_of` to the due date, or to the end of
    /// the pace window for periodic goals. Negative once past due.
    pub fn days_remaining(&self, goal: &Goal, as_of: Time) -> i64 {
        let end = match goal.period {
            Period::Custom => goal.due_date.unwrap_or(as_of),
            _ => self.pace_window(goal, as_of).1,
        };
        let secs = (end - as_of).num_seconds() as f64;
        (secs / SECONDS_PER_DAY).ceil() as i64
    }

    /// Catch-up advice for a goal that is behind pace; empty otherwise.
    pub fn catch_up_suggestions(&self, goal: &Goal, as_of: Time) -> Vec<Suggestion> {
        if !self.is_overdue(goal, as_of) {
            return Vec::new();
        }

        let remaining_target = (goal.target - goal.current_progress).max(0.0);
        let days_left = self.days_remaining(goal, as_of);
        let remaining_days = days_left.max(1);
        let daily_rate = remaining_target / remaining_days as f64;
        let unit = &goal.progress_unit;

        let mut suggestions = vec![Suggestion {
            kind: SuggestionKind::DailyRate,
            message: format!(
                "Aim for {daily_rate:.1} {unit} per day over the next {remaining_days} day(s) to reach {:.1} {unit}",
                goal.target
            ),
            daily_rate,
            remaining_target,
            remaining_days,
        }];

        if remaining_days >= 7 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::WeeklyRate,
                message: format!("That is about {:.1} {unit} per week", daily_rate * 7.0),
                daily_rate,
                remaining_target,
                remaining_days,
            });
        }

        if goal.period == Period::Custom && days_left <= 0 {
            suggestions.push(Suggestion {
                kind: SuggestionKind::DeadlinePassed,
                message: format!(
                    "The due date has passed with {remaining_target:.1} {unit} left; consider extending it"
                ),
                daily_rate,
                remaining_target,
                remaining_days,
            });
        }

        suggestions
    }

    /// All derived fields at once.
    pub fn insight(&self, goal: &Goal, as_of: Time) -> GoalInsight {
        GoalInsight {
            expected_progress: self.expected_progress(goal, as_of),
            is_overdue: self.is_overdue(goal, as_of),
            days_remaining: self.days_remaining(goal, as_of),
            catch_up_suggestions: self.catch_up_suggestions(goal, as_of),
        }
    }

    /// Bucket the goal's target and recorded progress by calendar week or month.
    ///
    /// Buckets cover the goal's lifetime (start or creation through
    /// completion, due date, or `as_of`), widened to include every entry.
    /// Empty buckets are kept with zero actual progress.
    pub fn period_breakdown(&self, goal: &Goal, granularity: Granularity, as_of: Time) -> Vec<PeriodBucket> {
        let (first_day, last_day) = self.lifetime_days(goal, as_of);

        let mut bucket_start = match granularity {
            Granularity::Week => week_start(first_day),
            Granularity::Month => month_start(first_day),
        };

        let mut buckets = Vec::new();
        while bucket_start <= last_day {
            let bucket_end = match granularity {
                Granularity::Week => bucket_start + Duration::days(7),
                Granularity::Month => next_month_start(bucket_start),
            };

            let mut target_for_period = 0.0;
            let mut day = bucket_start.max(first_day);
            while day < bucket_end && day <= last_day {
                target_for_period += self.daily_target(goal, day);
                day += Duration::days(1);
            }

            let actual_for_period = goal
                .entries
                .iter()
                .filter(|e| {
                    let d = e.timestamp.date_naive();
                    d >= bucket_start && d < bucket_end
                })
                .map(|e| e.value)
                .sum();

            buckets.push(PeriodBucket {
                period_start: bucket_start,
                period_end: bucket_end,
                target_for_period,
                actual_for_period,
            });
            bucket_start = bucket_end;
        }
        buckets
    }

    fn lifetime_days(&self, goal: &Goal, as_of: Time) -> (NaiveDate, NaiveDate) {
        let start = match goal.period {
            Period::Custom => goal.start_date.unwrap_or(goal.created_at),
            _ => goal.created_at,
        };
        let end = match (goal.completed_at, goal.period, goal.due_date) {
            (Some(done), _, _) => done,
            (None, Period::Custom, Some(due)) => due,
            _ => as_of,
        };

        let mut first = start.date_naive();
        let mut last = end.date_naive().max(first);
        for entry in &goal.entries {
            let d = entry.timestamp.date_naive();
            first = first.min(d);
            last = last.max(d);
        }
        (first, last)
    }

    /// Share of the target attributed to one calendar day.
    fn daily_target(&self, goal: &Goal, day: NaiveDate) -> f64 {
        match goal.period {
            Period::Daily => goal.target,
            Period::Weekly => goal.target / 7.0,
            Period::Monthly => goal.target / days_in_month(day) as f64,
            Period::Custom => {
                let (Some(start), Some(due)) = (goal.start_date, goal.due_date) else {
                    return 0.0;
                };
                let (start, due) = (start.date_naive(), due.date_naive());
                let span = (due - start).num_days().max(1);
                if day >= start && (day < due || (span == 1 && day == start)) {
                    goal.target / span as f64
                } else {
                    0.0
                }
            }
        }
    }
}
