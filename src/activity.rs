//! Staleness and activity classification.
//!
//! Staleness is a pure function of `now`. [`is_stale`] is the only place the
//! rule lives; list filters, summaries and stale marking all call it.

use crate::types::{ActivityState, Task, TaskStatus};
use chrono::{DateTime, Utc};

/// Default inactivity window before a started task counts as stale.
pub const DEFAULT_STALE_THRESHOLD_HOURS: f64 = 2.0;

/// The instant inactivity is measured from.
pub fn activity_reference(task: &Task) -> DateTime<Utc> {
    task.last_activity.unwrap_or(task.start_time)
}

fn hours_since(now: DateTime<Utc>, reference: DateTime<Utc>) -> f64 {
    (now - reference).num_milliseconds() as f64 / 3_600_000.0
}

/// Whether a task is stale at `now`.
pub fn is_stale(task: &Task, now: DateTime<Utc>, threshold_hours: f64) -> bool {
    if task.status == TaskStatus::Completed {
        return false;
    }
    if task.is_stale == Some(true) {
        return true;
    }
    if task.start_time > now {
        return false;
    }
    hours_since(now, activity_reference(task)) >= threshold_hours
}

/// Whole hours since the task's last activity (or start), never negative.
pub fn hours_inactive(task: &Task, now: DateTime<Utc>) -> i64 {
    (now - activity_reference(task)).num_hours().max(0)
}

/// Derived state shown to consumers.
pub fn classify(task: &Task, now: DateTime<Utc>, threshold_hours: f64) -> ActivityState {
    if task.status == TaskStatus::Completed {
        ActivityState::Completed
    } else if is_stale(task, now, threshold_hours) {
        ActivityState::Stale
    } else if task.status == TaskStatus::InProgress {
        ActivityState::InProgress
    } else {
        ActivityState::Pending
    }
}
