//! Lifecycle classification: where a task stands relative to the clock.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

/// Half-width of the window around the due time in which a task is "soon".
pub const SOON_WINDOW: Duration = Duration::minutes(5);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskState {
    /// Due more than [`SOON_WINDOW`] from now.
    Upcoming,
    /// Within [`SOON_WINDOW`] of the due time, either side.
    Soon,
    /// More than [`SOON_WINDOW`] overdue and not completed.
    Missed,
    /// Terminal.
    Completed,
}

impl TaskState {
    /// Only `Soon` and `Missed` tasks may be marked taken.
    pub fn can_be_completed(self) -> bool {
        matches!(self, TaskState::Soon | TaskState::Missed)
    }

    pub fn as_str(self) -> &'static str {
        match self {
            TaskState::Upcoming => "upcoming",
            TaskState::Soon => "soon",
            TaskState::Missed => "missed",
            TaskState::Completed => "completed",
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Classify a task from its due time, completion flag and the current time.
///
/// Pure and total: any combination of inputs yields a state.
pub fn classify(scheduled_time: DateTime<Utc>, completed: bool, now: DateTime<Utc>) -> TaskState {
    if completed {
        return TaskState::Completed;
    }

    let elapsed = now.signed_duration_since(scheduled_time);

    if elapsed.abs() <= SOON_WINDOW {
        TaskState::Soon
    } else if elapsed > SOON_WINDOW {
        TaskState::Missed
    } else {
        TaskState::Upcoming
    }
}
