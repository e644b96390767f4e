//! Task model: one timed medication dose.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::lifecycle::{classify, TaskState};

/// A single reminder item.
///
/// `id` is the only identity: two tasks with the same id compare equal no
/// matter what their other fields say.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub name: String,
    pub dosage: String,

    /// When the dose is due (UTC).
    pub scheduled_time: DateTime<Utc>,

    /// Set by an explicit completion; never reset.
    pub completed: bool,
}

impl Task {
    pub fn new(
        id: impl Into<String>,
        name: impl Into<String>,
        dosage: impl Into<String>,
        scheduled_time: DateTime<Utc>,
    ) -> Self {
        Self {
            id: id.into(),
            name: name.into(),
            dosage: dosage.into(),
            scheduled_time,
            completed: false,
        }
    }

    pub fn with_completed(mut self, completed: bool) -> Self {
        self.completed = completed;
        self
    }

    /// "name: dosage", the line shown in alerts and list rows.
    pub fn title(&self) -> String {
        format!("{}: {}", self.name, self.dosage)
    }

    /// Lifecycle state at `now`. Always recomputed, never cached.
    pub fn state(&self, now: DateTime<Utc>) -> TaskState {
        classify(self.scheduled_time, self.completed, now)
    }

    pub(crate) fn mark_completed(&mut self) {
        self.completed = true;
    }
}

impl PartialEq for Task {
    fn eq(&self, other: &Self) -> bool {
        self.id == other.id
    }
}

impl Eq for Task {}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_equality_is_by_id_only() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let a = Task::new("m1", "Aspirin", "81 mg", at);
        let b = Task::new("m1", "Renamed", "100 mg", at + Duration::hours(2)).with_completed(true);
        let c = Task::new("m2", "Aspirin", "81 mg", at);

        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_title_joins_name_and_dosage() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let t = Task::new("m1", "Metformin", "500 mg", at);
        assert_eq!(t.title(), "Metformin: 500 mg");
    }

    #[test]
    fn test_state_tracks_the_clock() {
        let at = Utc.with_ymd_and_hms(2026, 3, 1, 9, 0, 0).unwrap();
        let t = Task::new("m1", "Metformin", "500 mg", at);

        assert_eq!(t.state(at - Duration::hours(1)), TaskState::Upcoming);
        assert_eq!(t.state(at), TaskState::Soon);
        assert_eq!(t.state(at + Duration::minutes(30)), TaskState::Missed);
        assert_eq!(t.clone().with_completed(true).state(at), TaskState::Completed);
    }
}
