use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::escalation::Escalation;

/// Failures local to one scheduling step. None of them abort a reconcile pass.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum ScheduleError {
    #[error("fire time for {escalation} escalation of task {task_id} is out of range (due {scheduled_time})")]
    FireTimeOutOfRange {
        task_id: String,
        escalation: Escalation,
        scheduled_time: DateTime<Utc>,
    },

    #[error("re-scan time is out of range (now {now})")]
    RescanOutOfRange { now: DateTime<Utc> },
}

/// The driver task is gone (shut down or panicked).
#[derive(Debug, Error)]
#[error("scheduler driver is not running")]
pub struct DriverError;
