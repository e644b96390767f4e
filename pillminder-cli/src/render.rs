//! Terminal rendering of task rows and escalation alerts.

use chrono_tz::Tz;
use pillminder_core::{time::format_local_time, Escalation, EscalationEvent, TaskView};

pub fn format_row(index: usize, view: &TaskView, tz: Tz) -> String {
    let mut line = format!(
        "{index:>3}  {}  {:<9}  {}",
        format_local_time(view.task.scheduled_time, tz),
        view.state.as_str(),
        view.task.title()
    );
    if let Some(timer) = view.armed {
        line.push_str(&format!(
            "  (next: {} at {})",
            timer.escalation,
            format_local_time(timer.fire_at, tz)
        ));
    }
    line
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Alert {
    pub text: String,
    /// Terminal bells to ring with the alert.
    pub bells: usize,
}

impl Alert {
    pub fn render(&self) -> String {
        format!("{}{}", "\x07".repeat(self.bells), self.text)
    }
}

pub fn format_alert(event: &EscalationEvent, tz: Tz) -> Alert {
    let due = format_local_time(event.task.scheduled_time, tz);
    let title = event.task.title();
    match event.escalation {
        Escalation::Soon => Alert {
            text: format!("[soon] {title} is due at {due}"),
            bells: 0,
        },
        Escalation::Now => Alert {
            text: format!("[now]  Take Medication: {title}"),
            bells: 1,
        },
        Escalation::Late => Alert {
            text: format!("[late] {title} was due at {due} and has not been taken"),
            bells: 2,
        },
    }
}
