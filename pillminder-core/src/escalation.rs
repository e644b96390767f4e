//! Escalation tiers and the `soon -> now -> late` chain.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::lifecycle::SOON_WINDOW;
use crate::task::Task;

/// How close to the due time a task must be, on first sight, to start at `Now`.
pub const NOW_WINDOW: Duration = Duration::seconds(10);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Escalation {
    /// Five minutes before the due time.
    Soon,
    /// At the due time.
    Now,
    /// Five minutes after the due time. Terminal.
    Late,
}

impl Escalation {
    pub const ALL: [Escalation; 3] = [Escalation::Soon, Escalation::Now, Escalation::Late];

    /// Offset of this tier from the task's due time.
    pub fn offset(self) -> Duration {
        match self {
            Escalation::Soon => -SOON_WINDOW,
            Escalation::Now => Duration::zero(),
            Escalation::Late => SOON_WINDOW,
        }
    }

    /// Next tier in the chain, `None` after `Late`.
    pub fn next(self) -> Option<Escalation> {
        match self {
            Escalation::Soon => Some(Escalation::Now),
            Escalation::Now => Some(Escalation::Late),
            Escalation::Late => None,
        }
    }

    pub fn is_terminal(self) -> bool {
        self.next().is_none()
    }

    /// Wall-clock moment this tier fires for a task due at `scheduled_time`.
    ///
    /// `None` when the moment is outside chrono's representable range.
    pub fn fire_time(self, scheduled_time: DateTime<Utc>) -> Option<DateTime<Utc>> {
        scheduled_time.checked_add_signed(self.offset())
    }

    /// Tier a task starts at when first scheduled at `now`.
    ///
    /// Tiers whose moment has already passed are not replayed, except the one
    /// matching the present: within [`NOW_WINDOW`] of due starts at `Now`,
    /// further overdue starts at `Late`.
    pub fn initial(scheduled_time: DateTime<Utc>, now: DateTime<Utc>) -> Escalation {
        let elapsed = now.signed_duration_since(scheduled_time);
        if elapsed < -NOW_WINDOW {
            Escalation::Soon
        } else if elapsed <= NOW_WINDOW {
            Escalation::Now
        } else {
            Escalation::Late
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Escalation::Soon => "soon",
            Escalation::Now => "now",
            Escalation::Late => "late",
        }
    }
}

impl fmt::Display for Escalation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One delivered escalation, broadcast to every subscriber.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EscalationEvent {
    /// Snapshot of the task when the event fired.
    pub task: Task,
    pub escalation: Escalation,
    /// Clock reading at delivery.
    pub fired_at: DateTime<Utc>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn due() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap()
    }

    #[test]
    fn test_chain_is_strict_and_terminates() {
        assert_eq!(Escalation::Soon.next(), Some(Escalation::Now));
        assert_eq!(Escalation::Now.next(), Some(Escalation::Late));
        assert_eq!(Escalation::Late.next(), None);
        assert!(Escalation::Late.is_terminal());

        // Walking the chain from any tier only ever moves forward.
        for start in Escalation::ALL {
            let mut cur = start;
            while let Some(n) = cur.next() {
                assert!(n > cur);
                cur = n;
            }
            assert_eq!(cur, Escalation::Late);
        }
    }

    #[test]
    fn test_fire_times_are_offsets_from_due() {
        let at = due();
        assert_eq!(Escalation::Soon.fire_time(at), Some(at - Duration::minutes(5)));
        assert_eq!(Escalation::Now.fire_time(at), Some(at));
        assert_eq!(Escalation::Late.fire_time(at), Some(at + Duration::minutes(5)));
    }

    #[test]
    fn test_fire_time_out_of_range_is_none() {
        assert_eq!(Escalation::Late.fire_time(DateTime::<Utc>::MAX_UTC), None);
        assert_eq!(Escalation::Soon.fire_time(DateTime::<Utc>::MIN_UTC), None);
    }

    #[test]
    fn test_serializes_as_snake_case() {
        assert_eq!(serde_json::to_value(Escalation::Late).unwrap(), "late");
        let back: Escalation = serde_json::from_str("\"soon\"").unwrap();
        assert_eq!(back, Escalation::Soon);
    }

    #[test]
    fn test_initial_tier_matches_present_reality() {
        let at = due();
        let cases = [
            (-3_600, Escalation::Soon),
            (-120, Escalation::Soon),
            (-11, Escalation::Soon),
            (-10, Escalation::Now),
            (0, Escalation::Now),
            (10, Escalation::Now),
            (11, Escalation::Late),
            (240, Escalation::Late),
        ];
        for (offset, expected) in cases {
            let now = at + Duration::seconds(offset);
            assert_eq!(Escalation::initial(at, now), expected, "offset {offset}s");
        }
    }
}
