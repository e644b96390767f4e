//! One-shot timer bookkeeping for the scheduler.
//!
//! Design (v0):
//! - `armed` is the source of truth: task id -> (fire time, tier, seq).
//! - `heap` orders pending fires (earliest first) and holds copies only.
//!   Cancelling removes the `armed` entry and leaves the heap entry behind;
//!   a heap entry fires only while its seq still matches, so a cancelled or
//!   replaced timer never delivers.
//! - At most one re-scan timer, tracked the same way.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::cmp::Ordering;
use std::collections::{BinaryHeap, HashMap};

use crate::escalation::Escalation;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ArmedTimer {
    pub fire_at: DateTime<Utc>,
    pub escalation: Escalation,
}

#[derive(Debug, Clone, PartialEq, Eq)]
enum TimerKey {
    Task(String),
    Rescan,
}

#[derive(Debug, Clone)]
struct HeapEntry {
    fire_at: DateTime<Utc>,
    seq: u64,
    key: TimerKey,
}

impl PartialEq for HeapEntry {
    fn eq(&self, other: &Self) -> bool {
        self.fire_at == other.fire_at && self.seq == other.seq
    }
}
impl Eq for HeapEntry {}

impl PartialOrd for HeapEntry {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

impl Ord for HeapEntry {
    fn cmp(&self, other: &Self) -> Ordering {
        // BinaryHeap is a max-heap; invert so the earliest fire time (then the
        // earliest arming) comes out first.
        other
            .fire_at
            .cmp(&self.fire_at)
            .then_with(|| other.seq.cmp(&self.seq))
    }
}

#[derive(Debug, Clone, Copy)]
struct Slot {
    timer: ArmedTimer,
    seq: u64,
}

/// A timer whose fire time has been reached.
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Due {
    Task {
        task_id: String,
        escalation: Escalation,
        fire_at: DateTime<Utc>,
    },
    Rescan {
        fire_at: DateTime<Utc>,
    },
}

#[derive(Debug, Default)]
pub(crate) struct TimerTable {
    armed: HashMap<String, Slot>,
    rescan: Option<(DateTime<Utc>, u64)>,
    heap: BinaryHeap<HeapEntry>,
    seq: u64,
}

impl TimerTable {
    pub(crate) fn new() -> Self {
        Self::default()
    }

    /// Number of armed task timers (the re-scan timer is not counted).
    pub(crate) fn len(&self) -> usize {
        self.armed.len()
    }

    pub(crate) fn get(&self, task_id: &str) -> Option<ArmedTimer> {
        self.armed.get(task_id).map(|s| s.timer)
    }

    pub(crate) fn iter(&self) -> impl Iterator<Item = (&str, ArmedTimer)> {
        self.armed.iter().map(|(id, s)| (id.as_str(), s.timer))
    }

    pub(crate) fn rescan_at(&self) -> Option<DateTime<Utc>> {
        self.rescan.map(|(at, _)| at)
    }

    /// Arm (or replace) the timer for `task_id`.
    pub(crate) fn arm_task(&mut self, task_id: &str, timer: ArmedTimer) {
        let seq = self.next_seq();
        self.armed.insert(task_id.to_string(), Slot { timer, seq });
        self.heap.push(HeapEntry {
            fire_at: timer.fire_at,
            seq,
            key: TimerKey::Task(task_id.to_string()),
        });
    }

    pub(crate) fn cancel_task(&mut self, task_id: &str) -> Option<ArmedTimer> {
        let removed = self.armed.remove(task_id).map(|s| s.timer);
        if removed.is_some() {
            self.compact();
        }
        removed
    }

    pub(crate) fn arm_rescan(&mut self, fire_at: DateTime<Utc>) {
        let seq = self.next_seq();
        self.rescan = Some((fire_at, seq));
        self.heap.push(HeapEntry {
            fire_at,
            seq,
            key: TimerKey::Rescan,
        });
    }

    /// Drop every timer, task and re-scan alike.
    pub(crate) fn clear(&mut self) {
        self.armed.clear();
        self.rescan = None;
        self.heap.clear();
    }

    /// Earliest live fire time.
    pub(crate) fn next_deadline(&mut self) -> Option<DateTime<Utc>> {
        self.prune_stale_head();
        self.heap.peek().map(|e| e.fire_at)
    }

    /// Moment the driver should wake: the earliest live fire time, pushed out
    /// to the last live timer that falls within `tolerance` of it so nearby
    /// timers are delivered in one batch. Never earlier than the deadline.
    pub(crate) fn next_wake(&mut self, tolerance: Duration) -> Option<DateTime<Utc>> {
        let earliest = self.next_deadline()?;
        let horizon = earliest.checked_add_signed(tolerance).unwrap_or(earliest);

        let wake = self
            .heap
            .iter()
            .filter(|e| self.is_live(e))
            .map(|e| e.fire_at)
            .filter(|at| *at <= horizon)
            .max()
            .unwrap_or(earliest);

        Some(wake)
    }

    /// Pop the earliest live timer whose fire time is not after `now`.
    ///
    /// The popped timer is disarmed before it is returned.
    pub(crate) fn pop_due(&mut self, now: DateTime<Utc>) -> Option<Due> {
        loop {
            let head = self.heap.peek()?;
            if !self.is_live(head) {
                self.heap.pop();
                continue;
            }
            if head.fire_at > now {
                return None;
            }

            let entry = self.heap.pop()?;
            return Some(match entry.key {
                TimerKey::Task(task_id) => {
                    let slot = self.armed.remove(&task_id)?;
                    Due::Task {
                        task_id,
                        escalation: slot.timer.escalation,
                        fire_at: slot.timer.fire_at,
                    }
                }
                TimerKey::Rescan => {
                    self.rescan = None;
                    Due::Rescan {
                        fire_at: entry.fire_at,
                    }
                }
            });
        }
    }

    fn is_live(&self, entry: &HeapEntry) -> bool {
        match &entry.key {
            TimerKey::Task(id) => self.armed.get(id).is_some_and(|s| s.seq == entry.seq),
            TimerKey::Rescan => self.rescan.is_some_and(|(_, seq)| seq == entry.seq),
        }
    }

    fn prune_stale_head(&mut self) {
        while let Some(head) = self.heap.peek() {
            if self.is_live(head) {
                break;
            }
            self.heap.pop();
        }
    }

    /// Rebuild the heap once stale entries clearly outnumber live ones.
    fn compact(&mut self) {
        let live = self.armed.len() + usize::from(self.rescan.is_some());
        if self.heap.len() <= 2 * live + 16 {
            return;
        }
        let entries = std::mem::take(&mut self.heap).into_vec();
        self.heap = entries.into_iter().filter(|e| self.is_live(e)).collect();
    }

    fn next_seq(&mut self) -> u64 {
        self.seq += 1;
        self.seq
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap()
    }

    fn timer(at: DateTime<Utc>, escalation: Escalation) -> ArmedTimer {
        ArmedTimer {
            fire_at: at,
            escalation,
        }
    }

    #[test]
    fn test_pops_in_fire_time_order_and_only_when_due() {
        let mut table = TimerTable::new();
        table.arm_task("b", timer(t0() + Duration::minutes(2), Escalation::Now));
        table.arm_task("a", timer(t0() + Duration::minutes(1), Escalation::Soon));

        assert_eq!(table.pop_due(t0()), None);

        let first = table.pop_due(t0() + Duration::minutes(5)).unwrap();
        assert!(matches!(first, Due::Task { ref task_id, .. } if task_id == "a"));
        let second = table.pop_due(t0() + Duration::minutes(5)).unwrap();
        assert!(matches!(second, Due::Task { ref task_id, .. } if task_id == "b"));
        assert_eq!(table.pop_due(t0() + Duration::minutes(5)), None);
        assert_eq!(table.len(), 0);
    }

    #[test]
    fn test_cancelled_timer_never_fires() {
        let mut table = TimerTable::new();
        table.arm_task("a", timer(t0(), Escalation::Now));
        assert!(table.cancel_task("a").is_some());
        assert!(table.cancel_task("a").is_none());

        assert_eq!(table.pop_due(t0() + Duration::hours(1)), None);
        assert_eq!(table.next_deadline(), None);
    }

    #[test]
    fn test_rearming_replaces_the_previous_timer() {
        let mut table = TimerTable::new();
        table.arm_task("a", timer(t0(), Escalation::Soon));
        table.arm_task("a", timer(t0() + Duration::minutes(5), Escalation::Now));

        assert_eq!(table.len(), 1);
        assert_eq!(table.pop_due(t0()), None);
        assert_eq!(table.next_deadline(), Some(t0() + Duration::minutes(5)));
    }

    #[test]
    fn test_clear_drops_rescan_too() {
        let mut table = TimerTable::new();
        table.arm_task("a", timer(t0(), Escalation::Now));
        table.arm_rescan(t0() + Duration::minutes(10));
        assert_eq!(table.rescan_at(), Some(t0() + Duration::minutes(10)));

        table.clear();
        assert_eq!(table.len(), 0);
        assert_eq!(table.rescan_at(), None);
        assert_eq!(table.pop_due(t0() + Duration::days(1)), None);
    }

    #[test]
    fn test_rescan_pops_like_any_other_timer() {
        let mut table = TimerTable::new();
        table.arm_rescan(t0());
        assert_eq!(table.pop_due(t0()), Some(Due::Rescan { fire_at: t0() }));
        assert_eq!(table.rescan_at(), None);
    }

    #[test]
    fn test_wake_batches_timers_inside_tolerance() {
        let mut table = TimerTable::new();
        table.arm_task("a", timer(t0(), Escalation::Now));
        table.arm_task("b", timer(t0() + Duration::seconds(3), Escalation::Now));
        table.arm_task("c", timer(t0() + Duration::seconds(30), Escalation::Now));

        let tol = Duration::seconds(5);
        assert_eq!(table.next_wake(tol), Some(t0() + Duration::seconds(3)));
        assert_eq!(table.next_wake(Duration::zero()), Some(t0()));

        table.cancel_task("b");
        assert_eq!(table.next_wake(tol), Some(t0()));
    }

    #[test]
    fn test_stale_entries_are_compacted() {
        let mut table = TimerTable::new();
        for i in 0..100 {
            table.arm_task("a", timer(t0() + Duration::seconds(i), Escalation::Soon));
        }
        table.cancel_task("a");
        assert!(table.heap.len() <= 16);
    }
}
