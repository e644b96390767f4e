//! Reminder scheduler: owns the task list and its escalation timers.
//!
//! The scheduler is a plain `&mut self` state machine. It never sleeps; time
//! moves when the owner calls [`Scheduler::fire_due`] after the clock has
//! advanced (the async [`crate::driver`] does this in production).
//!
//! v0 behavior:
//! - `reconcile` drops every timer, re-sorts the list, and walks it in due
//!   order arming at most `max_armed_timers` task timers
//! - an escalation whose moment has already passed is delivered on the spot
//!   and the chain moves on to the next tier
//! - tasks cut off by the cap are picked up by a single delayed re-scan

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::config::SchedulerConfig;
use crate::error::ScheduleError;
use crate::escalation::{Escalation, EscalationEvent};
use crate::lifecycle::TaskState;
use crate::task::Task;
use crate::timers::{ArmedTimer, Due, TimerTable};

/// Buffered events per subscriber before the slowest one starts lagging.
const EVENT_CHANNEL_CAPACITY: usize = 256;

/// What one reconcile pass did.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ReconcileSummary {
    /// Tasks skipped as completed or missed.
    pub skipped: usize,
    /// Task timers armed at the end of the pass.
    pub armed: usize,
    /// Escalations delivered immediately because they were already due.
    pub fired: usize,
    /// Tasks that could not be scheduled (fire time out of range).
    pub failed: usize,
    /// True when the cap cut the scan short and a re-scan was armed.
    pub deferred: bool,
}

/// Result of [`Scheduler::complete`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum Completion {
    Completed,
    AlreadyCompleted,
    /// Ignored: only `soon` and `missed` tasks can be marked taken.
    NotCompletable(TaskState),
    UnknownTask,
}

/// One row of a [`SchedulerSnapshot`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskView {
    pub task: Task,
    pub state: TaskState,
    pub armed: Option<ArmedTimer>,
}

/// Point-in-time copy of the scheduler for rendering.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SchedulerSnapshot {
    pub taken_at: DateTime<Utc>,
    pub tasks: Vec<TaskView>,
    pub rescan_at: Option<DateTime<Utc>>,
}

pub struct Scheduler<C: Clock> {
    tasks: Vec<Task>,
    timers: TimerTable,
    config: SchedulerConfig,
    clock: C,
    events: broadcast::Sender<EscalationEvent>,
}

impl<C: Clock> Scheduler<C> {
    pub fn new(config: SchedulerConfig, clock: C) -> Self {
        let (events, _) = broadcast::channel(EVENT_CHANNEL_CAPACITY);
        Self {
            tasks: Vec::new(),
            timers: TimerTable::new(),
            config: config.normalized(),
            clock,
            events,
        }
    }

    /// Receive every escalation delivered from now on.
    pub fn subscribe(&self) -> broadcast::Receiver<EscalationEvent> {
        self.events.subscribe()
    }

    pub fn now(&self) -> DateTime<Utc> {
        self.clock.now()
    }

    /// Replace the task list and rebuild every timer from scratch.
    ///
    /// The list is stable-sorted by due time, so callers may pass it in any
    /// order; ties keep their input order.
    pub fn reconcile(&mut self, mut tasks: Vec<Task>) -> ReconcileSummary {
        tasks.sort_by_key(|t| t.scheduled_time);
        self.tasks = tasks;
        self.rescan()
    }

    /// Rebuild every timer from the list currently held.
    pub fn rescan(&mut self) -> ReconcileSummary {
        self.timers.clear();

        let now = self.clock.now();
        let cap = self.config.max_armed_timers;
        let mut summary = ReconcileSummary::default();

        for idx in 0..self.tasks.len() {
            let task = &self.tasks[idx];
            if matches!(task.state(now), TaskState::Completed | TaskState::Missed) {
                summary.skipped += 1;
                continue;
            }

            if self.timers.len() >= cap {
                summary.deferred = true;
                break;
            }

            let escalation = Escalation::initial(task.scheduled_time, now);
            if let Err(e) = self.schedule(idx, escalation, now, &mut summary.fired) {
                warn!(error = %e, "task dropped from this scheduling pass");
                summary.failed += 1;
            }
        }

        if summary.deferred {
            match now.checked_add_signed(self.config.refresh_delay()) {
                Some(at) => {
                    self.timers.arm_rescan(at);
                    debug!(rescan_at = %at, "re-scan armed for tasks beyond the timer cap");
                }
                None => {
                    let e = ScheduleError::RescanOutOfRange { now };
                    warn!(error = %e, "re-scan not armed");
                }
            }
        }

        summary.armed = self.timers.len();
        info!(
            tasks = self.tasks.len(),
            armed = summary.armed,
            fired = summary.fired,
            skipped = summary.skipped,
            failed = summary.failed,
            deferred = summary.deferred,
            "reconciled"
        );
        summary
    }

    /// Deliver every timer whose fire time has been reached.
    ///
    /// Returns the number of escalations delivered, including ones chained
    /// immediately behind a fired timer.
    pub fn fire_due(&mut self) -> usize {
        let now = self.clock.now();
        let mut delivered = 0;

        while let Some(due) = self.timers.pop_due(now) {
            match due {
                Due::Task {
                    task_id,
                    escalation,
                    fire_at,
                } => {
                    let Some(idx) = self.position(&task_id) else {
                        debug!(%task_id, "timer fired for a task no longer listed");
                        continue;
                    };
                    debug!(%task_id, %escalation, %fire_at, "timer fired");
                    self.deliver(idx, escalation, now);
                    delivered += 1;

                    if let Some(next) = escalation.next()
                        && let Err(e) = self.schedule(idx, next, now, &mut delivered)
                    {
                        warn!(error = %e, "escalation chain stopped");
                    }
                }
                Due::Rescan { fire_at } => {
                    debug!(%fire_at, "re-scan fired");
                    delivered += self.rescan().fired;
                }
            }
        }

        delivered
    }

    /// Mark a task taken and drop its pending escalation.
    ///
    /// Never triggers a reconcile. Completing an `upcoming` task is ignored.
    pub fn complete(&mut self, task_id: &str) -> Completion {
        let now = self.clock.now();
        let Some(task) = self.tasks.iter_mut().find(|t| t.id == task_id) else {
            debug!(%task_id, "completion for unknown task ignored");
            return Completion::UnknownTask;
        };

        match task.state(now) {
            TaskState::Completed => Completion::AlreadyCompleted,
            state if state.can_be_completed() => {
                task.mark_completed();
                let cancelled = self.timers.cancel_task(task_id);
                info!(%task_id, was = %state, cancelled = ?cancelled.map(|t| t.escalation), "task completed");
                Completion::Completed
            }
            state => {
                debug!(%task_id, %state, "completion ignored for task that is not due");
                Completion::NotCompletable(state)
            }
        }
    }

    pub fn len(&self) -> usize {
        self.tasks.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tasks.is_empty()
    }

    /// Task at `index` in due order.
    pub fn get(&self, index: usize) -> Option<&Task> {
        self.tasks.get(index)
    }

    pub fn find(&self, task_id: &str) -> Option<&Task> {
        self.tasks.iter().find(|t| t.id == task_id)
    }

    pub fn tasks(&self) -> &[Task] {
        &self.tasks
    }

    /// Freshly classified state of the task at `index`.
    pub fn state_at(&self, index: usize) -> Option<TaskState> {
        let now = self.clock.now();
        self.tasks.get(index).map(|t| t.state(now))
    }

    /// Number of armed task timers (re-scan excluded).
    pub fn armed_count(&self) -> usize {
        self.timers.len()
    }

    pub fn armed_timer(&self, task_id: &str) -> Option<ArmedTimer> {
        self.timers.get(task_id)
    }

    /// Armed task timers ordered by fire time, then task id.
    pub fn armed_timers(&self) -> Vec<(String, ArmedTimer)> {
        let mut out: Vec<(String, ArmedTimer)> = self
            .timers
            .iter()
            .map(|(id, timer)| (id.to_string(), timer))
            .collect();
        out.sort_by(|a, b| a.1.fire_at.cmp(&b.1.fire_at).then_with(|| a.0.cmp(&b.0)));
        out
    }

    pub fn rescan_at(&self) -> Option<DateTime<Utc>> {
        self.timers.rescan_at()
    }

    /// When the owner should next call [`Scheduler::fire_due`], allowing the
    /// configured tolerance for batching.
    pub fn next_wake(&mut self) -> Option<DateTime<Utc>> {
        self.timers.next_wake(self.config.timer_tolerance())
    }

    pub fn snapshot(&self) -> SchedulerSnapshot {
        let now = self.clock.now();
        SchedulerSnapshot {
            taken_at: now,
            tasks: self
                .tasks
                .iter()
                .map(|t| TaskView {
                    task: t.clone(),
                    state: t.state(now),
                    armed: self.timers.get(&t.id),
                })
                .collect(),
            rescan_at: self.timers.rescan_at(),
        }
    }

    fn position(&self, task_id: &str) -> Option<usize> {
        self.tasks.iter().position(|t| t.id == task_id)
    }

    /// Walk the chain from `escalation`: deliver tiers that are already due,
    /// arm the first one that is not. `fired` counts deliveries.
    fn schedule(
        &mut self,
        idx: usize,
        escalation: Escalation,
        now: DateTime<Utc>,
        fired: &mut usize,
    ) -> Result<Option<Escalation>, ScheduleError> {
        let mut tier = escalation;
        loop {
            let task = &self.tasks[idx];
            let fire_at = tier.fire_time(task.scheduled_time).ok_or_else(|| {
                ScheduleError::FireTimeOutOfRange {
                    task_id: task.id.clone(),
                    escalation: tier,
                    scheduled_time: task.scheduled_time,
                }
            })?;

            if fire_at > now {
                self.timers.arm_task(&task.id, ArmedTimer {
                    fire_at,
                    escalation: tier,
                });
                debug!(task_id = %task.id, escalation = %tier, %fire_at, "timer armed");
                return Ok(Some(tier));
            }

            self.deliver(idx, tier, now);
            *fired += 1;

            match tier.next() {
                Some(next) => tier = next,
                None => return Ok(None),
            }
        }
    }

    fn deliver(&self, idx: usize, escalation: Escalation, now: DateTime<Utc>) {
        let task = &self.tasks[idx];
        info!(task_id = %task.id, %escalation, title = %task.title(), "escalation");

        // No subscribers is fine; delivery is fire-and-forget.
        let _ = self.events.send(EscalationEvent {
            task: task.clone(),
            escalation,
            fired_at: now,
        });
    }
}
