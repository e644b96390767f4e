//! Async driver: runs a [`Scheduler`] on its own tokio task.
//!
//! Every reconcile, completion and timer wake goes through one loop, so the
//! scheduler sees them strictly one at a time. Callers talk to it through a
//! cloneable [`SchedulerHandle`].

use anyhow::Context;
use chrono::{DateTime, Utc};
use tokio::sync::{broadcast, mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, info, warn};

use crate::clock::Clock;
use crate::error::DriverError;
use crate::escalation::EscalationEvent;
use crate::scheduler::{Completion, ReconcileSummary, Scheduler, SchedulerSnapshot};
use crate::source::TaskSource;
use crate::task::Task;

const COMMAND_BUFFER: usize = 32;

enum Command {
    Reconcile {
        tasks: Vec<Task>,
        reply: oneshot::Sender<ReconcileSummary>,
    },
    Rescan {
        reply: oneshot::Sender<ReconcileSummary>,
    },
    Complete {
        task_id: String,
        reply: oneshot::Sender<Completion>,
    },
    Snapshot {
        reply: oneshot::Sender<SchedulerSnapshot>,
    },
    Subscribe {
        reply: oneshot::Sender<broadcast::Receiver<EscalationEvent>>,
    },
    Shutdown,
}

#[derive(Debug, Clone)]
pub struct SchedulerHandle {
    commands: mpsc::Sender<Command>,
}

/// Move `scheduler` onto a new tokio task.
///
/// The task exits on [`SchedulerHandle::shutdown`] or once every handle is
/// dropped. Subscribers see the channel close when it does.
pub fn spawn<C: Clock + 'static>(scheduler: Scheduler<C>) -> (SchedulerHandle, JoinHandle<()>) {
    let (tx, rx) = mpsc::channel(COMMAND_BUFFER);
    let join = tokio::spawn(run(scheduler, rx));
    (SchedulerHandle { commands: tx }, join)
}

impl SchedulerHandle {
    pub async fn reconcile(&self, tasks: Vec<Task>) -> Result<ReconcileSummary, DriverError> {
        self.request(|reply| Command::Reconcile { tasks, reply }).await
    }

    /// Reconcile the list the scheduler already holds.
    pub async fn rescan(&self) -> Result<ReconcileSummary, DriverError> {
        self.request(|reply| Command::Rescan { reply }).await
    }

    pub async fn complete(&self, task_id: impl Into<String>) -> Result<Completion, DriverError> {
        let task_id = task_id.into();
        self.request(|reply| Command::Complete { task_id, reply })
            .await
    }

    pub async fn snapshot(&self) -> Result<SchedulerSnapshot, DriverError> {
        self.request(|reply| Command::Snapshot { reply }).await
    }

    pub async fn subscribe(&self) -> Result<broadcast::Receiver<EscalationEvent>, DriverError> {
        self.request(|reply| Command::Subscribe { reply }).await
    }

    /// Fetch from `source` and reconcile. On a failed fetch nothing changes.
    pub async fn refresh<S: TaskSource>(&self, source: &S) -> anyhow::Result<ReconcileSummary> {
        let tasks = match source.fetch().await {
            Ok(tasks) => tasks,
            Err(e) => {
                warn!(error = %format!("{e:#}"), "task fetch failed; keeping current schedule");
                return Err(e.context("fetching task list"));
            }
        };
        let summary = self
            .reconcile(tasks)
            .await
            .context("reconciling fetched tasks")?;
        Ok(summary)
    }

    pub async fn shutdown(&self) -> Result<(), DriverError> {
        self.commands
            .send(Command::Shutdown)
            .await
            .map_err(|_| DriverError)
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, DriverError> {
        let (tx, rx) = oneshot::channel();
        self.commands.send(make(tx)).await.map_err(|_| DriverError)?;
        rx.await.map_err(|_| DriverError)
    }
}

async fn run<C: Clock>(mut scheduler: Scheduler<C>, mut commands: mpsc::Receiver<Command>) {
    info!("scheduler driver started");

    loop {
        let wake = scheduler
            .next_wake()
            .map(|at| until(scheduler.now(), at));

        tokio::select! {
            cmd = commands.recv() => match cmd {
                Some(Command::Shutdown) | None => break,
                Some(cmd) => handle(&mut scheduler, cmd),
            },
            () = sleep_for(wake) => {
                let delivered = scheduler.fire_due();
                debug!(delivered, "timer wake");
            }
        }
    }

    info!("scheduler driver stopped");
}

fn handle<C: Clock>(scheduler: &mut Scheduler<C>, cmd: Command) {
    // A dropped reply receiver just means the caller stopped waiting.
    match cmd {
        Command::Reconcile { tasks, reply } => {
            let _ = reply.send(scheduler.reconcile(tasks));
        }
        Command::Rescan { reply } => {
            let _ = reply.send(scheduler.rescan());
        }
        Command::Complete { task_id, reply } => {
            let _ = reply.send(scheduler.complete(&task_id));
        }
        Command::Snapshot { reply } => {
            let _ = reply.send(scheduler.snapshot());
        }
        Command::Subscribe { reply } => {
            let _ = reply.send(scheduler.subscribe());
        }
        Command::Shutdown => {}
    }
}

fn until(now: DateTime<Utc>, at: DateTime<Utc>) -> std::time::Duration {
    // Already due (negative) sleeps zero.
    at.signed_duration_since(now)
        .to_std()
        .unwrap_or(std::time::Duration::ZERO)
}

async fn sleep_for(wake: Option<std::time::Duration>) {
    match wake {
        Some(d) => tokio::time::sleep(d).await,
        None => std::future::pending().await,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, TimeZone};

    #[test]
    fn test_past_deadlines_sleep_zero() {
        let now = Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap();
        assert_eq!(until(now, now - Duration::seconds(3)), std::time::Duration::ZERO);
        assert_eq!(
            until(now, now + Duration::milliseconds(1500)),
            std::time::Duration::from_millis(1500)
        );
    }
}
