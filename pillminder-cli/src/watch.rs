//! Interactive watcher: prints escalations as they fire and reads commands
//! from stdin.

use anyhow::{Context, Result};
use chrono_tz::Tz;
use pillminder_core::{Completion, EscalationEvent, SchedulerHandle, Task, TaskSource};
use tokio::io::{AsyncBufReadExt, BufReader};
use tokio::sync::broadcast::{self, error::RecvError};
use tracing::warn;

use crate::render::{format_alert, format_row};

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum WatchCommand {
    List,
    /// Row index or task id.
    Done(String),
    Refresh,
    Quit,
    Help,
    Unknown(String),
}

impl WatchCommand {
    pub fn parse(line: &str) -> Option<Self> {
        let mut words = line.split_whitespace();
        let cmd = words.next()?;
        Some(match cmd {
            "list" | "ls" => WatchCommand::List,
            "done" | "take" => match words.next() {
                Some(target) => WatchCommand::Done(target.to_string()),
                None => WatchCommand::Unknown(line.trim().to_string()),
            },
            "refresh" => WatchCommand::Refresh,
            "quit" | "exit" | "q" => WatchCommand::Quit,
            "help" | "?" => WatchCommand::Help,
            other => WatchCommand::Unknown(other.to_string()),
        })
    }
}

const HELP: &str = "commands: list | done <index|id> | refresh | quit";

/// What the watcher loads before it starts reading commands.
pub enum FirstLoad<'a, S> {
    Fetch(&'a S),
    Tasks(Vec<Task>),
}

/// Subscribe, then load the first list.
///
/// The first reconcile delivers already-due escalations on the spot, so the
/// subscription must exist before it runs. A failed fetch is logged and the
/// watcher starts empty.
pub async fn start<S: TaskSource>(
    handle: &SchedulerHandle,
    first: FirstLoad<'_, S>,
) -> Result<broadcast::Receiver<EscalationEvent>> {
    let events = handle.subscribe().await?;
    match first {
        FirstLoad::Fetch(source) => {
            if let Err(e) = handle.refresh(source).await {
                warn!(error = %format!("{e:#}"), "initial fetch failed; use `refresh` to retry");
            }
        }
        FirstLoad::Tasks(tasks) => {
            handle.reconcile(tasks).await?;
        }
    }
    Ok(events)
}

/// Run until `quit`, end of input, or the driver stops.
///
/// `events` comes from [`start`]. `source` backs `refresh`; without one,
/// `refresh` re-scans the held list.
pub async fn run<S: TaskSource>(
    handle: &SchedulerHandle,
    mut events: broadcast::Receiver<EscalationEvent>,
    source: Option<&S>,
    tz: Tz,
) -> Result<()> {
    let mut lines = BufReader::new(tokio::io::stdin()).lines();

    print_list(handle, tz).await?;
    println!("{HELP}");

    loop {
        tokio::select! {
            ev = events.recv() => match ev {
                Ok(ev) => println!("{}", format_alert(&ev, tz).render()),
                Err(RecvError::Lagged(n)) => warn!(missed = n, "watcher fell behind; alerts skipped"),
                Err(RecvError::Closed) => break,
            },
            line = lines.next_line() => {
                let Some(line) = line.context("reading stdin")? else {
                    break;
                };
                let Some(cmd) = WatchCommand::parse(&line) else {
                    continue;
                };
                match cmd {
                    WatchCommand::List => print_list(handle, tz).await?,
                    WatchCommand::Done(target) => complete(handle, &target).await?,
                    WatchCommand::Refresh => refresh(handle, source).await?,
                    WatchCommand::Quit => break,
                    WatchCommand::Help => println!("{HELP}"),
                    WatchCommand::Unknown(s) => println!("unknown command: {s} ({HELP})"),
                }
            }
        }
    }

    Ok(())
}

async fn print_list(handle: &SchedulerHandle, tz: Tz) -> Result<()> {
    let snap = handle.snapshot().await?;
    if snap.tasks.is_empty() {
        println!("(no medications today)");
    }
    for (i, view) in snap.tasks.iter().enumerate() {
        println!("{}", format_row(i, view, tz));
    }
    Ok(())
}

async fn complete(handle: &SchedulerHandle, target: &str) -> Result<()> {
    let snap = handle.snapshot().await?;
    let task_id = resolve_target(target, snap.tasks.iter().map(|v| v.task.id.as_str()));

    match handle.complete(task_id.clone()).await? {
        Completion::Completed => println!("marked taken: {task_id}"),
        Completion::AlreadyCompleted => println!("already taken: {task_id}"),
        Completion::NotCompletable(state) => {
            println!("{task_id} is {state}; only soon or missed doses can be marked taken")
        }
        Completion::UnknownTask => println!("no medication {target}"),
    }
    Ok(())
}

async fn refresh<S: TaskSource>(handle: &SchedulerHandle, source: Option<&S>) -> Result<()> {
    let summary = match source {
        Some(source) => match handle.refresh(source).await {
            Ok(summary) => summary,
            Err(e) => {
                println!("refresh failed: {e:#}");
                return Ok(());
            }
        },
        None => handle.rescan().await?,
    };
    println!(
        "refreshed: {} armed, {} skipped{}",
        summary.armed,
        summary.skipped,
        if summary.deferred { ", more after re-scan" } else { "" }
    );
    Ok(())
}

/// A row index if `target` is one, otherwise `target` as a task id.
fn resolve_target<'a>(target: &str, ids: impl Iterator<Item = &'a str>) -> String {
    let ids: Vec<&str> = ids.collect();
    if ids.contains(&target) {
        return target.to_string();
    }
    target
        .parse::<usize>()
        .ok()
        .and_then(|i| ids.get(i))
        .map(|id| id.to_string())
        .unwrap_or_else(|| target.to_string())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::demo;
    use chrono::{DateTime, Duration, TimeZone, Utc};
    use pillminder_core::{
        spawn, Escalation, Scheduler, SchedulerConfig, StaticSource, TokioClock,
    };

    fn t0() -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2026, 2, 21, 8, 0, 0).unwrap()
    }

    fn drain(rx: &mut broadcast::Receiver<EscalationEvent>) -> Vec<(String, Escalation)> {
        let mut out = Vec::new();
        while let Ok(ev) = rx.try_recv() {
            out.push((ev.task.id, ev.escalation));
        }
        out
    }

    struct Unreachable;

    impl TaskSource for Unreachable {
        async fn fetch(&self) -> anyhow::Result<Vec<Task>> {
            anyhow::bail!("connection refused")
        }
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_keeps_alerts_fired_by_the_first_reconcile() {
        let (handle, _join) = spawn(Scheduler::new(
            SchedulerConfig::default(),
            TokioClock::new(t0()),
        ));
        let tasks = demo::generate(5, Duration::seconds(120), t0());

        let mut events = start::<StaticSource>(&handle, FirstLoad::Tasks(tasks))
            .await
            .unwrap();

        // demo-2 is due right now; demo-3 and demo-4 are inside their soon window.
        assert_eq!(
            drain(&mut events),
            vec![
                ("demo-2".to_string(), Escalation::Now),
                ("demo-3".to_string(), Escalation::Soon),
                ("demo-4".to_string(), Escalation::Soon),
            ]
        );

        // The first two are overdue; their late alerts follow on the timeline.
        let next = events.recv().await.unwrap();
        assert_eq!((next.task.id.as_str(), next.escalation), ("demo-0", Escalation::Late));
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_from_source_keeps_immediate_alerts() {
        let (handle, _join) = spawn(Scheduler::new(
            SchedulerConfig::default(),
            TokioClock::new(t0()),
        ));
        let source = StaticSource::new(vec![Task::new("m1", "Metformin", "500 mg", t0())]);

        let mut events = start(&handle, FirstLoad::Fetch(&source)).await.unwrap();

        assert_eq!(drain(&mut events), vec![("m1".to_string(), Escalation::Now)]);
    }

    #[tokio::test(start_paused = true)]
    async fn test_start_survives_a_failed_fetch() {
        let (handle, _join) = spawn(Scheduler::new(
            SchedulerConfig::default(),
            TokioClock::new(t0()),
        ));

        let mut events = start(&handle, FirstLoad::Fetch(&Unreachable)).await.unwrap();

        assert!(drain(&mut events).is_empty());
        assert!(handle.snapshot().await.unwrap().tasks.is_empty());
    }

    #[test]
    fn test_parses_commands() {
        assert_eq!(WatchCommand::parse("  list "), Some(WatchCommand::List));
        assert_eq!(
            WatchCommand::parse("done 3"),
            Some(WatchCommand::Done("3".to_string()))
        );
        assert_eq!(WatchCommand::parse("refresh"), Some(WatchCommand::Refresh));
        assert_eq!(WatchCommand::parse("q"), Some(WatchCommand::Quit));
        assert_eq!(
            WatchCommand::parse("done"),
            Some(WatchCommand::Unknown("done".to_string()))
        );
        assert_eq!(WatchCommand::parse("   "), None);
    }

    #[test]
    fn test_done_target_prefers_ids_then_indexes() {
        let ids = ["a1", "7", "b2"];
        assert_eq!(resolve_target("b2", ids.iter().copied()), "b2");
        assert_eq!(resolve_target("0", ids.iter().copied()), "a1");
        // "7" is an id, not index 7.
        assert_eq!(resolve_target("7", ids.iter().copied()), "7");
        assert_eq!(resolve_target("9", ids.iter().copied()), "9");
    }
}
