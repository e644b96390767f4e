use anyhow::{Context, Result};
use chrono::{Duration, Utc};
use clap::{Parser, Subcommand};
use pillminder_core::{spawn, Scheduler, StaticSource, SystemClock, TaskSource};
use tracing::{info, warn};

mod api;
mod config;
mod demo;
mod render;
mod state;
mod watch;

use crate::api::HttpTaskSource;
use crate::config::{config_path, init_config, load_config, show_config, Config};
use crate::watch::FirstLoad;

#[derive(Parser, Debug)]
#[command(
    name = "pillminder",
    version = concat!(env!("CARGO_PKG_VERSION"), " (", env!("PILLMINDER_BUILD_SHA"), ")"),
    about = "Medication reminders: soon, now and late alerts for today's doses"
)]
struct Cli {
    #[command(subcommand)]
    command: Command,
}

#[derive(Subcommand, Debug)]
enum Command {
    /// Fetch today's medications and print them with their current state
    List,

    /// Fetch today's medications and alert as doses come due
    Watch,

    /// Run the watcher on a generated list, no network needed
    Demo {
        /// Number of generated doses
        #[arg(long, default_value_t = 10)]
        count: usize,

        /// Seconds between consecutive doses
        #[arg(long, default_value_t = 120)]
        spacing_secs: u32,
    },

    /// Manage ~/.pillminder/config.toml
    Config {
        #[command(subcommand)]
        command: ConfigCommand,
    },
}

#[derive(Subcommand, Debug)]
enum ConfigCommand {
    /// Write a default config if none exists
    Init,
    /// Print the effective config
    Show,
    /// Print the config file location
    Path,
}

#[tokio::main]
async fn main() -> Result<()> {
    // stdout is the alert surface; logs go to stderr.
    tracing_subscriber::fmt()
        .with_writer(std::io::stderr)
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| tracing_subscriber::EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();

    match cli.command {
        Command::List => list().await?,
        Command::Watch => watch_live().await?,
        Command::Demo {
            count,
            spacing_secs,
        } => watch_demo(count, spacing_secs).await?,
        Command::Config { command } => match command {
            ConfigCommand::Init => init_config()?,
            ConfigCommand::Show => show_config()?,
            ConfigCommand::Path => println!("{}", config_path()?.display()),
        },
    }

    Ok(())
}

async fn list() -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.api.tz()?;
    let source = HttpTaskSource::new(&cfg.api)?;

    let mut tasks = source.fetch().await.context("fetching today's medications")?;
    tasks.sort_by_key(|t| t.scheduled_time);

    let now = Utc::now();
    if tasks.is_empty() {
        println!("(no medications today)");
    }
    for (i, task) in tasks.into_iter().enumerate() {
        let state = task.state(now);
        let view = pillminder_core::TaskView {
            task,
            state,
            armed: None,
        };
        println!("{}", render::format_row(i, &view, tz));
    }
    Ok(())
}

async fn watch_live() -> Result<()> {
    let cfg = load_config()?;
    let tz = cfg.api.tz()?;
    let source = HttpTaskSource::new(&cfg.api)?;

    let (handle, join) = spawn(Scheduler::new(cfg.scheduler, SystemClock));
    let events = watch::start(&handle, FirstLoad::Fetch(&source)).await?;

    watch::run(&handle, events, Some(&source), tz).await?;
    stop(handle, join).await
}

async fn watch_demo(count: usize, spacing_secs: u32) -> Result<()> {
    let cfg = demo_config();
    let tz = cfg.api.tz()?;
    let tasks = demo::generate(count, Duration::seconds(spacing_secs.into()), Utc::now());
    info!(count = tasks.len(), "demo medications generated");

    let (handle, join) = spawn(Scheduler::new(cfg.scheduler, SystemClock));
    let events = watch::start::<StaticSource>(&handle, FirstLoad::Tasks(tasks)).await?;

    watch::run::<StaticSource>(&handle, events, None, tz).await?;
    stop(handle, join).await
}

/// Demo runs with the saved scheduler and timezone settings when present.
fn demo_config() -> Config {
    load_config().unwrap_or_else(|e| {
        warn!(error = %format!("{e:#}"), "config unreadable; demo uses defaults");
        Config::default()
    })
}

async fn stop(
    handle: pillminder_core::SchedulerHandle,
    join: tokio::task::JoinHandle<()>,
) -> Result<()> {
    // Already gone is fine.
    let _ = handle.shutdown().await;
    join.await.context("scheduler driver panicked")?;
    Ok(())
}
