//! Scheduler tuning knobs.

use chrono::Duration;
use serde::{Deserialize, Serialize};
use tracing::warn;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SchedulerConfig {
    /// Upper bound on task timers armed by one reconcile pass.
    pub max_armed_timers: usize,

    /// Delay before the re-scan that picks up tasks left out by the cap.
    pub refresh_delay_secs: u64,

    /// How long the driver may hold a wake-up to batch nearby timers.
    pub timer_tolerance_secs: u64,
}

impl Default for SchedulerConfig {
    fn default() -> Self {
        Self {
            max_armed_timers: 20,
            refresh_delay_secs: 10 * 60,
            timer_tolerance_secs: 5,
        }
    }
}

impl SchedulerConfig {
    /// Clamp values that would stall the scheduler.
    ///
    /// A cap of zero would defer every task forever, so it is raised to one.
    pub fn normalized(mut self) -> Self {
        if self.max_armed_timers == 0 {
            warn!("max_armed_timers = 0 would never arm a task; using 1");
            self.max_armed_timers = 1;
        }
        self
    }

    pub fn refresh_delay(&self) -> Duration {
        secs(self.refresh_delay_secs)
    }

    pub fn timer_tolerance(&self) -> Duration {
        secs(self.timer_tolerance_secs)
    }
}

fn secs(n: u64) -> Duration {
    Duration::try_seconds(i64::try_from(n).unwrap_or(i64::MAX)).unwrap_or(Duration::MAX)
}
