//! pillminder-core: task model, escalation chain and the reminder scheduler

pub mod clock;
pub mod config;
pub mod driver;
pub mod error;
pub mod escalation;
pub mod lifecycle;
pub mod scheduler;
pub mod source;
pub mod task;
pub mod time;
mod timers;

pub use clock::{Clock, ManualClock, SystemClock, TokioClock};
pub use config::SchedulerConfig;
pub use driver::{spawn, SchedulerHandle};
pub use error::{DriverError, ScheduleError};
pub use escalation::{Escalation, EscalationEvent, NOW_WINDOW};
pub use lifecycle::{classify, TaskState, SOON_WINDOW};
pub use scheduler::{Completion, ReconcileSummary, Scheduler, SchedulerSnapshot, TaskView};
pub use source::{StaticSource, TaskSource};
pub use task::Task;
pub use timers::ArmedTimer;
