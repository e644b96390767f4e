//! Where task lists come from.

use std::future::Future;

use crate::task::Task;

/// A producer of the current task list (remote API, fixture, generator).
pub trait TaskSource: Send + Sync {
    fn fetch(&self) -> impl Future<Output = anyhow::Result<Vec<Task>>> + Send;
}

/// A fixed list, returned as-is on every fetch.
#[derive(Debug, Clone, Default)]
pub struct StaticSource {
    tasks: Vec<Task>,
}

impl StaticSource {
    pub fn new(tasks: Vec<Task>) -> Self {
        Self { tasks }
    }
}

impl TaskSource for StaticSource {
    async fn fetch(&self) -> anyhow::Result<Vec<Task>> {
        Ok(self.tasks.clone())
    }
}
