use anyhow::{Context, Result};
use pillminder_core::{time::parse_timestamp, Task};
use serde::{Deserialize, Serialize};

/// One medication row as the API sends it. Every field is optional on the
/// wire; a row only becomes a [`Task`] when all of them are present.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct MedicationRow {
    #[serde(rename = "_id")]
    pub id: Option<String>,
    pub name: Option<String>,
    pub dosage: Option<String>,
    /// "2026-02-21T13:30:00.000Z"
    pub time: Option<String>,
    pub completed: Option<bool>,
}

impl MedicationRow {
    pub fn into_task(self) -> Result<Task> {
        let id = self.id.context("missing _id")?;
        let name = self.name.with_context(|| format!("{id}: missing name"))?;
        let dosage = self.dosage.with_context(|| format!("{id}: missing dosage"))?;
        let time = self.time.with_context(|| format!("{id}: missing time"))?;
        let completed = self
            .completed
            .with_context(|| format!("{id}: missing completed"))?;

        let scheduled_time = parse_timestamp(&time).with_context(|| format!("{id}: bad time"))?;

        Ok(Task::new(id, name, dosage, scheduled_time).with_completed(completed))
    }
}
