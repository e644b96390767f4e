//! Medications API payload parser (JSON)
//!
//! Expected shape:
//!   [
//!     { "_id": "5935...", "name": "Metformin", "dosage": "500 mg",
//!       "time": "2026-02-21T13:30:00.000Z", "completed": false },
//!     ...
//!   ]
//!
//! An object whose values are rows is accepted too. Rows that do not convert
//! are dropped with a warning; only a payload that is not a collection fails.

use anyhow::{Context, Result};
use pillminder_core::Task;
use serde_json::Value;
use tracing::warn;

use crate::types::MedicationRow;

pub fn parse_medications_json(text: &str) -> Result<Vec<Task>> {
    let payload: Value = serde_json::from_str(text).context("medications payload is not JSON")?;
    parse_medications_value(payload)
}

pub fn parse_medications_value(payload: Value) -> Result<Vec<Task>> {
    let rows: Vec<Value> = match payload {
        Value::Array(rows) => rows,
        Value::Object(map) => map.into_iter().map(|(_, v)| v).collect(),
        other => anyhow::bail!("expected a list of medications, got {}", kind(&other)),
    };

    let mut out = Vec::with_capacity(rows.len());
    for (i, row) in rows.into_iter().enumerate() {
        let task = serde_json::from_value::<MedicationRow>(row)
            .map_err(anyhow::Error::from)
            .and_then(MedicationRow::into_task);
        match task {
            Ok(task) => out.push(task),
            Err(e) => warn!(row = i, error = %format!("{e:#}"), "dropping medication row"),
        }
    }

    Ok(out)
}

fn kind(v: &Value) -> &'static str {
    match v {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
