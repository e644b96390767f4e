//! HTTP task source for the medications endpoint.

use anyhow::{Context, Result};
use chrono::Utc;
use chrono_tz::Tz;
use pillminder_core::{Task, TaskSource};
use pillminder_ingest::{parse_medications_json, DayRange};
use std::time::Duration;
use tracing::debug;

use crate::config::ApiSection;

pub struct HttpTaskSource {
    client: reqwest::Client,
    url: String,
    tz: Tz,
}

impl HttpTaskSource {
    pub fn new(api: &ApiSection) -> Result<Self> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_secs(api.request_timeout_secs))
            .build()
            .context("building HTTP client")?;
        Ok(Self {
            client,
            url: api.medications_url(),
            tz: api.tz()?,
        })
    }
}

impl TaskSource for HttpTaskSource {
    async fn fetch(&self) -> Result<Vec<Task>> {
        let range = DayRange::today(Utc::now(), self.tz)?;
        debug!(url = %self.url, start = %range.start, end = %range.end, "fetching medications");

        let body = self
            .client
            .get(&self.url)
            .query(&range.query_pairs())
            .send()
            .await
            .with_context(|| format!("GET {}", self.url))?
            .error_for_status()
            .context("medications endpoint returned an error")?
            .text()
            .await
            .context("reading medications response")?;

        let tasks = parse_medications_json(&body)?;
        debug!(count = tasks.len(), "medications fetched");
        Ok(tasks)
    }
}
