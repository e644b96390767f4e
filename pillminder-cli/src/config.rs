use anyhow::{Context, Result};
use chrono_tz::Tz;
use pillminder_core::{time::parse_tz, SchedulerConfig};
use serde::{Deserialize, Serialize};
use std::fs;
use std::path::PathBuf;

use crate::state::ensure_pillminder_home;

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Config {
    #[serde(default)]
    pub api: ApiSection,
    #[serde(default)]
    pub scheduler: SchedulerConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApiSection {
    /// Root of the REST API; `medications` is appended.
    pub base_url: String,
    /// IANA zone that defines "today" for the day query and for display.
    pub timezone: String,
    pub request_timeout_secs: u64,
}

impl Default for ApiSection {
    fn default() -> Self {
        Self {
            base_url: "http://localhost:9000/api/".to_string(),
            timezone: "America/Toronto".to_string(),
            request_timeout_secs: 15,
        }
    }
}

impl ApiSection {
    pub fn tz(&self) -> Result<Tz> {
        parse_tz(&self.timezone)
    }

    pub fn medications_url(&self) -> String {
        format!("{}/medications", self.base_url.trim_end_matches('/'))
    }
}

pub fn config_path() -> Result<PathBuf> {
    Ok(ensure_pillminder_home()?.join("config.toml"))
}

pub fn load_config() -> Result<Config> {
    let p = config_path()?;
    if !p.exists() {
        return Ok(Config::default());
    }
    let s = fs::read_to_string(&p).with_context(|| format!("read {}", p.display()))?;
    parse_config(&s)
}

pub fn parse_config(s: &str) -> Result<Config> {
    let mut cfg: Config = toml::from_str(s).context("parse config.toml")?;
    cfg.scheduler = cfg.scheduler.normalized();
    Ok(cfg)
}

pub fn save_config(cfg: &Config) -> Result<()> {
    let p = config_path()?;
    let s = toml::to_string_pretty(cfg).context("serialize config")?;
    fs::write(&p, s).with_context(|| format!("write {}", p.display()))?;
    Ok(())
}

pub fn init_config() -> Result<()> {
    let p = config_path()?;
    if p.exists() {
        println!("Config already exists: {}", p.display());
        return Ok(());
    }
    save_config(&Config::default())?;
    println!("Wrote {}", p.display());
    Ok(())
}

pub fn show_config() -> Result<()> {
    let cfg = load_config()?;
    print!("{}", toml::to_string_pretty(&cfg).context("serialize config")?);
    Ok(())
}
