use anyhow::{Context, Result};
use std::fs;
use std::path::PathBuf;

/// `~/.pillminder`, or `$PILLMINDER_HOME` when set.
pub fn pillminder_home() -> Result<PathBuf> {
    if let Ok(dir) = std::env::var("PILLMINDER_HOME") {
        return Ok(PathBuf::from(dir));
    }
    let home = std::env::var("HOME").context("HOME is not set")?;
    Ok(PathBuf::from(home).join(".pillminder"))
}

pub fn ensure_pillminder_home() -> Result<PathBuf> {
    let dir = pillminder_home()?;
    fs::create_dir_all(&dir).with_context(|| format!("create {}", dir.display()))?;
    Ok(dir)
}
