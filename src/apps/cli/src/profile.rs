//! Stored connection settings
//!
//! A TOML profile under the user config directory stands in for a platform
//! secure store. Missing file means no profile, not an error.

use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};

use aibi_core::Credentials;

pub fn path() -> Result<PathBuf> {
    let base = dirs::config_dir().context("no user config directory available")?;
    Ok(base.join("aibi").join("profile.toml"))
}

pub fn load() -> Result<Option<Credentials>> {
    let path = path()?;
    if !path.exists() {
        return Ok(None);
    }
    let raw = fs::read_to_string(&path)
        .with_context(|| format!("failed to read {}", path.display()))?;
    let credentials =
        toml::from_str(&raw).with_context(|| format!("failed to parse {}", path.display()))?;
    Ok(Some(credentials))
}

pub fn save(credentials: &Credentials) -> Result<()> {
    let path = path()?;
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)
            .with_context(|| format!("failed to create {}", parent.display()))?;
    }
    fs::write(&path, toml::to_string_pretty(credentials)?)
        .with_context(|| format!("failed to write {}", path.display()))?;
    Ok(())
}

pub fn clear() -> Result<()> {
    let path = path()?;
    if path.exists() {
        fs::remove_file(&path).with_context(|| format!("failed to remove {}", path.display()))?;
    }
    Ok(())
}
