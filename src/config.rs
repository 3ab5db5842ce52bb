//! Runtime configuration.
//!
//! Defaults first, then `ROSTER_*` environment overrides.

use anyhow::{anyhow, Result};
use log::debug;
use serde::{Deserialize, Serialize};
use std::path::PathBuf;

use crate::logging::normalize_level;
use crate::services::UnresolvedCompany;

pub const ENV_DATABASE: &str = "ROSTER_DATABASE";
pub const ENV_BIND: &str = "ROSTER_BIND";
pub const ENV_LOG_LEVEL: &str = "ROSTER_LOG_LEVEL";
pub const ENV_LOG_DIR: &str = "ROSTER_LOG_DIR";
pub const ENV_UNRESOLVED_COMPANY: &str = "ROSTER_UNRESOLVED_COMPANY";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// SQLite database file
    pub database_path: PathBuf,

    /// HTTP listen address
    pub bind_address: String,

    pub log_level: String,

    /// Rotating log files go here; stderr when unset
    pub log_dir: Option<PathBuf>,

    /// Policy for CreatePerson with a company id that does not resolve
    pub unresolved_company: UnresolvedCompany,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            database_path: PathBuf::from("roster.db"),
            bind_address: "0.0.0.0:3000".to_string(),
            log_level: "info".to_string(),
            log_dir: None,
            unresolved_company: UnresolvedCompany::default(),
        }
    }
}

impl Config {
    /// Defaults plus process environment overrides
    pub fn from_env() -> Result<Self> {
        let mut config = Config::default();
        config.apply_overrides(|key| std::env::var(key).ok())?;
        Ok(config)
    }

    /// Apply overrides from any key lookup (the environment in production)
    pub fn apply_overrides<F>(&mut self, lookup: F) -> Result<()>
    where
        F: Fn(&str) -> Option<String>,
    {
        if let Some(path) = lookup(ENV_DATABASE) {
            self.database_path = PathBuf::from(path);
            debug!("Applied env override for database path");
        }

        if let Some(bind) = lookup(ENV_BIND) {
            self.bind_address = bind;
            debug!("Applied env override for bind address");
        }

        if let Some(level) = lookup(ENV_LOG_LEVEL) {
            self.log_level = normalize_level(&level)?.to_string();
            debug!("Applied env override for log level");
        }

        if let Some(dir) = lookup(ENV_LOG_DIR) {
            self.log_dir = if dir.trim().is_empty() {
                None
            } else {
                Some(PathBuf::from(dir))
            };
            debug!("Applied env override for log directory");
        }

        if let Some(policy) = lookup(ENV_UNRESOLVED_COMPANY) {
            self.unresolved_company = policy
                .parse()
                .map_err(|e: String| anyhow!("{}: {}", ENV_UNRESOLVED_COMPANY, e))?;
            debug!("Applied env override for unresolved company policy");
        }

        Ok(())
    }
}
