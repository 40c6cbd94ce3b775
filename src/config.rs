//! Settings read from the environment (after `.env` is loaded).

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result, bail};

use crate::infra::tfnsw::DEFAULT_BASE_URL;

pub const DEFAULT_DATABASE_URL: &str = "sqlite://data/railvision.db";
/// Central Station.
pub const DEFAULT_POLL_STOP: &str = "200060";
pub const DEFAULT_POLL_INTERVAL_SECS: u64 = 60;
pub const DEFAULT_BIND_ADDR: &str = "0.0.0.0:8000";

#[derive(Debug, Clone, PartialEq)]
pub struct Config {
    pub api_key: Option<String>,
    pub base_url: String,
    pub database_url: String,
    pub poll_stops: Vec<String>,
    pub poll_interval: Duration,
    pub bind_addr: String,
}

impl Config {
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Builds the config from any key/value source. Empty values count as
    /// unset.
    pub fn from_lookup<F>(lookup: F) -> Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let poll_stops: Vec<String> = get("POLL_STOPS")
            .unwrap_or_else(|| DEFAULT_POLL_STOP.to_string())
            .split(',')
            .map(str::trim)
            .filter(|s| !s.is_empty())
            .map(str::to_string)
            .collect();

        let poll_interval_secs = match get("POLL_INTERVAL_SECS") {
            Some(raw) => raw
                .parse::<u64>()
                .with_context(|| format!("POLL_INTERVAL_SECS must be a whole number, got '{raw}'"))?,
            None => DEFAULT_POLL_INTERVAL_SECS,
        };
        if poll_interval_secs == 0 {
            bail!("POLL_INTERVAL_SECS must be greater than zero");
        }

        Ok(Self {
            api_key: get("TFNSW_API_KEY"),
            base_url: get("TFNSW_BASE_URL").unwrap_or_else(|| DEFAULT_BASE_URL.to_string()),
            database_url: get("DATABASE_URL").unwrap_or_else(|| DEFAULT_DATABASE_URL.to_string()),
            poll_stops,
            poll_interval: Duration::from_secs(poll_interval_secs),
            bind_addr: get("BIND_ADDR").unwrap_or_else(|| DEFAULT_BIND_ADDR.to_string()),
        })
    }

    pub fn require_api_key(&self) -> Result<&str> {
        self.api_key
            .as_deref()
            .context("TFNSW_API_KEY must be set to fetch departures")
    }

    /// Directory that has to exist before SQLite can create the database
    /// file, if the URL points at a file in a subdirectory.
    pub fn database_dir(&self) -> Option<PathBuf> {
        let path = self
            .database_url
            .strip_prefix("sqlite://")
            .or_else(|| self.database_url.strip_prefix("sqlite:"))?;
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path.contains(":memory:") {
            return None;
        }

        let parent = PathBuf::from(path).parent()?.to_path_buf();
        (!parent.as_os_str().is_empty()).then_some(parent)
    }
}
