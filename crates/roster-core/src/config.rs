//! Application configuration management.
//!
//! This module handles loading and saving the application configuration:
//! the API base URL, the list page size, request timeout and the query cache
//! windows.
//!
//! Configuration is stored at `~/.config/student-roster/config.json`. The
//! `ROSTER_API_URL` environment variable overrides the stored base URL.

use std::path::PathBuf;
use std::time::Duration;

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::query::QueryPolicy;

/// Application name used for config/cache directory paths
const APP_NAME: &str = "student-roster";

/// Config file name
const CONFIG_FILE: &str = "config.json";

/// Environment variable that overrides `api_base_url`
pub const API_URL_ENV: &str = "ROSTER_API_URL";

/// json-server's conventional port in this project.
const DEFAULT_API_BASE_URL: &str = "http://localhost:4000/";

/// Rows per list page.
pub const DEFAULT_PAGE_SIZE: u32 = 10;

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct Config {
    pub api_base_url: String,
    pub page_size: u32,
    pub request_timeout_secs: u64,
    /// How long a fetched list page is served without refetching.
    pub list_stale_secs: u64,
    /// How long a prefetched or fetched single record is served without refetching.
    pub student_stale_secs: u64,
    /// How long an idle cache entry is retained before eviction.
    pub cache_time_secs: u64,
    /// How often the background sweep looks for idle entries.
    pub gc_interval_secs: u64,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_base_url: DEFAULT_API_BASE_URL.to_string(),
            page_size: DEFAULT_PAGE_SIZE,
            request_timeout_secs: 30,
            list_stale_secs: 5,
            student_stale_secs: 10,
            cache_time_secs: 5 * 60,
            gc_interval_secs: 60,
        }
    }
}

impl Config {
    /// Load the config file (or defaults) and apply environment overrides.
    pub fn load() -> Result<Self> {
        let path = Self::config_path()?;
        let mut config = if path.exists() {
            let contents = std::fs::read_to_string(&path)
                .with_context(|| format!("Failed to read config file: {}", path.display()))?;
            serde_json::from_str(&contents)
                .with_context(|| format!("Failed to parse config file: {}", path.display()))?
        } else {
            Self::default()
        };
        config.apply_env();
        debug!(api_base_url = %config.api_base_url, page_size = config.page_size, "Config loaded");
        Ok(config)
    }

    pub fn save(&self) -> Result<()> {
        let path = Self::config_path()?;
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        let contents = serde_json::to_string_pretty(self)?;
        std::fs::write(path, contents)?;
        Ok(())
    }

    fn apply_env(&mut self) {
        if let Ok(url) = std::env::var(API_URL_ENV) {
            if !url.trim().is_empty() {
                self.api_base_url = url;
            }
        }
    }

    fn config_path() -> Result<PathBuf> {
        let config_dir = dirs::config_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find config directory"))?;
        Ok(config_dir.join(APP_NAME).join(CONFIG_FILE))
    }

    /// Directory for log files.
    pub fn log_dir(&self) -> Result<PathBuf> {
        let cache_dir = dirs::cache_dir()
            .ok_or_else(|| anyhow::anyhow!("Could not find cache directory"))?;
        Ok(cache_dir.join(APP_NAME))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    pub fn gc_interval(&self) -> Duration {
        Duration::from_secs(self.gc_interval_secs.max(1))
    }

    /// Policy for `("students", page)` entries: keep the previous page on
    /// screen while refetching and fail fast.
    pub fn list_policy(&self) -> QueryPolicy {
        QueryPolicy::new(
            Duration::from_secs(self.list_stale_secs),
            Duration::from_secs(self.cache_time_secs),
        )
        .keep_previous_on_refetch(true)
        .retry_count(0)
    }

    /// Policy for `("student", id)` entries, shared by prefetch and the edit form.
    pub fn student_policy(&self) -> QueryPolicy {
        QueryPolicy::new(
            Duration::from_secs(self.student_stale_secs),
            Duration::from_secs(self.cache_time_secs),
        )
        .retry_count(0)
    }
}
