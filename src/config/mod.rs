//! Application configuration management

use std::env;
use std::str::FromStr;
use std::time::Duration;

use anyhow::{Context, Result};

/// Application configuration loaded from environment variables
#[derive(Debug, Clone)]
pub struct Config {
    /// Server port
    pub port: u16,

    /// SQLite database path or `sqlite://` URL
    pub database_url: String,

    /// Cron expression (with seconds) for the watch-folder scan
    pub organize_schedule: String,

    /// TVMaze API base URL
    pub tvmaze_base_url: String,

    /// Timeout for metadata provider requests
    pub provider_timeout: Duration,

    /// Files of one scan pass in flight at once
    pub scan_concurrency: usize,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Load configuration from any key lookup
    pub fn from_lookup(lookup: impl Fn(&str) -> Option<String>) -> Result<Self> {
        // Prefer DATABASE_PATH, fall back to DATABASE_URL
        let database_url = lookup("DATABASE_PATH")
            .or_else(|| lookup("DATABASE_URL"))
            .unwrap_or_else(|| "./data/autoorganize.db".to_string());

        Ok(Self {
            port: parse_or(&lookup, "PORT", 3001)?,

            database_url,

            organize_schedule: lookup("ORGANIZE_SCHEDULE").unwrap_or_else(|| "0 */5 * * * *".to_string()),

            tvmaze_base_url: lookup("TVMAZE_BASE_URL")
                .unwrap_or_else(|| crate::services::tvmaze::DEFAULT_BASE_URL.to_string()),

            provider_timeout: Duration::from_secs(parse_or(&lookup, "PROVIDER_TIMEOUT_SECS", 30)?),

            scan_concurrency: parse_or::<usize>(&lookup, "SCAN_CONCURRENCY", 1)?.max(1),
        })
    }

    /// Connection URL for sqlx, accepting a bare file path
    pub fn sqlite_url(&self) -> String {
        if self.database_url.starts_with("sqlite:") {
            self.database_url.clone()
        } else {
            format!("sqlite://{}", self.database_url)
        }
    }

    /// Local file behind the database URL, if there is one
    pub fn database_file(&self) -> Option<std::path::PathBuf> {
        let path = self
            .database_url
            .trim_start_matches("sqlite://")
            .trim_start_matches("sqlite:");
        let path = path.split('?').next().unwrap_or(path);
        if path.is_empty() || path == ":memory:" {
            None
        } else {
            Some(std::path::PathBuf::from(path))
        }
    }
}

fn parse_or<T>(lookup: &impl Fn(&str) -> Option<String>, key: &str, default: T) -> Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
{
    match lookup(key) {
        Some(value) => value.trim().parse().with_context(|| format!("Invalid {}", key)),
        None => Ok(default),
    }
}
