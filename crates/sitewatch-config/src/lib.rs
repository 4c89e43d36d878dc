//! Environment variable loading for the sitewatch process.
//!
//! Every knob has a default, so a bare process starts with sane settings;
//! invalid values fail startup instead of being silently replaced.

use std::env;
use std::time::Duration;

use thiserror::Error;
use tracing::debug;

/// Configuration loading errors.
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("invalid value for {var}: {reason}")]
    InvalidValue { var: String, reason: String },
}

/// Process-wide configuration, initialised once at startup.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Worker-pool size within one scan.
    pub max_concurrency: usize,
    /// Pause between URL batches, in milliseconds.
    pub crawl_delay_ms: u64,
    /// Per-request HTTP timeout, in milliseconds.
    pub request_timeout_ms: u64,
    /// Default job retry budget.
    pub retry_attempts: u32,
    /// Dispatcher poll interval, in milliseconds.
    pub dispatcher_poll_ms: u64,
    /// Maximum concurrent scans per dispatcher instance.
    pub dispatcher_max_concurrent: usize,
    /// Reaper pass interval, in milliseconds.
    pub reaper_interval_ms: u64,
    /// A running job older than this is considered stuck, in hours.
    pub stuck_job_hours: u32,
    /// Terminal jobs older than this are deleted, in days.
    pub old_job_days: u32,
    /// Archived sites older than this are deleted, in days.
    pub archive_retention_days: u32,
    /// User-agent sent on every outbound fetch.
    pub user_agent: String,
    /// Bind address for the HTTP API.
    pub listen_addr: String,
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            max_concurrency: 20,
            crawl_delay_ms: 500,
            request_timeout_ms: 30_000,
            retry_attempts: 3,
            dispatcher_poll_ms: 2_000,
            dispatcher_max_concurrent: 3,
            reaper_interval_ms: 300_000,
            stuck_job_hours: 2,
            old_job_days: 30,
            archive_retention_days: 30,
            user_agent: "WebMonitor-Crawler/1.0".to_string(),
            listen_addr: "0.0.0.0:8080".to_string(),
        }
    }
}

impl AppConfig {
    /// Load from the process environment, falling back to defaults.
    pub fn from_env() -> Result<Self, ConfigError> {
        let defaults = Self::default();
        let config = Self {
            max_concurrency: parse_var("MAX_CONCURRENCY", defaults.max_concurrency)?,
            crawl_delay_ms: parse_var("CRAWL_DELAY_MS", defaults.crawl_delay_ms)?,
            request_timeout_ms: parse_var("REQUEST_TIMEOUT_MS", defaults.request_timeout_ms)?,
            retry_attempts: parse_var("RETRY_ATTEMPTS", defaults.retry_attempts)?,
            dispatcher_poll_ms: parse_var("DISPATCHER_POLL_MS", defaults.dispatcher_poll_ms)?,
            dispatcher_max_concurrent: parse_var(
                "DISPATCHER_MAX_CONCURRENT",
                defaults.dispatcher_max_concurrent,
            )?,
            reaper_interval_ms: parse_var("REAPER_INTERVAL_MS", defaults.reaper_interval_ms)?,
            stuck_job_hours: parse_var("STUCK_JOB_HOURS", defaults.stuck_job_hours)?,
            old_job_days: parse_var("OLD_JOB_DAYS", defaults.old_job_days)?,
            archive_retention_days: parse_var(
                "ARCHIVE_RETENTION_DAYS",
                defaults.archive_retention_days,
            )?,
            user_agent: env::var("USER_AGENT").unwrap_or(defaults.user_agent),
            listen_addr: env::var("LISTEN_ADDR").unwrap_or(defaults.listen_addr),
        };

        debug!(?config, "Loaded configuration");
        Ok(config)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_millis(self.request_timeout_ms)
    }

    pub fn crawl_delay(&self) -> Duration {
        Duration::from_millis(self.crawl_delay_ms)
    }

    pub fn dispatcher_poll_interval(&self) -> Duration {
        Duration::from_millis(self.dispatcher_poll_ms)
    }

    pub fn reaper_interval(&self) -> Duration {
        Duration::from_millis(self.reaper_interval_ms)
    }
}

fn parse_var<T: std::str::FromStr>(var: &str, default: T) -> Result<T, ConfigError>
where
    T::Err: std::fmt::Display,
{
    match env::var(var) {
        Ok(raw) => raw.trim().parse().map_err(|e| ConfigError::InvalidValue {
            var: var.to_string(),
            reason: format!("{e}"),
        }),
        Err(_) => Ok(default),
    }
}
