//! Application configuration loaded from environment variables.

use crate::error::{AppError, Result};
use std::env;

/// Application configuration
#[derive(Debug, Clone)]
pub struct Config {
    /// Database connection URL
    pub database_url: String,

    /// Server bind address (host:port)
    pub bind_address: String,

    /// Log level
    pub log_level: String,

    /// Base URL of the remote artifact repository
    pub repository_url: String,

    /// Remote repository request timeout in seconds
    pub repository_timeout_secs: u64,

    /// Age in seconds after which a held refresh claim is considered
    /// abandoned and may be reclaimed by a later attempt
    pub claim_abandon_secs: u64,

    /// Maximum retry count before a notification is dead-lettered
    pub max_event_retries: i32,

    /// Worker-pool ceiling for fleet sweeps
    pub sweep_concurrency: usize,

    /// Notification consumer poll interval in seconds
    pub queue_poll_secs: u64,

    /// Lifetime of a schedule-instance lease in seconds
    pub schedule_lease_secs: u64,

    /// Interval of the snapshot-refresh schedule in seconds
    pub snapshot_sweep_secs: u64,

    /// Interval of the version-reconciliation schedule in seconds
    pub reconcile_sweep_secs: u64,
}

impl Config {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self> {
        Ok(Self {
            database_url: env::var("DATABASE_URL")
                .map_err(|_| AppError::Config("DATABASE_URL not set".into()))?,
            bind_address: env::var("BIND_ADDRESS").unwrap_or_else(|_| "0.0.0.0:8080".into()),
            log_level: env::var("LOG_LEVEL").unwrap_or_else(|_| "info".into()),
            repository_url: env::var("REPOSITORY_URL")
                .map_err(|_| AppError::Config("REPOSITORY_URL not set".into()))?,
            repository_timeout_secs: parse_env("REPOSITORY_TIMEOUT_SECS", 30),
            claim_abandon_secs: parse_env("CLAIM_ABANDON_SECS", 1800),
            max_event_retries: parse_env("MAX_EVENT_RETRIES", 5),
            sweep_concurrency: parse_env("SWEEP_CONCURRENCY", 4),
            queue_poll_secs: parse_env("QUEUE_POLL_SECS", 5),
            schedule_lease_secs: parse_env("SCHEDULE_LEASE_SECS", 300),
            snapshot_sweep_secs: parse_env("SNAPSHOT_SWEEP_SECS", 6 * 3600),
            reconcile_sweep_secs: parse_env("RECONCILE_SWEEP_SECS", 12 * 3600),
        })
    }
}

/// Parse an env var into any FromStr type, falling back to a default.
fn parse_env<T: std::str::FromStr>(name: &str, default: T) -> T {
    env::var(name)
        .ok()
        .and_then(|v| v.parse().ok())
        .unwrap_or(default)
}
