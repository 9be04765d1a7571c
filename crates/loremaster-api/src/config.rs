//! Server configuration read from the environment.

use std::str::FromStr;
use std::time::Duration;

use loremaster_resolution::application::ResolutionSettings;

use crate::error::AppError;

/// Everything the server needs to start.
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// PostgreSQL URL. Without one the in-process store is used.
    pub database_url: Option<String>,
    /// Bind host.
    pub host: String,
    /// Bind port.
    pub port: u16,
    /// Pool size for PostgreSQL.
    pub database_max_connections: u32,
    /// Narrator endpoint. Without one every resolution fails as retryable.
    pub narrator_url: Option<String>,
    /// Per-call narrator timeout.
    pub narrator_timeout: Duration,
    /// Age after which an in-flight resolution attempt counts as abandoned.
    pub resolution_stale_after: Duration,
    /// Buffered real-time events per subscriber.
    pub broadcast_capacity: usize,
    /// OTLP collector endpoint; tracing export is off without one.
    pub otlp_endpoint: Option<String>,
}

impl AppConfig {
    /// Reads the configuration from process environment variables.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first variable with an invalid value.
    pub fn from_env() -> Result<Self, AppError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Reads the configuration through `lookup`.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` naming the first variable with an invalid value.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, AppError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let non_empty = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let config = Self {
            database_url: non_empty("DATABASE_URL"),
            host: non_empty("HOST").unwrap_or_else(|| "0.0.0.0".to_owned()),
            port: parse_or(&lookup, "PORT", 3000)?,
            database_max_connections: parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10)?,
            narrator_url: non_empty("NARRATOR_URL"),
            narrator_timeout: Duration::from_secs(parse_or(&lookup, "NARRATOR_TIMEOUT_SECS", 60)?),
            resolution_stale_after: Duration::from_secs(parse_or(
                &lookup,
                "RESOLUTION_STALE_AFTER_SECS",
                300,
            )?),
            broadcast_capacity: parse_or(&lookup, "BROADCAST_CAPACITY", 256)?,
            otlp_endpoint: non_empty("OTEL_EXPORTER_OTLP_ENDPOINT"),
        };

        if config.narrator_timeout.is_zero() {
            return Err(AppError::Config("NARRATOR_TIMEOUT_SECS must be positive".into()));
        }
        if config.broadcast_capacity == 0 {
            return Err(AppError::Config("BROADCAST_CAPACITY must be positive".into()));
        }
        Ok(config)
    }

    /// The `host:port` pair to bind.
    #[must_use]
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Timing knobs for the resolution coordinator.
    ///
    /// # Errors
    ///
    /// Returns `AppError::Config` if the stale window does not fit a
    /// `chrono::Duration`.
    pub fn resolution_settings(&self) -> Result<ResolutionSettings, AppError> {
        let stale_after = chrono::Duration::from_std(self.resolution_stale_after)
            .map_err(|e| {
                AppError::Config(format!("RESOLUTION_STALE_AFTER_SECS out of range: {e}"))
            })?;
        Ok(ResolutionSettings {
            narrator_timeout: self.narrator_timeout,
            stale_after,
        })
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> Result<T, AppError>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key).filter(|v| !v.trim().is_empty()) {
        None => Ok(default),
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| AppError::Config(format!("{key} is invalid ({raw}): {e}"))),
    }
}
