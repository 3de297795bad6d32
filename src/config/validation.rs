//! Configuration validation.
//!
//! This module provides validation logic for configuration values,
//! ensuring they are within acceptable ranges.

use super::Config;
use crate::error::ConfigError;

/// Maximum requests per rate limiting window.
pub const MAX_RATE_LIMIT_REQUESTS: u32 = 100_000;

/// Minimum rate limiting window (1 second).
pub const MIN_RATE_LIMIT_WINDOW_MS: u64 = 1000;

/// Maximum rate limiting window (1 hour).
pub const MAX_RATE_LIMIT_WINDOW_MS: u64 = 3_600_000;

/// Maximum concurrent streaming sessions.
pub const MAX_STREAM_SESSIONS: u32 = 1024;

/// Minimum streaming session TTL (1 minute).
pub const MIN_STREAM_SESSION_TTL_SECS: u64 = 60;

/// Maximum streaming session TTL (1 day).
pub const MAX_STREAM_SESSION_TTL_SECS: u64 = 86_400;

/// Maximum audit log retention (10 years).
pub const MAX_RETENTION_DAYS: u32 = 3650;

/// Maximum command timeout (10 minutes).
pub const MAX_COMMAND_TIMEOUT_SECS: u64 = 600;

/// Validate configuration values.
///
/// # Errors
///
/// Returns [`ConfigError::InvalidValue`] if any value is out of range:
/// - `AUTH_TOKEN` must not be empty when set
/// - `LOG_FORMAT` must be `text` or `json`
/// - `RATE_LIMIT_MAX_REQUESTS` must be between 1 and 100000
/// - `RATE_LIMIT_WINDOW_MS` must be between 1000 and 3600000
/// - `MAX_STREAM_SESSIONS` must be between 1 and 1024
/// - `STREAM_SESSION_TTL_SECS` must be between 60 and 86400
/// - `LOG_RETENTION_DAYS` must be between 1 and 3650
/// - `COMMAND_TIMEOUT_SECS` must be between 1 and 600
#[must_use = "validation result should be checked"]
pub fn validate_config(config: &Config) -> Result<(), ConfigError> {
    if config.auth_token.as_ref().is_some_and(super::SecretString::is_empty) {
        return Err(invalid("AUTH_TOKEN", "must not be empty when set".into()));
    }

    if !matches!(config.log_format.to_ascii_lowercase().as_str(), "text" | "json") {
        return Err(invalid("LOG_FORMAT", "must be text or json".into()));
    }

    if !(1..=MAX_RATE_LIMIT_REQUESTS).contains(&config.rate_limit_max_requests) {
        return Err(invalid(
            "RATE_LIMIT_MAX_REQUESTS",
            format!("must be between 1 and {MAX_RATE_LIMIT_REQUESTS}"),
        ));
    }

    if !(MIN_RATE_LIMIT_WINDOW_MS..=MAX_RATE_LIMIT_WINDOW_MS).contains(&config.rate_limit_window_ms)
    {
        return Err(invalid(
            "RATE_LIMIT_WINDOW_MS",
            format!("must be between {MIN_RATE_LIMIT_WINDOW_MS} and {MAX_RATE_LIMIT_WINDOW_MS} ms"),
        ));
    }

    if !(1..=MAX_STREAM_SESSIONS).contains(&config.max_stream_sessions) {
        return Err(invalid(
            "MAX_STREAM_SESSIONS",
            format!("must be between 1 and {MAX_STREAM_SESSIONS}"),
        ));
    }

    if !(MIN_STREAM_SESSION_TTL_SECS..=MAX_STREAM_SESSION_TTL_SECS)
        .contains(&config.stream_session_ttl_secs)
    {
        return Err(invalid(
            "STREAM_SESSION_TTL_SECS",
            format!(
                "must be between {MIN_STREAM_SESSION_TTL_SECS} and {MAX_STREAM_SESSION_TTL_SECS} s"
            ),
        ));
    }

    if !(1..=MAX_RETENTION_DAYS).contains(&config.log_retention_days) {
        return Err(invalid(
            "LOG_RETENTION_DAYS",
            format!("must be between 1 and {MAX_RETENTION_DAYS}"),
        ));
    }

    if !(1..=MAX_COMMAND_TIMEOUT_SECS).contains(&config.command_timeout_secs) {
        return Err(invalid(
            "COMMAND_TIMEOUT_SECS",
            format!("must be between 1 and {MAX_COMMAND_TIMEOUT_SECS} s"),
        ));
    }

    Ok(())
}

fn invalid(var: &str, reason: String) -> ConfigError {
    ConfigError::InvalidValue {
        var: var.into(),
        reason,
    }
}
