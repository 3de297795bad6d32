//! Configuration management.
//!
//! This module handles:
//! - Environment variable loading
//! - Configuration validation
//! - Default value handling
//! - Secure auth token storage via [`SecretString`]
//! - Fixed transport limits via [`TransportConfig`]
//!
//! # Example
//!
//! ```
//! use desk_bridge::config::{Config, SecretString, DEFAULT_SERVER_PORT};
//!
//! // Create a config directly (use Config::from_env() in production)
//! let config = Config {
//!     auth_token: Some(SecretString::new("local-token")),
//!     ..Config::default()
//! };
//!
//! assert_eq!(config.server_port, DEFAULT_SERVER_PORT);
//! // Token is protected from accidental logging
//! let debug = format!("{:?}", config);
//! assert!(debug.contains("<REDACTED>"));
//! assert!(!debug.contains("local-token"));
//! ```

mod secret;
mod transport;
mod validation;

pub use secret::SecretString;
pub use transport::TransportConfig;
pub use validation::{
    validate_config, MAX_COMMAND_TIMEOUT_SECS, MAX_RATE_LIMIT_REQUESTS, MAX_RATE_LIMIT_WINDOW_MS,
    MAX_RETENTION_DAYS, MAX_STREAM_SESSIONS, MAX_STREAM_SESSION_TTL_SECS, MIN_RATE_LIMIT_WINDOW_MS,
    MIN_STREAM_SESSION_TTL_SECS,
};

use std::net::IpAddr;
use std::path::PathBuf;
use std::time::Duration;

use crate::error::ConfigError;

/// Default listen address.
pub const DEFAULT_LISTEN_ADDRESS: &str = "127.0.0.1";

/// Address used when the configured one does not parse.
pub const FALLBACK_LISTEN_ADDRESS: &str = "0.0.0.0";

/// Default listen port.
pub const DEFAULT_SERVER_PORT: u16 = 35182;

/// Default log level.
pub const DEFAULT_LOG_LEVEL: &str = "info";

/// Default log format.
pub const DEFAULT_LOG_FORMAT: &str = "text";

/// Default audit log path. Daily files are written next to it.
pub const DEFAULT_AUDIT_LOG_PATH: &str = "./logs/audit.log";

/// Default audit log retention in days.
pub const DEFAULT_LOG_RETENTION_DAYS: u32 = 30;

/// Default maximum requests per client per window.
pub const DEFAULT_RATE_LIMIT_MAX_REQUESTS: u32 = 120;

/// Default rate limiting window in milliseconds.
pub const DEFAULT_RATE_LIMIT_WINDOW_MS: u64 = 60_000;

/// Default cap on concurrent streaming sessions.
pub const DEFAULT_MAX_STREAM_SESSIONS: u32 = 16;

/// Default streaming session TTL in seconds.
pub const DEFAULT_STREAM_SESSION_TTL_SECS: u64 = 3600;

/// Default timeout for `execute_command` in seconds.
pub const DEFAULT_COMMAND_TIMEOUT_SECS: u64 = 30;

/// Default directory for screenshot and clipboard artifacts.
pub const DEFAULT_ARTIFACTS_DIR: &str = "./data";

/// Application configuration.
///
/// Use [`Config::from_env`] to load configuration from environment variables.
/// The `auth_token` field uses [`SecretString`] to prevent accidental logging.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Config {
    /// Address the listener binds to.
    pub listen_address: IpAddr,
    /// Port the listener binds to.
    pub server_port: u16,
    /// Retry on an ephemeral port when the configured one cannot be bound.
    pub auto_port: bool,
    /// Bearer token required on authorized paths. `None` disables the check.
    pub auth_token: Option<SecretString>,
    /// Log level (error, warn, info, debug, trace).
    pub log_level: String,
    /// Log format (`text` or `json`).
    pub log_format: String,
    /// Base path of the audit log.
    pub audit_log_path: PathBuf,
    /// Days of audit logs to keep.
    pub log_retention_days: u32,
    /// Requests admitted per client address per window.
    pub rate_limit_max_requests: u32,
    /// Rate limiting window in milliseconds.
    pub rate_limit_window_ms: u64,
    /// Cap on concurrent streaming sessions.
    pub max_stream_sessions: u32,
    /// Age after which a streaming session is swept.
    pub stream_session_ttl_secs: u64,
    /// Directories tools may touch. Empty allows every path.
    pub allowed_dirs: Vec<PathBuf>,
    /// Executables `execute_command` may run. Empty allows none.
    pub allowed_commands: Vec<String>,
    /// Timeout for `execute_command` in seconds.
    pub command_timeout_secs: u64,
    /// Root for screenshot and clipboard artifacts.
    pub artifacts_dir: PathBuf,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            listen_address: IpAddr::from([127, 0, 0, 1]),
            server_port: DEFAULT_SERVER_PORT,
            auto_port: true,
            auth_token: None,
            log_level: DEFAULT_LOG_LEVEL.into(),
            log_format: DEFAULT_LOG_FORMAT.into(),
            audit_log_path: PathBuf::from(DEFAULT_AUDIT_LOG_PATH),
            log_retention_days: DEFAULT_LOG_RETENTION_DAYS,
            rate_limit_max_requests: DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            rate_limit_window_ms: DEFAULT_RATE_LIMIT_WINDOW_MS,
            max_stream_sessions: DEFAULT_MAX_STREAM_SESSIONS,
            stream_session_ttl_secs: DEFAULT_STREAM_SESSION_TTL_SECS,
            allowed_dirs: Vec::new(),
            allowed_commands: Vec::new(),
            command_timeout_secs: DEFAULT_COMMAND_TIMEOUT_SECS,
            artifacts_dir: PathBuf::from(DEFAULT_ARTIFACTS_DIR),
        }
    }
}

impl Config {
    /// Load configuration from environment variables.
    ///
    /// All variables are optional:
    /// - `LISTEN_ADDRESS` (default: `127.0.0.1`, unparseable falls back to `0.0.0.0`)
    /// - `SERVER_PORT` (default: `35182`)
    /// - `AUTO_PORT` (default: `true`)
    /// - `AUTH_TOKEN` (default: unset, authorization disabled)
    /// - `LOG_LEVEL` / `LOG_FORMAT` (default: `info` / `text`)
    /// - `AUDIT_LOG_PATH` / `LOG_RETENTION_DAYS` (default: `./logs/audit.log` / `30`)
    /// - `RATE_LIMIT_MAX_REQUESTS` / `RATE_LIMIT_WINDOW_MS` (default: `120` / `60000`)
    /// - `MAX_STREAM_SESSIONS` / `STREAM_SESSION_TTL_SECS` (default: `16` / `3600`)
    /// - `ALLOWED_DIRS` (OS path-list separated) / `ALLOWED_COMMANDS` (comma separated)
    /// - `COMMAND_TIMEOUT_SECS` (default: `30`)
    /// - `ARTIFACTS_DIR` (default: `./data`)
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError`] if a numeric or boolean variable does not parse
    /// or any value fails validation (see [`validate_config`]).
    #[must_use = "configuration should be used"]
    pub fn from_env() -> Result<Self, ConfigError> {
        // Load .env file if present (ignore errors)
        let _ = dotenvy::dotenv();

        let listen_address = std::env::var("LISTEN_ADDRESS").map_or_else(
            |_| IpAddr::from([127, 0, 0, 1]),
            |raw| parse_listen_address(&raw),
        );

        let auth_token = std::env::var("AUTH_TOKEN").ok().map(SecretString::new);

        let config = Self {
            listen_address,
            server_port: parse_env_u16("SERVER_PORT", DEFAULT_SERVER_PORT)?,
            auto_port: parse_env_bool("AUTO_PORT", true)?,
            auth_token,
            log_level: std::env::var("LOG_LEVEL").unwrap_or_else(|_| DEFAULT_LOG_LEVEL.into()),
            log_format: std::env::var("LOG_FORMAT").unwrap_or_else(|_| DEFAULT_LOG_FORMAT.into()),
            audit_log_path: std::env::var("AUDIT_LOG_PATH")
                .map_or_else(|_| PathBuf::from(DEFAULT_AUDIT_LOG_PATH), PathBuf::from),
            log_retention_days: parse_env_u32("LOG_RETENTION_DAYS", DEFAULT_LOG_RETENTION_DAYS)?,
            rate_limit_max_requests: parse_env_u32(
                "RATE_LIMIT_MAX_REQUESTS",
                DEFAULT_RATE_LIMIT_MAX_REQUESTS,
            )?,
            rate_limit_window_ms: parse_env_u64(
                "RATE_LIMIT_WINDOW_MS",
                DEFAULT_RATE_LIMIT_WINDOW_MS,
            )?,
            max_stream_sessions: parse_env_u32("MAX_STREAM_SESSIONS", DEFAULT_MAX_STREAM_SESSIONS)?,
            stream_session_ttl_secs: parse_env_u64(
                "STREAM_SESSION_TTL_SECS",
                DEFAULT_STREAM_SESSION_TTL_SECS,
            )?,
            allowed_dirs: std::env::var_os("ALLOWED_DIRS")
                .map(|raw| std::env::split_paths(&raw).filter(|p| !p.as_os_str().is_empty()).collect())
                .unwrap_or_default(),
            allowed_commands: std::env::var("ALLOWED_COMMANDS")
                .map(|raw| parse_list(&raw))
                .unwrap_or_default(),
            command_timeout_secs: parse_env_u64(
                "COMMAND_TIMEOUT_SECS",
                DEFAULT_COMMAND_TIMEOUT_SECS,
            )?,
            artifacts_dir: std::env::var("ARTIFACTS_DIR")
                .map_or_else(|_| PathBuf::from(DEFAULT_ARTIFACTS_DIR), PathBuf::from),
        };

        validate_config(&config)?;
        Ok(config)
    }

    /// Rate limiting window as a [`Duration`].
    #[must_use]
    pub const fn rate_limit_window(&self) -> Duration {
        Duration::from_millis(self.rate_limit_window_ms)
    }

    /// Streaming session TTL as a [`Duration`].
    #[must_use]
    pub const fn stream_session_ttl(&self) -> Duration {
        Duration::from_secs(self.stream_session_ttl_secs)
    }

    /// Command timeout as a [`Duration`].
    #[must_use]
    pub const fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Returns true when structured JSON logging is requested.
    #[must_use]
    pub fn json_logs(&self) -> bool {
        self.log_format.eq_ignore_ascii_case("json")
    }
}

/// Parse a listen address, falling back to all interfaces when invalid.
fn parse_listen_address(raw: &str) -> IpAddr {
    raw.trim().parse().unwrap_or_else(|_| {
        tracing::warn!(
            address = raw,
            fallback = FALLBACK_LISTEN_ADDRESS,
            "Invalid listen address, falling back"
        );
        IpAddr::from([0, 0, 0, 0])
    })
}

/// Split a comma separated list, dropping blanks.
fn parse_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(String::from)
        .collect()
}

/// Parse an environment variable as u64, using a default if not set.
fn parse_env_u64(name: &str, default: u64) -> Result<u64, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as u32, using a default if not set.
fn parse_env_u32(name: &str, default: u32) -> Result<u32, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a positive integer".into(),
        })
    })
}

/// Parse an environment variable as a port number.
fn parse_env_u16(name: &str, default: u16) -> Result<u16, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        val.trim().parse().map_err(|_| ConfigError::InvalidValue {
            var: name.into(),
            reason: "must be a port number between 0 and 65535".into(),
        })
    })
}

/// Parse an environment variable as a boolean flag.
fn parse_env_bool(name: &str, default: bool) -> Result<bool, ConfigError> {
    std::env::var(name).map_or(Ok(default), |val| {
        match val.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            _ => Err(ConfigError::InvalidValue {
                var: name.into(),
                reason: "must be true or false".into(),
            }),
        }
    })
}
