//! HTTP server.
//!
//! This module provides:
//! - The TCP listener with per-connection tasks and graceful shutdown
//! - Request routing (preflight, health, authorization, dispatch)
//! - Plain REST endpoints
//! - Shared application state
//!
//! # Example
//!
//! ```no_run
//! use desk_bridge::config::Config;
//! use desk_bridge::server::McpServer;
//!
//! # async fn example() -> Result<(), Box<dyn std::error::Error>> {
//! let server = McpServer::from_config(Config::default());
//! let running = server.start().await?;
//! println!("listening on {}", running.local_addr());
//! running.shutdown().await?;
//! # Ok(())
//! # }
//! ```

mod listener;
mod mcp;
mod rest;
mod router;
mod types;

pub use listener::{bind, spawn, Readiness, RETRY_AFTER_SECS};
pub use mcp::{McpServer, RunningServer};
pub use rest::{health, is_valid_artifact_name, ENDPOINTS};
pub use router::{internal_error, preflight, route, Route, ALLOW_HEADERS, ALLOW_METHODS};
pub use types::AppState;
