//! Desk Bridge
//!
//! A local MCP control plane that exposes host capabilities (files, commands
//! and optional OS integrations) to agents over JSON-RPC 2.0 on HTTP.
//!
//! # Features
//!
//! - Two MCP transports sharing one dispatcher: a long-lived event stream
//!   (`GET /sse` + `POST /messages`) and stateless request/response calls
//!   (`POST /mcp`)
//! - Tool registry with policy checks and a daily-rotated audit log on every
//!   tool call
//! - Per-address sliding-window rate limiting and bearer token authorization
//! - Plain REST endpoints for status, health and direct tool access
//!
//! # Quick Start
//!
//! ```bash
//! AUTH_TOKEN=change-me ALLOWED_DIRS=/home/me/shared ./desk-bridge
//! ```
//!
//! # Architecture
//!
//! ```text
//!               ┌──────────────────────────── desk-bridge ───────────────────────────┐
//!  agent ──TCP─▶│ listener ─▶ rate limit ─▶ framer ─▶ router ─┬─▶ /sse, /messages ─┐ │
//!               │                                  (auth)     ├─▶ /mcp ────────────┤ │
//!               │                                             └─▶ REST ────────────┤ │
//!               │                                                                  ▼ │
//!               │       sessions ◀──── transports ────▶ dispatcher ─▶ registry      │
//!               │                                        │    │                     │
//!               │                                   policy  audit log ─▶ tool       │
//!               └────────────────────────────────────────────────────────────────────┘
//! ```

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(rustdoc::missing_crate_level_docs)]
#![warn(clippy::all, clippy::pedantic, clippy::nursery)]
#![allow(clippy::module_name_repetitions)]

pub mod activity;
pub mod audit;
pub mod auth;
pub mod config;
pub mod error;
pub mod http;
pub mod policy;
pub mod protocol;
pub mod rate_limit;
pub mod registry;
pub mod server;
pub mod session;
pub mod tools;
pub mod traits;
pub mod transport;

#[cfg(test)]
mod test_utils;
