//! Test utilities and fixtures.
//!
//! This module provides shared testing infrastructure:
//! - A recording audit sink
//! - An echo tool handler
//! - [`AppState`] factories with fast transport timeouts
//! - Stream reading helpers
//!
//! Only compiled for tests (`#[cfg(test)]`).

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::Value;
use tokio::io::{AsyncRead, AsyncReadExt};

use crate::auth::BearerTokenAuthorizer;
use crate::config::{Config, SecretString, TransportConfig};
use crate::error::{AuditError, ToolError};
use crate::policy::AllowListPolicy;
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::server::AppState;
use crate::tools::text_result;
use crate::traits::{AuditEntry, AuditSink, RiskLevel, ToolHandler};

/// Audit sink keeping entries in memory.
#[derive(Debug, Default)]
pub struct RecordingAuditSink {
    entries: Mutex<Vec<AuditEntry>>,
}

impl RecordingAuditSink {
    /// Entries recorded so far.
    pub fn entries(&self) -> Vec<AuditEntry> {
        self.entries.lock().unwrap().clone()
    }
}

impl AuditSink for RecordingAuditSink {
    fn log_tool_call(&self, entry: &AuditEntry) -> Result<(), AuditError> {
        self.entries.lock().unwrap().push(entry.clone());
        Ok(())
    }
}

/// Tool handler echoing its arguments back as text.
#[derive(Debug, Default)]
pub struct EchoTool;

#[async_trait]
impl ToolHandler for EchoTool {
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        Ok(text_result(arguments.to_string(), false))
    }
}

/// Transport limits shrunk for tests.
#[must_use]
pub fn fast_transport() -> TransportConfig {
    TransportConfig {
        recv_timeout: Duration::from_millis(500),
        send_timeout: Duration::from_millis(500),
        stream_send_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_millis(40),
        heartbeat_tick: Duration::from_millis(10),
        poll_interval: Duration::from_millis(50),
        ..TransportConfig::default()
    }
}

/// Registry holding an `echo` tool.
#[must_use]
pub fn echo_registry() -> Arc<ToolRegistry> {
    let registry = Arc::new(ToolRegistry::new());
    registry.register(
        ToolDescriptor::new("echo", "Echo the arguments", Arc::new(EchoTool))
            .with_risk(RiskLevel::Low),
    );
    registry
}

/// State with an allow-all path policy, the `echo` tool, a recording audit
/// sink and an optional bearer token.
#[must_use]
pub fn test_state(config: Config, token: Option<&str>) -> (Arc<AppState>, Arc<RecordingAuditSink>) {
    let audit = Arc::new(RecordingAuditSink::default());
    let policy = Arc::new(AllowListPolicy::from_config(&config));
    let authorizer = Arc::new(BearerTokenAuthorizer::new(token.map(SecretString::new)));
    let state = AppState::from_parts(
        config,
        fast_transport(),
        echo_registry(),
        policy,
        Arc::clone(&audit) as Arc<dyn AuditSink>,
        authorizer,
    );
    (Arc::new(state), audit)
}

/// Read from `reader` until the accumulated text contains `needle`.
///
/// Panics after two seconds.
pub async fn read_until<R: AsyncRead + Unpin>(reader: &mut R, buf: &mut String, needle: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    let mut chunk = [0u8; 1024];
    while !buf.contains(needle) {
        let n = tokio::time::timeout_at(deadline, reader.read(&mut chunk))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?} in {buf:?}"))
            .unwrap();
        assert!(n > 0, "stream closed before {needle:?} in {buf:?}");
        buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
}
