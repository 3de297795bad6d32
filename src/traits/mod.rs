//! Trait definitions for the collaborators the protocol engine consumes.
//!
//! This module defines traits for:
//! - [`ToolHandler`]: The capability behind a registered tool
//! - [`Authorizer`]: Per-request authorization check
//! - [`PolicyGuard`]: Tool call, path and command policy
//! - [`AuditSink`]: Tool call audit trail
//! - [`TimeProvider`]: Time abstraction for testing
//!
//! It also re-exports shared types from the `types` submodule.
//!
//! # Mocking
//!
//! All traits are annotated with `#[cfg_attr(test, mockall::automock)]`
//! which generates mock implementations automatically for testing.
//!
//! # Example
//!
//! ```
//! use desk_bridge::traits::{TimeProvider, RealTimeProvider};
//!
//! let time_provider = RealTimeProvider;
//! let now = time_provider.now();
//! println!("Current time: {now}");
//! ```

mod types;

pub use types::{AuditEntry, PolicyDecision, RiskLevel};

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value;

use crate::error::{AuditError, ToolError};
use crate::http::HttpRequest;

/// Capability behind a registered tool.
///
/// Handlers receive the call's `arguments` object and return the JSON value
/// placed in the RPC result.
#[cfg_attr(test, mockall::automock)]
#[async_trait]
pub trait ToolHandler: Send + Sync {
    /// Invoke the tool.
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError>;
}

/// Authorization check applied to every path except `/health` and preflight.
#[cfg_attr(test, mockall::automock)]
pub trait Authorizer: Send + Sync {
    /// Returns true when the request may proceed.
    fn authorize(&self, request: &HttpRequest) -> bool;
}

/// Policy consulted before any tool handler runs.
#[cfg_attr(test, mockall::automock)]
pub trait PolicyGuard: Send + Sync {
    /// Evaluate a tool call by name and arguments.
    fn evaluate_tool_call(&self, tool: &str, arguments: &Value) -> PolicyDecision;

    /// Returns true when `path` may be read or listed.
    fn is_path_allowed(&self, path: &str) -> bool;

    /// Returns true when `command` may be executed.
    fn is_command_allowed(&self, command: &str) -> bool;
}

/// Destination for tool call audit entries.
#[cfg_attr(test, mockall::automock)]
pub trait AuditSink: Send + Sync {
    /// Record one entry.
    fn log_tool_call(&self, entry: &AuditEntry) -> Result<(), AuditError>;
}

/// Time provider trait for mocking.
///
/// This trait abstracts time operations to allow for
/// deterministic testing of time-dependent code.
#[cfg_attr(test, mockall::automock)]
pub trait TimeProvider: Send + Sync {
    /// Get the current time.
    fn now(&self) -> DateTime<Utc>;
}

/// Real time provider using system clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct RealTimeProvider;

impl TimeProvider for RealTimeProvider {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use serde_json::json;
    use static_assertions::assert_impl_all;

    assert_impl_all!(RealTimeProvider: Send, Sync, Clone, Copy, Default);
    assert_impl_all!(MockToolHandler: Send, Sync);
    assert_impl_all!(MockPolicyGuard: Send, Sync);
    assert_impl_all!(MockAuditSink: Send, Sync);

    #[test]
    fn test_real_time_provider_now() {
        let before = Utc::now();
        let now = RealTimeProvider.now();
        let after = Utc::now();
        assert!(now >= before && now <= after);
    }

    #[tokio::test]
    async fn test_mock_tool_handler() {
        let mut handler = MockToolHandler::new();
        handler
            .expect_invoke()
            .withf(|args| args["path"] == "/tmp")
            .returning(|_| Ok(json!({"ok": true})));

        let result = handler.invoke(json!({"path": "/tmp"})).await.unwrap();
        assert_eq!(result, json!({"ok": true}));
    }

    #[test]
    fn test_mock_policy_guard() {
        let mut guard = MockPolicyGuard::new();
        guard
            .expect_evaluate_tool_call()
            .returning(|tool, _| PolicyDecision::deny(format!("{tool} blocked")));

        let decision = guard.evaluate_tool_call("execute_command", &json!({}));
        assert!(!decision.allowed);
        assert_eq!(decision.reason, "execute_command blocked");
    }

    #[test]
    fn test_mock_time_provider() {
        let fixed = DateTime::parse_from_rfc3339("2026-03-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let mut clock = MockTimeProvider::new();
        clock.expect_now().return_const(fixed);
        assert_eq!(clock.now(), fixed);
    }
}
