//! Shared types for the traits module.
//!
//! This module defines the data exchanged with collaborators:
//! - [`RiskLevel`]: Coarse risk classification of a tool
//! - [`PolicyDecision`]: Verdict of the policy guard
//! - [`AuditEntry`]: One line of the audit log

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// Risk classification attached to a tool.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum RiskLevel {
    /// Read-only, side-effect free.
    Low,
    /// Local side effects.
    Medium,
    /// Modifies user data.
    High,
    /// Arbitrary code or system control.
    Critical,
}

impl RiskLevel {
    /// Lowercase wire name.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Low => "low",
            Self::Medium => "medium",
            Self::High => "high",
            Self::Critical => "critical",
        }
    }

    /// Returns true for High and Critical.
    #[must_use]
    pub const fn is_high(self) -> bool {
        matches!(self, Self::High | Self::Critical)
    }
}

impl std::fmt::Display for RiskLevel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Verdict returned by a policy guard for one tool call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PolicyDecision {
    /// Whether the call may proceed.
    pub allowed: bool,
    /// Human-readable reason, surfaced to the client on denial.
    pub reason: String,
}

impl PolicyDecision {
    /// An allowing decision.
    #[must_use]
    pub fn allow() -> Self {
        Self {
            allowed: true,
            reason: String::new(),
        }
    }

    /// A denying decision with a reason.
    #[must_use]
    pub fn deny(reason: impl Into<String>) -> Self {
        Self {
            allowed: false,
            reason: reason.into(),
        }
    }
}

/// One tool invocation record.
///
/// Serialized as a single JSON line; optional fields are omitted when empty.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AuditEntry {
    /// UTC timestamp, `%Y-%m-%dT%H:%M:%S%.3fZ`.
    pub time: String,
    /// Tool name.
    pub tool: String,
    /// Tool risk level.
    pub risk: RiskLevel,
    /// Outcome tag (`executing` for pre-invocation entries).
    pub result: String,
    /// Elapsed time in milliseconds.
    pub duration_ms: u64,
    /// Failure message, if any.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
    /// Set for high-risk or confirmation-gated tools.
    #[serde(default, skip_serializing_if = "std::ops::Not::not")]
    pub high_risk: bool,
    /// Structured details, usually the call arguments.
    #[serde(default, skip_serializing_if = "is_empty_details")]
    pub details: Value,
}

fn is_empty_details(value: &Value) -> bool {
    match value {
        Value::Null => true,
        Value::Object(map) => map.is_empty(),
        _ => false,
    }
}

impl AuditEntry {
    /// Create an entry for `tool` with the given outcome tag.
    #[must_use]
    pub fn new(
        time: impl Into<String>,
        tool: impl Into<String>,
        risk: RiskLevel,
        result: impl Into<String>,
    ) -> Self {
        Self {
            time: time.into(),
            tool: tool.into(),
            risk,
            result: result.into(),
            duration_ms: 0,
            error: None,
            high_risk: risk.is_high(),
            details: Value::Null,
        }
    }

    /// Attach structured details.
    #[must_use]
    pub fn with_details(mut self, details: Value) -> Self {
        self.details = details;
        self
    }

    /// Attach an error message.
    #[must_use]
    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }

    /// Set the elapsed time.
    #[must_use]
    pub const fn with_duration_ms(mut self, duration_ms: u64) -> Self {
        self.duration_ms = duration_ms;
        self
    }

    /// Force the high-risk marker on.
    #[must_use]
    pub const fn flag_high_risk(mut self) -> Self {
        self.high_risk = true;
        self
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;
    use pretty_assertions::assert_eq;
    use serde_json::json;

    #[test]
    fn test_risk_level_ordering_and_names() {
        assert!(RiskLevel::Low < RiskLevel::Critical);
        assert_eq!(RiskLevel::Medium.to_string(), "medium");
        assert_eq!(serde_json::to_value(RiskLevel::High).unwrap(), json!("high"));
        assert!(RiskLevel::Critical.is_high());
        assert!(!RiskLevel::Medium.is_high());
    }

    #[test]
    fn test_policy_decision_constructors() {
        assert!(PolicyDecision::allow().allowed);
        let denied = PolicyDecision::deny("outside allowed dirs");
        assert!(!denied.allowed);
        assert_eq!(denied.reason, "outside allowed dirs");
    }

    #[test]
    fn test_audit_entry_minimal_serialization() {
        let entry = AuditEntry::new("2026-01-01T00:00:00.000Z", "read_file", RiskLevel::Low, "executing");
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(
            value,
            json!({
                "time": "2026-01-01T00:00:00.000Z",
                "tool": "read_file",
                "risk": "low",
                "result": "executing",
                "duration_ms": 0
            })
        );
    }

    #[test]
    fn test_audit_entry_full_serialization() {
        let entry = AuditEntry::new("t", "execute_command", RiskLevel::Critical, "failed")
            .with_details(json!({"command": "ls"}))
            .with_error("exit 1")
            .with_duration_ms(12);
        let value = serde_json::to_value(&entry).unwrap();
        assert_eq!(value["high_risk"], json!(true));
        assert_eq!(value["details"]["command"], json!("ls"));
        assert_eq!(value["error"], json!("exit 1"));
        assert_eq!(value["duration_ms"], json!(12));
    }

    #[test]
    fn test_audit_entry_flag_high_risk() {
        let entry = AuditEntry::new("t", "write", RiskLevel::Low, "executing").flag_high_risk();
        assert!(entry.high_risk);
    }
}
