//! Method dispatch and the tool-invocation pipeline.
//!
//! `tools/call` runs four steps, each short-circuiting on failure:
//! registry lookup, policy evaluation, a pre-invocation audit entry
//! (best-effort), then the handler on its own task so it runs to completion
//! even if the requesting connection goes away.

use std::sync::Arc;
use std::time::Instant;

use serde_json::{json, Value};
use tracing::{debug, error, info, warn};

use super::message::{
    is_accepted_version, RpcResponse, ACCEPTED_PROTOCOL_VERSIONS, SERVER_PROTOCOL_VERSION,
};
use crate::activity::ActivityFeed;
use crate::error::McpError;
use crate::registry::ToolRegistry;
use crate::traits::{AuditEntry, AuditSink, PolicyGuard, RealTimeProvider, TimeProvider};

/// Audit outcome tag written before a handler runs.
pub const AUDIT_RESULT_EXECUTING: &str = "executing";

/// Timestamp format used in audit entries.
pub const AUDIT_TIME_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.3fZ";

/// Name and version reported in `initialize`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ServerInfo {
    /// Server name.
    pub name: String,
    /// Server version.
    pub version: String,
}

impl Default for ServerInfo {
    fn default() -> Self {
        Self {
            name: env!("CARGO_PKG_NAME").into(),
            version: env!("CARGO_PKG_VERSION").into(),
        }
    }
}

/// Effect of a notification on the session it belongs to.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotificationEffect {
    /// Mark the session initialized.
    MarkInitialized,
    /// Nothing to do.
    Ignored,
}

/// Shared JSON-RPC semantics for both transports.
pub struct Dispatcher {
    registry: Arc<ToolRegistry>,
    policy: Arc<dyn PolicyGuard>,
    audit: Arc<dyn AuditSink>,
    activity: ActivityFeed,
    clock: Arc<dyn TimeProvider>,
    server_info: ServerInfo,
}

impl Dispatcher {
    /// Create a dispatcher over its collaborators.
    #[must_use]
    pub fn new(
        registry: Arc<ToolRegistry>,
        policy: Arc<dyn PolicyGuard>,
        audit: Arc<dyn AuditSink>,
        activity: ActivityFeed,
    ) -> Self {
        Self {
            registry,
            policy,
            audit,
            activity,
            clock: Arc::new(RealTimeProvider),
            server_info: ServerInfo::default(),
        }
    }

    /// Use a custom clock for audit timestamps.
    #[must_use]
    pub fn with_clock(mut self, clock: Arc<dyn TimeProvider>) -> Self {
        self.clock = clock;
        self
    }

    /// Override the reported server name and version.
    #[must_use]
    pub fn with_server_info(mut self, server_info: ServerInfo) -> Self {
        self.server_info = server_info;
        self
    }

    /// Tool registry.
    #[must_use]
    pub const fn registry(&self) -> &Arc<ToolRegistry> {
        &self.registry
    }

    /// Policy guard.
    #[must_use]
    pub fn policy(&self) -> &dyn PolicyGuard {
        self.policy.as_ref()
    }

    /// Observer feed.
    #[must_use]
    pub const fn activity(&self) -> &ActivityFeed {
        &self.activity
    }

    /// Reported server name and version.
    #[must_use]
    pub const fn server_info(&self) -> &ServerInfo {
        &self.server_info
    }

    /// Answer a request, wrapping the outcome in a JSON-RPC response.
    pub async fn handle_request(&self, id: Value, method: &str, params: &Value) -> RpcResponse {
        self.activity.request("mcp", method);
        match self.dispatch(method, params).await {
            Ok(result) => RpcResponse::success(id, result),
            Err(err) => {
                debug!(method, code = err.code(), error = %err, "Request failed");
                self.activity.error("mcp", format!("{method}: {err}"));
                RpcResponse::from_error(id, &err)
            }
        }
    }

    /// Route a request by method name.
    ///
    /// # Errors
    ///
    /// Returns the [`McpError`] to send back to the client.
    pub async fn dispatch(&self, method: &str, params: &Value) -> Result<Value, McpError> {
        match method {
            "initialize" => self.initialize(params),
            "ping" => Ok(json!({})),
            "tools/list" => Ok(self.list_tools()),
            "tools/call" => {
                let name = params
                    .get("name")
                    .and_then(Value::as_str)
                    .ok_or_else(|| McpError::InvalidParams {
                        message: "Missing or invalid 'name' in params".into(),
                    })?;
                let arguments = match params.get("arguments") {
                    None | Some(Value::Null) => json!({}),
                    Some(arguments) if arguments.is_object() => arguments.clone(),
                    Some(_) => {
                        return Err(McpError::InvalidParams {
                            message: "'arguments' must be an object".into(),
                        })
                    }
                };
                self.call_tool(name, arguments).await
            }
            other => Err(McpError::MethodNotFound {
                method: other.into(),
            }),
        }
    }

    /// Validate the client's proposed version and build the `initialize` result.
    ///
    /// The result always carries the server's own protocol version.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::InvalidRequest`] when the client proposes a
    /// version outside the accepted set.
    pub fn initialize(&self, params: &Value) -> Result<Value, McpError> {
        match params.get("protocolVersion") {
            None | Some(Value::Null) => {}
            Some(Value::String(version)) if is_accepted_version(version) => {}
            Some(Value::String(version)) => return Err(unsupported_version(version)),
            Some(other) => return Err(unsupported_version(&other.to_string())),
        }

        Ok(json!({
            "protocolVersion": SERVER_PROTOCOL_VERSION,
            "capabilities": { "tools": {} },
            "serverInfo": {
                "name": self.server_info.name,
                "version": self.server_info.version,
            }
        }))
    }

    /// `tools/list` result.
    #[must_use]
    pub fn list_tools(&self) -> Value {
        json!({ "tools": self.registry.list() })
    }

    /// Interpret a notification.
    #[must_use]
    pub fn handle_notification(&self, method: &str) -> NotificationEffect {
        if method == "notifications/initialized" {
            NotificationEffect::MarkInitialized
        } else {
            debug!(method, "Ignoring notification");
            NotificationEffect::Ignored
        }
    }

    /// Run the tool-invocation pipeline.
    ///
    /// # Errors
    ///
    /// - [`McpError::UnknownTool`] when no tool of that name is registered;
    ///   neither the policy guard nor the audit sink is consulted
    /// - [`McpError::PolicyDenied`] when the guard rejects the call; the
    ///   handler is not invoked and nothing is audited
    /// - [`McpError::ToolExecution`] when the handler fails or panics
    pub async fn call_tool(&self, name: &str, arguments: Value) -> Result<Value, McpError> {
        let Some(tool) = self.registry.get(name) else {
            return Err(McpError::UnknownTool { tool: name.into() });
        };

        let decision = self.policy.evaluate_tool_call(name, &arguments);
        if !decision.allowed {
            warn!(tool = name, reason = %decision.reason, "Tool call denied by policy");
            self.activity
                .error(name, format!("Policy denied: {}", decision.reason));
            return Err(McpError::PolicyDenied {
                reason: decision.reason,
            });
        }

        let mut entry = AuditEntry::new(
            self.clock.now().format(AUDIT_TIME_FORMAT).to_string(),
            name,
            tool.risk,
            AUDIT_RESULT_EXECUTING,
        )
        .with_details(arguments.clone());
        if tool.requires_confirmation {
            entry = entry.flag_high_risk();
        }
        if let Err(err) = self.audit.log_tool_call(&entry) {
            warn!(tool = name, error = %err, "Audit log write failed");
        }

        self.activity.processing(name, format!("Running {name}"));
        let started = Instant::now();
        let handler = Arc::clone(&tool.handler);
        let outcome = tokio::spawn(async move { handler.invoke(arguments).await }).await;
        let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);

        match outcome {
            Ok(Ok(result)) => {
                info!(tool = name, elapsed_ms, "Tool call completed");
                self.activity
                    .success(name, format!("Completed in {elapsed_ms}ms"));
                Ok(result)
            }
            Ok(Err(err)) => {
                warn!(tool = name, elapsed_ms, error = %err, "Tool call failed");
                self.activity.error(name, err.to_string());
                Err(McpError::ToolExecution {
                    message: err.to_string(),
                })
            }
            Err(join_err) => {
                error!(tool = name, error = %join_err, "Tool handler aborted");
                self.activity.error(name, "handler aborted");
                Err(McpError::ToolExecution {
                    message: "tool handler aborted unexpectedly".into(),
                })
            }
        }
    }
}

impl std::fmt::Debug for Dispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Dispatcher")
            .field("tools", &self.registry.len())
            .field("server_info", &self.server_info)
            .finish_non_exhaustive()
    }
}

fn unsupported_version(version: &str) -> McpError {
    McpError::invalid_request(format!(
        "Unsupported client protocol version: {version}. Supported: {}",
        ACCEPTED_PROTOCOL_VERSIONS.join(", ")
    ))
}
