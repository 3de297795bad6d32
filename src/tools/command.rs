//! Command execution.
//!
//! Commands are split on whitespace and run directly, without a shell. The
//! child is killed if the timeout elapses.

use std::process::Stdio;
use std::time::Duration;

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};
use tracing::{debug, warn};

use super::{parse_arguments, text_result};
use crate::error::ToolError;
use crate::traits::ToolHandler;

/// Arguments of `execute_command`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ExecuteCommandArgs {
    /// Command line, program first.
    pub command: String,
}

/// Runs a command and reports its exit code and output.
#[derive(Debug, Clone, Copy)]
pub struct ExecuteCommandTool {
    timeout: Duration,
}

impl ExecuteCommandTool {
    /// Create a tool with the given timeout.
    #[must_use]
    pub const fn new(timeout: Duration) -> Self {
        Self { timeout }
    }
}

#[async_trait]
impl ToolHandler for ExecuteCommandTool {
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ExecuteCommandArgs = parse_arguments(arguments)?;
        let mut parts = args.command.split_whitespace();
        let Some(program) = parts.next() else {
            return Err(ToolError::InvalidArguments {
                message: "command is empty".into(),
            });
        };

        debug!(program, "Spawning command");
        let child = tokio::process::Command::new(program)
            .args(parts)
            .stdin(Stdio::null())
            .stdout(Stdio::piped())
            .stderr(Stdio::piped())
            .kill_on_drop(true)
            .spawn()
            .map_err(|e| ToolError::execution(format!("failed to start {program}: {e}")))?;

        let output = match tokio::time::timeout(self.timeout, child.wait_with_output()).await {
            Ok(result) => result.map_err(|e| ToolError::execution(e.to_string()))?,
            Err(_) => {
                warn!(program, timeout_secs = self.timeout.as_secs(), "Command timed out");
                return Err(ToolError::execution(format!(
                    "command timed out after {}s",
                    self.timeout.as_secs()
                )));
            }
        };

        let report = json!({
            "exit_code": output.status.code(),
            "stdout": String::from_utf8_lossy(&output.stdout),
            "stderr": String::from_utf8_lossy(&output.stderr),
        });
        Ok(text_result(report.to_string(), !output.status.success()))
    }
}
