//! Built-in tools registered at startup.
//!
//! Each tool is a [`ToolHandler`] with a `schemars`-derived argument type.
//! OS integrations that are not built in (clipboard, screenshots, window and
//! process listing, disks, search) are left unregistered.

mod command;
mod filesystem;

pub use command::{ExecuteCommandArgs, ExecuteCommandTool};
pub use filesystem::{
    ListDirectoryArgs, ListDirectoryTool, ReadFileArgs, ReadFileTool, DEFAULT_MAX_READ_BYTES,
};

use std::sync::Arc;

use schemars::JsonSchema;
use serde::de::DeserializeOwned;
use serde_json::{json, Value};
use tracing::info;

use crate::config::Config;
use crate::error::ToolError;
use crate::registry::{ToolDescriptor, ToolRegistry};
use crate::traits::{RiskLevel, ToolHandler};

/// Tool name for reading files.
pub const READ_FILE: &str = "read_file";
/// Tool name for listing directories.
pub const LIST_DIRECTORY: &str = "list_directory";
/// Tool name for running commands.
pub const EXECUTE_COMMAND: &str = "execute_command";

/// Register the built-in tools.
pub fn register_builtin_tools(registry: &ToolRegistry, config: &Config) {
    registry.register(
        ToolDescriptor::new(
            READ_FILE,
            "Read a text file from the local filesystem",
            Arc::new(ReadFileTool::default()) as Arc<dyn ToolHandler>,
        )
        .with_schema(schema_of::<ReadFileArgs>())
        .with_risk(RiskLevel::Low),
    );
    registry.register(
        ToolDescriptor::new(
            LIST_DIRECTORY,
            "List the entries of a local directory",
            Arc::new(ListDirectoryTool) as Arc<dyn ToolHandler>,
        )
        .with_schema(schema_of::<ListDirectoryArgs>())
        .with_risk(RiskLevel::Low),
    );
    registry.register(
        ToolDescriptor::new(
            EXECUTE_COMMAND,
            "Run an allow-listed command and capture its output",
            Arc::new(ExecuteCommandTool::new(config.command_timeout())) as Arc<dyn ToolHandler>,
        )
        .with_schema(schema_of::<ExecuteCommandArgs>())
        .with_risk(RiskLevel::Critical)
        .requiring_confirmation(),
    );
    info!(tools = registry.len(), "Built-in tools registered");
}

/// JSON schema for an argument type.
#[must_use]
pub fn schema_of<T: JsonSchema>() -> Value {
    serde_json::to_value(schemars::schema_for!(T))
        .unwrap_or_else(|_| json!({"type": "object"}))
}

/// Deserialize tool arguments.
///
/// # Errors
///
/// Returns [`ToolError::InvalidArguments`] when `arguments` does not match `T`.
pub fn parse_arguments<T: DeserializeOwned>(arguments: Value) -> Result<T, ToolError> {
    serde_json::from_value(arguments).map_err(|e| ToolError::InvalidArguments {
        message: e.to_string(),
    })
}

/// Wrap text in the tool result shape.
#[must_use]
pub fn text_result(text: impl Into<String>, is_error: bool) -> Value {
    json!({
        "content": [{"type": "text", "text": text.into()}],
        "isError": is_error,
    })
}
