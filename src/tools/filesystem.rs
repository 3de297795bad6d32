//! File reading and directory listing.

use async_trait::async_trait;
use schemars::JsonSchema;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::io::AsyncReadExt;

use super::{parse_arguments, text_result};
use crate::error::ToolError;
use crate::traits::ToolHandler;

/// Default read cap for `read_file`.
pub const DEFAULT_MAX_READ_BYTES: u64 = 1024 * 1024;

/// Arguments of `read_file`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ReadFileArgs {
    /// File to read.
    pub path: String,
    /// Maximum bytes to return (default 1 MiB).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
}

/// Arguments of `list_directory`.
#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct ListDirectoryArgs {
    /// Directory to list.
    pub path: String,
}

/// Reads a file as UTF-8 text, lossily.
#[derive(Debug, Clone, Copy)]
pub struct ReadFileTool {
    max_bytes: u64,
}

impl Default for ReadFileTool {
    fn default() -> Self {
        Self {
            max_bytes: DEFAULT_MAX_READ_BYTES,
        }
    }
}

impl ReadFileTool {
    /// Create a tool with a custom default cap.
    #[must_use]
    pub const fn new(max_bytes: u64) -> Self {
        Self { max_bytes }
    }
}

#[async_trait]
impl ToolHandler for ReadFileTool {
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ReadFileArgs = parse_arguments(arguments)?;
        let limit = args.max_bytes.unwrap_or(self.max_bytes);

        let file = tokio::fs::File::open(&args.path)
            .await
            .map_err(|e| ToolError::execution(format!("{}: {e}", args.path)))?;
        let size = file.metadata().await.map(|m| m.len()).unwrap_or(0);

        let mut buf = Vec::new();
        file.take(limit)
            .read_to_end(&mut buf)
            .await
            .map_err(|e| ToolError::execution(format!("{}: {e}", args.path)))?;

        let mut text = String::from_utf8_lossy(&buf).into_owned();
        if size > limit {
            text = format!("{text}\n[truncated: {limit} of {size} bytes]");
        }
        Ok(text_result(text, false))
    }
}

/// One directory entry.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
struct DirEntry {
    name: String,
    is_dir: bool,
    size: u64,
}

/// Lists a directory as JSON text.
#[derive(Debug, Clone, Copy, Default)]
pub struct ListDirectoryTool;

#[async_trait]
impl ToolHandler for ListDirectoryTool {
    async fn invoke(&self, arguments: Value) -> Result<Value, ToolError> {
        let args: ListDirectoryArgs = parse_arguments(arguments)?;

        let mut reader = tokio::fs::read_dir(&args.path)
            .await
            .map_err(|e| ToolError::execution(format!("{}: {e}", args.path)))?;

        let mut entries = Vec::new();
        while let Some(entry) = reader
            .next_entry()
            .await
            .map_err(|e| ToolError::execution(format!("{}: {e}", args.path)))?
        {
            let metadata = entry.metadata().await.ok();
            entries.push(DirEntry {
                name: entry.file_name().to_string_lossy().into_owned(),
                is_dir: metadata.as_ref().is_some_and(std::fs::Metadata::is_dir),
                size: metadata.as_ref().map_or(0, std::fs::Metadata::len),
            });
        }
        entries.sort_by(|a, b| a.name.cmp(&b.name));

        let listing = serde_json::json!({ "path": args.path, "entries": entries });
        Ok(text_result(listing.to_string(), false))
    }
}
