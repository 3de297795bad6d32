//! Allow-list policy guard.
//!
//! Paths are compared lexically: the candidate is normalised (`.` dropped,
//! `..` folded) and must sit under one of the configured directories. A `..`
//! that would climb above the path's root is rejected outright. Commands are
//! matched by their first whitespace-separated token.

use std::path::{Component, Path, PathBuf};

use serde_json::Value;
use tracing::debug;

use crate::config::Config;
use crate::traits::{PolicyDecision, PolicyGuard};

/// Policy built from the `ALLOWED_DIRS` and `ALLOWED_COMMANDS` lists.
#[derive(Debug, Clone, Default)]
pub struct AllowListPolicy {
    allowed_dirs: Vec<PathBuf>,
    allowed_commands: Vec<String>,
}

impl AllowListPolicy {
    /// Create a policy.
    ///
    /// An empty directory list allows every path; an empty command list
    /// allows no command.
    #[must_use]
    pub fn new(allowed_dirs: Vec<PathBuf>, allowed_commands: Vec<String>) -> Self {
        let allowed_dirs = allowed_dirs
            .iter()
            .filter_map(|dir| normalize(dir))
            .collect();
        Self {
            allowed_dirs,
            allowed_commands,
        }
    }

    /// Create a policy from configuration.
    #[must_use]
    pub fn from_config(config: &Config) -> Self {
        Self::new(config.allowed_dirs.clone(), config.allowed_commands.clone())
    }
}

impl PolicyGuard for AllowListPolicy {
    fn evaluate_tool_call(&self, tool: &str, arguments: &Value) -> PolicyDecision {
        if let Some(path) = arguments.get("path").and_then(Value::as_str) {
            if !self.is_path_allowed(path) {
                debug!(tool, path, "Path outside allow-list");
                return PolicyDecision::deny(format!("path not allowed: {path}"));
            }
        }
        if let Some(command) = arguments.get("command").and_then(Value::as_str) {
            if !self.is_command_allowed(command) {
                debug!(tool, command, "Command outside allow-list");
                return PolicyDecision::deny(format!("command not allowed: {command}"));
            }
        }
        PolicyDecision::allow()
    }

    fn is_path_allowed(&self, path: &str) -> bool {
        if path.trim().is_empty() {
            return false;
        }
        let Some(candidate) = normalize(Path::new(path)) else {
            return false;
        };
        if self.allowed_dirs.is_empty() {
            return true;
        }
        self.allowed_dirs.iter().any(|dir| candidate.starts_with(dir))
    }

    fn is_command_allowed(&self, command: &str) -> bool {
        let Some(program) = command.split_whitespace().next() else {
            return false;
        };
        self.allowed_commands.iter().any(|allowed| allowed == program)
    }
}

/// Lexically normalise `path`. Returns `None` when `..` escapes the root.
fn normalize(path: &Path) -> Option<PathBuf> {
    let mut out = PathBuf::new();
    let mut depth = 0usize;
    for component in path.components() {
        match component {
            Component::Prefix(_) | Component::RootDir => out.push(component.as_os_str()),
            Component::CurDir => {}
            Component::ParentDir => {
                if depth == 0 {
                    return None;
                }
                out.pop();
                depth -= 1;
            }
            Component::Normal(part) => {
                out.push(part);
                depth += 1;
            }
        }
    }
    Some(out)
}
