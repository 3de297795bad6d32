//! Error types for the desk bridge.
//!
//! This module defines a hierarchical error system:
//! - [`AppError`]: Startup errors (configuration or listener)
//! - [`ConfigError`]: Configuration errors
//! - [`FrameError`]: HTTP framing errors (transport level, never answered)
//! - [`ServerError`]: Listener startup and socket errors
//! - [`McpError`]: JSON-RPC protocol errors with their wire codes
//! - [`ToolError`]: Failures raised by tool handlers
//! - [`AuditError`]: Audit log write failures
//!
//! All errors implement `Send + Sync` for async compatibility.

use thiserror::Error;

/// Top-level application error.
///
/// Returned by the startup path ([`McpServer::run`](crate::server::McpServer::run)
/// and the binary), which can fail on configuration or on the listener.
#[derive(Debug, Error)]
pub enum AppError {
    /// Configuration error.
    #[error("Configuration error: {0}")]
    Config(#[from] ConfigError),

    /// Listener or socket error.
    #[error("Server error: {0}")]
    Server(#[from] ServerError),
}

/// Configuration errors.
///
/// These errors represent failures in configuration loading and validation.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ConfigError {
    /// Configuration value is invalid.
    #[error("Invalid value for {var}: {reason}")]
    InvalidValue {
        /// The variable name.
        var: String,
        /// Why the value is invalid.
        reason: String,
    },
}

/// HTTP framing errors.
///
/// Every variant drops the connection without a response body.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum FrameError {
    /// Peer closed the connection before sending anything.
    #[error("Connection closed before any data was received")]
    ConnectionClosed,

    /// Peer closed the connection before the header terminator arrived.
    #[error("Connection closed after {received} bytes without a complete header block")]
    IncompleteHeaders {
        /// Bytes received before the close.
        received: usize,
    },

    /// Header block exceeded the cap without a terminator.
    #[error("Header block exceeds {limit} bytes")]
    HeaderTooLarge {
        /// The configured header cap.
        limit: usize,
    },

    /// Declared body length exceeded the cap.
    #[error("Declared body of {declared} bytes exceeds {limit} bytes")]
    BodyTooLarge {
        /// The declared `Content-Length`.
        declared: usize,
        /// The configured body cap.
        limit: usize,
    },

    /// Framing did not complete within the receive timeout.
    #[error("Receive timeout after {timeout_ms}ms")]
    Timeout {
        /// Timeout duration in milliseconds.
        timeout_ms: u64,
    },

    /// Request line or headers could not be parsed.
    #[error("Malformed request: {message}")]
    Malformed {
        /// Description of the parse failure.
        message: String,
    },

    /// Socket read failure.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },
}

/// Listener and socket errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ServerError {
    /// Binding the listening socket failed.
    #[error("Failed to bind {addr}: {message}")]
    Bind {
        /// The address that could not be bound.
        addr: String,
        /// Description of the bind failure.
        message: String,
    },

    /// Socket failure after startup.
    #[error("I/O error: {message}")]
    Io {
        /// Description of the I/O failure.
        message: String,
    },

    /// The listener exited before reporting readiness.
    #[error("Listener stopped before it became ready")]
    NotStarted,
}

/// MCP protocol errors.
///
/// Each variant maps to one JSON-RPC error code via [`McpError::code`]; the
/// `Display` output is the wire message.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum McpError {
    /// Body was not valid JSON.
    #[error("Parse error: {message}")]
    ParseError {
        /// Parser diagnostic.
        message: String,
    },

    /// Structurally invalid JSON-RPC message.
    #[error("{message}")]
    InvalidRequest {
        /// Description of what's invalid.
        message: String,
    },

    /// Unknown method requested.
    #[error("Method not found: {method}")]
    MethodNotFound {
        /// The unknown method name.
        method: String,
    },

    /// Unknown tool requested.
    #[error("Unknown tool: {tool}")]
    UnknownTool {
        /// The unknown tool name.
        tool: String,
    },

    /// Invalid method parameters.
    #[error("{message}")]
    InvalidParams {
        /// Description of what's invalid.
        message: String,
    },

    /// Policy guard rejected a tool call.
    #[error("Policy denied: {reason}")]
    PolicyDenied {
        /// Reason supplied by the guard.
        reason: String,
    },

    /// Tool handler failed.
    #[error("Tool execution error: {message}")]
    ToolExecution {
        /// Failure message from the handler.
        message: String,
    },
}

/// JSON-RPC parse error code.
pub const PARSE_ERROR: i64 = -32700;
/// JSON-RPC invalid request code.
pub const INVALID_REQUEST: i64 = -32600;
/// JSON-RPC method not found code.
pub const METHOD_NOT_FOUND: i64 = -32601;
/// JSON-RPC invalid params code.
pub const INVALID_PARAMS: i64 = -32602;
/// Server error code, used for policy denial and tool failure alike.
pub const SERVER_ERROR: i64 = -32000;

impl McpError {
    /// Returns the JSON-RPC error code for this error.
    #[must_use]
    pub const fn code(&self) -> i64 {
        match self {
            Self::ParseError { .. } => PARSE_ERROR,
            Self::InvalidRequest { .. } => INVALID_REQUEST,
            Self::MethodNotFound { .. } | Self::UnknownTool { .. } => METHOD_NOT_FOUND,
            Self::InvalidParams { .. } => INVALID_PARAMS,
            Self::PolicyDenied { .. } | Self::ToolExecution { .. } => SERVER_ERROR,
        }
    }

    /// Shorthand for [`McpError::InvalidRequest`].
    #[must_use]
    pub fn invalid_request(message: impl Into<String>) -> Self {
        Self::InvalidRequest {
            message: message.into(),
        }
    }
}

/// Tool handler errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum ToolError {
    /// Arguments did not match the tool's schema.
    #[error("Invalid arguments: {message}")]
    InvalidArguments {
        /// Description of what's invalid.
        message: String,
    },

    /// The underlying operation failed.
    #[error("{message}")]
    Execution {
        /// Description of the failure.
        message: String,
    },

    /// Capability not present on this host.
    #[error("{tool} is not available on this host")]
    Unavailable {
        /// The tool name.
        tool: String,
    },
}

impl ToolError {
    /// Shorthand for [`ToolError::Execution`].
    #[must_use]
    pub fn execution(message: impl Into<String>) -> Self {
        Self::Execution {
            message: message.into(),
        }
    }
}

/// Audit logging errors.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
pub enum AuditError {
    /// Opening or writing the log file failed.
    #[error("Audit log I/O failed for {path}: {message}")]
    Io {
        /// The log file path.
        path: String,
        /// Description of the failure.
        message: String,
    },
}
