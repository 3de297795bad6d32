//! JSON-RPC message classification and response shapes.

use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::error::McpError;

/// Required value of the `jsonrpc` field.
pub const JSONRPC_VERSION: &str = "2.0";

/// Protocol version the server advertises and commits to.
pub const SERVER_PROTOCOL_VERSION: &str = "2024-11-05";

/// Protocol versions a client may propose.
pub const ACCEPTED_PROTOCOL_VERSIONS: &[&str] = &["2024-11-05", "2025-03-26"];

/// Returns true when `version` is in [`ACCEPTED_PROTOCOL_VERSIONS`].
#[must_use]
pub fn is_accepted_version(version: &str) -> bool {
    ACCEPTED_PROTOCOL_VERSIONS.contains(&version)
}

/// A classified incoming JSON-RPC message.
#[derive(Debug, Clone, PartialEq)]
pub enum RpcMessage {
    /// Method and id present.
    Request {
        /// Request id, echoed in the response.
        id: Value,
        /// Method name.
        method: String,
        /// Parameters, `{}` when absent.
        params: Value,
    },
    /// Method present, id absent.
    Notification {
        /// Method name.
        method: String,
        /// Parameters, `{}` when absent.
        params: Value,
    },
    /// Result or error present without a method. Never answered.
    Response {
        /// Id of the answered request.
        id: Value,
    },
    /// Anything else.
    Invalid {
        /// Id if the message carried one, else null.
        id: Value,
        /// Why the message is invalid.
        error: McpError,
    },
}

impl RpcMessage {
    /// Parse and classify a request body.
    ///
    /// # Errors
    ///
    /// Returns [`McpError::ParseError`] when the body is not JSON.
    pub fn parse(body: &[u8]) -> Result<Self, McpError> {
        let value: Value = serde_json::from_slice(body).map_err(|err| McpError::ParseError {
            message: err.to_string(),
        })?;
        Ok(Self::classify(value))
    }

    /// Classify a JSON value.
    #[must_use]
    pub fn classify(value: Value) -> Self {
        let mut object = match value {
            Value::Object(object) => object,
            other => {
                let message = if other.is_array() {
                    "Batch requests are not supported"
                } else {
                    "Expected JSON object"
                };
                return Self::Invalid {
                    id: Value::Null,
                    error: McpError::invalid_request(message),
                };
            }
        };

        let id = object.remove("id");

        if object.get("jsonrpc").and_then(Value::as_str) != Some(JSONRPC_VERSION) {
            return Self::Invalid {
                id: id.unwrap_or(Value::Null),
                error: McpError::invalid_request("Missing or invalid 'jsonrpc' field, must be '2.0'"),
            };
        }

        let params = match object.remove("params") {
            None | Some(Value::Null) => Value::Object(serde_json::Map::new()),
            Some(params) => params,
        };

        match (object.remove("method"), id) {
            (Some(Value::String(method)), Some(id)) => Self::Request { id, method, params },
            (Some(Value::String(method)), None) => Self::Notification { method, params },
            (None, id) if object.contains_key("result") || object.contains_key("error") => {
                Self::Response {
                    id: id.unwrap_or(Value::Null),
                }
            }
            (_, id) => Self::Invalid {
                id: id.unwrap_or(Value::Null),
                error: McpError::invalid_request("Missing 'method' field"),
            },
        }
    }
}

/// JSON-RPC error object.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcErrorObject {
    /// Error code.
    pub code: i64,
    /// Error message.
    pub message: String,
    /// Optional structured data.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub data: Option<Value>,
}

/// JSON-RPC response.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RpcResponse {
    /// Always `"2.0"`.
    pub jsonrpc: String,
    /// Id of the request, null when it could not be determined.
    pub id: Value,
    /// Result on success.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub result: Option<Value>,
    /// Error on failure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<RpcErrorObject>,
}

impl RpcResponse {
    /// Success response.
    #[must_use]
    pub fn success(id: Value, result: Value) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: Some(result),
            error: None,
        }
    }

    /// Error response with an explicit code and message.
    #[must_use]
    pub fn error(id: Value, code: i64, message: impl Into<String>) -> Self {
        Self {
            jsonrpc: JSONRPC_VERSION.into(),
            id,
            result: None,
            error: Some(RpcErrorObject {
                code,
                message: message.into(),
                data: None,
            }),
        }
    }

    /// Error response for a protocol error.
    #[must_use]
    pub fn from_error(id: Value, error: &McpError) -> Self {
        Self::error(id, error.code(), error.to_string())
    }

    /// Returns true for error responses.
    #[must_use]
    pub const fn is_error(&self) -> bool {
        self.error.is_some()
    }

    /// Serialize to a JSON value.
    #[must_use]
    pub fn to_value(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
