//! Request/response transport on `POST /mcp`.
//!
//! Every call is answered synchronously. `initialize` creates a session and
//! returns its id in the `MCP-Session-Id` header; every other request must
//! carry that header. Notifications and client responses get an empty
//! `202 Accepted`.

use serde_json::Value;
use tracing::debug;

use super::rpc_error_response;
use crate::error::{INVALID_REQUEST, SERVER_ERROR};
use crate::http::{HttpRequest, HttpResponse};
use crate::protocol::{
    is_accepted_version, NotificationEffect, RpcMessage, RpcResponse, ACCEPTED_PROTOCOL_VERSIONS,
    SERVER_PROTOCOL_VERSION,
};
use crate::server::AppState;

/// Header carrying the session id.
pub const SESSION_HEADER: &str = "MCP-Session-Id";

/// Header carrying the client's protocol version.
pub const PROTOCOL_VERSION_HEADER: &str = "MCP-Protocol-Version";

/// Returns true when the `Origin` header names a loopback host.
///
/// The host is taken from `scheme://host[:port][/path]`; origins without a
/// scheme are rejected.
#[must_use]
pub fn is_loopback_origin(origin: &str) -> bool {
    let Some((_, rest)) = origin.split_once("://") else {
        return false;
    };
    let host_port = rest.split('/').next().unwrap_or_default();
    let host = host_port.split(':').next().unwrap_or_default();
    host == "localhost" || host == "127.0.0.1"
}

/// Handle one request on `/mcp`.
pub async fn handle(state: &AppState, request: &HttpRequest) -> HttpResponse {
    if !request.is_method("POST") {
        return HttpResponse::error(405, "Method Not Allowed").with_header("Allow", "POST, OPTIONS");
    }

    if let Some(origin) = request.header("origin").filter(|o| !o.is_empty()) {
        if !is_loopback_origin(origin) {
            debug!(origin, "Rejected non-loopback origin");
            return rpc_error_response(403, Value::Null, SERVER_ERROR, "Origin not allowed");
        }
    }

    if let Some(version) = request
        .header(PROTOCOL_VERSION_HEADER)
        .filter(|v| !v.is_empty())
    {
        if !is_accepted_version(version) {
            return rpc_error_response(
                400,
                Value::Null,
                INVALID_REQUEST,
                &format!(
                    "Unsupported MCP protocol version: {version}. Supported: {}",
                    ACCEPTED_PROTOCOL_VERSIONS.join(", ")
                ),
            );
        }
    }

    let message = match RpcMessage::parse(&request.body) {
        Ok(message) => message,
        Err(err) => return rpc_json(&RpcResponse::from_error(Value::Null, &err)),
    };

    match message {
        RpcMessage::Invalid { id, error } => rpc_json(&RpcResponse::from_error(id, &error)),
        RpcMessage::Response { .. } => HttpResponse::accepted(),
        RpcMessage::Notification { method, .. } => {
            if state.dispatcher.handle_notification(&method) == NotificationEffect::MarkInitialized
            {
                if let Some(id) = request.header(SESSION_HEADER) {
                    state.sessions.mark_initialized(id);
                }
            }
            HttpResponse::accepted()
        }
        RpcMessage::Request { id, method, params } if method == "initialize" => {
            initialize(state, id, &params).await
        }
        RpcMessage::Request { id, method, params } => {
            let Some(session_id) = request.header(SESSION_HEADER).filter(|s| !s.is_empty()) else {
                return rpc_error_response(400, id, INVALID_REQUEST, "Missing MCP-Session-Id header");
            };
            if !state.sessions.contains(session_id) {
                debug!(session_id, "Request for unknown MCP session");
                return rpc_error_response(
                    404,
                    id,
                    INVALID_REQUEST,
                    "Unknown or expired session. Please re-initialize.",
                );
            }
            rpc_json(&state.dispatcher.handle_request(id, &method, &params).await)
        }
    }
}

async fn initialize(state: &AppState, id: Value, params: &Value) -> HttpResponse {
    let response = state.dispatcher.handle_request(id, "initialize", params).await;
    if response.is_error() {
        return rpc_json(&response);
    }

    let session = state.sessions.create(SERVER_PROTOCOL_VERSION);
    state
        .activity()
        .success("mcp", format!("initialize OK, session={}", session.id));
    rpc_json(&response)
        .with_header(SESSION_HEADER, session.id)
        .with_header("Access-Control-Expose-Headers", SESSION_HEADER)
}

fn rpc_json(response: &RpcResponse) -> HttpResponse {
    HttpResponse::json(200, &response.to_value())
}
