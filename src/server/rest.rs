//! Plain REST endpoints.
//!
//! Path- and command-taking endpoints check the policy guard up front, then
//! run the matching tool through the same pipeline as `tools/call`, so REST
//! calls are audited exactly like RPC calls. Endpoints backed by OS
//! integrations answer 501 when no tool provides them.

use std::path::Path;

use serde_json::{json, Value};
use tracing::{debug, info, warn};

use super::types::AppState;
use crate::error::{McpError, ToolError};
use crate::http::{HttpRequest, HttpResponse};
use crate::protocol::SERVER_PROTOCOL_VERSION;
use crate::tools::{EXECUTE_COMMAND, LIST_DIRECTORY, READ_FILE};

/// Endpoints listed on `/`, `/help` and in 404 bodies.
pub const ENDPOINTS: &[&str] = &[
    "GET /health",
    "GET|POST /status",
    "GET /help",
    "GET /disks",
    "GET /list?path=",
    "GET /read?path=",
    "GET /search?path=&query=",
    "GET|PUT /clipboard",
    "GET /clipboard/image/<name>",
    "GET /clipboard/file/<name>",
    "GET /screenshot",
    "GET /screenshot/file/<name>",
    "GET /windows",
    "GET /processes",
    "POST /execute",
    "GET /sse",
    "POST /messages?sessionId=",
    "POST /mcp",
    "POST /mcp/initialize",
    "GET|POST /mcp/tools/list",
    "POST /mcp/tools/call",
    "POST /exit",
];

/// Days of audit history summarised on `/status`.
pub const STATUS_AUDIT_DAYS: u32 = 7;

/// Tool backing `/search`.
pub const SEARCH_FILES: &str = "search_files";
/// Tool backing `/disks`.
pub const LIST_DISKS: &str = "list_disks";
/// Tool backing `GET /clipboard`.
pub const GET_CLIPBOARD: &str = "get_clipboard";
/// Tool backing `PUT /clipboard`.
pub const SET_CLIPBOARD: &str = "set_clipboard";
/// Tool backing `/screenshot`.
pub const TAKE_SCREENSHOT: &str = "take_screenshot";
/// Tool backing `/windows`.
pub const LIST_WINDOWS: &str = "list_windows";
/// Tool backing `/processes`.
pub const LIST_PROCESSES: &str = "list_processes";

const ARTIFACT_ROUTES: &[(&str, &str)] = &[
    ("/screenshot/file/", "screenshots"),
    ("/clipboard/image/", "clipboard_images"),
    ("/clipboard/file/", "clipboard_files"),
];

/// Dispatch a REST request. Unknown paths yield 404.
pub async fn handle(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let method = request.method.to_ascii_uppercase();
    let path = request.path.as_str();

    match (method.as_str(), path) {
        ("GET" | "POST", "/status" | "/sts") => status(state).await,
        ("GET", "/" | "/help") => help(state),
        ("POST", "/exit") => exit(state),
        ("GET", "/list") => path_tool(state, request, LIST_DIRECTORY).await,
        ("GET", "/read") => path_tool(state, request, READ_FILE).await,
        ("GET", "/search") => path_tool(state, request, SEARCH_FILES).await,
        ("POST", "/execute") => execute(state, request).await,
        ("GET", "/disks") => optional_tool(state, LIST_DISKS, json!({})).await,
        ("GET", "/clipboard") => optional_tool(state, GET_CLIPBOARD, json!({})).await,
        ("PUT", "/clipboard") => match body_object(request) {
            Ok(arguments) => optional_tool(state, SET_CLIPBOARD, arguments).await,
            Err(response) => response,
        },
        ("GET", "/screenshot") => optional_tool(state, TAKE_SCREENSHOT, json!({})).await,
        ("GET", "/windows") => optional_tool(state, LIST_WINDOWS, json!({})).await,
        ("GET", "/processes") => optional_tool(state, LIST_PROCESSES, json!({})).await,
        ("POST", "/mcp/initialize") => legacy_initialize(state, request),
        ("GET" | "POST", "/mcp/tools/list") => {
            HttpResponse::json(200, &state.dispatcher.list_tools())
        }
        ("POST", "/mcp/tools/call") => legacy_call(state, request).await,
        ("GET", _) => match artifact_route(path) {
            Some((kind, name)) => artifact(state, kind, name).await,
            None => not_found(),
        },
        _ => not_found(),
    }
}

/// `GET /health`, answered without authorization.
#[must_use]
pub fn health(state: &AppState) -> HttpResponse {
    HttpResponse::json(
        200,
        &json!({
            "status": "ok",
            "version": env!("CARGO_PKG_VERSION"),
            "uptime_seconds": state.uptime_secs(),
            "sse_sessions": state.streaming.len(),
        }),
    )
}

async fn status(state: &AppState) -> HttpResponse {
    // Hostname lookup and the audit file scan both block.
    let audit_log = state.audit_log.clone();
    let (computer_name, audit_stats) = tokio::task::spawn_blocking(move || {
        let computer_name = hostname::get()
            .map(|name| name.to_string_lossy().into_owned())
            .unwrap_or_else(|_| "unknown".into());
        let audit_stats = audit_log.map_or(Value::Null, |log| json!(log.stats(STATUS_AUDIT_DAYS)));
        (computer_name, audit_stats)
    })
    .await
    .unwrap_or_else(|e| {
        warn!("Status lookup task failed: {e}");
        ("unknown".into(), Value::Null)
    });

    HttpResponse::json(
        200,
        &json!({
            "status": "running",
            "version": env!("CARGO_PKG_VERSION"),
            "protocol_version": SERVER_PROTOCOL_VERSION,
            "computer_name": computer_name,
            "port": state.port(),
            "listen_address": state.config.listen_address.to_string(),
            "uptime_seconds": state.uptime_secs(),
            "sse_sessions": state.streaming.len(),
            "mcp_sessions": state.sessions.len(),
            "tools": state.registry().len(),
            "audit_stats": audit_stats,
            "endpoints": ENDPOINTS,
        }),
    )
}

fn help(state: &AppState) -> HttpResponse {
    let tools: Vec<Value> = state
        .registry()
        .list()
        .into_iter()
        .map(|tool| json!({"name": tool.name, "description": tool.description}))
        .collect();
    HttpResponse::json(
        200,
        &json!({
            "name": state.dispatcher.server_info().name,
            "version": state.dispatcher.server_info().version,
            "endpoints": ENDPOINTS,
            "tools": tools,
        }),
    )
}

fn exit(state: &AppState) -> HttpResponse {
    info!("Shutdown requested over HTTP");
    state.shutdown.cancel();
    HttpResponse::json(200, &json!({"status": "shutting down"}))
}

fn not_found() -> HttpResponse {
    HttpResponse::json(
        404,
        &json!({"error": "Not Found", "available_endpoints": ENDPOINTS}),
    )
}

async fn path_tool(state: &AppState, request: &HttpRequest, tool: &str) -> HttpResponse {
    let Some(path) = request.query_param("path").filter(|p| !p.is_empty()) else {
        return HttpResponse::error(400, "missing 'path' parameter");
    };
    if !state.policy().is_path_allowed(&path) {
        debug!(path = %path, tool, "REST path rejected by policy");
        return HttpResponse::error(403, "path not allowed");
    }

    let mut arguments = json!({ "path": path });
    if let Some(query) = request.query_param("query") {
        arguments["query"] = Value::String(query);
    }
    optional_tool(state, tool, arguments).await
}

async fn execute(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let arguments = match body_object(request) {
        Ok(arguments) => arguments,
        Err(response) => return response,
    };
    let Some(command) = arguments.get("command").and_then(Value::as_str) else {
        return HttpResponse::error(400, "missing 'command' field");
    };
    if !state.policy().is_command_allowed(command) {
        debug!(command, "REST command rejected by policy");
        return HttpResponse::error(403, "command not allowed");
    }
    optional_tool(state, EXECUTE_COMMAND, arguments).await
}

/// Run `tool` if registered, else 501.
async fn optional_tool(state: &AppState, tool: &str, arguments: Value) -> HttpResponse {
    if !state.registry().contains(tool) {
        let err = ToolError::Unavailable { tool: tool.into() };
        return HttpResponse::error(501, &err.to_string());
    }
    match state.dispatcher.call_tool(tool, arguments).await {
        Ok(result) => HttpResponse::json(200, &result),
        Err(err) => mcp_error_response(&err),
    }
}

fn mcp_error_response(err: &McpError) -> HttpResponse {
    let status = match err {
        McpError::ParseError { .. }
        | McpError::InvalidRequest { .. }
        | McpError::InvalidParams { .. } => 400,
        McpError::MethodNotFound { .. } | McpError::UnknownTool { .. } => 404,
        McpError::PolicyDenied { .. } => 403,
        McpError::ToolExecution { .. } => 500,
    };
    HttpResponse::error(status, &err.to_string())
}

fn body_object(request: &HttpRequest) -> Result<Value, HttpResponse> {
    if request.body.is_empty() {
        return Ok(json!({}));
    }
    match serde_json::from_slice::<Value>(&request.body) {
        Ok(value) if value.is_object() => Ok(value),
        Ok(_) => Err(HttpResponse::error(400, "Expected JSON object")),
        Err(err) => Err(HttpResponse::error(400, &format!("Parse error: {err}"))),
    }
}

fn legacy_initialize(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let params = match body_object(request) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.dispatcher.initialize(&params) {
        Ok(result) => HttpResponse::json(200, &result),
        Err(err) => mcp_error_response(&err),
    }
}

async fn legacy_call(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let params = match body_object(request) {
        Ok(params) => params,
        Err(response) => return response,
    };
    match state.dispatcher.dispatch("tools/call", &params).await {
        Ok(result) => HttpResponse::json(200, &result),
        Err(err) => mcp_error_response(&err),
    }
}

/// Split an artifact path into its storage directory and file name.
fn artifact_route(path: &str) -> Option<(&'static str, &str)> {
    ARTIFACT_ROUTES
        .iter()
        .find_map(|(prefix, kind)| path.strip_prefix(prefix).map(|name| (*kind, name)))
}

/// Returns true for names made of `[A-Za-z0-9._-]` that do not start with a dot.
#[must_use]
pub fn is_valid_artifact_name(name: &str) -> bool {
    !name.is_empty()
        && !name.starts_with('.')
        && name
            .bytes()
            .all(|b| b.is_ascii_alphanumeric() || matches!(b, b'.' | b'_' | b'-'))
}

fn content_type_for(name: &str) -> &'static str {
    let extension = Path::new(name)
        .extension()
        .map(|e| e.to_string_lossy().to_ascii_lowercase());
    match extension.as_deref() {
        Some("png") => "image/png",
        Some("jpg" | "jpeg") => "image/jpeg",
        Some("gif") => "image/gif",
        Some("bmp") => "image/bmp",
        Some("txt") => "text/plain; charset=utf-8",
        Some("json") => "application/json",
        _ => "application/octet-stream",
    }
}

async fn artifact(state: &AppState, kind: &str, name: &str) -> HttpResponse {
    if !is_valid_artifact_name(name) {
        return HttpResponse::error(400, "invalid file name");
    }
    let path = state.config.artifacts_dir.join(kind).join(name);
    match tokio::fs::read(&path).await {
        Ok(bytes) => HttpResponse::bytes(200, content_type_for(name), bytes),
        Err(err) => {
            debug!(path = %path.display(), error = %err, "Artifact not readable");
            HttpResponse::error(404, "file not found")
        }
    }
}
