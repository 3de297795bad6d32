//! Request routing.
//!
//! Order: CORS preflight, `/health`, authorization, then dispatch by path.

use serde_json::json;

use super::rest;
use super::types::AppState;
use crate::http::{HttpRequest, HttpResponse};
use crate::transport::{sse, streamable};

/// Methods advertised in preflight responses.
pub const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";

/// Headers advertised in preflight responses.
pub const ALLOW_HEADERS: &str = "Content-Type, Authorization, MCP-Session-Id, MCP-Protocol-Version";

/// What the connection handler should do with a request.
#[derive(Debug)]
pub enum Route {
    /// Write this response and close.
    Respond(HttpResponse),
    /// Hand the connection to the streaming transport.
    OpenStream,
}

/// Route one framed request.
pub async fn route(state: &AppState, request: &HttpRequest) -> Route {
    if request.is_method("OPTIONS") {
        return Route::Respond(preflight());
    }
    if request.path == "/health" {
        return Route::Respond(rest::health(state));
    }
    if !state.authorizer.authorize(request) {
        return Route::Respond(HttpResponse::error(401, "unauthorized"));
    }

    let response = match request.path.as_str() {
        "/sse" if request.is_method("GET") => return Route::OpenStream,
        "/sse" => HttpResponse::error(405, "Method Not Allowed").with_header("Allow", "GET, OPTIONS"),
        "/messages" if request.is_method("POST") => sse::handle_message(state, request).await,
        "/messages" => {
            HttpResponse::error(405, "Method Not Allowed").with_header("Allow", "POST, OPTIONS")
        }
        "/mcp" => streamable::handle(state, request).await,
        _ => rest::handle(state, request).await,
    };
    Route::Respond(response)
}

/// CORS preflight response.
#[must_use]
pub fn preflight() -> HttpResponse {
    HttpResponse::new(200)
        .with_header("Access-Control-Allow-Methods", ALLOW_METHODS)
        .with_header("Access-Control-Allow-Headers", ALLOW_HEADERS)
        .with_header("Access-Control-Max-Age", "86400")
}

/// 500 response for a handler that failed to produce one.
#[must_use]
pub fn internal_error() -> HttpResponse {
    HttpResponse::json(500, &json!({"error": "internal_error"}))
}
