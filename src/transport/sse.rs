//! Streaming transport.
//!
//! `GET /sse` opens a long-lived event stream. The first event, `endpoint`,
//! carries the absolute URL the client must POST its JSON-RPC messages to.
//! Those POSTs are acknowledged with `202 Accepted` once the session id is
//! validated; responses are pushed back over the stream as `message` events.

use tokio::io::{AsyncRead, AsyncReadExt, AsyncWriteExt};
use tracing::{debug, info, warn};

use super::{rpc_error_response, write_response};
use crate::error::INVALID_REQUEST;
use crate::http::{HttpRequest, HttpResponse};
use crate::protocol::{NotificationEffect, RpcMessage, RpcResponse, SERVER_PROTOCOL_VERSION};
use crate::server::AppState;
use crate::session::{is_valid_session_id, CapacityExceeded, EventWriter, StreamingSession};

/// Response head that opens an event stream. No `Content-Length`.
pub const STREAM_OPEN_HEADERS: &str = "HTTP/1.1 200 OK\r\n\
    Content-Type: text/event-stream\r\n\
    Cache-Control: no-cache\r\n\
    Connection: keep-alive\r\n\
    Access-Control-Allow-Origin: *\r\n\r\n";

/// Body of the 503 sent when the store is full.
pub const CAPACITY_MESSAGE: &str = "Too many SSE sessions, try later";

/// Absolute URL for the `endpoint` event.
///
/// Uses the request's `Host` header when present, else loopback and `port`.
#[must_use]
pub fn endpoint_url(host: Option<&str>, port: u16, session_id: &str) -> String {
    match host.map(str::trim).filter(|h| !h.is_empty()) {
        Some(host) => format!("http://{host}/messages?sessionId={session_id}"),
        None => format!("http://127.0.0.1:{port}/messages?sessionId={session_id}"),
    }
}

/// Serve an authorized `GET /sse` until the client goes away, the session
/// dies or the server shuts down.
///
/// `reader` is the read half of the connection; reaching EOF on it ends the
/// stream early. `writer` is handed to the session store.
pub async fn serve_stream<R>(state: &AppState, request: &HttpRequest, mut reader: R, writer: EventWriter)
where
    R: AsyncRead + Unpin,
{
    let session = match state.streaming.create(writer).await {
        Ok(session) => session,
        Err(CapacityExceeded {
            mut writer,
            max_sessions,
        }) => {
            warn!(max_sessions, "Stream session capacity reached");
            let response = HttpResponse::error(503, CAPACITY_MESSAGE);
            write_response(&mut writer, &response, state.transport.send_timeout).await;
            let _ = writer.shutdown().await;
            return;
        }
    };

    if open(state, request, &session).await {
        keep_alive(state, &session, &mut reader).await;
    }

    state.streaming.remove(session.id()).await;
    session.close().await;
    debug!(session_id = %session.id(), "Stream ended");
}

async fn open(state: &AppState, request: &HttpRequest, session: &StreamingSession) -> bool {
    if !session.write_frame(STREAM_OPEN_HEADERS.as_bytes()).await {
        debug!(session_id = %session.id(), "Failed to write stream headers");
        return false;
    }

    let url = endpoint_url(request.header("host"), state.port(), session.id());
    if !session.send_event("endpoint", &url).await {
        debug!(session_id = %session.id(), "Failed to send endpoint event");
        return false;
    }
    info!(session_id = %session.id(), endpoint = %url, "Stream opened");
    state.activity().success("sse", format!("stream opened: {}", session.id()));
    true
}

async fn keep_alive<R>(state: &AppState, session: &StreamingSession, reader: &mut R)
where
    R: AsyncRead + Unpin,
{
    let tick = state.transport.heartbeat_tick;
    let per_heartbeat = state.transport.heartbeat_ticks();
    let mut ticks = 0u32;
    let mut inbound = [0u8; 256];
    let mut reading = true;

    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => {
                debug!(session_id = %session.id(), "Stream closing for shutdown");
                break;
            }
            () = tokio::time::sleep(tick) => {
                if !session.is_alive() {
                    break;
                }
                ticks += 1;
                if ticks >= per_heartbeat {
                    ticks = 0;
                    if !session.send_heartbeat().await {
                        debug!(session_id = %session.id(), "Heartbeat failed");
                        break;
                    }
                }
            }
            read = reader.read(&mut inbound), if reading => match read {
                // Half-closed peers may still read; heartbeats decide liveness.
                Ok(0) => {
                    debug!(session_id = %session.id(), "Stream client half-closed");
                    reading = false;
                }
                Ok(_) => {}
                Err(_) => {
                    debug!(session_id = %session.id(), "Stream client disconnected");
                    break;
                }
            },
        }
    }
}

/// Handle `POST /messages?sessionId=<id>`.
///
/// The session id is checked before the body is parsed. Once it is valid the
/// answer is always `202 Accepted`; the RPC outcome goes over the stream.
pub async fn handle_message(state: &AppState, request: &HttpRequest) -> HttpResponse {
    let Some(session_id) = request
        .query_param("sessionId")
        .filter(|id| is_valid_session_id(id))
        .map(|id| id.to_ascii_lowercase())
    else {
        return rpc_error_response(
            400,
            serde_json::Value::Null,
            INVALID_REQUEST,
            "Missing sessionId query parameter",
        );
    };

    let Some(session) = state.streaming.get_alive(&session_id) else {
        debug!(session_id = %session_id, "Message for unknown stream session");
        return rpc_error_response(
            404,
            serde_json::Value::Null,
            INVALID_REQUEST,
            "Unknown or expired session. Connect to GET /sse first.",
        );
    };

    let reply = match RpcMessage::parse(&request.body) {
        Err(err) => Some(RpcResponse::from_error(serde_json::Value::Null, &err)),
        Ok(RpcMessage::Invalid { id, error }) => Some(RpcResponse::from_error(id, &error)),
        Ok(RpcMessage::Response { id }) => {
            debug!(session_id = %session_id, %id, "Discarding client response");
            None
        }
        Ok(RpcMessage::Notification { method, .. }) => {
            if state.dispatcher.handle_notification(&method) == NotificationEffect::MarkInitialized {
                session.mark_initialized();
                debug!(session_id = %session_id, "Stream session initialized");
            }
            None
        }
        Ok(RpcMessage::Request { id, method, params }) => {
            let response = state.dispatcher.handle_request(id, &method, &params).await;
            if method == "initialize" && !response.is_error() {
                session.set_protocol_version(SERVER_PROTOCOL_VERSION);
            }
            Some(response)
        }
    };

    if let Some(reply) = reply {
        let payload = reply.to_value().to_string();
        if !session.send_event("message", &payload).await {
            debug!(session_id = %session_id, "Stream gone, response dropped");
        }
    }
    HttpResponse::accepted()
}
