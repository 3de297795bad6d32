//! MCP transports.
//!
//! - [`sse`]: long-lived event stream (`GET /sse`) plus short-lived
//!   `POST /messages?sessionId=` calls whose responses travel over the stream
//! - [`streamable`]: stateless request/response calls on `POST /mcp`
//!
//! Both share the [`Dispatcher`](crate::protocol::Dispatcher) for JSON-RPC
//! semantics and differ only in session handling and where responses go.

pub mod sse;
pub mod streamable;

use std::time::Duration;

use serde_json::Value;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::debug;

use crate::http::HttpResponse;
use crate::protocol::RpcResponse;

/// HTTP response whose body is a JSON-RPC error object.
#[must_use]
pub fn rpc_error_response(status: u16, id: Value, code: i64, message: &str) -> HttpResponse {
    HttpResponse::json(status, &RpcResponse::error(id, code, message).to_value())
}

/// Write a full response, bounded by `timeout`. Returns false on failure.
pub async fn write_response<W>(writer: &mut W, response: &HttpResponse, timeout: Duration) -> bool
where
    W: AsyncWrite + Unpin + ?Sized,
{
    let bytes = response.to_bytes();
    let written = tokio::time::timeout(timeout, async {
        writer.write_all(&bytes).await?;
        writer.flush().await
    })
    .await;

    match written {
        Ok(Ok(())) => true,
        Ok(Err(err)) => {
            debug!(status = response.status(), error = %err, "Response write failed");
            false
        }
        Err(_) => {
            debug!(status = response.status(), "Response write timed out");
            false
        }
    }
}
