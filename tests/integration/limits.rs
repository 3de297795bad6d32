//! Rate limiting and framing limits.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::Bridge;
use pretty_assertions::assert_eq;
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

#[tokio::test]
async fn test_rate_limit_applies_to_every_path() {
    let bridge = Bridge::start_with(|config| config.rate_limit_max_requests = 3).await;

    for _ in 0..3 {
        assert_eq!(bridge.get("/health").await.status, 200);
    }

    for path in ["/health", "/status", "/sse"] {
        let reply = bridge.get(path).await;
        assert_eq!(reply.status, 429, "{path} was not limited");
        assert_eq!(reply.header("Retry-After"), Some("60"));
        assert_eq!(reply.json()["error"], "Too many requests");
    }

    bridge.stop().await;
}

#[tokio::test]
async fn test_oversized_headers_close_without_response() {
    let bridge = Bridge::start().await;

    let mut stream = TcpStream::connect(bridge.addr()).await.unwrap();
    let filler = "x".repeat(20 * 1024);
    let raw = format!("GET /health HTTP/1.1\r\nX-Filler: {filler}\r\n\r\n");
    let _ = stream.write_all(raw.as_bytes()).await;

    let mut response = Vec::new();
    let _ = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut response))
        .await
        .unwrap();
    assert!(response.is_empty());

    bridge.stop().await;
}

#[tokio::test]
async fn test_slow_request_times_out() {
    let bridge = Bridge::start().await;

    let mut stream = TcpStream::connect(bridge.addr()).await.unwrap();
    stream
        .write_all(b"POST /mcp HTTP/1.1\r\nContent-Length: 50\r\n\r\n{\"jsonrpc\"")
        .await
        .unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    assert!(response.is_empty(), "unexpected reply {response:?}");

    bridge.stop().await;
}

#[tokio::test]
async fn test_half_closed_body_is_framed_as_received() {
    let bridge = Bridge::start().await;

    let mut stream = TcpStream::connect(bridge.addr()).await.unwrap();
    stream
        .write_all(b"POST /mcp HTTP/1.1\r\nContent-Length: 50\r\n\r\n{\"jsonrpc\"")
        .await
        .unwrap();
    stream.shutdown().await.unwrap();

    let mut response = String::new();
    tokio::time::timeout(Duration::from_secs(2), stream.read_to_string(&mut response))
        .await
        .unwrap()
        .unwrap();
    let reply = super::harness::parse_reply(&response);
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json()["error"]["code"], -32700);

    bridge.stop().await;
}
