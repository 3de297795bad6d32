//! Streaming transport workflow: connect → endpoint → messages.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{is_session_id, parse_reply, read_until, Bridge};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};
use std::time::Duration;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

const OPEN_STREAM: &str = "GET /sse HTTP/1.1\r\nHost: localhost\r\nAccept: text/event-stream\r\n\r\n";

/// Open a stream and return it with the session id from the `endpoint` event.
async fn connect(bridge: &Bridge) -> (TcpStream, String) {
    let mut stream = TcpStream::connect(bridge.addr()).await.unwrap();
    stream.write_all(OPEN_STREAM.as_bytes()).await.unwrap();

    let mut buf = String::new();
    read_until(&mut stream, &mut buf, "sessionId=").await;
    read_until(&mut stream, &mut buf, "\n\n").await;

    assert!(buf.starts_with("HTTP/1.1 200 OK\r\n"));
    assert!(buf.contains("Content-Type: text/event-stream\r\n"));
    assert!(!buf.contains("Content-Length"));

    let (_, events) = buf.split_once("\r\n\r\n").unwrap();
    assert!(
        events.starts_with("event: endpoint\ndata: http://localhost/messages?sessionId="),
        "first event was {events:?}"
    );
    let id = events
        .split("sessionId=")
        .nth(1)
        .and_then(|rest| rest.lines().next())
        .unwrap()
        .to_string();
    (stream, id)
}

/// Read the next `message` event and parse its payload.
async fn next_message(stream: &mut TcpStream) -> Value {
    let mut buf = String::new();
    read_until(stream, &mut buf, "event: message\ndata: ").await;
    let start = buf.find("event: message\ndata: ").unwrap();
    read_until(stream, &mut buf, "}\n\n").await;
    let frame = &buf[start + "event: message\ndata: ".len()..];
    let payload = frame.split("\n\n").next().unwrap();
    serde_json::from_str(payload).unwrap()
}

#[tokio::test]
async fn test_endpoint_event_carries_session_id() {
    let bridge = Bridge::start().await;
    let (_stream, id) = connect(&bridge).await;

    assert!(is_session_id(&id), "bad session id {id}");
    assert_eq!(bridge.state.streaming.len(), 1);

    bridge.stop().await;
}

#[tokio::test]
async fn test_messages_answered_over_stream() {
    let bridge = Bridge::start().await;
    let (mut stream, id) = connect(&bridge).await;
    let path = format!("/messages?sessionId={id}");

    let init = bridge
        .post_json(
            &path,
            &[],
            &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;
    assert_eq!(init.status, 202);
    let response = next_message(&mut stream).await;
    assert_eq!(response["id"], 1);
    assert_eq!(response["result"]["protocolVersion"], "2024-11-05");

    let note = bridge
        .post_json(
            &path,
            &[],
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
    assert_eq!(note.status, 202);
    assert!(bridge.state.streaming.get(&id).unwrap().is_initialized());

    let ping = bridge
        .post_json(&path, &[], &json!({"jsonrpc": "2.0", "id": "p", "method": "ping"}))
        .await;
    assert_eq!(ping.status, 202);
    let response = next_message(&mut stream).await;
    assert_eq!(response, json!({"jsonrpc": "2.0", "id": "p", "result": {}}));

    let unknown = bridge
        .post_json(&path, &[], &json!({"jsonrpc": "2.0", "id": 9, "method": "nope"}))
        .await;
    assert_eq!(unknown.status, 202);
    let response = next_message(&mut stream).await;
    assert_eq!(response["error"]["code"], -32601);

    bridge.stop().await;
}

#[tokio::test]
async fn test_unknown_session_is_rejected() {
    let bridge = Bridge::start().await;

    let reply = bridge
        .post_json(
            "/messages?sessionId=0123456789abcdef0123456789abcdef",
            &[],
            &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}),
        )
        .await;
    assert_eq!(reply.status, 404);
    let body = reply.json();
    assert_eq!(body["error"]["code"], -32600);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("Connect to GET /sse first"));

    let missing = bridge
        .post_json("/messages", &[], &json!({"jsonrpc": "2.0", "id": 1, "method": "ping"}))
        .await;
    assert_eq!(missing.status, 400);

    bridge.stop().await;
}

#[tokio::test]
async fn test_heartbeats_and_disconnect_cleanup() {
    let bridge = Bridge::start().await;
    let (mut stream, id) = connect(&bridge).await;

    let mut buf = String::new();
    read_until(&mut stream, &mut buf, ": ping\n\n").await;

    drop(stream);
    let deadline = tokio::time::Instant::now() + Duration::from_secs(2);
    while bridge.state.streaming.get(&id).is_some() {
        assert!(tokio::time::Instant::now() < deadline, "session not removed");
        tokio::time::sleep(Duration::from_millis(20)).await;
    }

    bridge.stop().await;
}

#[tokio::test]
async fn test_half_closed_client_keeps_stream() {
    let bridge = Bridge::start().await;
    let (mut stream, id) = connect(&bridge).await;

    stream.shutdown().await.unwrap();
    tokio::time::sleep(Duration::from_millis(300)).await;
    assert!(bridge.state.streaming.get(&id).is_some(), "session dropped on half-close");

    let mut buf = String::new();
    read_until(&mut stream, &mut buf, ": ping\n\n").await;

    let reply = bridge
        .post_json(
            &format!("/messages?sessionId={id}"),
            &[],
            &json!({"jsonrpc": "2.0", "id": 9, "method": "ping"}),
        )
        .await;
    assert_eq!(reply.status, 202);
    assert_eq!(next_message(&mut stream).await["id"], 9);

    bridge.stop().await;
}

#[tokio::test]
async fn test_stream_capacity_returns_503() {
    let bridge = Bridge::start_with(|config| config.max_stream_sessions = 1).await;
    let (_held, _) = connect(&bridge).await;

    let mut second = TcpStream::connect(bridge.addr()).await.unwrap();
    second.write_all(OPEN_STREAM.as_bytes()).await.unwrap();
    let mut text = String::new();
    tokio::time::timeout(Duration::from_secs(3), second.read_to_string(&mut text))
        .await
        .unwrap()
        .unwrap();

    let reply = parse_reply(&text);
    assert_eq!(reply.status, 503);
    assert_eq!(reply.json(), json!({"error": "Too many SSE sessions, try later"}));
    assert_eq!(bridge.state.streaming.len(), 1);

    bridge.stop().await;
}

#[tokio::test]
async fn test_shutdown_closes_open_streams() {
    let bridge = Bridge::start().await;
    let (mut stream, _) = connect(&bridge).await;

    bridge.stop().await;

    let mut rest = Vec::new();
    let closed = tokio::time::timeout(Duration::from_secs(2), stream.read_to_end(&mut rest)).await;
    assert!(closed.is_ok(), "stream still open after shutdown");
}
