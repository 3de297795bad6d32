//! Request/response transport workflow: initialize → list → call.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::{is_session_id, Bridge};
use pretty_assertions::assert_eq;
use serde_json::{json, Value};

async fn initialize(bridge: &Bridge) -> String {
    let reply = bridge
        .post_json(
            "/mcp",
            &[],
            &json!({
                "jsonrpc": "2.0",
                "id": 1,
                "method": "initialize",
                "params": {"protocolVersion": "2025-03-26", "capabilities": {}}
            }),
        )
        .await;
    assert_eq!(reply.status, 200);
    reply.header("MCP-Session-Id").unwrap().to_string()
}

#[tokio::test]
async fn test_initialize_returns_session_header() {
    let bridge = Bridge::start().await;

    let reply = bridge
        .post_json(
            "/mcp",
            &[],
            &json!({"jsonrpc": "2.0", "id": 1, "method": "initialize", "params": {}}),
        )
        .await;

    assert_eq!(reply.status, 200);
    let session = reply.header("MCP-Session-Id").unwrap();
    assert!(is_session_id(session), "bad session id {session}");
    assert!(reply
        .header("Access-Control-Expose-Headers")
        .unwrap()
        .contains("MCP-Session-Id"));

    let body = reply.json();
    assert_eq!(body["jsonrpc"], "2.0");
    assert_eq!(body["id"], 1);
    assert_eq!(body["result"]["protocolVersion"], "2024-11-05");
    assert_eq!(body["result"]["serverInfo"]["name"], "desk-bridge");
    assert!(body["result"]["capabilities"]["tools"].is_object());
    assert_eq!(bridge.state.sessions.len(), 1);

    bridge.stop().await;
}

#[tokio::test]
async fn test_tools_list_exposes_only_public_fields() {
    let bridge = Bridge::start().await;
    let session = initialize(&bridge).await;

    let reply = bridge
        .post_json(
            "/mcp",
            &[("MCP-Session-Id", &session)],
            &json!({"jsonrpc": "2.0", "id": "list", "method": "tools/list"}),
        )
        .await;

    assert_eq!(reply.status, 200);
    let body = reply.json();
    assert_eq!(body["id"], "list");
    let tools = body["result"]["tools"].as_array().unwrap();
    let names: Vec<&str> = tools.iter().filter_map(|t| t["name"].as_str()).collect();
    assert_eq!(names, vec!["execute_command", "list_directory", "read_file"]);

    for tool in tools {
        let mut keys: Vec<&String> = tool.as_object().unwrap().keys().collect();
        keys.sort();
        assert_eq!(keys, vec!["description", "inputSchema", "name"]);
        assert_eq!(tool["inputSchema"]["type"], "object");
    }

    bridge.stop().await;
}

#[tokio::test]
async fn test_tools_call_reads_file_and_audits() {
    let bridge = Bridge::start().await;
    let file = bridge.dir.path().join("notes.txt");
    std::fs::write(&file, "hello bridge").unwrap();
    let session = initialize(&bridge).await;

    let reply = bridge
        .post_json(
            "/mcp",
            &[("MCP-Session-Id", &session)],
            &json!({
                "jsonrpc": "2.0",
                "id": 7,
                "method": "tools/call",
                "params": {"name": "read_file", "arguments": {"path": file.to_string_lossy()}}
            }),
        )
        .await;

    assert_eq!(reply.status, 200);
    let body = reply.json();
    assert_eq!(body["result"]["content"][0]["type"], "text");
    assert_eq!(body["result"]["content"][0]["text"], "hello bridge");
    assert_eq!(body["result"]["isError"], false);

    let stats = bridge.audit_log.stats(2);
    assert_eq!(stats.total_calls, 1);
    assert_eq!(stats.by_tool.get("read_file"), Some(&1));

    bridge.stop().await;
}

#[tokio::test]
async fn test_tools_call_outside_allowed_dirs_is_denied() {
    let bridge = Bridge::start().await;
    let session = initialize(&bridge).await;

    let reply = bridge
        .post_json(
            "/mcp",
            &[("MCP-Session-Id", &session)],
            &json!({
                "jsonrpc": "2.0",
                "id": 2,
                "method": "tools/call",
                "params": {"name": "read_file", "arguments": {"path": "/etc/hostname"}}
            }),
        )
        .await;

    assert_eq!(reply.status, 200);
    let body = reply.json();
    assert_eq!(body["error"]["code"], -32000);
    assert!(body["error"]["message"]
        .as_str()
        .unwrap()
        .contains("path not allowed"));
    assert_eq!(bridge.audit_log.stats(2).total_calls, 0);

    bridge.stop().await;
}

#[tokio::test]
async fn test_requests_without_session_are_rejected() {
    let bridge = Bridge::start().await;
    let list = json!({"jsonrpc": "2.0", "id": 3, "method": "tools/list"});

    let missing = bridge.post_json("/mcp", &[], &list).await;
    assert_eq!(missing.status, 400);
    assert_eq!(missing.json()["error"]["code"], -32600);

    let unknown = bridge
        .post_json("/mcp", &[("MCP-Session-Id", "0123456789abcdef0123456789abcdef")], &list)
        .await;
    assert_eq!(unknown.status, 404);
    assert_eq!(unknown.json()["id"], 3);

    bridge.stop().await;
}

#[tokio::test]
async fn test_notification_and_errors() {
    let bridge = Bridge::start().await;
    let session = initialize(&bridge).await;

    let note = bridge
        .post_json(
            "/mcp",
            &[("MCP-Session-Id", &session)],
            &json!({"jsonrpc": "2.0", "method": "notifications/initialized"}),
        )
        .await;
    assert_eq!(note.status, 202);
    assert!(note.body.is_empty());
    assert!(bridge.state.sessions.get(&session).unwrap().initialized);

    let parse = bridge
        .send("POST /mcp HTTP/1.1\r\nContent-Length: 5\r\n\r\n{oops")
        .await;
    assert_eq!(parse.status, 200);
    assert_eq!(parse.json()["error"]["code"], -32700);
    assert_eq!(parse.json()["id"], Value::Null);

    let foreign = bridge
        .post_json("/mcp", &[("Origin", "https://evil.example")], &json!({}))
        .await;
    assert_eq!(foreign.status, 403);

    let version = bridge
        .post_json("/mcp", &[("MCP-Protocol-Version", "1999-01-01")], &json!({}))
        .await;
    assert_eq!(version.status, 400);

    let get = bridge.get("/mcp").await;
    assert_eq!(get.status, 405);
    assert_eq!(get.header("Allow"), Some("POST, OPTIONS"));

    bridge.stop().await;
}
