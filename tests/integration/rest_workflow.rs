//! REST surface and authorization.

#![allow(clippy::unwrap_used, clippy::expect_used)]

use super::harness::Bridge;
use desk_bridge::config::SecretString;
use pretty_assertions::assert_eq;
use serde_json::json;
use std::time::Duration;

#[tokio::test]
async fn test_health_skips_authorization() {
    let bridge =
        Bridge::start_with(|config| config.auth_token = Some(SecretString::new("s3cret"))).await;

    let health = bridge.get("/health").await;
    assert_eq!(health.status, 200);
    let body = health.json();
    assert_eq!(body["status"], "ok");
    assert_eq!(body["sse_sessions"], 0);

    let denied = bridge.get("/status").await;
    assert_eq!(denied.status, 401);
    assert_eq!(denied.json(), json!({"error": "unauthorized"}));

    let wrong = bridge
        .send("GET /status HTTP/1.1\r\nAuthorization: Bearer nope\r\n\r\n")
        .await;
    assert_eq!(wrong.status, 401);

    let allowed = bridge
        .send("GET /status HTTP/1.1\r\nAuthorization: Bearer s3cret\r\n\r\n")
        .await;
    assert_eq!(allowed.status, 200);
    assert_eq!(allowed.json()["status"], "running");
    assert_eq!(allowed.json()["port"], bridge.addr().port());

    bridge.stop().await;
}

#[tokio::test]
async fn test_preflight_answers_without_token() {
    let bridge =
        Bridge::start_with(|config| config.auth_token = Some(SecretString::new("s3cret"))).await;

    let reply = bridge.send("OPTIONS /mcp HTTP/1.1\r\n\r\n").await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.header("Access-Control-Allow-Origin"), Some("*"));
    assert!(reply
        .header("Access-Control-Allow-Headers")
        .unwrap()
        .contains("MCP-Session-Id"));

    bridge.stop().await;
}

#[tokio::test]
async fn test_read_and_list_through_rest() {
    let bridge = Bridge::start().await;
    std::fs::write(bridge.dir.path().join("a.txt"), "alpha").unwrap();
    std::fs::create_dir(bridge.dir.path().join("sub")).unwrap();
    let root = bridge.dir.path().to_string_lossy().into_owned();

    let read = bridge.get(&format!("/read?path={root}/a.txt")).await;
    assert_eq!(read.status, 200);
    assert_eq!(read.json()["content"][0]["text"], "alpha");

    let list = bridge.get(&format!("/list?path={root}")).await;
    assert_eq!(list.status, 200);
    let text = list.json()["content"][0]["text"].as_str().unwrap().to_string();
    let listing: serde_json::Value = serde_json::from_str(&text).unwrap();
    let names: Vec<&str> = listing["entries"]
        .as_array()
        .unwrap()
        .iter()
        .filter_map(|e| e["name"].as_str())
        .collect();
    assert_eq!(names, vec!["a.txt", "logs", "sub"]);

    let outside = bridge.get("/read?path=/etc/passwd").await;
    assert_eq!(outside.status, 403);

    let missing = bridge.get("/read").await;
    assert_eq!(missing.status, 400);

    bridge.stop().await;
}

#[tokio::test]
async fn test_optional_tools_and_unknown_paths() {
    let bridge = Bridge::start().await;

    let screenshot = bridge.get("/screenshot").await;
    assert_eq!(screenshot.status, 501);

    let execute = bridge
        .post_json("/execute", &[], &json!({"command": "rm -rf /"}))
        .await;
    assert_eq!(execute.status, 403);

    let unknown = bridge.get("/nowhere").await;
    assert_eq!(unknown.status, 404);
    assert!(unknown.json()["available_endpoints"].is_array());

    let artifact = bridge.get("/screenshot/file/.hidden").await;
    assert_eq!(artifact.status, 400);

    bridge.stop().await;
}

#[tokio::test]
async fn test_exit_stops_server() {
    let bridge = Bridge::start().await;
    let addr = bridge.addr();

    let reply = bridge.post_json("/exit", &[], &json!({})).await;
    assert_eq!(reply.status, 200);
    assert_eq!(reply.json(), json!({"status": "shutting down"}));
    assert!(bridge.state.shutdown.is_cancelled());

    tokio::time::timeout(Duration::from_secs(2), bridge.running.wait())
        .await
        .unwrap()
        .unwrap();
    assert!(tokio::net::TcpStream::connect(addr).await.is_err());
}
