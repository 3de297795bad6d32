//! Server fixture and raw HTTP helpers.

#![allow(clippy::unwrap_used, clippy::expect_used, clippy::panic)]

use std::net::{IpAddr, SocketAddr};
use std::sync::Arc;
use std::time::Duration;

use desk_bridge::audit::FileAuditLogger;
use desk_bridge::auth::BearerTokenAuthorizer;
use desk_bridge::config::{Config, TransportConfig};
use desk_bridge::policy::AllowListPolicy;
use desk_bridge::registry::ToolRegistry;
use desk_bridge::server::{AppState, McpServer, RunningServer};
use desk_bridge::tools::register_builtin_tools;
use desk_bridge::traits::AuditSink;
use serde_json::Value;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;

/// A running server plus the scratch directory it is confined to.
pub struct Bridge {
    pub dir: TempDir,
    pub state: Arc<AppState>,
    pub audit_log: Arc<FileAuditLogger>,
    pub running: RunningServer,
}

/// A parsed HTTP response.
#[derive(Debug)]
pub struct Reply {
    pub status: u16,
    pub headers: Vec<(String, String)>,
    pub body: String,
}

impl Reply {
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn json(&self) -> Value {
        serde_json::from_str(&self.body)
            .unwrap_or_else(|e| panic!("body is not JSON ({e}): {}", self.body))
    }
}

fn fast_transport() -> TransportConfig {
    TransportConfig {
        recv_timeout: Duration::from_millis(500),
        send_timeout: Duration::from_millis(500),
        stream_send_timeout: Duration::from_millis(500),
        heartbeat_interval: Duration::from_millis(50),
        heartbeat_tick: Duration::from_millis(10),
        poll_interval: Duration::from_millis(50),
        ..TransportConfig::default()
    }
}

impl Bridge {
    /// Start with defaults tweaked by `customize`.
    pub async fn start_with(customize: impl FnOnce(&mut Config)) -> Self {
        let dir = TempDir::new().expect("Failed to create temp dir");
        let mut config = Config {
            listen_address: IpAddr::from([127, 0, 0, 1]),
            server_port: 0,
            audit_log_path: dir.path().join("logs").join("audit.log"),
            allowed_dirs: vec![dir.path().to_path_buf()],
            artifacts_dir: dir.path().join("data"),
            ..Config::default()
        };
        customize(&mut config);

        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry, &config);
        let audit_log = Arc::new(FileAuditLogger::new(&config.audit_log_path));
        let policy = Arc::new(AllowListPolicy::from_config(&config));
        let authorizer = Arc::new(BearerTokenAuthorizer::new(config.auth_token.clone()));

        let mut state = AppState::from_parts(
            config,
            fast_transport(),
            registry,
            policy,
            Arc::clone(&audit_log) as Arc<dyn AuditSink>,
            authorizer,
        );
        state.audit_log = Some(Arc::clone(&audit_log));

        let server = McpServer::new(state);
        let running = server.start().await.expect("server should start");
        Self {
            dir,
            state: Arc::clone(server.state()),
            audit_log,
            running,
        }
    }

    pub async fn start() -> Self {
        Self::start_with(|_| {}).await
    }

    pub fn addr(&self) -> SocketAddr {
        self.running.local_addr()
    }

    pub async fn get(&self, path: &str) -> Reply {
        self.send(&format!("GET {path} HTTP/1.1\r\nHost: localhost\r\n\r\n"))
            .await
    }

    pub async fn post_json(&self, path: &str, headers: &[(&str, &str)], body: &Value) -> Reply {
        let body = body.to_string();
        let mut raw = format!(
            "POST {path} HTTP/1.1\r\nHost: localhost\r\nContent-Type: application/json\r\nContent-Length: {}\r\n",
            body.len()
        );
        for (name, value) in headers {
            raw.push_str(name);
            raw.push_str(": ");
            raw.push_str(value);
            raw.push_str("\r\n");
        }
        raw.push_str("\r\n");
        raw.push_str(&body);
        self.send(&raw).await
    }

    pub async fn send(&self, raw: &str) -> Reply {
        send_raw(self.addr(), raw).await
    }

    pub async fn stop(self) {
        self.running.shutdown().await.expect("clean shutdown");
    }
}

/// Write one raw request and read until the server closes the connection.
pub async fn send_raw(addr: SocketAddr, raw: &str) -> Reply {
    let mut stream = TcpStream::connect(addr).await.expect("connect");
    stream.write_all(raw.as_bytes()).await.expect("write request");
    let mut text = String::new();
    tokio::time::timeout(Duration::from_secs(3), stream.read_to_string(&mut text))
        .await
        .expect("response within timeout")
        .expect("read response");
    parse_reply(&text)
}

pub fn parse_reply(text: &str) -> Reply {
    let (head, body) = text
        .split_once("\r\n\r\n")
        .unwrap_or_else(|| panic!("malformed response: {text:?}"));
    let mut lines = head.split("\r\n");
    let status = lines
        .next()
        .and_then(|line| line.split_whitespace().nth(1))
        .and_then(|code| code.parse().ok())
        .unwrap_or_else(|| panic!("missing status line: {head:?}"));
    let headers = lines
        .filter_map(|line| line.split_once(':'))
        .map(|(k, v)| (k.trim().to_string(), v.trim().to_string()))
        .collect();
    Reply {
        status,
        headers,
        body: body.to_string(),
    }
}

/// Read from `stream` until the accumulated text contains `needle`.
pub async fn read_until(stream: &mut TcpStream, buf: &mut String, needle: &str) {
    let deadline = tokio::time::Instant::now() + Duration::from_secs(3);
    let mut chunk = [0u8; 2048];
    while !buf.contains(needle) {
        let n = tokio::time::timeout_at(deadline, stream.read(&mut chunk))
            .await
            .unwrap_or_else(|_| panic!("timed out waiting for {needle:?} in {buf:?}"))
            .expect("read stream");
        assert!(n > 0, "stream closed before {needle:?} in {buf:?}");
        buf.push_str(&String::from_utf8_lossy(&chunk[..n]));
    }
}

pub fn is_session_id(id: &str) -> bool {
    id.len() == 32 && id.bytes().all(|b| matches!(b, b'0'..=b'9' | b'a'..=b'f'))
}
