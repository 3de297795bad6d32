//! TCP listener and per-connection handling.
//!
//! Each accepted connection gets its own task: rate limit, frame, route,
//! respond. Streaming connections stay on that task for the lifetime of
//! their session.

use std::net::SocketAddr;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;

use futures_util::FutureExt;
use tokio::io::AsyncWriteExt;
use tokio::net::{TcpListener, TcpStream};
use tokio::sync::oneshot;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use super::router::{self, Route};
use super::types::AppState;
use crate::config::Config;
use crate::error::ServerError;
use crate::http::{read_request, HttpResponse};
use crate::transport::{sse, write_response};

/// Seconds advertised in `Retry-After` on rate-limit rejections.
pub const RETRY_AFTER_SECS: u64 = 60;

/// Readiness signal: the bound address, or why binding failed.
pub type Readiness = oneshot::Receiver<Result<SocketAddr, ServerError>>;

/// Bind the configured address, retrying on an ephemeral port when
/// `auto_port` is set.
///
/// # Errors
///
/// Returns [`ServerError::Bind`] when no address could be bound.
pub async fn bind(config: &Config) -> Result<TcpListener, ServerError> {
    let addr = SocketAddr::new(config.listen_address, config.server_port);
    match TcpListener::bind(addr).await {
        Ok(listener) => Ok(listener),
        Err(err) if config.auto_port && config.server_port != 0 => {
            warn!(%addr, error = %err, "Port unavailable, retrying on an ephemeral port");
            let fallback = SocketAddr::new(config.listen_address, 0);
            TcpListener::bind(fallback)
                .await
                .map_err(|e| ServerError::Bind {
                    addr: fallback.to_string(),
                    message: e.to_string(),
                })
        }
        Err(err) => Err(ServerError::Bind {
            addr: addr.to_string(),
            message: err.to_string(),
        }),
    }
}

/// Spawn the listener task.
///
/// The returned receiver resolves once the socket is bound (or failed to
/// bind). The task runs until `state.shutdown` fires and then closes every
/// session before finishing.
#[must_use]
pub fn spawn(state: Arc<AppState>) -> (Readiness, JoinHandle<()>) {
    let (ready_tx, ready_rx) = oneshot::channel();
    let handle = tokio::spawn(async move {
        let listener = match bind(&state.config).await {
            Ok(listener) => listener,
            Err(err) => {
                error!(error = %err, "Listener failed to start");
                let _ = ready_tx.send(Err(err));
                return;
            }
        };
        let addr = match listener.local_addr() {
            Ok(addr) => addr,
            Err(err) => {
                let _ = ready_tx.send(Err(ServerError::Io {
                    message: err.to_string(),
                }));
                return;
            }
        };

        state.set_bound_addr(addr);
        state.rate_limiter.spawn_cleanup_task(state.shutdown.child_token());
        info!(%addr, "Listening");
        let _ = ready_tx.send(Ok(addr));

        accept_loop(&state, listener).await;
        shutdown(&state).await;
    });
    (ready_rx, handle)
}

async fn accept_loop(state: &Arc<AppState>, listener: TcpListener) {
    loop {
        tokio::select! {
            () = state.shutdown.cancelled() => break,
            accepted = listener.accept() => match accepted {
                Ok((stream, peer)) => {
                    tokio::spawn(handle_connection(Arc::clone(state), stream, peer));
                }
                Err(err) => {
                    warn!(error = %err, "Accept failed");
                    tokio::time::sleep(state.transport.poll_interval).await;
                }
            }
        }
    }
    drop(listener);
    info!("Listener closed");
}

async fn shutdown(state: &AppState) {
    state.streaming.shutdown_all().await;
    let cleared = state.sessions.clear();
    info!(mcp_sessions = cleared, "Server stopped");
}

async fn handle_connection(state: Arc<AppState>, stream: TcpStream, peer: SocketAddr) {
    let started = Instant::now();
    let (mut reader, mut writer) = stream.into_split();
    let send_timeout = state.transport.send_timeout;

    if !state.rate_limiter.allow(peer.ip()) {
        warn!(%peer, "Rate limit exceeded");
        let response = HttpResponse::error(429, "Too many requests")
            .with_header("Retry-After", RETRY_AFTER_SECS.to_string());
        write_response(&mut writer, &response, send_timeout).await;
        let _ = writer.shutdown().await;
        return;
    }

    let request = tokio::select! {
        () = state.shutdown.cancelled() => return,
        framed = read_request(&mut reader, &state.transport) => match framed {
            Ok(request) => request,
            Err(err) => {
                debug!(%peer, error = %err, "Dropping connection");
                return;
            }
        }
    };

    let routed = AssertUnwindSafe(router::route(&state, &request))
        .catch_unwind()
        .await;
    let response = match routed {
        Ok(Route::Respond(response)) => response,
        Ok(Route::OpenStream) => {
            debug!(%peer, "Opening event stream");
            sse::serve_stream(&state, &request, reader, Box::new(writer)).await;
            return;
        }
        Err(_) => {
            error!(%peer, method = %request.method, path = %request.path, "Handler panicked");
            router::internal_error()
        }
    };

    let sent = write_response(&mut writer, &response, send_timeout).await;
    let _ = writer.shutdown().await;
    let elapsed_ms = u64::try_from(started.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        %peer,
        method = %request.method,
        path = %request.path,
        status = response.status(),
        elapsed_ms,
        sent,
        "Request handled"
    );
}
