//! Main server orchestration.
//!
//! This module provides the main entry point for running the bridge.

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use super::listener;
use super::types::AppState;
use crate::config::Config;
use crate::error::{AppError, ServerError};
use crate::registry::ToolRegistry;
use crate::tools::register_builtin_tools;

/// Main server that owns the shared state and starts the listener.
#[derive(Debug)]
pub struct McpServer {
    state: Arc<AppState>,
}

impl McpServer {
    /// Creates a server from prepared state.
    #[must_use]
    pub fn new(state: AppState) -> Self {
        Self {
            state: Arc::new(state),
        }
    }

    /// Creates a server with the built-in tools and production collaborators.
    #[must_use]
    pub fn from_config(config: Config) -> Self {
        let registry = Arc::new(ToolRegistry::new());
        register_builtin_tools(&registry, &config);
        Self::new(AppState::new(config, registry))
    }

    /// Shared state.
    #[must_use]
    pub const fn state(&self) -> &Arc<AppState> {
        &self.state
    }

    /// Token that stops the server when cancelled.
    #[must_use]
    pub fn shutdown_token(&self) -> CancellationToken {
        self.state.shutdown.clone()
    }

    /// Bind and start accepting connections.
    ///
    /// Resolves once the listener is bound.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Bind`] when the address cannot be bound, or
    /// [`ServerError::NotStarted`] if the listener task ended before
    /// reporting readiness.
    pub async fn start(&self) -> Result<RunningServer, ServerError> {
        let (ready, handle) = listener::spawn(Arc::clone(&self.state));
        let addr = ready.await.map_err(|_| ServerError::NotStarted)??;
        info!(%addr, tools = self.state.registry().len(), "Server started");
        Ok(RunningServer {
            addr,
            handle,
            shutdown: self.shutdown_token(),
        })
    }

    /// Delete audit files older than the configured retention.
    ///
    /// Failures are logged and otherwise ignored.
    pub fn prune_audit_logs(&self) {
        let Some(audit_log) = &self.state.audit_log else {
            return;
        };
        if let Err(e) = audit_log.cleanup_old_logs(self.state.config.log_retention_days) {
            warn!("Audit log cleanup failed: {e}");
        }
    }

    /// Start the server and wait until it stops.
    ///
    /// # Errors
    ///
    /// Returns [`AppError::Server`] when the listener cannot start or its
    /// task fails.
    pub async fn run(&self) -> Result<(), AppError> {
        let running = self.start().await?;
        running.wait().await?;
        Ok(())
    }
}

/// Handle to a started server.
#[derive(Debug)]
pub struct RunningServer {
    addr: SocketAddr,
    handle: JoinHandle<()>,
    shutdown: CancellationToken,
}

impl RunningServer {
    /// Address the listener is bound to.
    #[must_use]
    pub const fn local_addr(&self) -> SocketAddr {
        self.addr
    }

    /// Wait until the server stops.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener task panicked.
    pub async fn wait(self) -> Result<(), ServerError> {
        self.handle.await.map_err(|e| ServerError::Io {
            message: e.to_string(),
        })
    }

    /// Request shutdown and wait for the listener to finish.
    ///
    /// # Errors
    ///
    /// Returns [`ServerError::Io`] if the listener task panicked.
    pub async fn shutdown(self) -> Result<(), ServerError> {
        self.shutdown.cancel();
        self.wait().await
    }
}
