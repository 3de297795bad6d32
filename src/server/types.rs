//! Server types and shared state.
//!
//! [`AppState`] owns every service the listener and handlers use. It is
//! built once per server and passed by `Arc` into each connection task.

use std::net::SocketAddr;
use std::sync::{Arc, OnceLock};
use std::time::Instant;

use tokio_util::sync::CancellationToken;

use crate::activity::ActivityFeed;
use crate::audit::FileAuditLogger;
use crate::auth::BearerTokenAuthorizer;
use crate::config::{Config, TransportConfig};
use crate::policy::AllowListPolicy;
use crate::protocol::Dispatcher;
use crate::rate_limit::{RateLimiter, RateLimiterConfig};
use crate::registry::ToolRegistry;
use crate::session::{RequestResponseStore, StreamingSessionStore, StreamingStoreConfig};
use crate::traits::{AuditSink, Authorizer, PolicyGuard};

/// Shared application state for all connection handlers.
pub struct AppState {
    /// Server configuration.
    pub config: Arc<Config>,
    /// Framing limits and timeouts.
    pub transport: TransportConfig,
    /// JSON-RPC dispatcher (owns the registry, policy and audit sink).
    pub dispatcher: Arc<Dispatcher>,
    /// Sessions of the streaming transport.
    pub streaming: Arc<StreamingSessionStore>,
    /// Sessions of the request/response transport.
    pub sessions: Arc<RequestResponseStore>,
    /// Per-address rate limiter.
    pub rate_limiter: Arc<RateLimiter>,
    /// Authorization check.
    pub authorizer: Arc<dyn Authorizer>,
    /// File audit log, when the state was built with one. Used for `/status`.
    pub audit_log: Option<Arc<FileAuditLogger>>,
    /// Global shutdown flag.
    pub shutdown: CancellationToken,
    /// When the state was built.
    pub started_at: Instant,
    bound: OnceLock<SocketAddr>,
}

impl AppState {
    /// Build the production state: allow-list policy, file audit log and
    /// bearer token authorization, all driven by `config`.
    #[must_use]
    pub fn new(config: Config, registry: Arc<ToolRegistry>) -> Self {
        let audit_log = Arc::new(FileAuditLogger::new(&config.audit_log_path));
        let policy = Arc::new(AllowListPolicy::from_config(&config));
        let authorizer = Arc::new(BearerTokenAuthorizer::new(config.auth_token.clone()));

        let mut state = Self::from_parts(
            config,
            TransportConfig::default(),
            registry,
            policy,
            Arc::clone(&audit_log) as Arc<dyn AuditSink>,
            authorizer,
        );
        state.audit_log = Some(audit_log);
        state
    }

    /// Build state from explicit collaborators.
    #[must_use]
    pub fn from_parts(
        config: Config,
        transport: TransportConfig,
        registry: Arc<ToolRegistry>,
        policy: Arc<dyn PolicyGuard>,
        audit: Arc<dyn AuditSink>,
        authorizer: Arc<dyn Authorizer>,
    ) -> Self {
        let dispatcher = Dispatcher::new(registry, policy, audit, ActivityFeed::default());
        let streaming = StreamingSessionStore::new(StreamingStoreConfig::from_config(
            &config,
            transport.stream_send_timeout,
        ));
        let rate_limiter = RateLimiter::new(RateLimiterConfig::from(&config));

        Self {
            config: Arc::new(config),
            transport,
            dispatcher: Arc::new(dispatcher),
            streaming: Arc::new(streaming),
            sessions: Arc::new(RequestResponseStore::new()),
            rate_limiter: Arc::new(rate_limiter),
            authorizer,
            audit_log: None,
            shutdown: CancellationToken::new(),
            started_at: Instant::now(),
            bound: OnceLock::new(),
        }
    }

    /// Record the address the listener actually bound.
    pub fn set_bound_addr(&self, addr: SocketAddr) {
        let _ = self.bound.set(addr);
    }

    /// Address the listener bound, once known.
    #[must_use]
    pub fn bound_addr(&self) -> Option<SocketAddr> {
        self.bound.get().copied()
    }

    /// Bound port, falling back to the configured one before binding.
    #[must_use]
    pub fn port(&self) -> u16 {
        self.bound_addr()
            .map_or(self.config.server_port, |addr| addr.port())
    }

    /// Whole seconds since the state was built.
    #[must_use]
    pub fn uptime_secs(&self) -> u64 {
        self.started_at.elapsed().as_secs()
    }

    /// Tool registry.
    #[must_use]
    pub fn registry(&self) -> &ToolRegistry {
        self.dispatcher.registry()
    }

    /// Policy guard.
    #[must_use]
    pub fn policy(&self) -> &dyn PolicyGuard {
        self.dispatcher.policy()
    }

    /// Observer feed.
    #[must_use]
    pub fn activity(&self) -> &ActivityFeed {
        self.dispatcher.activity()
    }
}

impl std::fmt::Debug for AppState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AppState")
            .field("config", &self.config)
            .field("bound", &self.bound_addr())
            .finish_non_exhaustive()
    }
}
