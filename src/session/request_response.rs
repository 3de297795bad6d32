//! Metadata-only sessions for the stateless `/mcp` transport.
//!
//! Sessions are created by a successful `initialize` and live until removed
//! or until the store is cleared at shutdown. There is no idle expiry.

use std::collections::HashMap;
use std::sync::{PoisonError, RwLock};
use std::time::Instant;

use tracing::info;

use super::generate_session_id;

/// Session metadata tracked for the request/response transport.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RequestResponseSession {
    /// Session id returned in the `MCP-Session-Id` header.
    pub id: String,
    /// Negotiated protocol version.
    pub protocol_version: String,
    /// Set by `notifications/initialized`.
    pub initialized: bool,
    /// Creation instant.
    pub created_at: Instant,
}

/// Store of request/response sessions.
#[derive(Debug, Default)]
pub struct RequestResponseStore {
    sessions: RwLock<HashMap<String, RequestResponseSession>>,
}

impl RequestResponseStore {
    /// Create an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Create a session for the negotiated `protocol_version`.
    pub fn create(&self, protocol_version: impl Into<String>) -> RequestResponseSession {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let id = loop {
            let candidate = generate_session_id();
            if !sessions.contains_key(&candidate) {
                break candidate;
            }
        };
        let session = RequestResponseSession {
            id: id.clone(),
            protocol_version: protocol_version.into(),
            initialized: false,
            created_at: Instant::now(),
        };
        sessions.insert(id, session.clone());
        info!(session_id = %session.id, active = sessions.len(), "MCP session created");
        session
    }

    /// Look up a session by id.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<RequestResponseSession> {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .get(id)
            .cloned()
    }

    /// Returns true when the session exists.
    #[must_use]
    pub fn contains(&self, id: &str) -> bool {
        self.sessions
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .contains_key(id)
    }

    /// Mark a session initialized. Returns false for unknown ids.
    pub fn mark_initialized(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .get_mut(id)
            .map(|session| session.initialized = true)
            .is_some()
    }

    /// Remove a session. Returns false for unknown ids.
    pub fn remove(&self, id: &str) -> bool {
        self.sessions
            .write()
            .unwrap_or_else(PoisonError::into_inner)
            .remove(id)
            .is_some()
    }

    /// Drop every session, returning how many were removed.
    pub fn clear(&self) -> usize {
        let mut sessions = self.sessions.write().unwrap_or_else(PoisonError::into_inner);
        let removed = sessions.len();
        sessions.clear();
        removed
    }

    /// Number of sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.sessions.read().unwrap_or_else(PoisonError::into_inner).len()
    }

    /// Returns true when no sessions exist.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
