//! Sessions bound to a live event-stream connection.
//!
//! The store owns every [`StreamingSession`]. Each session owns the write half
//! of its connection behind an async mutex; closing takes the writer out of
//! the mutex, so the connection is shut down exactly once no matter whether
//! a failed write, a disconnect, a TTL sweep or global shutdown gets there
//! first.

use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use futures_util::future::join_all;
use tokio::io::{AsyncWrite, AsyncWriteExt};
use tracing::{debug, info};

use super::generate_session_id;
use crate::config::Config;

/// Write half of a streaming connection.
pub type EventWriter = Box<dyn AsyncWrite + Send + Unpin>;

/// One live event-stream client.
pub struct StreamingSession {
    id: String,
    writer: tokio::sync::Mutex<Option<EventWriter>>,
    alive: AtomicBool,
    initialized: AtomicBool,
    protocol_version: Mutex<Option<String>>,
    created_at: Instant,
    send_timeout: Duration,
}

impl StreamingSession {
    fn new(id: String, writer: EventWriter, created_at: Instant, send_timeout: Duration) -> Self {
        Self {
            id,
            writer: tokio::sync::Mutex::new(Some(writer)),
            alive: AtomicBool::new(true),
            initialized: AtomicBool::new(false),
            protocol_version: Mutex::new(None),
            created_at,
            send_timeout,
        }
    }

    /// Session id.
    #[must_use]
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Returns false once the session has been marked dead.
    #[must_use]
    pub fn is_alive(&self) -> bool {
        self.alive.load(Ordering::Acquire)
    }

    /// Mark the session dead. Its keep-alive loop exits on the next tick.
    pub fn mark_dead(&self) {
        self.alive.store(false, Ordering::Release);
    }

    /// Returns true after `notifications/initialized`.
    #[must_use]
    pub fn is_initialized(&self) -> bool {
        self.initialized.load(Ordering::Acquire)
    }

    /// Record `notifications/initialized`.
    pub fn mark_initialized(&self) {
        self.initialized.store(true, Ordering::Release);
    }

    /// Negotiated protocol version, once `initialize` succeeded.
    #[must_use]
    pub fn protocol_version(&self) -> Option<String> {
        self.protocol_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .clone()
    }

    /// Record the negotiated protocol version.
    pub fn set_protocol_version(&self, version: impl Into<String>) {
        *self
            .protocol_version
            .lock()
            .unwrap_or_else(PoisonError::into_inner) = Some(version.into());
    }

    /// Creation instant.
    #[must_use]
    pub const fn created_at(&self) -> Instant {
        self.created_at
    }

    /// Push a named event. Returns false if the session is gone or the write failed.
    pub async fn send_event(&self, event: &str, data: &str) -> bool {
        self.write_frame(format!("event: {event}\ndata: {data}\n\n").as_bytes())
            .await
    }

    /// Push a comment-only heartbeat frame.
    pub async fn send_heartbeat(&self) -> bool {
        self.write_frame(b": ping\n\n").await
    }

    /// Write raw bytes under the write lock.
    ///
    /// A failed or timed-out write marks the session dead and closes the
    /// connection while the lock is still held.
    pub async fn write_frame(&self, bytes: &[u8]) -> bool {
        let mut guard = self.writer.lock().await;
        let Some(writer) = guard.as_mut() else {
            return false;
        };
        if !self.is_alive() {
            return false;
        }

        let written = tokio::time::timeout(self.send_timeout, async {
            writer.write_all(bytes).await?;
            writer.flush().await
        })
        .await;

        match written {
            Ok(Ok(())) => true,
            Ok(Err(err)) => {
                debug!(session_id = %self.id, error = %err, "Stream write failed");
                self.mark_dead();
                self.shutdown_locked(&mut guard).await;
                false
            }
            Err(_) => {
                debug!(session_id = %self.id, "Stream write timed out");
                self.mark_dead();
                self.shutdown_locked(&mut guard).await;
                false
            }
        }
    }

    /// Mark dead and close the connection. Returns true only for the call
    /// that actually closed it.
    pub async fn close(&self) -> bool {
        self.mark_dead();
        let mut guard = self.writer.lock().await;
        self.shutdown_locked(&mut guard).await
    }

    /// Returns true once the connection has been closed.
    pub async fn is_closed(&self) -> bool {
        self.writer.lock().await.is_none()
    }

    async fn shutdown_locked(&self, slot: &mut Option<EventWriter>) -> bool {
        match slot.take() {
            Some(mut writer) => {
                let _ = tokio::time::timeout(self.send_timeout, writer.shutdown()).await;
                debug!(session_id = %self.id, "Stream connection closed");
                true
            }
            None => false,
        }
    }
}

impl std::fmt::Debug for StreamingSession {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StreamingSession")
            .field("id", &self.id)
            .field("alive", &self.is_alive())
            .field("initialized", &self.is_initialized())
            .finish_non_exhaustive()
    }
}

/// Configuration for the streaming session store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct StreamingStoreConfig {
    /// Cap on concurrent sessions.
    pub max_sessions: usize,
    /// Age after which a session is swept on the next creation.
    pub ttl: Duration,
    /// Write timeout for event frames.
    pub send_timeout: Duration,
}

impl Default for StreamingStoreConfig {
    fn default() -> Self {
        Self {
            max_sessions: 16,
            ttl: Duration::from_secs(3600),
            send_timeout: Duration::from_secs(5),
        }
    }
}

impl StreamingStoreConfig {
    /// Build from application config and the streaming send timeout.
    #[must_use]
    pub fn from_config(config: &Config, send_timeout: Duration) -> Self {
        Self {
            max_sessions: config.max_stream_sessions as usize,
            ttl: config.stream_session_ttl(),
            send_timeout,
        }
    }
}

/// Rejection returned when the store is full. Hands the writer back so the
/// caller can still answer on it.
pub struct CapacityExceeded {
    /// The writer passed to [`StreamingSessionStore::create`].
    pub writer: EventWriter,
    /// The configured cap.
    pub max_sessions: usize,
}

impl std::fmt::Debug for CapacityExceeded {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CapacityExceeded")
            .field("max_sessions", &self.max_sessions)
            .finish_non_exhaustive()
    }
}

/// Owner of all streaming sessions.
#[derive(Debug, Default)]
pub struct StreamingSessionStore {
    sessions: Mutex<HashMap<String, Arc<StreamingSession>>>,
    config: StreamingStoreConfig,
}

impl StreamingSessionStore {
    /// Create an empty store.
    #[must_use]
    pub fn new(config: StreamingStoreConfig) -> Self {
        Self {
            sessions: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Store configuration.
    #[must_use]
    pub const fn config(&self) -> &StreamingStoreConfig {
        &self.config
    }

    /// Create a session owning `writer`.
    ///
    /// Dead and expired sessions are swept first. If the store is still at
    /// capacity the writer is handed back in [`CapacityExceeded`].
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded`] when the live session count is at the cap.
    pub async fn create(&self, writer: EventWriter) -> Result<Arc<StreamingSession>, CapacityExceeded> {
        self.create_at(writer, Instant::now()).await
    }

    /// [`StreamingSessionStore::create`] evaluated at `now`.
    ///
    /// # Errors
    ///
    /// Returns [`CapacityExceeded`] when the live session count is at the cap.
    pub async fn create_at(
        &self,
        writer: EventWriter,
        now: Instant,
    ) -> Result<Arc<StreamingSession>, CapacityExceeded> {
        let mut evicted = Vec::new();
        let outcome = {
            let mut sessions = self.lock();
            sessions.retain(|_, session| {
                let expired = now.saturating_duration_since(session.created_at) >= self.config.ttl;
                let keep = session.is_alive() && !expired;
                if !keep {
                    evicted.push(Arc::clone(session));
                }
                keep
            });

            if sessions.len() >= self.config.max_sessions {
                Err(writer)
            } else {
                let id = loop {
                    let candidate = generate_session_id();
                    if !sessions.contains_key(&candidate) {
                        break candidate;
                    }
                };
                let session = Arc::new(StreamingSession::new(
                    id.clone(),
                    writer,
                    now,
                    self.config.send_timeout,
                ));
                sessions.insert(id, Arc::clone(&session));
                Ok(session)
            }
        };

        if !evicted.is_empty() {
            debug!(evicted = evicted.len(), "Swept dead or expired stream sessions");
            join_all(evicted.iter().map(|session| session.close())).await;
        }

        match outcome {
            Ok(session) => {
                info!(session_id = %session.id, active = self.len(), "Stream session created");
                Ok(session)
            }
            Err(writer) => Err(CapacityExceeded {
                writer,
                max_sessions: self.config.max_sessions,
            }),
        }
    }

    /// Look up a session by id, dead or alive.
    #[must_use]
    pub fn get(&self, id: &str) -> Option<Arc<StreamingSession>> {
        self.lock().get(id).cloned()
    }

    /// Look up a live session by id.
    #[must_use]
    pub fn get_alive(&self, id: &str) -> Option<Arc<StreamingSession>> {
        self.get(id).filter(|session| session.is_alive())
    }

    /// Push an event to a live session. Returns false if it is unknown, dead
    /// or the write failed.
    pub async fn send_event(&self, id: &str, event: &str, data: &str) -> bool {
        match self.get_alive(id) {
            Some(session) => session.send_event(event, data).await,
            None => false,
        }
    }

    /// Remove a session and close its connection.
    pub async fn remove(&self, id: &str) -> bool {
        let removed = self.lock().remove(id);
        match removed {
            Some(session) => {
                session.close().await;
                info!(session_id = %id, active = self.len(), "Stream session removed");
                true
            }
            None => false,
        }
    }

    /// Close every session and empty the store.
    pub async fn shutdown_all(&self) {
        let drained: Vec<_> = self.lock().drain().map(|(_, session)| session).collect();
        for session in &drained {
            session.mark_dead();
        }
        join_all(drained.iter().map(|session| session.close())).await;
        if !drained.is_empty() {
            info!(closed = drained.len(), "All stream sessions closed");
        }
    }

    /// Number of stored sessions.
    #[must_use]
    pub fn len(&self) -> usize {
        self.lock().len()
    }

    /// Returns true when no sessions are stored.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, Arc<StreamingSession>>> {
        self.sessions.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
