//! Observer feed for dashboards.
//!
//! This module provides:
//! - [`ActivityEvent`]: Human-readable request/processing/success/error notices
//! - [`ActivityFeed`]: Broadcast sender with best-effort publishing
//!
//! Publishing never blocks and never fails the caller; with no subscribers
//! events are dropped.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use tokio::sync::broadcast;

/// Default channel capacity.
pub const DEFAULT_ACTIVITY_CAPACITY: usize = 256;

/// Kind of activity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActivityKind {
    /// A request arrived.
    Request,
    /// A tool started running.
    Processing,
    /// A request or tool completed.
    Success,
    /// A request or tool failed.
    Error,
}

/// One observer notification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActivityEvent {
    /// Event kind.
    pub kind: ActivityKind,
    /// Originating component or tool name.
    pub source: String,
    /// Human-readable message.
    pub message: String,
    /// When the event was published.
    pub timestamp: DateTime<Utc>,
}

impl ActivityEvent {
    /// Create an event stamped with the current time.
    #[must_use]
    pub fn new(kind: ActivityKind, source: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            kind,
            source: source.into(),
            message: message.into(),
            timestamp: Utc::now(),
        }
    }
}

/// Fire-and-forget publisher of [`ActivityEvent`]s.
#[derive(Clone)]
pub struct ActivityFeed {
    tx: broadcast::Sender<ActivityEvent>,
}

impl Default for ActivityFeed {
    fn default() -> Self {
        Self::new(DEFAULT_ACTIVITY_CAPACITY)
    }
}

impl ActivityFeed {
    /// Create a feed buffering up to `capacity` events per subscriber.
    #[must_use]
    pub fn new(capacity: usize) -> Self {
        let (tx, _rx) = broadcast::channel(capacity.max(1));
        Self { tx }
    }

    /// Subscribe to future events.
    #[must_use]
    pub fn subscribe(&self) -> broadcast::Receiver<ActivityEvent> {
        self.tx.subscribe()
    }

    /// Publish an event.
    pub fn publish(&self, event: ActivityEvent) {
        // Best-effort send - don't block if no receivers
        let _ = self.tx.send(event);
    }

    /// Publish a [`ActivityKind::Request`] event.
    pub fn request(&self, source: &str, message: impl Into<String>) {
        self.publish(ActivityEvent::new(ActivityKind::Request, source, message));
    }

    /// Publish a [`ActivityKind::Processing`] event.
    pub fn processing(&self, source: &str, message: impl Into<String>) {
        self.publish(ActivityEvent::new(ActivityKind::Processing, source, message));
    }

    /// Publish a [`ActivityKind::Success`] event.
    pub fn success(&self, source: &str, message: impl Into<String>) {
        self.publish(ActivityEvent::new(ActivityKind::Success, source, message));
    }

    /// Publish a [`ActivityKind::Error`] event.
    pub fn error(&self, source: &str, message: impl Into<String>) {
        self.publish(ActivityEvent::new(ActivityKind::Error, source, message));
    }

    /// Number of live subscribers.
    #[must_use]
    pub fn subscriber_count(&self) -> usize {
        self.tx.receiver_count()
    }
}

impl std::fmt::Debug for ActivityFeed {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ActivityFeed")
            .field("subscribers", &self.tx.receiver_count())
            .finish_non_exhaustive()
    }
}
