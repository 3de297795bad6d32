//! Per-client sliding-window rate limiting.
//!
//! Each client address owns an ordered list of admission timestamps. A call
//! first drops timestamps older than the window, then admits (and records)
//! only if fewer than the maximum remain. Rejections are not recorded.
//!
//! A single mutex covers the whole map; the number of distinct simultaneous
//! clients of a single-host agent is small.

use std::collections::{HashMap, VecDeque};
use std::net::IpAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::Config;

/// Configuration for the rate limiter.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimiterConfig {
    /// Requests admitted per client per window.
    pub max_requests: usize,
    /// Length of the sliding window.
    pub window: Duration,
}

impl Default for RateLimiterConfig {
    fn default() -> Self {
        Self {
            max_requests: 120,
            window: Duration::from_secs(60),
        }
    }
}

impl From<&Config> for RateLimiterConfig {
    fn from(config: &Config) -> Self {
        Self {
            max_requests: config.rate_limit_max_requests as usize,
            window: config.rate_limit_window(),
        }
    }
}

/// Sliding-window limiter keyed by client address.
#[derive(Debug)]
pub struct RateLimiter {
    windows: Mutex<HashMap<IpAddr, VecDeque<Instant>>>,
    config: RateLimiterConfig,
}

impl RateLimiter {
    /// Create a limiter.
    #[must_use]
    pub fn new(config: RateLimiterConfig) -> Self {
        info!(
            max_requests = config.max_requests,
            window_ms = u64::try_from(config.window.as_millis()).unwrap_or(u64::MAX),
            "Rate limiter configured"
        );
        Self {
            windows: Mutex::new(HashMap::new()),
            config,
        }
    }

    /// Returns the limiter configuration.
    #[must_use]
    pub const fn config(&self) -> &RateLimiterConfig {
        &self.config
    }

    /// Admit or reject a call from `client` at the current instant.
    pub fn allow(&self, client: IpAddr) -> bool {
        self.allow_at(client, Instant::now())
    }

    /// Admit or reject a call from `client` at `now`.
    pub fn allow_at(&self, client: IpAddr, now: Instant) -> bool {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let window = windows.entry(client).or_default();
        prune(window, now, self.config.window);

        if window.len() >= self.config.max_requests {
            debug!(%client, in_window = window.len(), "Rate limit exceeded");
            return false;
        }
        window.push_back(now);
        true
    }

    /// Drop expired timestamps and remove empty client buckets.
    ///
    /// Returns the number of buckets removed.
    pub fn cleanup(&self) -> usize {
        self.cleanup_at(Instant::now())
    }

    /// [`RateLimiter::cleanup`] evaluated at `now`.
    pub fn cleanup_at(&self, now: Instant) -> usize {
        let mut windows = self.windows.lock().unwrap_or_else(PoisonError::into_inner);
        let before = windows.len();
        windows.retain(|_, window| {
            prune(window, now, self.config.window);
            !window.is_empty()
        });
        let removed = before - windows.len();
        if removed > 0 {
            debug!(
                removed,
                remaining = windows.len(),
                "Cleaned up idle rate limiter buckets"
            );
        }
        removed
    }

    /// Number of tracked client addresses.
    #[must_use]
    pub fn tracked_clients(&self) -> usize {
        self.windows
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    /// Spawn a background task that calls [`RateLimiter::cleanup`] once per
    /// window until `shutdown` fires.
    pub fn spawn_cleanup_task(self: &Arc<Self>, shutdown: CancellationToken) {
        let limiter = Arc::clone(self);
        let period = limiter.config.window.max(Duration::from_millis(10));
        tokio::spawn(async move {
            let mut tick = tokio::time::interval(period);
            tick.tick().await;
            loop {
                tokio::select! {
                    _ = tick.tick() => {
                        limiter.cleanup();
                    }
                    () = shutdown.cancelled() => {
                        debug!("Rate limiter cleanup task shutting down");
                        break;
                    }
                }
            }
        });
    }
}

fn prune(window: &mut VecDeque<Instant>, now: Instant, length: Duration) {
    while let Some(&oldest) = window.front() {
        if now.saturating_duration_since(oldest) >= length {
            window.pop_front();
        } else {
            break;
        }
    }
}
