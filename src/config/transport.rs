//! Fixed transport limits.

use std::time::Duration;

/// Configuration for HTTP framing and socket timeouts.
///
/// These bounds are protocol constants rather than user settings; tests
/// shrink them to keep timeouts fast.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TransportConfig {
    /// Maximum header block size in bytes.
    pub max_header_bytes: usize,
    /// Maximum declared body size in bytes.
    pub max_body_bytes: usize,
    /// Total time allowed to frame one request.
    pub recv_timeout: Duration,
    /// Write timeout on ordinary connections.
    pub send_timeout: Duration,
    /// Write timeout on streaming connections.
    pub stream_send_timeout: Duration,
    /// Interval between streaming heartbeats.
    pub heartbeat_interval: Duration,
    /// Granularity of the heartbeat sleep.
    pub heartbeat_tick: Duration,
    /// Interval between rate limiter sweeps and the accept poll.
    pub poll_interval: Duration,
}

impl Default for TransportConfig {
    fn default() -> Self {
        Self {
            max_header_bytes: 16 * 1024,
            max_body_bytes: 4 * 1024 * 1024,
            recv_timeout: Duration::from_secs(30),
            send_timeout: Duration::from_secs(10),
            stream_send_timeout: Duration::from_secs(5),
            heartbeat_interval: Duration::from_secs(15),
            heartbeat_tick: Duration::from_secs(1),
            poll_interval: Duration::from_secs(1),
        }
    }
}

impl TransportConfig {
    /// Number of heartbeat ticks per heartbeat interval (at least one).
    #[must_use]
    pub fn heartbeat_ticks(&self) -> u32 {
        let tick = self.heartbeat_tick.as_millis().max(1);
        let ticks = (self.heartbeat_interval.as_millis() / tick).max(1);
        u32::try_from(ticks).unwrap_or(u32::MAX)
    }
}
