//! Session stores for both transports.
//!
//! - [`StreamingSessionStore`]: sessions bound to a live event-stream
//!   connection, capped and swept by TTL when new sessions are requested
//! - [`RequestResponseStore`]: metadata-only sessions for the stateless
//!   `/mcp` transport, tracked by a header-carried id
//!
//! Both stores key sessions by a 32-character lowercase hex id drawn from a
//! uniform random source.

mod request_response;
mod streaming;

pub use request_response::{RequestResponseSession, RequestResponseStore};
pub use streaming::{
    CapacityExceeded, EventWriter, StreamingSession, StreamingSessionStore, StreamingStoreConfig,
};

use rand::Rng;

/// Length of a session id in characters.
pub const SESSION_ID_LEN: usize = 32;

const HEX_DIGITS: &[u8; 16] = b"0123456789abcdef";

/// Generate a fresh 32-character lowercase hex session id.
#[must_use]
pub fn generate_session_id() -> String {
    let mut rng = rand::thread_rng();
    (0..SESSION_ID_LEN)
        .map(|_| char::from(HEX_DIGITS[rng.gen_range(0..HEX_DIGITS.len())]))
        .collect()
}

/// Returns true when `id` has the shape of a session id.
///
/// Uppercase hex is accepted on input; generated ids are always lowercase.
#[must_use]
pub fn is_valid_session_id(id: &str) -> bool {
    id.len() == SESSION_ID_LEN && id.bytes().all(|b| b.is_ascii_hexdigit())
}
