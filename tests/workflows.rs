//! End-to-end tests against a real listener on an ephemeral port.
//!
//! - Request/response transport: initialize → list → call
//! - Streaming transport: connect → endpoint → messages over the stream
//! - REST surface and authorization
//! - Rate limiting, stream capacity and shutdown

mod integration;
