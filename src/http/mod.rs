//! Minimal HTTP/1.1 layer.
//!
//! This module provides:
//! - [`read_request`]: Bounded framing of one request from a byte stream
//! - [`HttpRequest`]: Parsed request with case-insensitive headers
//! - [`HttpResponse`]: Response builder with permissive CORS

mod framer;
mod request;
mod response;

pub use framer::{content_length, read_request};
pub use request::HttpRequest;
pub use response::{reason_phrase, HttpResponse, ALLOW_ORIGIN};
