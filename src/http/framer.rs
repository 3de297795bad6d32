//! HTTP message framing over a raw byte stream.
//!
//! Reads until the `\r\n\r\n` header terminator (bounded by the header cap),
//! then reads the declared body (bounded by the body cap). The whole step is
//! bounded by the receive timeout. A peer that closes mid-body yields the
//! bytes received so far.

use tokio::io::{AsyncRead, AsyncReadExt};

use super::HttpRequest;
use crate::config::TransportConfig;
use crate::error::FrameError;

const CHUNK_SIZE: usize = 4096;
const HEADER_TERMINATOR: &[u8] = b"\r\n\r\n";

/// Read one complete HTTP request from `reader`.
///
/// # Errors
///
/// Returns a [`FrameError`] when the peer sends nothing, the header block
/// exceeds the cap, the declared body exceeds the cap, the request line is
/// malformed, the socket fails, or the receive timeout elapses.
pub async fn read_request<R>(reader: &mut R, limits: &TransportConfig) -> Result<HttpRequest, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let timeout_ms = u64::try_from(limits.recv_timeout.as_millis()).unwrap_or(u64::MAX);
    tokio::time::timeout(limits.recv_timeout, frame(reader, limits))
        .await
        .map_err(|_| FrameError::Timeout { timeout_ms })?
}

async fn frame<R>(reader: &mut R, limits: &TransportConfig) -> Result<HttpRequest, FrameError>
where
    R: AsyncRead + Unpin + ?Sized,
{
    let mut buf = Vec::with_capacity(CHUNK_SIZE);
    let mut chunk = [0u8; CHUNK_SIZE];

    let header_end = loop {
        let n = reader.read(&mut chunk).await.map_err(io_error)?;
        if n == 0 {
            return Err(if buf.is_empty() {
                FrameError::ConnectionClosed
            } else {
                FrameError::IncompleteHeaders { received: buf.len() }
            });
        }
        let search_from = buf.len().saturating_sub(HEADER_TERMINATOR.len() - 1);
        buf.extend_from_slice(&chunk[..n]);

        if let Some(pos) = find_terminator(&buf[search_from..]) {
            break search_from + pos;
        }
        if buf.len() > limits.max_header_bytes {
            return Err(FrameError::HeaderTooLarge {
                limit: limits.max_header_bytes,
            });
        }
    };

    let head = &buf[..header_end];
    let declared = content_length(head);
    if declared > limits.max_body_bytes {
        return Err(FrameError::BodyTooLarge {
            declared,
            limit: limits.max_body_bytes,
        });
    }

    let mut body = buf[header_end + HEADER_TERMINATOR.len()..].to_vec();
    while body.len() < declared {
        let n = reader.read(&mut chunk).await.map_err(io_error)?;
        if n == 0 {
            tracing::debug!(
                declared,
                received = body.len(),
                "Peer closed before body completed"
            );
            break;
        }
        body.extend_from_slice(&chunk[..n]);
    }
    body.truncate(declared);

    HttpRequest::parse(head, body)
}

fn find_terminator(haystack: &[u8]) -> Option<usize> {
    haystack
        .windows(HEADER_TERMINATOR.len())
        .position(|window| window == HEADER_TERMINATOR)
}

/// Declared `Content-Length` of a header block.
///
/// The header name matches case-insensitively and the value is trimmed of
/// spaces and tabs. Only the leading digits count; a missing or non-numeric
/// value is zero, an overflowing one saturates.
#[must_use]
pub fn content_length(head: &[u8]) -> usize {
    let text = String::from_utf8_lossy(head);
    text.split("\r\n")
        .skip(1)
        .filter_map(|line| line.split_once(':'))
        .find(|(name, _)| name.trim().eq_ignore_ascii_case("content-length"))
        .map_or(0, |(_, value)| {
            let digits: String = value
                .trim_matches(|c| c == ' ' || c == '\t')
                .chars()
                .take_while(char::is_ascii_digit)
                .collect();
            if digits.is_empty() {
                0
            } else {
                digits.parse().unwrap_or(usize::MAX)
            }
        })
}

fn io_error(err: std::io::Error) -> FrameError {
    FrameError::Io {
        message: err.to_string(),
    }
}
