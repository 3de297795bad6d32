//! Parsed HTTP request.

use crate::error::FrameError;

/// A fully framed HTTP request.
///
/// Header names are stored lowercase; lookups are case-insensitive.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct HttpRequest {
    /// Request method, as sent (`GET`, `POST`, ...).
    pub method: String,
    /// Path component of the request target.
    pub path: String,
    /// Raw query string without the leading `?`.
    pub query: String,
    headers: Vec<(String, String)>,
    /// Body bytes, at most the declared `Content-Length`.
    pub body: Vec<u8>,
}

impl HttpRequest {
    /// Create a request from a method and a request target (`/path?query`).
    #[must_use]
    pub fn new(method: impl Into<String>, target: &str) -> Self {
        let (path, query) = split_target(target);
        Self {
            method: method.into(),
            path,
            query,
            headers: Vec::new(),
            body: Vec::new(),
        }
    }

    /// Add a header.
    #[must_use]
    pub fn with_header(mut self, name: &str, value: impl Into<String>) -> Self {
        self.headers.push((name.to_ascii_lowercase(), value.into()));
        self
    }

    /// Set the body.
    #[must_use]
    pub fn with_body(mut self, body: impl Into<Vec<u8>>) -> Self {
        self.body = body.into();
        self
    }

    /// Parse a header block (without the blank-line terminator) and attach `body`.
    ///
    /// # Errors
    ///
    /// Returns [`FrameError::Malformed`] when the request line is not
    /// `METHOD TARGET VERSION`.
    pub fn parse(head: &[u8], body: Vec<u8>) -> Result<Self, FrameError> {
        let text = String::from_utf8_lossy(head);
        let mut lines = text.split("\r\n");

        let request_line = lines.next().unwrap_or_default();
        let mut parts = request_line.split_whitespace();
        let (Some(method), Some(target), Some(_version)) = (parts.next(), parts.next(), parts.next())
        else {
            return Err(FrameError::Malformed {
                message: format!("invalid request line: {request_line:?}"),
            });
        };

        let mut request = Self::new(method, target);
        for line in lines {
            if let Some((name, value)) = line.split_once(':') {
                request
                    .headers
                    .push((name.trim().to_ascii_lowercase(), value.trim().to_string()));
            }
        }
        request.body = body;
        Ok(request)
    }

    /// Case-insensitive header lookup (first occurrence).
    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers
            .iter()
            .find(|(key, _)| key.eq_ignore_ascii_case(name))
            .map(|(_, value)| value.as_str())
    }

    /// All headers as lowercase name/value pairs.
    #[must_use]
    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Percent-decoded query parameter (first occurrence).
    #[must_use]
    pub fn query_param(&self, name: &str) -> Option<String> {
        self.query
            .split('&')
            .filter_map(|pair| pair.split_once('=').or(Some((pair, ""))))
            .find(|(key, _)| decode_component(key) == name)
            .map(|(_, value)| decode_component(value))
    }

    /// Body as UTF-8 text, replacing invalid sequences.
    #[must_use]
    pub fn body_text(&self) -> String {
        String::from_utf8_lossy(&self.body).into_owned()
    }

    /// Returns true when the method matches, ignoring case.
    #[must_use]
    pub fn is_method(&self, method: &str) -> bool {
        self.method.eq_ignore_ascii_case(method)
    }
}

fn split_target(target: &str) -> (String, String) {
    match target.split_once('?') {
        Some((path, query)) => (path.to_string(), query.to_string()),
        None => (target.to_string(), String::new()),
    }
}

/// Decode one query component: `+` is a space, `%XX` escapes are decoded
/// and malformed escapes are kept verbatim.
fn decode_component(input: &str) -> String {
    let spaced = input.replace('+', " ");
    String::from_utf8_lossy(&urlencoding::decode_binary(spaced.as_bytes())).into_owned()
}
