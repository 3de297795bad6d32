//! Bearer token authorization.

use tracing::debug;

use crate::config::SecretString;
use crate::http::HttpRequest;
use crate::traits::Authorizer;

/// Authorizes requests carrying `Authorization: Bearer <token>`.
///
/// Without a configured token every request is allowed.
#[derive(Debug, Clone, Default)]
pub struct BearerTokenAuthorizer {
    token: Option<SecretString>,
}

impl BearerTokenAuthorizer {
    /// Create an authorizer for `token`. Empty tokens disable the check.
    #[must_use]
    pub fn new(token: Option<SecretString>) -> Self {
        Self {
            token: token.filter(|t| !t.is_empty()),
        }
    }

    /// Returns true when a token is configured.
    #[must_use]
    pub const fn is_enabled(&self) -> bool {
        self.token.is_some()
    }
}

impl Authorizer for BearerTokenAuthorizer {
    fn authorize(&self, request: &HttpRequest) -> bool {
        let Some(expected) = &self.token else {
            return true;
        };

        let presented = request.header("authorization").and_then(|value| {
            let (scheme, token) = value.trim().split_once(' ')?;
            scheme.eq_ignore_ascii_case("bearer").then(|| token.trim())
        });

        match presented {
            Some(token) if expected.matches(token) => true,
            Some(_) => {
                debug!(path = %request.path, "Rejected bearer token");
                false
            }
            None => {
                debug!(path = %request.path, "Missing bearer token");
                false
            }
        }
    }
}
