//! Token provider
//!
//! Exchanges stored credentials for a session token. The token is read-only
//! once obtained and shared by every request of a run, including concurrent
//! publish-phase tasks. Expiry is not tracked locally.

use crate::api::PublishingApi;
use crate::config::Credentials;
use crate::error::Result;
use std::fmt;
use std::sync::Arc;
use tracing::{info, instrument};

/// Session token sent as the `X-Florence-Token` header
#[derive(Clone, PartialEq, Eq)]
pub struct Token(Arc<str>);

impl Token {
    /// Build a token from the raw login response body.
    ///
    /// The login endpoint answers with a JSON string, so surrounding quotes
    /// and whitespace are stripped.
    pub fn from_login_response(body: &str) -> Self {
        Self(Arc::from(body.trim().trim_matches('"')))
    }

    pub fn new(value: impl AsRef<str>) -> Self {
        Self(Arc::from(value.as_ref()))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Debug for Token {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str("Token(<redacted>)")
    }
}

/// Log in and return the session token.
#[instrument(skip_all, fields(email = %credentials.email))]
pub async fn login(api: &dyn PublishingApi, credentials: &Credentials) -> Result<Token> {
    let token = api.login(credentials).await?;
    info!("Obtained access token");
    Ok(token)
}

#[cfg(test)]
#[allow(clippy::unwrap_used, clippy::expect_used)]
mod tests {
    use super::*;

    #[test]
    fn test_token_strips_quotes() {
        let token = Token::from_login_response("\"abc123\"\n");
        assert_eq!(token.as_str(), "abc123");

        let bare = Token::from_login_response("abc123");
        assert_eq!(bare, token);
    }

    #[test]
    fn test_token_debug_is_redacted() {
        let token = Token::new("secret-token");
        assert!(!format!("{:?}", token).contains("secret"));
    }
}
