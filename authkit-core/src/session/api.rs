//! Credential-exchange collaborator contract.
//!
//! The HTTP transport lives outside this crate; the session manager only
//! depends on this trait.

use async_trait::async_trait;

use super::types::{LoginCredentials, TokenGrant};

/// Outcome of a login exchange.
///
/// An unsuccessful outcome is a server-side rejection, not a transport
/// failure; transport failures surface as [`ExchangeError`] from the
/// implementation.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Whether the server accepted the credentials.
    pub successful: bool,
    /// Server-supplied message, set on rejection.
    pub message: Option<String>,
    /// The granted tokens, set on success.
    pub auth_response: Option<TokenGrant>,
}

/// Failure of a credential or refresh exchange.
#[derive(Debug, Clone, thiserror::Error)]
#[error("{message}")]
pub struct ExchangeError {
    /// Human-readable failure description.
    pub message: String,
    /// HTTP status of the response, if one was received.
    pub status: Option<u16>,
}

impl ExchangeError {
    /// A failure with no HTTP status, e.g. a dropped connection.
    #[must_use]
    pub fn network(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: None,
        }
    }

    /// A failure carrying the HTTP status of the response.
    #[must_use]
    pub fn http(status: u16, message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
            status: Some(status),
        }
    }

    /// Whether this failure means the credentials themselves are no longer
    /// valid. A 4xx refresh rejection is permanent, except 408 (request
    /// timeout) and 429 (rate limited) which a later attempt may survive;
    /// 5xx responses and transport failures are transient and worth
    /// retrying.
    #[must_use]
    pub fn is_permanent(&self) -> bool {
        self.status
            .is_some_and(|s| (400..500).contains(&s) && s != 408 && s != 429)
    }
}

/// Exchanges credentials for token grants. Implemented by the HTTP layer,
/// mocked in tests.
#[async_trait]
pub trait CredentialExchange: Send + Sync {
    /// Exchanges username/password for a token grant.
    ///
    /// # Errors
    /// Returns an error on transport failure; a server-side rejection is a
    /// successful call with `successful == false`.
    async fn login(&self, credentials: &LoginCredentials) -> Result<LoginOutcome, ExchangeError>;

    /// Exchanges a refresh token for a fresh grant.
    ///
    /// # Errors
    /// Returns an error on rejection or transport failure; `status` carries
    /// the HTTP status when one was received.
    async fn refresh(&self, refresh_token: &str) -> Result<TokenGrant, ExchangeError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_permanent_is_4xx_minus_the_retryable_statuses() {
        assert!(ExchangeError::http(400, "bad request").is_permanent());
        assert!(ExchangeError::http(401, "unauthorized").is_permanent());
        assert!(ExchangeError::http(403, "forbidden").is_permanent());
        assert!(!ExchangeError::http(408, "request timeout").is_permanent());
        assert!(!ExchangeError::http(429, "rate limited").is_permanent());
        assert!(!ExchangeError::http(500, "server error").is_permanent());
        assert!(!ExchangeError::http(503, "unavailable").is_permanent());
        assert!(!ExchangeError::network("connection reset").is_permanent());
    }

    #[test]
    fn test_display_is_the_message() {
        assert_eq!(
            ExchangeError::http(401, "token revoked").to_string(),
            "token revoked"
        );
    }
}
