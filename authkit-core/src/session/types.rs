//! Session state, the persisted token bundle, and pure expiry arithmetic.

use serde::{Deserialize, Serialize};
use strum::Display;

use crate::claims::Claims;

/// Default access-token lifetime when the server omits `expires_in`.
pub const DEFAULT_ACCESS_TOKEN_TTL_MS: i64 = 3600 * 1000;

/// Refresh window opens this long before access-token expiry.
pub const ACCESS_TOKEN_REFRESH_BUFFER_MS: i64 = 5 * 60 * 1000;

/// Refresh tokens are treated as valid for one year after issuance.
pub const REFRESH_TOKEN_TTL_MS: i64 = 365 * 24 * 60 * 60 * 1000;

/// Lifecycle state of the session singleton.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Display, Serialize, Deserialize)]
#[strum(serialize_all = "camelCase")]
#[serde(rename_all = "camelCase")]
pub enum AuthStatus {
    /// Process start, before hydration.
    Idle,
    /// Login in flight.
    Loading,
    /// Authenticated with a token bundle.
    SignedIn,
    /// No credentials.
    SignedOut,
    /// Last login attempt failed; message in `AuthSession::error`.
    Error,
    /// First-run onboarding flow.
    Onboarding,
}

/// Credentials submitted to the login exchange.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LoginCredentials {
    /// Account username.
    pub username: String,
    /// Account password.
    pub password: String,
}

/// Token grant returned by the credential-exchange collaborator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TokenGrant {
    /// Bearer token for API calls.
    pub access_token: String,
    /// Token exchanged for new grants.
    pub refresh_token: String,
    /// Identity token carrying the claims payload.
    pub id_token: String,
    /// Access-token lifetime in seconds.
    pub expires_in: i64,
    /// Grant type, typically `Bearer`.
    pub token_type: String,
    /// Server-computed expiry instant, RFC 3339.
    #[serde(default)]
    pub expiration_date: Option<String>,
}

/// The durably persisted token bundle, stored under the `authResponse` key.
///
/// A [`TokenGrant`] stamped with the instant it was obtained. The stamp is
/// the sole input to refresh-token age math on hydration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StoredAuthResponse {
    /// The granted tokens.
    #[serde(flatten)]
    pub grant: TokenGrant,
    /// Instant the grant was obtained, epoch milliseconds.
    pub obtained_at: i64,
}

/// In-memory session state. Singleton, mutated only by the session manager.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AuthSession {
    /// Bearer token, present iff signed in.
    pub access_token: Option<String>,
    /// Refresh token, present iff signed in.
    pub refresh_token: Option<String>,
    /// Instant the access token was obtained, epoch milliseconds.
    pub access_token_obtained_at: Option<i64>,
    /// Instant the refresh token was obtained, epoch milliseconds.
    pub refresh_token_obtained_at: Option<i64>,
    /// Access-token lifetime in milliseconds, from the server grant.
    pub access_token_ttl_ms: i64,
    /// Lifecycle state.
    pub status: AuthStatus,
    /// Message from the last failed login, if any.
    pub error: Option<String>,
    /// Decoded identity claims.
    pub profile: Option<Claims>,
    /// Subject identifier from the claims.
    pub user_id: Option<String>,
    /// Whether the onboarding flow should be shown.
    pub is_first_time: bool,
}

impl Default for AuthSession {
    fn default() -> Self {
        Self {
            access_token: None,
            refresh_token: None,
            access_token_obtained_at: None,
            refresh_token_obtained_at: None,
            access_token_ttl_ms: DEFAULT_ACCESS_TOKEN_TTL_MS,
            status: AuthStatus::Idle,
            error: None,
            profile: None,
            user_id: None,
            is_first_time: true,
        }
    }
}

impl AuthSession {
    /// The cleared state after logout or failed hydration.
    #[must_use]
    pub fn signed_out() -> Self {
        Self {
            status: AuthStatus::SignedOut,
            ..Self::default()
        }
    }

    /// Whether the access token has outlived its TTL at `now_ms`.
    ///
    /// Missing token or timestamp counts as expired.
    #[must_use]
    pub fn is_access_token_expired_at(&self, now_ms: i64) -> bool {
        match (&self.access_token, self.access_token_obtained_at) {
            (Some(_), Some(obtained_at)) => {
                now_ms - obtained_at >= self.access_token_ttl_ms
            }
            _ => true,
        }
    }

    /// Whether the access token is inside the pre-expiry refresh buffer at
    /// `now_ms`.
    #[must_use]
    pub fn is_access_token_expiring_soon_at(&self, now_ms: i64) -> bool {
        match (&self.access_token, self.access_token_obtained_at) {
            (Some(_), Some(obtained_at)) => {
                now_ms - obtained_at
                    >= self.access_token_ttl_ms - ACCESS_TOKEN_REFRESH_BUFFER_MS
            }
            _ => true,
        }
    }

    /// Whether the refresh token has outlived its one-year TTL at `now_ms`.
    #[must_use]
    pub fn is_refresh_token_expired_at(&self, now_ms: i64) -> bool {
        match (&self.refresh_token, self.refresh_token_obtained_at) {
            (Some(_), Some(obtained_at)) => now_ms - obtained_at >= REFRESH_TOKEN_TTL_MS,
            _ => true,
        }
    }

    /// Whether a refresh should be attempted at `now_ms`: the access token
    /// is expired or expiring soon while the refresh token is still valid.
    #[must_use]
    pub fn should_refresh_token_at(&self, now_ms: i64) -> bool {
        if self.access_token.is_none() || self.refresh_token.is_none() {
            return false;
        }
        self.is_access_token_expiring_soon_at(now_ms)
            && !self.is_refresh_token_expired_at(now_ms)
    }

    /// Whether the session is usable at `now_ms`: signed in, both tokens
    /// present, refresh token not expired.
    #[must_use]
    pub fn is_authenticated_at(&self, now_ms: i64) -> bool {
        self.status == AuthStatus::SignedIn
            && self.access_token.is_some()
            && self.refresh_token.is_some()
            && !self.is_refresh_token_expired_at(now_ms)
    }
}
