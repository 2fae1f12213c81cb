//! The session state machine.
//!
//! Owns the `AuthSession` singleton and the only code paths allowed to
//! mutate it: `login`, `logout`, `refresh_access_token`, `hydrate` and
//! `set_onboarding`. Token bundles are always persisted before the
//! corresponding in-memory transition becomes visible, so a crash mid-login
//! cannot leave a signed-in state that was never durably recorded.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};

use chrono::Utc;
use tracing::{error, info, warn};

use crate::claims::decode_claims;
use crate::error::AuthError;
use crate::storage::{SecureKvStore, AUTH_RESPONSE_KEY};

use super::api::{CredentialExchange, ExchangeError};
use super::types::{
    AuthSession, AuthStatus, LoginCredentials, StoredAuthResponse, TokenGrant,
    DEFAULT_ACCESS_TOKEN_TTL_MS,
};

/// Drives the session lifecycle against a credential exchange and a secure
/// store.
///
/// All mutation goes through `&self`; the manager is shared behind an `Arc`
/// by the API layer and any refresh interceptor.
pub struct SessionManager {
    exchange: Arc<dyn CredentialExchange>,
    store: Arc<SecureKvStore>,
    state: Mutex<AuthSession>,
    // Single-flight gate: overlapping refresh attempts collapse into one
    // exchange call and one state transition.
    refresh_gate: tokio::sync::Mutex<()>,
}

impl SessionManager {
    /// Creates a manager in the `Idle` state. Call [`hydrate`](Self::hydrate)
    /// to restore a persisted session.
    #[must_use]
    pub fn new(exchange: Arc<dyn CredentialExchange>, store: Arc<SecureKvStore>) -> Self {
        Self {
            exchange,
            store,
            state: Mutex::new(AuthSession::default()),
            refresh_gate: tokio::sync::Mutex::new(()),
        }
    }

    /// Snapshot of the current session state.
    #[must_use]
    pub fn session(&self) -> AuthSession {
        self.state().clone()
    }

    /// Whether the session is usable right now.
    #[must_use]
    pub fn is_authenticated(&self) -> bool {
        self.state().is_authenticated_at(now_ms())
    }

    /// Whether the access token has outlived its TTL.
    #[must_use]
    pub fn is_access_token_expired(&self) -> bool {
        self.state().is_access_token_expired_at(now_ms())
    }

    /// Whether the refresh token has outlived its TTL.
    #[must_use]
    pub fn is_refresh_token_expired(&self) -> bool {
        self.state().is_refresh_token_expired_at(now_ms())
    }

    /// Whether a refresh should be attempted now.
    #[must_use]
    pub fn should_refresh_token(&self) -> bool {
        self.state().should_refresh_token_at(now_ms())
    }

    /// Exchanges `credentials` for a session.
    ///
    /// Failures never escape: the outcome is readable from
    /// [`session`](Self::session) as `status` plus `error`.
    pub async fn login(&self, credentials: &LoginCredentials) {
        self.update(|s| {
            s.status = AuthStatus::Loading;
            s.error = None;
        });

        if let Err(err) = self.try_login(credentials).await {
            error!(
                username = %credentials.username,
                error = %err,
                "login failed"
            );
            self.update(|s| {
                s.status = AuthStatus::Error;
                s.error = Some(err.to_string());
            });
        }
    }

    async fn try_login(&self, credentials: &LoginCredentials) -> Result<(), AuthError> {
        let outcome = self.exchange.login(credentials).await?;

        if !outcome.successful {
            let message = outcome
                .message
                .unwrap_or_else(|| "Login failed".to_string());
            error!(
                username = %credentials.username,
                message = %message,
                "login rejected by server"
            );
            self.update(|s| {
                s.status = AuthStatus::Error;
                s.error = Some(message);
            });
            return Ok(());
        }

        let grant = outcome.auth_response.ok_or(AuthError::MissingIdToken)?;
        if grant.id_token.is_empty() {
            return Err(AuthError::MissingIdToken);
        }
        let claims = decode_claims(&grant.id_token)?;

        let now = now_ms();
        self.persist_grant(&grant, now)?;

        let ttl_ms = access_ttl_ms(&grant);
        self.update(|s| {
            s.access_token = Some(grant.access_token.clone());
            s.refresh_token = Some(grant.refresh_token.clone());
            s.access_token_obtained_at = Some(now);
            s.refresh_token_obtained_at = Some(now);
            s.access_token_ttl_ms = ttl_ms;
            s.status = AuthStatus::SignedIn;
            s.error = None;
            s.user_id = Some(claims.sub.clone());
            s.profile = Some(claims.clone());
        });

        info!(
            username = %credentials.username,
            user_id = %claims.sub,
            obtained_at = now,
            "user successfully logged in"
        );
        Ok(())
    }

    /// Tears the session down to `SignedOut` and removes the persisted
    /// bundle so it cannot re-hydrate.
    ///
    /// A `reason` marks a forced logout (expired or rejected refresh token);
    /// `None` is a voluntary one. Idempotent.
    pub async fn logout(&self, reason: Option<&str>) {
        let snapshot = self.session();
        let was_authenticated = snapshot.is_authenticated_at(now_ms());

        if was_authenticated {
            if let Some(reason) = reason {
                error!(
                    user_id = snapshot.user_id.as_deref().unwrap_or(""),
                    reason,
                    access_token_obtained_at = snapshot.access_token_obtained_at,
                    refresh_token_obtained_at = snapshot.refresh_token_obtained_at,
                    "user forced to logout due to authentication issue"
                );
            } else {
                info!(
                    user_id = snapshot.user_id.as_deref().unwrap_or(""),
                    "user logged out voluntarily"
                );
            }
        }

        if let Err(err) = self.store.delete(AUTH_RESPONSE_KEY) {
            warn!(error = %err, "failed to remove persisted auth response during logout");
        }

        self.update(|s| *s = AuthSession::signed_out());
    }

    /// Exchanges the current refresh token for a fresh grant.
    ///
    /// Missing or expired refresh tokens force an immediate logout without a
    /// network call. A permanent rejection (4xx) forces logout with reason
    /// `"Token refresh failed"` and resolves `Ok`. Overlapping callers
    /// collapse into a single exchange call.
    ///
    /// Unlike login, a failed bundle write here does not abort the commit:
    /// the grant is already valid and the old refresh token may be spent, so
    /// the in-memory session is updated anyway and the stale persisted
    /// bundle is left to the hydration age checks.
    ///
    /// # Errors
    /// Returns the exchange error only when it is transient (network
    /// failure, 5xx); the session is left untouched so the caller can retry.
    pub async fn refresh_access_token(&self) -> Result<(), ExchangeError> {
        let stamp_before = self.state().access_token_obtained_at;
        let _gate = self.refresh_gate.lock().await;

        let snapshot = self.session();
        // A concurrent caller already refreshed while we waited on the gate.
        if snapshot.access_token_obtained_at != stamp_before {
            return Ok(());
        }

        let Some(refresh_token) = snapshot.refresh_token.clone() else {
            error!(
                user_id = snapshot.user_id.as_deref().unwrap_or(""),
                "no refresh token available for token refresh"
            );
            self.logout(Some("No refresh token available")).await;
            return Ok(());
        };

        if snapshot.is_refresh_token_expired_at(now_ms()) {
            error!(
                user_id = snapshot.user_id.as_deref().unwrap_or(""),
                refresh_token_obtained_at = snapshot.refresh_token_obtained_at,
                "refresh token expired, forcing logout"
            );
            self.logout(Some("Refresh token expired")).await;
            return Ok(());
        }

        info!(
            user_id = snapshot.user_id.as_deref().unwrap_or(""),
            "attempting to refresh access token"
        );

        match self.exchange.refresh(&refresh_token).await {
            Ok(grant) => {
                let now = now_ms();
                if let Err(err) = self.persist_grant(&grant, now) {
                    // Best-effort: the session stays usable, hydration may
                    // see a stale bundle.
                    warn!(error = %err, "failed to persist refreshed auth response");
                }

                let ttl_ms = access_ttl_ms(&grant);
                self.update(|s| {
                    s.access_token = Some(grant.access_token.clone());
                    s.refresh_token = Some(grant.refresh_token.clone());
                    s.access_token_obtained_at = Some(now);
                    s.refresh_token_obtained_at = Some(now);
                    s.access_token_ttl_ms = ttl_ms;
                    s.status = AuthStatus::SignedIn;
                    s.error = None;
                });

                info!(
                    user_id = snapshot.user_id.as_deref().unwrap_or(""),
                    obtained_at = now,
                    "successfully refreshed access token"
                );
                Ok(())
            }
            Err(err) if err.is_permanent() => {
                error!(
                    user_id = snapshot.user_id.as_deref().unwrap_or(""),
                    status = err.status,
                    error = %err,
                    "failed to refresh access token, forcing logout"
                );
                self.logout(Some("Token refresh failed")).await;
                Ok(())
            }
            Err(err) => {
                warn!(
                    user_id = snapshot.user_id.as_deref().unwrap_or(""),
                    error = %err,
                    "transient refresh failure, session preserved"
                );
                Err(err)
            }
        }
    }

    /// Restores the session from the persisted bundle.
    ///
    /// An absent, unreadable or malformed bundle lands in `SignedOut`. An
    /// expired refresh token forces `SignedOut` and clears state. Otherwise
    /// the session is `SignedIn` even when the access token is already
    /// expired; hydration classifies expiry but never refreshes.
    pub async fn hydrate(&self) {
        info!("hydrating auth state");

        let raw = match self.store.get(AUTH_RESPONSE_KEY) {
            Ok(Some(raw)) => raw,
            Ok(None) => {
                info!("no persisted auth response found during hydration");
                self.update(|s| *s = AuthSession::signed_out());
                return;
            }
            Err(err) => {
                error!(error = %err, "failed to read persisted auth response, signing out");
                self.update(|s| *s = AuthSession::signed_out());
                return;
            }
        };

        let record: StoredAuthResponse = match serde_json::from_str(&raw) {
            Ok(record) => record,
            Err(err) => {
                error!(error = %err, "malformed persisted auth response, signing out");
                self.update(|s| *s = AuthSession::signed_out());
                return;
            }
        };

        let claims = match decode_claims(&record.grant.id_token) {
            Ok(claims) => claims,
            Err(err) => {
                error!(error = %err, "invalid identity token during hydration, signing out");
                self.update(|s| *s = AuthSession::signed_out());
                return;
            }
        };

        let now = now_ms();
        let obtained_at = if record.obtained_at > 0 {
            record.obtained_at
        } else {
            now
        };

        let restored = AuthSession {
            access_token: Some(record.grant.access_token.clone()),
            refresh_token: Some(record.grant.refresh_token.clone()),
            access_token_obtained_at: Some(obtained_at),
            refresh_token_obtained_at: Some(obtained_at),
            access_token_ttl_ms: access_ttl_ms(&record.grant),
            status: AuthStatus::SignedIn,
            error: None,
            user_id: Some(claims.sub.clone()),
            profile: Some(claims.clone()),
            is_first_time: false,
        };

        if restored.is_refresh_token_expired_at(now) {
            error!(
                user_id = %claims.sub,
                obtained_at,
                "refresh token expired during hydration, forcing logout"
            );
            self.update(|s| *s = AuthSession::signed_out());
            return;
        }

        let access_expired = restored.is_access_token_expired_at(now);
        self.update(|s| *s = restored);

        info!(
            user_id = %claims.sub,
            access_expired,
            "successfully hydrated auth state"
        );
    }

    /// Moves the session into the onboarding flow.
    pub fn set_onboarding(&self) {
        info!("entering onboarding");
        self.update(|s| s.status = AuthStatus::Onboarding);
    }

    fn persist_grant(&self, grant: &TokenGrant, obtained_at: i64) -> Result<(), AuthError> {
        let record = StoredAuthResponse {
            grant: grant.clone(),
            obtained_at,
        };
        let json = serde_json::to_string(&record)
            .map_err(|e| AuthError::Serialization(e.to_string()))?;
        self.store.set(AUTH_RESPONSE_KEY, &json)?;
        Ok(())
    }

    fn state(&self) -> MutexGuard<'_, AuthSession> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn update(&self, f: impl FnOnce(&mut AuthSession)) {
        f(&mut self.state());
    }
}

fn now_ms() -> i64 {
    Utc::now().timestamp_millis()
}

fn access_ttl_ms(grant: &TokenGrant) -> i64 {
    if grant.expires_in > 0 {
        grant.expires_in * 1000
    } else {
        DEFAULT_ACCESS_TOKEN_TTL_MS
    }
}
