//! End-to-end session lifecycle against the public API: login, persistence,
//! hydration and key rotation, with in-memory platform backends.

use std::sync::Arc;

use async_trait::async_trait;
use base64::engine::general_purpose::URL_SAFE_NO_PAD;
use base64::Engine as _;
use chrono::Utc;

use authkit_core::platform::{OsFamily, StaticCapabilities};
use authkit_core::session::{
    AuthStatus, CredentialExchange, ExchangeError, LoginCredentials, LoginOutcome,
    SessionManager, StoredAuthResponse, TokenGrant,
};
use authkit_core::storage::keys::KeyStoreConfig;
use authkit_core::storage::memory::{InMemoryBackendFactory, InMemorySecretStore};
use authkit_core::storage::{SecureStorage, AUTH_RESPONSE_KEY};

fn id_token_for(sub: &str) -> String {
    let payload = format!("{{\"sub\":\"{sub}\",\"name\":\"Test User\"}}");
    format!(
        "{}.{}.{}",
        URL_SAFE_NO_PAD.encode(b"{\"alg\":\"RS256\"}"),
        URL_SAFE_NO_PAD.encode(payload.as_bytes()),
        URL_SAFE_NO_PAD.encode(b"sig")
    )
}

fn grant_for(sub: &str, expires_in: i64) -> TokenGrant {
    TokenGrant {
        access_token: format!("access-{sub}"),
        refresh_token: format!("refresh-{sub}"),
        id_token: id_token_for(sub),
        expires_in,
        token_type: "Bearer".to_string(),
        expiration_date: None,
    }
}

struct FixedExchange {
    grant: TokenGrant,
}

#[async_trait]
impl CredentialExchange for FixedExchange {
    async fn login(
        &self,
        _credentials: &LoginCredentials,
    ) -> Result<LoginOutcome, ExchangeError> {
        Ok(LoginOutcome {
            successful: true,
            message: None,
            auth_response: Some(self.grant.clone()),
        })
    }

    async fn refresh(&self, _refresh_token: &str) -> Result<TokenGrant, ExchangeError> {
        Ok(self.grant.clone())
    }
}

fn storage() -> SecureStorage {
    let probe = StaticCapabilities::mobile(OsFamily::Ios);
    SecureStorage::initialize(
        &probe,
        Arc::new(InMemorySecretStore::new()),
        Arc::new(InMemoryBackendFactory::new()),
        KeyStoreConfig::default(),
    )
    .expect("initialize storage")
}

fn credentials() -> LoginCredentials {
    LoginCredentials {
        username: "testuser".to_string(),
        password: "hunter2".to_string(),
    }
}

#[tokio::test]
async fn login_then_hydrate_reproduces_the_session() {
    let storage = storage();
    let exchange = Arc::new(FixedExchange {
        grant: grant_for("user-42", 3600),
    });

    let manager = SessionManager::new(
        Arc::clone(&exchange) as Arc<dyn CredentialExchange>,
        storage.general(),
    );
    manager.login(&credentials()).await;
    let after_login = manager.session();
    assert_eq!(after_login.status, AuthStatus::SignedIn);

    // A fresh process over the same store restores the identical identity.
    let restored = SessionManager::new(exchange, storage.general());
    restored.hydrate().await;
    let after_hydrate = restored.session();

    assert_eq!(after_hydrate.status, AuthStatus::SignedIn);
    assert_eq!(after_hydrate.user_id, after_login.user_id);
    assert_eq!(after_hydrate.access_token, after_login.access_token);
    assert_eq!(after_hydrate.refresh_token, after_login.refresh_token);
    assert!(!after_hydrate.is_first_time);
}

#[tokio::test]
async fn hydrate_accepts_an_expired_access_token_without_refreshing() {
    let storage = storage();
    let store = storage.general();

    // Bundle obtained two hours ago with a one-hour access TTL.
    let record = StoredAuthResponse {
        grant: grant_for("user-42", 3600),
        obtained_at: Utc::now().timestamp_millis() - 2 * 60 * 60 * 1000,
    };
    store
        .set(
            AUTH_RESPONSE_KEY,
            &serde_json::to_string(&record).expect("serialize"),
        )
        .expect("seed bundle");

    let manager = SessionManager::new(
        Arc::new(FixedExchange {
            grant: grant_for("someone-else", 3600),
        }),
        store,
    );
    manager.hydrate().await;

    let session = manager.session();
    assert_eq!(session.status, AuthStatus::SignedIn);
    assert!(manager.is_access_token_expired());
    assert!(manager.should_refresh_token());
    // Hydration classifies expiry but never swaps tokens itself.
    assert_eq!(session.access_token.as_deref(), Some("access-user-42"));
}

#[tokio::test]
async fn hydrate_signs_out_when_the_refresh_token_aged_out() {
    let storage = storage();
    let store = storage.general();

    let record = StoredAuthResponse {
        grant: grant_for("user-42", 3600),
        obtained_at: Utc::now().timestamp_millis() - 366 * 24 * 60 * 60 * 1000,
    };
    store
        .set(
            AUTH_RESPONSE_KEY,
            &serde_json::to_string(&record).expect("serialize"),
        )
        .expect("seed bundle");

    let manager = SessionManager::new(
        Arc::new(FixedExchange {
            grant: grant_for("user-42", 3600),
        }),
        store,
    );
    manager.hydrate().await;

    let session = manager.session();
    assert_eq!(session.status, AuthStatus::SignedOut);
    assert!(session.access_token.is_none());
    assert!(session.is_first_time);
}

#[tokio::test]
async fn hydrate_on_an_empty_store_signs_out() {
    let storage = storage();
    let manager = SessionManager::new(
        Arc::new(FixedExchange {
            grant: grant_for("user-42", 3600),
        }),
        storage.general(),
    );
    manager.hydrate().await;
    assert_eq!(manager.session().status, AuthStatus::SignedOut);
}

#[tokio::test]
async fn key_rotation_revokes_the_persisted_session() {
    // Software-encryption platform: rotation makes old ciphertext unreadable.
    let probe = StaticCapabilities::web(true, true);
    let storage = SecureStorage::initialize(
        &probe,
        Arc::new(InMemorySecretStore::new()),
        Arc::new(InMemoryBackendFactory::new()),
        KeyStoreConfig::default(),
    )
    .expect("initialize storage");

    let exchange = Arc::new(FixedExchange {
        grant: grant_for("user-42", 3600),
    });
    let manager = SessionManager::new(
        Arc::clone(&exchange) as Arc<dyn CredentialExchange>,
        storage.general(),
    );
    manager.login(&credentials()).await;
    assert_eq!(manager.session().status, AuthStatus::SignedIn);

    storage.rotate_keys().expect("rotate");

    let restored = SessionManager::new(exchange, storage.general());
    restored.hydrate().await;
    assert_eq!(restored.session().status, AuthStatus::SignedOut);
}
