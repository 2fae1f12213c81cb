//! Secure keyed storage: per-domain encryption keys and encrypted stores.

pub mod cipher;
pub mod error;
pub mod keys;
pub mod memory;
pub mod queue_adapter;
pub mod store;

pub use error::{StorageError, StorageResult};
pub use keys::{KeyMaterial, KeyOrigin, KeyStore, KeyStoreConfig, SecretStore};
pub use queue_adapter::{OfflineQueueStateStorage, StateStorage, StoreResolver};
pub use store::{BackendFactory, KeyValueBackend, SecureKvStore, SecureStorage};

/// Storage key of the persisted session token bundle in the general store.
pub const AUTH_RESPONSE_KEY: &str = "authResponse";

/// Logical storage domains. Each has its own encryption key; compromise of
/// one domain must not compromise the other.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreDomain {
    /// General-purpose app storage, including the session token bundle.
    General,
    /// Offline action queue; may hold PII and is disabled on platforms that
    /// cannot encrypt it at rest.
    OfflineQueue,
}

impl StoreDomain {
    /// Every domain, in key-rotation order.
    pub const ALL: [Self; 2] = [Self::General, Self::OfflineQueue];

    /// Fixed secret-store record name for this domain's key. Distinct from
    /// the operator override in [`keys::KeyStoreConfig`], which never touches
    /// the secret store.
    #[must_use]
    pub const fn key_name(self) -> &'static str {
        match self {
            Self::General => "MMKV_ENCRYPTION_KEY",
            Self::OfflineQueue => "OFFLINE_QUEUE_ENCRYPTION_KEY",
        }
    }

    /// Stable identifier used in log records and backend naming.
    #[must_use]
    pub const fn id(self) -> &'static str {
        match self {
            Self::General => "general",
            Self::OfflineQueue => "offline-queue",
        }
    }
}
