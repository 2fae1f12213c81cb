//! Encryption key acquisition, rotation and wipe, per storage domain.

use rand::{rngs::OsRng, RngCore};
use std::sync::Arc;
use tracing::{debug, error, info, warn};
use zeroize::{Zeroize, ZeroizeOnDrop};

use super::error::{StorageError, StorageResult};
use super::StoreDomain;

/// A 256-bit symmetric key, hex-encoded at rest.
///
/// Material is zeroized on drop. Treat every copy as sensitive.
#[derive(Clone, PartialEq, Eq, Zeroize, ZeroizeOnDrop)]
pub struct KeyMaterial {
    bytes: [u8; 32],
}

impl KeyMaterial {
    /// Generates fresh material from the platform secure random source.
    #[must_use]
    pub fn generate() -> Self {
        let mut bytes = [0u8; 32];
        OsRng.fill_bytes(&mut bytes);
        Self { bytes }
    }

    /// Parses hex-encoded material.
    ///
    /// # Errors
    ///
    /// Returns an error unless `hex` decodes to exactly 32 bytes.
    pub fn from_hex(hex_str: &str) -> StorageResult<Self> {
        let decoded = hex::decode(hex_str.trim()).map_err(|err| {
            StorageError::InvalidKeyMaterial(format!("not hex: {err}"))
        })?;
        if decoded.len() != 32 {
            return Err(StorageError::InvalidKeyMaterial(format!(
                "length mismatch: expected 32 bytes, got {}",
                decoded.len()
            )));
        }
        let mut bytes = [0u8; 32];
        bytes.copy_from_slice(&decoded);
        Ok(Self { bytes })
    }

    /// Hex encoding used for the persisted key record.
    #[must_use]
    pub fn to_hex(&self) -> String {
        hex::encode(self.bytes)
    }

    /// Raw key bytes.
    #[must_use]
    pub const fn bytes(&self) -> &[u8; 32] {
        &self.bytes
    }
}

impl std::fmt::Debug for KeyMaterial {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("KeyMaterial(..)")
    }
}

/// How the key for a domain was obtained.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum KeyOrigin {
    /// Generated on this device and persisted in the secret store.
    GeneratedAndStored,
    /// Operator-supplied via configuration; bypasses per-device generation.
    ExternallyConfigured,
    /// Generated for this process only after the secret store failed;
    /// anything encrypted under it is lost on restart.
    SessionFallback,
}

/// Platform secret store for named string secrets.
///
/// Backed by the hardware keystore on mobile platforms (Keychain, Keystore);
/// tests use an in-memory implementation.
pub trait SecretStore: Send + Sync {
    /// Reads the secret stored under `name`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform store cannot be read.
    fn get(&self, name: &str) -> StorageResult<Option<String>>;

    /// Persists `value` under `name`, overwriting any existing record.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform store cannot be written.
    fn set(&self, name: &str, value: &str) -> StorageResult<()>;

    /// Deletes the record under `name`. Missing records are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the platform store cannot be written.
    fn delete(&self, name: &str) -> StorageResult<()>;
}

/// Key-store configuration.
#[derive(Debug, Clone, Default)]
pub struct KeyStoreConfig {
    /// Operator-supplied hex key for fleet-managed deployments. When set and
    /// non-empty it is used for every domain instead of per-device keys.
    pub override_key: Option<String>,
}

/// Acquires and manages the per-domain encryption keys.
pub struct KeyStore {
    secret_store: Arc<dyn SecretStore>,
    config: KeyStoreConfig,
}

impl KeyStore {
    /// Creates a key store over the platform secret store.
    #[must_use]
    pub fn new(secret_store: Arc<dyn SecretStore>, config: KeyStoreConfig) -> Self {
        Self {
            secret_store,
            config,
        }
    }

    /// Returns the key for `domain`, creating and persisting one if needed.
    ///
    /// Resolution order: configuration override, existing persisted record,
    /// freshly generated material. A secret-store failure degrades to a
    /// session-only key with a warning instead of propagating.
    pub fn get_or_create(&self, domain: StoreDomain) -> (KeyMaterial, KeyOrigin) {
        if let Some(key) = self.configured_key(domain) {
            return (key, KeyOrigin::ExternallyConfigured);
        }

        match self.load_or_generate(domain) {
            Ok(result) => result,
            Err(err) => {
                error!(
                    key_name = domain.key_name(),
                    %err,
                    "failed to get or create secure key"
                );
                warn!(
                    key_name = domain.key_name(),
                    "using fallback encryption key for session"
                );
                (KeyMaterial::generate(), KeyOrigin::SessionFallback)
            }
        }
    }

    /// Overwrites every domain's key record with fresh material.
    ///
    /// Data encrypted under the previous keys becomes permanently unreadable;
    /// that is the point of a "revoke everything" rotation. Dependent stores
    /// must be re-pointed at the returned material.
    ///
    /// # Errors
    ///
    /// Returns an error if any new record cannot be persisted.
    pub fn rotate(&self) -> StorageResult<Vec<(StoreDomain, KeyMaterial)>> {
        let mut rotated = Vec::with_capacity(StoreDomain::ALL.len());
        for domain in StoreDomain::ALL {
            let key = KeyMaterial::generate();
            self.secret_store.set(domain.key_name(), &key.to_hex())?;
            rotated.push((domain, key));
        }
        info!("successfully rotated encryption keys");
        Ok(rotated)
    }

    /// Deletes every domain's key record outright.
    ///
    /// Same unreadability consequence as [`Self::rotate`], without
    /// replacement keys.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be deleted.
    pub fn wipe(&self) -> StorageResult<()> {
        for domain in StoreDomain::ALL {
            self.secret_store.delete(domain.key_name())?;
        }
        info!("cleared all secure encryption keys");
        Ok(())
    }

    fn configured_key(&self, domain: StoreDomain) -> Option<KeyMaterial> {
        let configured = self.config.override_key.as_deref()?.trim();
        if configured.is_empty() {
            return None;
        }
        match KeyMaterial::from_hex(configured) {
            Ok(key) => {
                info!(
                    key_name = domain.key_name(),
                    "using encryption key from configuration"
                );
                Some(key)
            }
            Err(err) => {
                warn!(%err, "ignoring malformed configured encryption key");
                None
            }
        }
    }

    fn load_or_generate(
        &self,
        domain: StoreDomain,
    ) -> StorageResult<(KeyMaterial, KeyOrigin)> {
        if let Some(stored) = self.secret_store.get(domain.key_name())? {
            let key = KeyMaterial::from_hex(&stored)?;
            debug!(
                key_name = domain.key_name(),
                "retrieved existing encryption key"
            );
            return Ok((key, KeyOrigin::GeneratedAndStored));
        }

        let key = KeyMaterial::generate();
        self.secret_store.set(domain.key_name(), &key.to_hex())?;
        info!(
            key_name = domain.key_name(),
            "generated and stored new encryption key"
        );
        Ok((key, KeyOrigin::GeneratedAndStored))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::memory::{FailingSecretStore, InMemorySecretStore};

    fn key_store(secret_store: Arc<dyn SecretStore>) -> KeyStore {
        KeyStore::new(secret_store, KeyStoreConfig::default())
    }

    #[test]
    fn test_generates_then_returns_same_key() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = key_store(secrets);

        let (first, origin) = store.get_or_create(StoreDomain::General);
        assert_eq!(origin, KeyOrigin::GeneratedAndStored);
        let (second, _) = store.get_or_create(StoreDomain::General);
        assert_eq!(first, second);
    }

    #[test]
    fn test_domains_never_share_material() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = key_store(secrets);

        let (general, _) = store.get_or_create(StoreDomain::General);
        let (queue, _) = store.get_or_create(StoreDomain::OfflineQueue);
        assert_ne!(general, queue);
    }

    #[test]
    fn test_configured_override_bypasses_generation() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let configured = KeyMaterial::generate().to_hex();
        let store = KeyStore::new(
            Arc::clone(&secrets) as Arc<dyn SecretStore>,
            KeyStoreConfig {
                override_key: Some(configured.clone()),
            },
        );

        let (key, origin) = store.get_or_create(StoreDomain::General);
        assert_eq!(origin, KeyOrigin::ExternallyConfigured);
        assert_eq!(key.to_hex(), configured);
        // Nothing was written to the secret store.
        assert!(secrets
            .get(StoreDomain::General.key_name())
            .expect("get")
            .is_none());
    }

    #[test]
    fn test_secret_store_failure_degrades_to_session_key() {
        let store = key_store(Arc::new(FailingSecretStore));

        let (first, origin) = store.get_or_create(StoreDomain::General);
        assert_eq!(origin, KeyOrigin::SessionFallback);
        // Session keys are not persisted, so every call yields fresh material.
        let (second, _) = store.get_or_create(StoreDomain::General);
        assert_ne!(first, second);
    }

    #[test]
    fn test_rotation_replaces_both_records() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = key_store(Arc::clone(&secrets) as Arc<dyn SecretStore>);
        let (before, _) = store.get_or_create(StoreDomain::General);

        let rotated = store.rotate().expect("rotate");
        assert_eq!(rotated.len(), 2);
        let (after, _) = store.get_or_create(StoreDomain::General);
        assert_ne!(before, after);
    }

    #[test]
    fn test_wipe_deletes_records() {
        let secrets = Arc::new(InMemorySecretStore::new());
        let store = key_store(Arc::clone(&secrets) as Arc<dyn SecretStore>);
        store.get_or_create(StoreDomain::General);
        store.get_or_create(StoreDomain::OfflineQueue);

        store.wipe().expect("wipe");
        for domain in StoreDomain::ALL {
            assert!(secrets.get(domain.key_name()).expect("get").is_none());
        }
    }

    #[test]
    fn test_rejects_short_hex_material() {
        assert!(KeyMaterial::from_hex("deadbeef").is_err());
        assert!(KeyMaterial::from_hex("zz").is_err());
    }
}
