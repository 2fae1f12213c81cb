//! Encrypted keyed stores, one per storage domain.

use std::sync::{Arc, RwLock};
use tracing::{info, warn};

use crate::platform::{should_disable_queue_persistence, PlatformCapabilities};

use super::cipher::StoreCipher;
use super::error::{StorageError, StorageResult};
use super::keys::{KeyMaterial, KeyStore, KeyStoreConfig, SecretStore};
use super::StoreDomain;

/// Raw persistent key-value storage supplied by the platform.
///
/// On platforms with hardware-backed encryption the backend is opened with
/// key material and encrypts at rest itself; elsewhere it stores whatever
/// strings it is handed.
pub trait KeyValueBackend: Send + Sync {
    /// Reads the value stored under `key`, if present.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be read.
    fn get(&self, key: &str) -> StorageResult<Option<String>>;

    /// Stores `value` under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn set(&self, key: &str, value: &str) -> StorageResult<()>;

    /// Deletes the value under `key`. Missing keys are not an error.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn delete(&self, key: &str) -> StorageResult<()>;

    /// Deletes every value in this backend's domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be written.
    fn clear_all(&self) -> StorageResult<()>;
}

/// Opens platform backends per domain.
pub trait BackendFactory: Send + Sync {
    /// Opens the backend for `domain`. `key` is `Some` on platforms whose
    /// store encrypts natively; `None` requests plain storage for the
    /// software encryption path.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend cannot be opened.
    fn open(
        &self,
        domain: StoreDomain,
        key: Option<&KeyMaterial>,
    ) -> StorageResult<Arc<dyn KeyValueBackend>>;
}

enum Layer {
    /// Backend encrypts natively; values pass through unchanged.
    Native,
    /// Software encryption over a plain backend.
    Software(StoreCipher),
}

struct Inner {
    backend: Arc<dyn KeyValueBackend>,
    layer: Layer,
}

/// An encrypted keyed store scoped to one domain.
pub struct SecureKvStore {
    domain: StoreDomain,
    inner: RwLock<Inner>,
}

impl SecureKvStore {
    fn open(
        domain: StoreDomain,
        hardware: bool,
        key: &KeyMaterial,
        factory: &dyn BackendFactory,
    ) -> StorageResult<Self> {
        let inner = Self::build_inner(domain, hardware, key, factory)?;
        Ok(Self {
            domain,
            inner: RwLock::new(inner),
        })
    }

    fn build_inner(
        domain: StoreDomain,
        hardware: bool,
        key: &KeyMaterial,
        factory: &dyn BackendFactory,
    ) -> StorageResult<Inner> {
        if hardware {
            let backend = factory.open(domain, Some(key))?;
            Ok(Inner {
                backend,
                layer: Layer::Native,
            })
        } else {
            let backend = factory.open(domain, None)?;
            Ok(Inner {
                backend,
                layer: Layer::Software(StoreCipher::new(key)),
            })
        }
    }

    /// The domain this store is scoped to.
    #[must_use]
    pub const fn domain(&self) -> StoreDomain {
        self.domain
    }

    /// Reads the value under `key`.
    ///
    /// On the software path a value that fails to decrypt is returned as-is:
    /// pre-existing unencrypted records survive, at the cost of accepting
    /// foreign ciphertext as plaintext.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend read fails.
    pub fn get(&self, key: &str) -> StorageResult<Option<String>> {
        let inner = self.read_inner()?;
        let Some(raw) = inner.backend.get(key)? else {
            return Ok(None);
        };
        match &inner.layer {
            Layer::Native => Ok(Some(raw)),
            Layer::Software(cipher) => match cipher.decrypt(&raw) {
                Some(plaintext) => Ok(Some(plaintext)),
                None => {
                    warn!(key, domain = self.domain.id(), "failed to decrypt stored value, returning as-is");
                    Ok(Some(raw))
                }
            },
        }
    }

    /// Stores `value` under `key`, encrypting on the software path.
    ///
    /// # Errors
    ///
    /// Returns an error if encryption or the backend write fails.
    pub fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        let inner = self.read_inner()?;
        match &inner.layer {
            Layer::Native => inner.backend.set(key, value),
            Layer::Software(cipher) => {
                let encrypted = cipher.encrypt(value)?;
                inner.backend.set(key, &encrypted)
            }
        }
    }

    /// Deletes the value under `key`.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn delete(&self, key: &str) -> StorageResult<()> {
        self.read_inner()?.backend.delete(key)
    }

    /// Deletes every value in this store's domain.
    ///
    /// # Errors
    ///
    /// Returns an error if the backend write fails.
    pub fn clear_all(&self) -> StorageResult<()> {
        self.read_inner()?.backend.clear_all()
    }

    /// Re-points the store at fresh key material.
    ///
    /// Existing records written under the previous key become unreadable.
    fn rekey(
        &self,
        hardware: bool,
        key: &KeyMaterial,
        factory: &dyn BackendFactory,
    ) -> StorageResult<()> {
        let rebuilt = Self::build_inner(self.domain, hardware, key, factory)?;
        let mut inner = self
            .inner
            .write()
            .map_err(|_| StorageError::Backend("store lock poisoned".to_string()))?;
        *inner = rebuilt;
        Ok(())
    }

    fn read_inner(&self) -> StorageResult<std::sync::RwLockReadGuard<'_, Inner>> {
        self.inner
            .read()
            .map_err(|_| StorageError::Backend("store lock poisoned".to_string()))
    }
}

/// Owns the key store and both domain stores; the single entry point the rest
/// of the subsystem uses for encrypted persistence.
pub struct SecureStorage {
    key_store: KeyStore,
    factory: Arc<dyn BackendFactory>,
    hardware: bool,
    general: Arc<SecureKvStore>,
    offline_queue: Option<Arc<SecureKvStore>>,
}

impl SecureStorage {
    /// Builds both domain stores for the given platform.
    ///
    /// The offline-queue store is skipped entirely on capability-limited
    /// platforms (see [`should_disable_queue_persistence`]); its operations
    /// then degrade to logged no-ops downstream.
    ///
    /// # Errors
    ///
    /// Returns an error if a backend cannot be opened.
    pub fn initialize(
        probe: &dyn PlatformCapabilities,
        secret_store: Arc<dyn SecretStore>,
        factory: Arc<dyn BackendFactory>,
        config: KeyStoreConfig,
    ) -> StorageResult<Self> {
        let hardware = probe.has_hardware_keystore();
        let key_store = KeyStore::new(secret_store, config);

        let (general_key, _) = key_store.get_or_create(StoreDomain::General);
        let general = Arc::new(SecureKvStore::open(
            StoreDomain::General,
            hardware,
            &general_key,
            factory.as_ref(),
        )?);

        let offline_queue = if should_disable_queue_persistence(probe) {
            None
        } else {
            let (queue_key, _) = key_store.get_or_create(StoreDomain::OfflineQueue);
            Some(Arc::new(SecureKvStore::open(
                StoreDomain::OfflineQueue,
                hardware,
                &queue_key,
                factory.as_ref(),
            )?))
        };

        info!(
            hardware,
            queue_persistence = offline_queue.is_some(),
            "initialized secure storage"
        );

        Ok(Self {
            key_store,
            factory,
            hardware,
            general,
            offline_queue,
        })
    }

    /// The general-purpose store.
    #[must_use]
    pub fn general(&self) -> Arc<SecureKvStore> {
        Arc::clone(&self.general)
    }

    /// The offline-queue store, or `None` when persistence for that domain is
    /// disabled on this platform.
    #[must_use]
    pub fn offline_queue(&self) -> Option<Arc<SecureKvStore>> {
        self.offline_queue.as_ref().map(Arc::clone)
    }

    /// Rotates every domain key and re-points the dependent stores.
    ///
    /// Everything previously encrypted becomes permanently unreadable, which
    /// is the desired effect of a "revoke everything" operation.
    ///
    /// # Errors
    ///
    /// Returns an error if persisting a new key or reopening a store fails.
    pub fn rotate_keys(&self) -> StorageResult<()> {
        for (domain, key) in self.key_store.rotate()? {
            let store = match domain {
                StoreDomain::General => Some(&self.general),
                StoreDomain::OfflineQueue => self.offline_queue.as_ref(),
            };
            if let Some(store) = store {
                store.rekey(self.hardware, &key, self.factory.as_ref())?;
            }
        }
        Ok(())
    }

    /// Deletes every domain key record, leaving existing ciphertext
    /// permanently unreadable.
    ///
    /// # Errors
    ///
    /// Returns an error if a record cannot be deleted.
    pub fn wipe_keys(&self) -> StorageResult<()> {
        self.key_store.wipe()
    }

    /// Emergency cleanup: wipe all keys, then purge the offline-queue store.
    ///
    /// The queue purge is best-effort; a failure is logged and the wipe still
    /// counts.
    ///
    /// # Errors
    ///
    /// Returns an error if the key wipe itself fails.
    pub fn emergency_cleanup(&self) -> StorageResult<()> {
        warn!("initiating emergency PII cleanup");
        self.key_store.wipe()?;
        if let Some(queue) = &self.offline_queue {
            if let Err(err) = queue.clear_all() {
                warn!(%err, "failed to purge offline queue during emergency cleanup");
            }
        }
        info!("emergency PII cleanup completed");
        Ok(())
    }
}
