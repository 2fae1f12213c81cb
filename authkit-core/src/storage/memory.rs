//! In-memory storage implementations.
//!
//! Used by the test suites and by host shells that have not wired a real
//! platform backend yet. Nothing here persists beyond the process.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use super::error::{StorageError, StorageResult};
use super::keys::{KeyMaterial, SecretStore};
use super::store::{BackendFactory, KeyValueBackend};
use super::StoreDomain;

fn lock_err() -> StorageError {
    StorageError::Backend("mutex poisoned".to_string())
}

/// In-memory [`SecretStore`].
#[derive(Default)]
pub struct InMemorySecretStore {
    records: Mutex<HashMap<String, String>>,
}

impl InMemorySecretStore {
    /// Creates an empty secret store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl SecretStore for InMemorySecretStore {
    fn get(&self, name: &str) -> StorageResult<Option<String>> {
        Ok(self.records.lock().map_err(|_| lock_err())?.get(name).cloned())
    }

    fn set(&self, name: &str, value: &str) -> StorageResult<()> {
        self.records
            .lock()
            .map_err(|_| lock_err())?
            .insert(name.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, name: &str) -> StorageResult<()> {
        self.records.lock().map_err(|_| lock_err())?.remove(name);
        Ok(())
    }
}

/// A [`SecretStore`] whose every operation fails, for exercising the
/// session-only key fallback.
pub struct FailingSecretStore;

impl SecretStore for FailingSecretStore {
    fn get(&self, _name: &str) -> StorageResult<Option<String>> {
        Err(StorageError::SecretStore("keystore unavailable".to_string()))
    }

    fn set(&self, _name: &str, _value: &str) -> StorageResult<()> {
        Err(StorageError::SecretStore("keystore unavailable".to_string()))
    }

    fn delete(&self, _name: &str) -> StorageResult<()> {
        Err(StorageError::SecretStore("keystore unavailable".to_string()))
    }
}

type DomainMap = Mutex<HashMap<StoreDomain, Arc<Mutex<HashMap<String, String>>>>>;

/// In-memory [`KeyValueBackend`] over a shared per-domain map.
pub struct InMemoryBackend {
    values: Arc<Mutex<HashMap<String, String>>>,
}

impl KeyValueBackend for InMemoryBackend {
    fn get(&self, key: &str) -> StorageResult<Option<String>> {
        Ok(self.values.lock().map_err(|_| lock_err())?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> StorageResult<()> {
        self.values
            .lock()
            .map_err(|_| lock_err())?
            .insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn delete(&self, key: &str) -> StorageResult<()> {
        self.values.lock().map_err(|_| lock_err())?.remove(key);
        Ok(())
    }

    fn clear_all(&self) -> StorageResult<()> {
        self.values.lock().map_err(|_| lock_err())?.clear();
        Ok(())
    }
}

/// Factory handing out [`InMemoryBackend`]s that share state per domain, so a
/// reopened (rekeyed) backend still sees previously written raw values.
///
/// The in-memory form ignores native-encryption key material; tests inspect
/// raw values through [`Self::raw_value`] to assert what is actually at rest.
#[derive(Default)]
pub struct InMemoryBackendFactory {
    domains: DomainMap,
}

impl InMemoryBackendFactory {
    /// Creates a factory with empty domains.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// The raw stored value for `key` in `domain`, bypassing any cipher.
    #[must_use]
    pub fn raw_value(&self, domain: StoreDomain, key: &str) -> Option<String> {
        let domains = self.domains.lock().ok()?;
        let values = domains.get(&domain)?.lock().ok()?;
        values.get(key).cloned()
    }

    /// Seeds a raw value directly into `domain`, bypassing any cipher.
    pub fn seed_raw(&self, domain: StoreDomain, key: &str, value: &str) {
        if let Ok(mut domains) = self.domains.lock() {
            let values = domains
                .entry(domain)
                .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())));
            if let Ok(mut values) = values.lock() {
                values.insert(key.to_string(), value.to_string());
            }
        }
    }
}

impl BackendFactory for InMemoryBackendFactory {
    fn open(
        &self,
        domain: StoreDomain,
        _key: Option<&KeyMaterial>,
    ) -> StorageResult<Arc<dyn KeyValueBackend>> {
        let mut domains = self.domains.lock().map_err(|_| lock_err())?;
        let values = domains
            .entry(domain)
            .or_insert_with(|| Arc::new(Mutex::new(HashMap::new())));
        Ok(Arc::new(InMemoryBackend {
            values: Arc::clone(values),
        }))
    }
}
