//! Persistence adapter bridging the offline action queue to secure storage.

use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::OnceCell;
use tracing::{debug, error, warn};

use super::store::SecureKvStore;

/// Generic async key-value persistence interface consumed by persisted-state
/// containers.
///
/// Failures are absorbed by the implementation: queued actions must never be
/// rejected because persistence is degraded, they just will not survive a
/// restart.
#[async_trait]
pub trait StateStorage: Send + Sync {
    /// Reads the persisted value under `key`, if any.
    async fn get(&self, key: &str) -> Option<String>;

    /// Persists `value` under `key`.
    async fn set(&self, key: &str, value: &str);

    /// Removes the persisted value under `key`.
    async fn remove(&self, key: &str);
}

/// Resolves the backing store for the offline-queue domain.
///
/// Injected at construction so the adapter never reaches into globals; the
/// resolver typically performs the platform key/store acquisition.
#[async_trait]
pub trait StoreResolver: Send + Sync {
    /// Resolves the offline-queue store, or `None` when persistence for that
    /// domain is unavailable on this platform.
    async fn resolve(&self) -> Option<Arc<SecureKvStore>>;
}

/// [`StateStorage`] implementation backed by the offline-queue secure store.
///
/// The store is resolved lazily on first use; concurrent first callers share
/// the single in-flight resolution. When resolution yields no usable store,
/// every operation becomes a logged no-op.
pub struct OfflineQueueStateStorage {
    resolver: Arc<dyn StoreResolver>,
    store: OnceCell<Option<Arc<SecureKvStore>>>,
}

impl OfflineQueueStateStorage {
    /// Creates the adapter over `resolver`.
    #[must_use]
    pub fn new(resolver: Arc<dyn StoreResolver>) -> Self {
        Self {
            resolver,
            store: OnceCell::new(),
        }
    }

    async fn backing_store(&self) -> Option<&Arc<SecureKvStore>> {
        let resolved = self
            .store
            .get_or_init(|| async {
                let store = self.resolver.resolve().await;
                debug!(
                    has_store = store.is_some(),
                    "offline queue storage initialized"
                );
                store
            })
            .await;
        resolved.as_ref()
    }
}

#[async_trait]
impl StateStorage for OfflineQueueStateStorage {
    async fn get(&self, key: &str) -> Option<String> {
        let Some(store) = self.backing_store().await else {
            debug!(key, "no secure storage available for offline queue");
            return None;
        };
        match store.get(key) {
            Ok(value) => value,
            Err(err) => {
                error!(key, %err, "failed to retrieve offline queue data");
                None
            }
        }
    }

    async fn set(&self, key: &str, value: &str) {
        let Some(store) = self.backing_store().await else {
            warn!(
                key,
                "no secure storage available for offline queue, data will not persist"
            );
            return;
        };
        if let Err(err) = store.set(key, value) {
            error!(key, %err, "failed to save offline queue data");
        }
    }

    async fn remove(&self, key: &str) {
        let Some(store) = self.backing_store().await else {
            debug!(key, "no secure storage available for offline queue");
            return;
        };
        if let Err(err) = store.delete(key) {
            error!(key, %err, "failed to remove offline queue data");
        }
    }
}
