//! Cache Store Client
//!
//! Wraps a [`PackStore`] with the pipeline's store policy: store failures are
//! logged and never fail a request. Store calls run on the blocking pool.

use crate::error::{OverlayError, StorageError};
use crate::key::CacheKey;
use crate::store::PackStore;
use crate::types::OverlayPack;
use std::sync::Arc;
use tracing::{debug, warn};

#[derive(Clone)]
pub struct CacheStoreClient {
    store: Arc<dyn PackStore>,
}

impl CacheStoreClient {
    pub fn new(store: Arc<dyn PackStore>) -> Self {
        Self { store }
    }

    pub fn store(&self) -> &Arc<dyn PackStore> {
        &self.store
    }

    async fn blocking<R, F>(&self, f: F) -> Result<R, OverlayError>
    where
        R: Send + 'static,
        F: FnOnce(&dyn PackStore) -> Result<R, StorageError> + Send + 'static,
    {
        let store = Arc::clone(&self.store);
        tokio::task::spawn_blocking(move || f(store.as_ref()))
            .await
            .map_err(|e| OverlayError::CacheError(format!("store task failed: {}", e)))?
            .map_err(OverlayError::from)
    }

    /// Lookup that counts as a use of the pack.
    ///
    /// A hit is returned with `usage_count + 1` and the durable increment is
    /// spawned without waiting for it; concurrent hits may under-count. A
    /// read failure is logged and treated as a miss.
    pub async fn get(&self, key: &CacheKey) -> Option<OverlayPack> {
        let lookup_key = key.clone();
        let mut pack = match self.blocking(move |store| store.get(&lookup_key)).await {
            Ok(Some(pack)) => pack,
            Ok(None) => {
                debug!(key = %key, "Cache miss");
                return None;
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Cache read failed, treating as miss");
                return None;
            }
        };

        pack.usage_count = pack.usage_count.saturating_add(1);
        debug!(key = %key, usage_count = pack.usage_count, "Cache hit");

        let store = Arc::clone(&self.store);
        let increment_key = key.clone();
        tokio::task::spawn_blocking(move || {
            if let Err(err) = store.increment_usage(&increment_key) {
                warn!(key = %increment_key, error = %err, "Usage count increment failed");
            }
        });

        Some(pack)
    }

    /// Read-only lookup; does not touch the usage count.
    pub async fn peek(&self, key: &CacheKey) -> Result<Option<OverlayPack>, OverlayError> {
        let lookup_key = key.clone();
        self.blocking(move |store| store.get(&lookup_key)).await
    }

    /// Upsert the pack. Failures are logged and swallowed; returns whether the
    /// write landed.
    pub async fn put(&self, key: &CacheKey, pack: &OverlayPack) -> bool {
        let write_key = key.clone();
        let value = pack.clone();
        match self.blocking(move |store| store.put(&write_key, &value)).await {
            Ok(()) => {
                debug!(key = %key, "Pack stored");
                true
            }
            Err(err) => {
                warn!(key = %key, error = %err, "Cache write failed, returning unstored pack");
                false
            }
        }
    }

    pub async fn list(&self) -> Result<Vec<OverlayPack>, OverlayError> {
        self.blocking(|store| store.list()).await
    }
}
