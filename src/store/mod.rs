//! Overlay Pack Store
//!
//! Durable keyed storage for assembled packs. Records are keyed by the
//! rendered cache key, `<workspace>/<family>`, and written with upsert
//! semantics. Packs are never deleted here; expiry belongs to whoever owns
//! the backing store.

pub mod client;
pub mod persistence;

pub use client::CacheStoreClient;
pub use persistence::SledPackStore;

use crate::error::StorageError;
use crate::key::CacheKey;
use crate::types::OverlayPack;
use parking_lot::RwLock;
use std::collections::HashMap;

/// Pack Store interface
pub trait PackStore: Send + Sync {
    fn get(&self, key: &CacheKey) -> Result<Option<OverlayPack>, StorageError>;

    /// Insert or replace the pack stored under `key`.
    fn put(&self, key: &CacheKey, pack: &OverlayPack) -> Result<(), StorageError>;

    /// Bump the stored usage count. Returns the new count, or `None` when no
    /// pack is stored under `key`.
    fn increment_usage(&self, key: &CacheKey) -> Result<Option<u64>, StorageError>;

    fn list(&self) -> Result<Vec<OverlayPack>, StorageError>;
}

/// The pack must describe the key it is filed under.
pub(crate) fn check_key(key: &CacheKey, pack: &OverlayPack) -> Result<(), StorageError> {
    if pack.vehicle_family != key.vehicle_family || pack.workspace_type != key.workspace_type {
        return Err(StorageError::InvalidKey(format!(
            "pack {}/{} filed under {}",
            pack.workspace_type, pack.vehicle_family, key
        )));
    }
    Ok(())
}

/// In-process store for tests and ephemeral runs.
#[derive(Default)]
pub struct MemoryPackStore {
    packs: RwLock<HashMap<CacheKey, OverlayPack>>,
}

impl MemoryPackStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.packs.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.packs.read().is_empty()
    }
}

impl PackStore for MemoryPackStore {
    fn get(&self, key: &CacheKey) -> Result<Option<OverlayPack>, StorageError> {
        Ok(self.packs.read().get(key).cloned())
    }

    fn put(&self, key: &CacheKey, pack: &OverlayPack) -> Result<(), StorageError> {
        check_key(key, pack)?;
        self.packs.write().insert(key.clone(), pack.clone());
        Ok(())
    }

    fn increment_usage(&self, key: &CacheKey) -> Result<Option<u64>, StorageError> {
        Ok(self.packs.write().get_mut(key).map(|pack| {
            pack.usage_count = pack.usage_count.saturating_add(1);
            pack.usage_count
        }))
    }

    fn list(&self) -> Result<Vec<OverlayPack>, StorageError> {
        let mut packs: Vec<OverlayPack> = self.packs.read().values().cloned().collect();
        packs.sort_by(|a, b| {
            (a.workspace_type, &a.vehicle_family).cmp(&(b.workspace_type, &b.vehicle_family))
        });
        Ok(packs)
    }
}
