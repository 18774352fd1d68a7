//! Persistence layer for the Pack Store

use crate::error::StorageError;
use crate::key::CacheKey;
use crate::store::{check_key, PackStore};
use crate::types::OverlayPack;
use std::path::Path;

/// Sled-based implementation of PackStore
pub struct SledPackStore {
    db: sled::Db,
}

impl SledPackStore {
    /// Open (or create) the database at `path`.
    pub fn new<P: AsRef<Path>>(path: P) -> Result<Self, StorageError> {
        let db = sled::open(path)
            .map_err(|e| StorageError::Backend(format!("Failed to open sled database: {}", e)))?;
        Ok(Self { db })
    }

    /// Flush all pending writes to disk
    pub fn flush(&self) -> Result<(), StorageError> {
        self.db.flush()?;
        Ok(())
    }

    pub fn contains(&self, key: &CacheKey) -> Result<bool, StorageError> {
        Ok(self.db.contains_key(key.to_string().as_bytes())?)
    }
}

fn encode(pack: &OverlayPack) -> Result<Vec<u8>, StorageError> {
    bincode::serialize(pack).map_err(|e| StorageError::Encode(e.to_string()))
}

fn decode(bytes: &[u8]) -> Result<OverlayPack, StorageError> {
    bincode::deserialize(bytes).map_err(|e| StorageError::Decode(e.to_string()))
}

impl PackStore for SledPackStore {
    fn get(&self, key: &CacheKey) -> Result<Option<OverlayPack>, StorageError> {
        match self.db.get(key.to_string().as_bytes())? {
            Some(value) => Ok(Some(decode(&value)?)),
            None => Ok(None),
        }
    }

    fn put(&self, key: &CacheKey, pack: &OverlayPack) -> Result<(), StorageError> {
        check_key(key, pack)?;
        let value = encode(pack)?;
        self.db.insert(key.to_string().as_bytes(), value)?;
        Ok(())
    }

    fn increment_usage(&self, key: &CacheKey) -> Result<Option<u64>, StorageError> {
        // Records that fail to decode are left untouched.
        let updated = self.db.update_and_fetch(key.to_string().as_bytes(), |old| {
            let old = old?;
            match decode(old) {
                Ok(mut pack) => {
                    pack.usage_count = pack.usage_count.saturating_add(1);
                    encode(&pack).ok().or_else(|| Some(old.to_vec()))
                }
                Err(_) => Some(old.to_vec()),
            }
        })?;
        match updated {
            Some(bytes) => Ok(Some(decode(&bytes)?.usage_count)),
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<OverlayPack>, StorageError> {
        let mut packs = Vec::new();
        for item in self.db.iter() {
            let (_, value) = item?;
            packs.push(decode(&value)?);
        }
        Ok(packs)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::store::fixtures;
    use crate::types::WorkspaceType;
    use tempfile::TempDir;

    fn key() -> CacheKey {
        CacheKey::new("toyota_camry", WorkspaceType::EngineFront)
    }

    #[test]
    fn test_store_and_retrieve() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledPackStore::new(temp_dir.path()).unwrap();
        let pack = fixtures::pack(&key());

        store.put(&key(), &pack).unwrap();

        let retrieved = store.get(&key()).unwrap().unwrap();
        assert_eq!(retrieved, pack);
        assert!(store.contains(&key()).unwrap());
    }

    #[test]
    fn test_get_nonexistent() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledPackStore::new(temp_dir.path()).unwrap();
        assert!(store.get(&key()).unwrap().is_none());
        assert_eq!(store.increment_usage(&key()).unwrap(), None);
    }

    #[test]
    fn test_update_existing() {
        let temp_dir = TempDir::new().unwrap();
        let store = SledPackStore::new(temp_dir.path()).unwrap();
        let mut pack = fixtures::pack(&key());
        store.put(&key(), &pack).unwrap();

        pack.provider_tag = "gpt-4o".to_string();
        store.put(&key(), &pack).unwrap();

        assert_eq!(store.list().unwrap().len(), 1);
        assert_eq!(store.get(&key()).unwrap().unwrap().provider_tag, "gpt-4o");
    }

    #[test]
    fn test_increment_usage_persists() {
        let temp_dir = TempDir::new().unwrap();
        {
            let store = SledPackStore::new(temp_dir.path()).unwrap();
            store.put(&key(), &fixtures::pack(&key())).unwrap();
            assert_eq!(store.increment_usage(&key()).unwrap(), Some(1));
            assert_eq!(store.increment_usage(&key()).unwrap(), Some(2));
            store.flush().unwrap();
        }
        let store = SledPackStore::new(temp_dir.path()).unwrap();
        assert_eq!(store.get(&key()).unwrap().unwrap().usage_count, 2);
    }
}
