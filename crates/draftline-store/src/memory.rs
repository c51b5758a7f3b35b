use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};

use draftline_core::{
    decode_record, encode_record, now_rfc3339, CachedDraftRecord, DraftSnapshot, StorageKey,
};

use crate::cache::{LocalDraftCache, StoreError};

/// In-process draft cache. Keeps raw encoded entries so tests can plant
/// corrupt data, and records every successful write.
#[derive(Debug, Default)]
pub struct MemoryDraftCache {
    entries: Mutex<HashMap<StorageKey, String>>,
    writes: Mutex<Vec<(StorageKey, DraftSnapshot)>>,
    unavailable: bool,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

impl MemoryDraftCache {
    pub fn new() -> Self {
        Self::default()
    }

    /// A cache whose every write and clear fails, like disabled browser storage.
    pub fn unavailable() -> Self {
        Self {
            unavailable: true,
            ..Self::default()
        }
    }

    /// Store a raw entry verbatim, bypassing encoding.
    pub fn insert_raw(&self, key: &StorageKey, raw: impl Into<String>) {
        lock(&self.entries).insert(key.clone(), raw.into());
    }

    /// Successful writes in order.
    pub fn writes(&self) -> Vec<(StorageKey, DraftSnapshot)> {
        lock(&self.writes).clone()
    }

    pub fn contains(&self, key: &StorageKey) -> bool {
        lock(&self.entries).contains_key(key)
    }
}

impl LocalDraftCache for MemoryDraftCache {
    fn write(&self, key: &StorageKey, snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("storage disabled".into()));
        }
        let mut entries = lock(&self.entries);
        let restored = entries
            .get(key)
            .and_then(|raw| decode_record(key, raw))
            .is_some_and(|r| r.restored);
        let raw = encode_record(&CachedDraftRecord {
            key: key.clone(),
            snapshot: snapshot.clone(),
            saved_at: now_rfc3339(),
            restored,
        })?;
        entries.insert(key.clone(), raw);
        drop(entries);
        lock(&self.writes).push((key.clone(), snapshot.clone()));
        Ok(())
    }

    fn read(&self, key: &StorageKey) -> Option<CachedDraftRecord> {
        let raw = lock(&self.entries).get(key).cloned()?;
        decode_record(key, &raw)
    }

    fn clear(&self, key: &StorageKey) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("storage disabled".into()));
        }
        lock(&self.entries).remove(key);
        Ok(())
    }

    fn mark_restored(&self, key: &StorageKey) -> Result<(), StoreError> {
        if self.unavailable {
            return Err(StoreError::Unavailable("storage disabled".into()));
        }
        let mut entries = lock(&self.entries);
        let Some(record) = entries.get(key).and_then(|raw| decode_record(key, raw)) else {
            return Ok(());
        };
        let raw = encode_record(&CachedDraftRecord {
            restored: true,
            ..record
        })?;
        entries.insert(key.clone(), raw);
        Ok(())
    }
}
