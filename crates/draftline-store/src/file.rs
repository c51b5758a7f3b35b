use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use draftline_core::{
    decode_record, encode_record, now_rfc3339, peek_key, CachedDraftRecord, DraftSnapshot,
    StorageKey,
};

use crate::cache::{LocalDraftCache, StoreError};
use crate::{entry_id, lock_file, write_atomic};

/// Draft cache backed by one JSON file per key.
///
/// Layout: `{dir}/{entry_id}.json` holds the record, `{dir}/{entry_id}.lock`
/// serializes writers across processes.
#[derive(Debug, Clone)]
pub struct FileDraftCache {
    dir: PathBuf,
    max_bytes: Option<u64>,
}

impl FileDraftCache {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            max_bytes: None,
        }
    }

    /// Reject records larger than `limit` bytes.
    pub fn with_max_bytes(mut self, limit: u64) -> Self {
        self.max_bytes = Some(limit);
        self
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn entry_path(&self, key: &StorageKey) -> PathBuf {
        self.dir.join(format!("{}.json", entry_id(key)))
    }

    fn lock_path(&self, key: &StorageKey) -> PathBuf {
        self.dir.join(format!("{}.lock", entry_id(key)))
    }

    /// Every readable record in the cache, sorted by key.
    /// Entries that are corrupt or carry no key are skipped.
    pub fn entries(&self) -> Result<Vec<CachedDraftRecord>, StoreError> {
        let dir = match fs::read_dir(&self.dir) {
            Ok(d) => d,
            Err(e) if e.kind() == ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e.into()),
        };
        let mut records = Vec::new();
        for entry in dir {
            let path = entry?.path();
            if path.extension().and_then(|e| e.to_str()) != Some("json") {
                continue;
            }
            let raw = match fs::read_to_string(&path) {
                Ok(r) => r,
                Err(e) => {
                    tracing::warn!(path = %path.display(), error = %e, "skipping unreadable draft");
                    continue;
                }
            };
            let Some(key) = peek_key(&raw) else {
                continue;
            };
            if let Some(record) = decode_record(&key, &raw) {
                records.push(record);
            }
        }
        records.sort_by(|a, b| a.key.cmp(&b.key));
        Ok(records)
    }
}

impl FileDraftCache {
    /// Encode and store `record`. Callers hold the entry lock.
    fn put(&self, record: &CachedDraftRecord) -> Result<(), StoreError> {
        let data = encode_record(record)?;
        let bytes = data.len() as u64;
        if let Some(limit) = self.max_bytes {
            if bytes > limit {
                return Err(StoreError::QuotaExceeded {
                    key: record.key.clone(),
                    bytes,
                    limit,
                });
            }
        }
        write_atomic(&self.entry_path(&record.key), data.as_bytes())?;
        tracing::debug!(key = %record.key, bytes, restored = record.restored, "cached draft written");
        Ok(())
    }
}

impl LocalDraftCache for FileDraftCache {
    fn write(&self, key: &StorageKey, snapshot: &DraftSnapshot) -> Result<(), StoreError> {
        let _guard = lock_file(&self.lock_path(key))?;
        let restored = self.read(key).is_some_and(|r| r.restored);
        self.put(&CachedDraftRecord {
            key: key.clone(),
            snapshot: snapshot.clone(),
            saved_at: now_rfc3339(),
            restored,
        })
    }

    fn mark_restored(&self, key: &StorageKey) -> Result<(), StoreError> {
        if !self.dir.is_dir() {
            return Ok(());
        }
        let _guard = lock_file(&self.lock_path(key))?;
        match self.read(key) {
            Some(record) if !record.restored => self.put(&CachedDraftRecord {
                restored: true,
                ..record
            }),
            _ => Ok(()),
        }
    }

    fn read(&self, key: &StorageKey) -> Option<CachedDraftRecord> {
        let path = self.entry_path(key);
        let raw = match fs::read_to_string(&path) {
            Ok(r) => r,
            Err(e) if e.kind() == ErrorKind::NotFound => return None,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "cached draft unreadable");
                return None;
            }
        };
        decode_record(key, &raw)
    }

    fn clear(&self, key: &StorageKey) -> Result<(), StoreError> {
        if !self.dir.is_dir() {
            return Ok(());
        }
        let lock_path = self.lock_path(key);
        {
            let _guard = lock_file(&lock_path)?;
            match fs::remove_file(self.entry_path(key)) {
                Ok(()) => tracing::debug!(key = %key, "cached draft cleared"),
                Err(e) if e.kind() == ErrorKind::NotFound => {}
                Err(e) => return Err(e.into()),
            }
        }
        let _ = fs::remove_file(lock_path);
        Ok(())
    }
}
