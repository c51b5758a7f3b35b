use draftline_core::{CachedDraftRecord, DraftError, DraftSnapshot, StorageKey};
use thiserror::Error;

/// Local cache failures. All of them are soft: the remote tier is the
/// durable backstop, so callers log these and carry on.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum StoreError {
    #[error("draft cache I/O failed: {0}")]
    Io(#[from] std::io::Error),

    #[error(transparent)]
    Encode(#[from] DraftError),

    #[error("draft for {key} is {bytes} bytes, over the {limit} byte quota")]
    QuotaExceeded { key: StorageKey, bytes: u64, limit: u64 },

    #[error("draft storage unavailable: {0}")]
    Unavailable(String),
}

/// Key-scoped, synchronous, best-effort draft store that survives restarts.
pub trait LocalDraftCache: Send + Sync {
    /// Store `snapshot` under `key`, stamped with the current time.
    fn write(&self, key: &StorageKey, snapshot: &DraftSnapshot) -> Result<(), StoreError>;

    /// The cached record, or `None` if absent or unreadable.
    fn read(&self, key: &StorageKey) -> Option<CachedDraftRecord>;

    /// Remove the record. Removing an absent key is not an error.
    fn clear(&self, key: &StorageKey) -> Result<(), StoreError>;

    /// Flag the record as restored. Later writes keep the flag until the
    /// key is cleared. No-op when the key has no record.
    fn mark_restored(&self, key: &StorageKey) -> Result<(), StoreError>;
}
