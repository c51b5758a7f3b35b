//! Startup detection of a locally cached draft and the one-shot
//! restore/discard decision that follows.

use draftline_core::{CachedDraftRecord, DraftSnapshot, StorageKey};
use draftline_store::{LocalDraftCache, StoreError};

/// What the user chose to do with a recovered draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryDecision {
    Restored,
    Discarded,
}

#[derive(Debug, Clone)]
pub struct RecoveryController {
    key: StorageKey,
    pending: Option<CachedDraftRecord>,
    decision: Option<RecoveryDecision>,
}

impl RecoveryController {
    /// Look for a cached draft under `key`. A server-hydrated form never
    /// offers recovery, whatever the cache holds, and neither does a draft
    /// that was already restored by an earlier mount.
    pub fn probe(cache: &dyn LocalDraftCache, key: &StorageKey, server_hydrated: bool) -> Self {
        let pending = if server_hydrated {
            None
        } else {
            cache.read(key)
        };
        let pending = match pending {
            Some(record) if record.restored => {
                tracing::debug!(key = %key, "cached draft already restored, not offering it again");
                None
            }
            Some(record) => {
                tracing::debug!(key = %key, saved_at = %record.saved_at, "recoverable draft found");
                Some(record)
            }
            None => None,
        };
        Self {
            key: key.clone(),
            pending,
            decision: None,
        }
    }

    /// A controller that never offers recovery, for disabled sessions.
    pub fn inactive(key: &StorageKey) -> Self {
        Self {
            key: key.clone(),
            pending: None,
            decision: None,
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.key
    }

    /// True until the user restores or discards the draft found at mount.
    pub fn has_draft(&self) -> bool {
        self.pending.is_some() && self.decision.is_none()
    }

    /// The record found at mount, while still undecided.
    pub fn pending(&self) -> Option<&CachedDraftRecord> {
        if self.decision.is_some() {
            return None;
        }
        self.pending.as_ref()
    }

    pub fn decision(&self) -> Option<RecoveryDecision> {
        self.decision
    }

    /// Accept the draft found at mount and flag it in the cache so later
    /// mounts do not ask again. Calling it again returns the same snapshot;
    /// after a discard it returns `None`.
    pub fn restore(&mut self, cache: &dyn LocalDraftCache) -> Option<DraftSnapshot> {
        match self.decision {
            Some(RecoveryDecision::Discarded) => None,
            Some(RecoveryDecision::Restored) => self.pending.as_ref().map(|r| r.snapshot.clone()),
            None => {
                let record = self.pending.as_ref()?;
                self.decision = Some(RecoveryDecision::Restored);
                if let Err(e) = cache.mark_restored(&self.key) {
                    tracing::warn!(key = %self.key, error = %e, "failed to record restore decision");
                }
                Some(record.snapshot.clone())
            }
        }
    }

    /// Reject the draft and clear it from the cache. Allowed with nothing
    /// pending: the cache entry is removed either way.
    pub fn discard(&mut self, cache: &dyn LocalDraftCache) -> Result<(), StoreError> {
        if self.pending.is_some() {
            self.decision = Some(RecoveryDecision::Discarded);
        }
        cache.clear(&self.key)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftline_store::MemoryDraftCache;
    use serde_json::json;

    fn key() -> StorageKey {
        StorageKey::new("shift_report:2291").unwrap()
    }

    fn seeded() -> MemoryDraftCache {
        let cache = MemoryDraftCache::new();
        cache
            .write(&key(), &DraftSnapshot::new(json!({"calls": 2})))
            .unwrap();
        cache
    }

    #[test]
    fn cached_draft_is_offered() {
        let cache = seeded();
        let ctl = RecoveryController::probe(&cache, &key(), false);
        assert!(ctl.has_draft());
        assert_eq!(
            ctl.pending().unwrap().snapshot,
            DraftSnapshot::new(json!({"calls": 2}))
        );
        assert_eq!(ctl.decision(), None);
    }

    #[test]
    fn server_hydrated_form_is_not_prompted() {
        let cache = seeded();
        let ctl = RecoveryController::probe(&cache, &key(), true);
        assert!(!ctl.has_draft());
        assert!(ctl.pending().is_none());
    }

    #[test]
    fn empty_cache_offers_nothing() {
        let cache = MemoryDraftCache::new();
        let mut ctl = RecoveryController::probe(&cache, &key(), false);
        assert!(!ctl.has_draft());
        assert_eq!(ctl.restore(&cache), None);
        assert_eq!(ctl.decision(), None);
    }

    #[test]
    fn corrupt_entry_offers_nothing() {
        let cache = MemoryDraftCache::new();
        cache.insert_raw(&key(), "{\"snapshot\": ");
        let ctl = RecoveryController::probe(&cache, &key(), false);
        assert!(!ctl.has_draft());
    }

    #[test]
    fn restore_is_idempotent() {
        let cache = seeded();
        let mut ctl = RecoveryController::probe(&cache, &key(), false);
        let first = ctl.restore(&cache);
        let second = ctl.restore(&cache);
        assert_eq!(first, Some(DraftSnapshot::new(json!({"calls": 2}))));
        assert_eq!(first, second);
        assert!(!ctl.has_draft());
        assert_eq!(ctl.decision(), Some(RecoveryDecision::Restored));
        // restoring leaves the cache entry for the autosave to overwrite
        assert!(cache.read(&key()).is_some());
    }

    #[test]
    fn restored_draft_is_not_offered_again() {
        let cache = seeded();
        let mut ctl = RecoveryController::probe(&cache, &key(), false);
        ctl.restore(&cache).unwrap();
        assert!(cache.read(&key()).unwrap().restored);

        let again = RecoveryController::probe(&cache, &key(), false);
        assert!(!again.has_draft());
        assert!(again.pending().is_none());
    }

    #[test]
    fn restore_returns_mount_time_snapshot() {
        let cache = seeded();
        let mut ctl = RecoveryController::probe(&cache, &key(), false);
        cache
            .write(&key(), &DraftSnapshot::new(json!({"calls": 9})))
            .unwrap();
        assert_eq!(ctl.restore(&cache), Some(DraftSnapshot::new(json!({"calls": 2}))));
    }

    #[test]
    fn discard_clears_cache() {
        let cache = seeded();
        let mut ctl = RecoveryController::probe(&cache, &key(), false);
        ctl.discard(&cache).unwrap();
        assert!(!ctl.has_draft());
        assert!(cache.read(&key()).is_none());
        assert_eq!(ctl.decision(), Some(RecoveryDecision::Discarded));
        assert_eq!(ctl.restore(&cache), None);
    }

    #[test]
    fn discard_reports_storage_failure() {
        let cache = MemoryDraftCache::unavailable();
        let mut ctl = RecoveryController::inactive(&key());
        assert!(matches!(
            ctl.discard(&cache),
            Err(StoreError::Unavailable(_))
        ));
    }
}
