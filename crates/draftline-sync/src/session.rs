//! The surface a form holds for one draft: feed it changes, read its save
//! state, answer the recovery prompt, and finalize after submission.

use std::sync::Arc;

use draftline_core::{AutosaveOptions, CachedDraftRecord, DraftSnapshot, SaveState, StorageKey};
use draftline_store::LocalDraftCache;
use serde::de::DeserializeOwned;
use tokio::sync::watch;

use crate::gateway::RemoteDraftGateway;
use crate::recovery::{RecoveryController, RecoveryDecision};
use crate::scheduler::SyncScheduler;

/// What `finalize` managed to clean up.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct FinalizeOutcome {
    pub local_cleared: bool,
    pub remote_deleted: bool,
}

pub struct DraftSession {
    cache: Arc<dyn LocalDraftCache>,
    gateway: Arc<dyn RemoteDraftGateway>,
    recovery: RecoveryController,
    scheduler: SyncScheduler,
}

impl DraftSession {
    /// Probe the local cache for a recoverable draft, then start autosave.
    /// Must run inside a Tokio runtime unless autosave is disabled.
    pub fn mount(
        options: AutosaveOptions,
        cache: Arc<dyn LocalDraftCache>,
        gateway: Arc<dyn RemoteDraftGateway>,
    ) -> Self {
        let recovery = if options.enabled {
            RecoveryController::probe(
                cache.as_ref(),
                &options.storage_key,
                options.initial_draft.is_some(),
            )
        } else {
            RecoveryController::inactive(&options.storage_key)
        };
        let scheduler = SyncScheduler::start(&options, cache.clone(), gateway.clone());
        if recovery.has_draft() {
            scheduler.set_has_draft(true);
        }
        Self {
            cache,
            gateway,
            recovery,
            scheduler,
        }
    }

    pub fn key(&self) -> &StorageKey {
        self.scheduler.key()
    }

    pub fn session_id(&self) -> &str {
        self.scheduler.session_id()
    }

    pub fn state(&self) -> SaveState {
        self.scheduler.state()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.scheduler.subscribe()
    }

    pub fn has_draft(&self) -> bool {
        self.recovery.has_draft()
    }

    /// The cached record awaiting a decision, for showing when it was saved.
    pub fn pending_draft(&self) -> Option<&CachedDraftRecord> {
        self.recovery.pending()
    }

    pub fn recovery_decision(&self) -> Option<RecoveryDecision> {
        self.recovery.decision()
    }

    pub fn on_change(&self, snapshot: DraftSnapshot) {
        self.scheduler.on_change(snapshot);
    }

    /// Accept the recovered draft. The caller merges it into its form and
    /// feeds the result back through [`DraftSession::on_change`]. The choice
    /// is recorded in the cache, so later mounts of this key do not ask again.
    pub fn restore_draft(&mut self) -> Option<DraftSnapshot> {
        if !self.scheduler.is_enabled() {
            return None;
        }
        let snapshot = self.recovery.restore(self.cache.as_ref());
        self.scheduler.set_has_draft(false);
        snapshot
    }

    /// Restore into `T`, filling fields an older draft lacks from
    /// `#[serde(default)]`. A draft that no longer decodes is discarded.
    pub fn restore_draft_as<T: DeserializeOwned>(&mut self) -> Option<T> {
        let snapshot = self.restore_draft()?;
        match snapshot.decode::<T>() {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(key = %self.key(), error = %e, "recovered draft does not fit the form, discarding");
                if let Err(e) = self.cache.clear(self.scheduler.key()) {
                    tracing::warn!(key = %self.key(), error = %e, "failed to clear undecodable draft");
                }
                None
            }
        }
    }

    /// Discard the local draft. The remote draft is left alone.
    pub fn clear_draft(&mut self) {
        if !self.scheduler.is_enabled() {
            return;
        }
        if let Err(e) = self.recovery.discard(self.cache.as_ref()) {
            tracing::warn!(key = %self.key(), error = %e, "failed to clear local draft");
        }
        self.scheduler.set_has_draft(false);
    }

    /// Flush both tiers now and return the resulting state.
    pub async fn save_now(&self) -> SaveState {
        self.scheduler.save_now().await
    }

    /// Unmount with a final best-effort flush of both tiers.
    pub async fn shutdown(self) {
        self.scheduler.shutdown().await;
    }

    /// Call after the server acknowledged the final submission. Stops
    /// autosave, waits out any pending remote save, then clears the local
    /// draft and deletes the remote one. A failed delete is logged only.
    pub async fn finalize(mut self) -> FinalizeOutcome {
        self.scheduler.halt().await;
        if !self.scheduler.is_enabled() {
            return FinalizeOutcome::default();
        }

        let key = self.scheduler.key().clone();
        let local_cleared = match self.cache.clear(&key) {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, error = %e, "failed to clear local draft on finalize");
                false
            }
        };
        self.scheduler.set_has_draft(false);

        let session_id = self.scheduler.session_id();
        let remote_deleted = match self.gateway.delete_draft(session_id).await {
            Ok(()) => true,
            Err(e) => {
                tracing::warn!(key = %key, session_id, error = %e, "remote draft delete failed");
                false
            }
        };
        tracing::debug!(key = %key, local_cleared, remote_deleted, "draft finalized");
        FinalizeOutcome {
            local_cleared,
            remote_deleted,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::gateway::CollectGateway;
    use draftline_core::SaveStatus;
    use draftline_store::{FileDraftCache, MemoryDraftCache};
    use serde::Deserialize;
    use serde_json::json;
    use std::time::Duration;
    use tokio::time::sleep;

    fn key() -> StorageKey {
        StorageKey::new("shift_report:2291").unwrap()
    }

    fn options() -> AutosaveOptions {
        AutosaveOptions::new(key(), "2291")
            .with_debounce(Duration::from_millis(1500))
            .with_server_save_interval(Duration::from_millis(30_000))
    }

    fn snap(v: serde_json::Value) -> DraftSnapshot {
        DraftSnapshot::new(v)
    }

    fn mount_with(
        options: AutosaveOptions,
        cache: &Arc<MemoryDraftCache>,
        gateway: &Arc<CollectGateway>,
    ) -> DraftSession {
        DraftSession::mount(options, cache.clone(), gateway.clone())
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_round_trip() {
        let cache = Arc::new(MemoryDraftCache::new());
        let gateway = Arc::new(CollectGateway::new());
        let draft = snap(json!({"calls": 2, "notes": "two transports"}));

        let first = mount_with(options(), &cache, &gateway);
        assert!(!first.has_draft());
        first.on_change(draft.clone());
        sleep(Duration::from_millis(2_000)).await;
        // simulate a crash: no shutdown, no final flush
        std::mem::forget(first);

        let mut second = mount_with(options(), &cache, &gateway);
        assert!(second.has_draft());
        assert!(second.state().has_draft);
        assert_eq!(second.pending_draft().unwrap().snapshot, draft);

        assert_eq!(second.restore_draft(), Some(draft.clone()));
        assert!(!second.has_draft());
        assert!(!second.state().has_draft);
        assert_eq!(second.recovery_decision(), Some(RecoveryDecision::Restored));
        assert_eq!(second.restore_draft(), Some(draft));
        second.shutdown().await;
    }

    #[tokio::test(start_paused = true)]
    async fn recovery_survives_on_disk() {
        let dir = tempfile::tempdir().unwrap();
        let gateway = Arc::new(CollectGateway::new());
        let draft = snap(json!({"calls": 5}));

        let first = DraftSession::mount(
            options(),
            Arc::new(FileDraftCache::new(dir.path())),
            gateway.clone(),
        );
        first.on_change(draft.clone());
        sleep(Duration::from_millis(1_600)).await;
        std::mem::forget(first);

        let mut second = DraftSession::mount(
            options(),
            Arc::new(FileDraftCache::new(dir.path())),
            gateway,
        );
        assert!(second.has_draft());
        assert_eq!(second.restore_draft(), Some(draft));
    }

    #[tokio::test(start_paused = true)]
    async fn remount_after_restore_does_not_prompt() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": 1}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());
        gateway.set_fail_saves(true);

        let mut first = mount_with(options(), &cache, &gateway);
        let restored = first.restore_draft().unwrap();
        first.on_change(restored);
        first.on_change(snap(json!({"calls": 2})));
        first.shutdown().await;
        assert!(gateway.stored("2291").is_none());

        let second = mount_with(options(), &cache, &gateway);
        assert!(!second.has_draft());
        assert!(!second.state().has_draft);
        // the edits are still cached, only the prompt is gone
        assert_eq!(
            cache.read(&key()).unwrap().snapshot,
            snap(json!({"calls": 2}))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn fresh_draft_after_clear_prompts_again() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": 1}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());

        let mut first = mount_with(options(), &cache, &gateway);
        first.restore_draft();
        first.shutdown().await;
        cache.clear(&key()).unwrap();
        cache.write(&key(), &snap(json!({"calls": 5}))).unwrap();

        let second = mount_with(options(), &cache, &gateway);
        assert!(second.has_draft());
    }

    #[tokio::test(start_paused = true)]
    async fn server_hydrated_mount_has_no_prompt() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": 1}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());

        let session = mount_with(
            options().with_initial_draft(Some(snap(json!({"calls": 3})))),
            &cache,
            &gateway,
        );
        assert!(!session.has_draft());
        assert!(!session.state().has_draft);
        assert_eq!(session.state().status, SaveStatus::Saved);
    }

    #[tokio::test(start_paused = true)]
    async fn corrupt_cache_has_no_draft() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.insert_raw(&key(), "{\"snapshot\": {\"calls\": 2");
        let gateway = Arc::new(CollectGateway::new());

        let mut session = mount_with(options(), &cache, &gateway);
        assert!(!session.has_draft());
        assert_eq!(session.restore_draft(), None);
    }

    #[tokio::test(start_paused = true)]
    async fn clear_is_idempotent() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": 1}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());

        let mut session = mount_with(options(), &cache, &gateway);
        assert!(session.has_draft());
        session.clear_draft();
        session.clear_draft();
        assert!(!session.has_draft());
        assert!(!session.state().has_draft);
        assert!(cache.read(&key()).is_none());
        assert_eq!(session.restore_draft(), None);
        assert!(gateway.deletes().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn clear_on_empty_key() {
        let cache = Arc::new(MemoryDraftCache::new());
        let gateway = Arc::new(CollectGateway::new());
        let mut session = mount_with(options(), &cache, &gateway);
        session.clear_draft();
        assert!(!session.has_draft());
        assert_eq!(session.recovery_decision(), None);
    }

    #[derive(Debug, Deserialize, PartialEq)]
    struct ShiftReport {
        calls: u32,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        transports: Vec<String>,
    }

    #[tokio::test(start_paused = true)]
    async fn typed_restore_fills_new_fields() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": 4}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());

        let mut session = mount_with(options(), &cache, &gateway);
        let report: ShiftReport = session.restore_draft_as().unwrap();
        assert_eq!(
            report,
            ShiftReport {
                calls: 4,
                notes: String::new(),
                transports: vec![],
            }
        );
    }

    #[tokio::test(start_paused = true)]
    async fn typed_restore_failure_discards() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": "many"}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());

        let mut session = mount_with(options(), &cache, &gateway);
        assert!(session.restore_draft_as::<ShiftReport>().is_none());
        assert!(!session.has_draft());
        assert!(cache.read(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_clears_both_tiers() {
        let cache = Arc::new(MemoryDraftCache::new());
        let gateway = Arc::new(CollectGateway::new());

        let session = mount_with(options(), &cache, &gateway);
        session.on_change(snap(json!({"calls": 6})));
        sleep(Duration::from_millis(30_001)).await;
        assert!(gateway.stored("2291").is_some());
        assert!(cache.read(&key()).is_some());

        let outcome = session.finalize().await;
        assert_eq!(
            outcome,
            FinalizeOutcome {
                local_cleared: true,
                remote_deleted: true,
            }
        );
        assert!(cache.read(&key()).is_none());
        assert_eq!(gateway.deletes(), vec!["2291".to_string()]);
        assert!(gateway.stored("2291").is_none());

        // no timer survives finalize
        sleep(Duration::from_millis(120_000)).await;
        assert_eq!(gateway.saves().len(), 1);
        assert!(cache.read(&key()).is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_waits_for_pending_save() {
        let cache = Arc::new(MemoryDraftCache::new());
        let gateway = Arc::new(CollectGateway::new());
        gateway.hold();

        let session = mount_with(options(), &cache, &gateway);
        session.on_change(snap(json!({"calls": 1})));
        sleep(Duration::from_millis(30_001)).await;
        assert_eq!(session.state().status, SaveStatus::Saving);

        let releaser = {
            let gateway = gateway.clone();
            tokio::spawn(async move {
                sleep(Duration::from_millis(500)).await;
                gateway.release();
            })
        };
        session.finalize().await;
        releaser.await.unwrap();

        // the late save landed before the delete, so nothing is resurrected
        assert_eq!(gateway.deletes().len(), 1);
        assert!(gateway.stored("2291").is_none());
    }

    #[tokio::test(start_paused = true)]
    async fn finalize_delete_failure_is_not_fatal() {
        let cache = Arc::new(MemoryDraftCache::new());
        let gateway = Arc::new(CollectGateway::new());
        gateway.set_fail_deletes(true);

        let session = mount_with(options(), &cache, &gateway);
        session.on_change(snap(json!({"calls": 1})));
        sleep(Duration::from_millis(1_600)).await;

        let outcome = session.finalize().await;
        assert!(outcome.local_cleared);
        assert!(!outcome.remote_deleted);
        assert!(cache.read(&key()).is_none());
        assert_eq!(gateway.deletes().len(), 1);
    }

    #[tokio::test(start_paused = true)]
    async fn disabled_session_never_touches_storage() {
        let cache = Arc::new(MemoryDraftCache::new());
        cache.write(&key(), &snap(json!({"calls": 8}))).unwrap();
        let gateway = Arc::new(CollectGateway::new());

        let mut session = mount_with(options().with_enabled(false), &cache, &gateway);
        assert!(!session.has_draft());
        assert_eq!(session.state(), SaveState::default());
        session.on_change(snap(json!({"calls": 9})));
        assert_eq!(session.restore_draft(), None);
        session.clear_draft();
        sleep(Duration::from_millis(60_000)).await;

        assert_eq!(session.state().status, SaveStatus::Idle);
        assert!(cache.contains(&key()));
        assert_eq!(cache.writes().len(), 1);

        let outcome = session.finalize().await;
        assert_eq!(outcome, FinalizeOutcome::default());
        assert!(cache.contains(&key()));
        assert!(gateway.deletes().is_empty());
        assert!(gateway.saves().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn shutdown_sends_pending_change() {
        let cache = Arc::new(MemoryDraftCache::new());
        let gateway = Arc::new(CollectGateway::new());

        let session = mount_with(options(), &cache, &gateway);
        let mut rx = session.subscribe();
        session.on_change(snap(json!({"calls": 3})));
        session.shutdown().await;

        assert_eq!(gateway.stored("2291"), Some(snap(json!({"calls": 3}))));
        assert_eq!(rx.borrow_and_update().status, SaveStatus::Saved);
        assert!(cache.read(&key()).is_some());
    }
}
