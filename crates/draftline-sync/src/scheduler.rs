//! Debounced local flushes and periodic remote flushes for one draft.
//!
//! Two owned tasks run per scheduler: the debounce loop writes the latest
//! snapshot to the local cache once edits go quiet, the interval loop pushes
//! it to the remote gateway when there is something unsaved. Both read the
//! snapshot held here at the moment they flush, never one captured earlier.

use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use draftline_core::{now_rfc3339, AutosaveOptions, DraftSnapshot, SaveState, StorageKey};
use draftline_store::LocalDraftCache;
use tokio::sync::{watch, Notify};
use tokio::task::JoinHandle;
use tokio::time::{Instant, MissedTickBehavior};
use tokio_util::sync::CancellationToken;

use crate::gateway::RemoteDraftGateway;

const MIN_PERIOD: Duration = Duration::from_millis(1);

/// Why a remote save was started.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FlushReason {
    Interval,
    Explicit,
    Unmount,
}

impl FlushReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            FlushReason::Interval => "interval",
            FlushReason::Explicit => "explicit",
            FlushReason::Unmount => "unmount",
        }
    }
}

// ── Shared state ──

#[derive(Debug, Default)]
struct Shared {
    latest: Option<DraftSnapshot>,
    /// Bumped on every change.
    revision: u64,
    /// Last revision written to the local cache.
    local_revision: u64,
    /// Last revision acknowledged by the remote gateway.
    remote_revision: u64,
    /// When the quiet period after the last change ends. Cleared once that
    /// change is written locally.
    local_due: Option<Instant>,
    in_flight: bool,
    save: SaveState,
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

struct Inner {
    key: StorageKey,
    session_id: String,
    enabled: bool,
    debounce: Duration,
    interval: Duration,
    cache: Arc<dyn LocalDraftCache>,
    gateway: Arc<dyn RemoteDraftGateway>,
    shared: Mutex<Shared>,
    changed: Notify,
    state_tx: watch::Sender<SaveState>,
    in_flight_task: Mutex<Option<JoinHandle<()>>>,
}

impl Inner {
    fn shared(&self) -> MutexGuard<'_, Shared> {
        lock(&self.shared)
    }

    fn publish(&self, save: &SaveState) {
        self.state_tx.send_replace(save.clone());
    }

    /// Write the latest snapshot locally if it has not been written yet.
    fn flush_local(&self) -> bool {
        let (snapshot, revision) = {
            let s = self.shared();
            if s.local_revision == s.revision {
                return false;
            }
            match &s.latest {
                Some(snapshot) => (snapshot.clone(), s.revision),
                None => return false,
            }
        };
        match self.cache.write(&self.key, &snapshot) {
            Ok(()) => {
                let mut s = self.shared();
                s.local_revision = s.local_revision.max(revision);
                if s.local_revision == s.revision {
                    s.local_due = None;
                }
                tracing::debug!(key = %self.key, revision, "local draft flushed");
                true
            }
            Err(e) => {
                tracing::warn!(key = %self.key, error = %e, "local draft write failed");
                false
            }
        }
    }

    /// Claim the remote slot. `None` when a save is already in flight or
    /// nothing is unsaved.
    fn begin_remote(&self) -> Option<(DraftSnapshot, u64)> {
        let mut s = self.shared();
        if s.in_flight {
            tracing::debug!(key = %self.key, "remote save pending, tick skipped");
            return None;
        }
        if s.remote_revision == s.revision {
            return None;
        }
        let snapshot = s.latest.clone()?;
        if let Err(e) = s.save.begin_save() {
            tracing::warn!(key = %self.key, error = %e, "cannot start remote save");
            return None;
        }
        s.in_flight = true;
        self.publish(&s.save);
        Some((snapshot, s.revision))
    }

    async fn save_remote(&self, snapshot: DraftSnapshot, revision: u64, reason: FlushReason) {
        let result = self.gateway.save_draft(&self.session_id, &snapshot).await;

        let mut s = self.shared();
        s.in_flight = false;
        let applied = match result {
            Ok(receipt) => {
                s.remote_revision = s.remote_revision.max(revision);
                let dirty_again = s.revision != s.remote_revision;
                tracing::debug!(
                    key = %self.key,
                    remote_id = %receipt.id,
                    reason = reason.as_str(),
                    revision,
                    "remote draft saved"
                );
                s.save.save_succeeded(now_rfc3339(), dirty_again)
            }
            Err(e) => {
                tracing::warn!(
                    key = %self.key,
                    reason = reason.as_str(),
                    error = %e,
                    "remote draft save failed"
                );
                s.save.save_failed()
            }
        };
        if let Err(e) = applied {
            tracing::warn!(key = %self.key, error = %e, "save state out of step");
        }
        self.publish(&s.save);
    }

    fn spawn_remote(self: &Arc<Self>, reason: FlushReason) -> bool {
        let Some((snapshot, revision)) = self.begin_remote() else {
            return false;
        };
        let inner = Arc::clone(self);
        let handle =
            tokio::spawn(async move { inner.save_remote(snapshot, revision, reason).await });
        *lock(&self.in_flight_task) = Some(handle);
        true
    }

    fn take_in_flight(&self) -> Option<JoinHandle<()>> {
        lock(&self.in_flight_task).take()
    }

    /// True once the quiet period after the last unwritten change is over.
    fn local_due(&self, now: Instant) -> bool {
        self.shared().local_due.is_some_and(|due| due <= now)
    }

    fn tick(self: &Arc<Self>) {
        // A debounce ending on this same tick writes locally before the
        // remote save. Mid-burst the local write waits for the debounce.
        if self.local_due(Instant::now()) {
            self.flush_local();
        }
        self.spawn_remote(FlushReason::Interval);
    }
}

// ── Timer loops ──

async fn debounce_loop(inner: Arc<Inner>, cancel: CancellationToken) {
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = inner.changed.notified() => {}
        }
        // Every change restarts the quiet period.
        loop {
            tokio::select! {
                biased;
                _ = cancel.cancelled() => return,
                _ = inner.changed.notified() => continue,
                _ = tokio::time::sleep(inner.debounce) => break,
            }
        }
        inner.flush_local();
    }
}

async fn interval_loop(inner: Arc<Inner>, first_tick: Instant, cancel: CancellationToken) {
    let mut ticker = tokio::time::interval_at(first_tick, inner.interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    loop {
        tokio::select! {
            biased;
            _ = cancel.cancelled() => return,
            _ = ticker.tick() => inner.tick(),
        }
    }
}

// ── Scheduler ──

/// Owns the autosave timers and the save state of one draft session.
///
/// Dropping the scheduler cancels both timers and, inside a Tokio runtime,
/// spawns one detached remote save for anything unsaved. [`SyncScheduler::shutdown`]
/// does the same but waits for it.
pub struct SyncScheduler {
    inner: Arc<Inner>,
    cancel: CancellationToken,
    tasks: Vec<JoinHandle<()>>,
    closed: bool,
}

impl SyncScheduler {
    /// Start the timers. Must run inside a Tokio runtime unless `options.enabled` is false.
    pub fn start(
        options: &AutosaveOptions,
        cache: Arc<dyn LocalDraftCache>,
        gateway: Arc<dyn RemoteDraftGateway>,
    ) -> Self {
        let save = SaveState::initial(options.enabled && options.initial_draft.is_some());
        let (state_tx, _) = watch::channel(save.clone());
        let inner = Arc::new(Inner {
            key: options.storage_key.clone(),
            session_id: options.session_id.clone(),
            enabled: options.enabled,
            debounce: options.debounce.max(MIN_PERIOD),
            interval: options.server_save_interval.max(MIN_PERIOD),
            cache,
            gateway,
            shared: Mutex::new(Shared {
                latest: options.initial_draft.clone(),
                save,
                ..Shared::default()
            }),
            changed: Notify::new(),
            state_tx,
            in_flight_task: Mutex::new(None),
        });

        let cancel = CancellationToken::new();
        let mut tasks = Vec::new();
        if options.enabled {
            let first_tick = Instant::now() + inner.interval;
            tasks.push(tokio::spawn(debounce_loop(inner.clone(), cancel.clone())));
            tasks.push(tokio::spawn(interval_loop(
                inner.clone(),
                first_tick,
                cancel.clone(),
            )));
            tracing::debug!(
                key = %inner.key,
                debounce_ms = inner.debounce.as_millis() as u64,
                interval_ms = inner.interval.as_millis() as u64,
                "autosave started"
            );
        }

        Self {
            inner,
            cancel,
            tasks,
            closed: false,
        }
    }

    pub fn key(&self) -> &StorageKey {
        &self.inner.key
    }

    pub fn session_id(&self) -> &str {
        &self.inner.session_id
    }

    pub fn is_enabled(&self) -> bool {
        self.inner.enabled
    }

    pub fn state(&self) -> SaveState {
        self.inner.shared().save.clone()
    }

    pub fn subscribe(&self) -> watch::Receiver<SaveState> {
        self.inner.state_tx.subscribe()
    }

    /// The snapshot the next flush would send.
    pub fn latest(&self) -> Option<DraftSnapshot> {
        self.inner.shared().latest.clone()
    }

    /// Record a new canonical snapshot and restart the debounce timer.
    pub fn on_change(&self, snapshot: DraftSnapshot) {
        if !self.inner.enabled || self.closed {
            return;
        }
        {
            let mut s = self.inner.shared();
            s.latest = Some(snapshot);
            s.revision += 1;
            s.local_due = Some(Instant::now() + self.inner.debounce);
            s.save.has_unsaved_changes = true;
            self.inner.publish(&s.save);
        }
        self.inner.changed.notify_one();
    }

    pub(crate) fn set_has_draft(&self, has_draft: bool) {
        let mut s = self.inner.shared();
        if s.save.has_draft != has_draft {
            s.save.has_draft = has_draft;
            self.inner.publish(&s.save);
        }
    }

    /// Write the latest snapshot locally now instead of waiting for the debounce.
    pub fn flush_local(&self) -> bool {
        self.inner.enabled && self.inner.flush_local()
    }

    /// Flush locally, then save remotely and wait for the outcome. Skipped if a
    /// remote save is already in flight.
    pub async fn save_now(&self) -> SaveState {
        if self.inner.enabled && !self.closed {
            self.inner.flush_local();
            if let Some((snapshot, revision)) = self.inner.begin_remote() {
                self.inner
                    .save_remote(snapshot, revision, FlushReason::Explicit)
                    .await;
            }
        }
        self.state()
    }

    /// Stop both timers and wait for any in-flight remote save. Nothing is
    /// flushed afterwards.
    pub async fn halt(&mut self) {
        self.closed = true;
        self.cancel.cancel();
        for task in self.tasks.drain(..) {
            if let Err(e) = task.await {
                tracing::warn!(key = %self.inner.key, error = %e, "autosave task ended abnormally");
            }
        }
        if let Some(pending) = self.inner.take_in_flight() {
            if let Err(e) = pending.await {
                tracing::warn!(key = %self.inner.key, error = %e, "remote save task ended abnormally");
            }
        }
    }

    /// Unmount: stop the timers, write any pending change locally, then make
    /// one best-effort remote save. Failures are logged and not retried.
    pub async fn shutdown(mut self) {
        self.halt().await;
        if !self.inner.enabled {
            return;
        }
        self.inner.flush_local();
        if let Some((snapshot, revision)) = self.inner.begin_remote() {
            self.inner
                .save_remote(snapshot, revision, FlushReason::Unmount)
                .await;
        }
        tracing::debug!(key = %self.inner.key, "autosave stopped");
    }
}

impl Drop for SyncScheduler {
    fn drop(&mut self) {
        if self.closed {
            return;
        }
        self.cancel.cancel();
        if !self.inner.enabled {
            return;
        }
        self.inner.flush_local();
        let Ok(runtime) = tokio::runtime::Handle::try_current() else {
            return;
        };
        let pending = self.inner.take_in_flight();
        let inner = Arc::clone(&self.inner);
        runtime.spawn(async move {
            if let Some(pending) = pending {
                if let Err(e) = pending.await {
                    tracing::warn!(key = %inner.key, error = %e, "remote save task ended abnormally");
                }
            }
            if let Some((snapshot, revision)) = inner.begin_remote() {
                inner
                    .save_remote(snapshot, revision, FlushReason::Unmount)
                    .await;
            }
        });
    }
}
