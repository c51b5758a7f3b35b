use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Mutex, MutexGuard};

use draftline_core::{now_rfc3339, DraftSnapshot};
use draftline_store::StoreError;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tokio::sync::watch;

/// Remote tier failures. They surface as `SaveStatus::Error`, never as a
/// panic or an error returned to the form.
#[derive(Error, Debug)]
#[non_exhaustive]
pub enum GatewayError {
    #[error("remote draft request failed: {0}")]
    Transport(String),

    #[error("remote draft service rejected the request ({status}): {message}")]
    Rejected { status: u16, message: String },

    #[error("remote draft response unreadable: {0}")]
    Decode(String),

    #[error("remote draft store failed: {0}")]
    Store(#[from] StoreError),

    #[error("invalid remote draft endpoint: {0}")]
    Endpoint(String),
}

/// Acknowledgement returned by a successful remote save.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDraftReceipt {
    pub id: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

/// A draft as held by the durable remote store.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RemoteDraftRecord {
    pub session_id: String,
    pub snapshot: DraftSnapshot,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub saved_at: Option<String>,
}

/// Durable draft store addressed by session identifier.
#[async_trait::async_trait]
pub trait RemoteDraftGateway: Send + Sync {
    /// Upsert the draft for `session_id`.
    async fn save_draft(
        &self,
        session_id: &str,
        snapshot: &DraftSnapshot,
    ) -> Result<RemoteDraftReceipt, GatewayError>;

    /// Delete the draft for `session_id`. Deleting an absent draft succeeds.
    async fn delete_draft(&self, session_id: &str) -> Result<(), GatewayError>;

    /// Fetch the draft for `session_id`, used to hydrate a form before mount.
    async fn load_draft(&self, session_id: &str) -> Result<Option<DraftSnapshot>, GatewayError>;
}

fn lock<T>(m: &Mutex<T>) -> MutexGuard<'_, T> {
    m.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

/// Records calls in memory (for testing and offline runs).
///
/// Saves are logged as soon as they are issued, before any hold or failure
/// applies, so tests can count concurrent attempts.
pub struct CollectGateway {
    saves: Mutex<Vec<(String, DraftSnapshot)>>,
    deletes: Mutex<Vec<String>>,
    stored: Mutex<HashMap<String, DraftSnapshot>>,
    fail_saves: AtomicBool,
    fail_deletes: AtomicBool,
    hold: watch::Sender<bool>,
}

impl Default for CollectGateway {
    fn default() -> Self {
        Self::new()
    }
}

impl CollectGateway {
    pub fn new() -> Self {
        Self {
            saves: Mutex::new(Vec::new()),
            deletes: Mutex::new(Vec::new()),
            stored: Mutex::new(HashMap::new()),
            fail_saves: AtomicBool::new(false),
            fail_deletes: AtomicBool::new(false),
            hold: watch::Sender::new(false),
        }
    }

    /// Saves issued so far, in order.
    pub fn saves(&self) -> Vec<(String, DraftSnapshot)> {
        lock(&self.saves).clone()
    }

    /// Deletes issued so far, in order.
    pub fn deletes(&self) -> Vec<String> {
        lock(&self.deletes).clone()
    }

    /// Draft currently held for `session_id`.
    pub fn stored(&self, session_id: &str) -> Option<DraftSnapshot> {
        lock(&self.stored).get(session_id).cloned()
    }

    pub fn set_fail_saves(&self, fail: bool) {
        self.fail_saves.store(fail, Ordering::SeqCst);
    }

    pub fn set_fail_deletes(&self, fail: bool) {
        self.fail_deletes.store(fail, Ordering::SeqCst);
    }

    /// While held, saves stay pending until [`CollectGateway::release`].
    pub fn hold(&self) {
        self.hold.send_replace(true);
    }

    pub fn release(&self) {
        self.hold.send_replace(false);
    }
}

#[async_trait::async_trait]
impl RemoteDraftGateway for CollectGateway {
    async fn save_draft(
        &self,
        session_id: &str,
        snapshot: &DraftSnapshot,
    ) -> Result<RemoteDraftReceipt, GatewayError> {
        lock(&self.saves).push((session_id.to_string(), snapshot.clone()));

        let mut held = self.hold.subscribe();
        if held.wait_for(|h| !*h).await.is_err() {
            return Err(GatewayError::Transport("gateway dropped".into()));
        }

        if self.fail_saves.load(Ordering::SeqCst) {
            return Err(GatewayError::Transport("connection refused".into()));
        }
        lock(&self.stored).insert(session_id.to_string(), snapshot.clone());
        Ok(RemoteDraftReceipt {
            id: session_id.to_string(),
            saved_at: Some(now_rfc3339()),
        })
    }

    async fn delete_draft(&self, session_id: &str) -> Result<(), GatewayError> {
        lock(&self.deletes).push(session_id.to_string());
        if self.fail_deletes.load(Ordering::SeqCst) {
            return Err(GatewayError::Rejected {
                status: 503,
                message: "service unavailable".into(),
            });
        }
        lock(&self.stored).remove(session_id);
        Ok(())
    }

    async fn load_draft(&self, session_id: &str) -> Result<Option<DraftSnapshot>, GatewayError> {
        Ok(self.stored(session_id))
    }
}
