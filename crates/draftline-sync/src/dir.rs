use std::fs;
use std::io::ErrorKind;
use std::path::{Path, PathBuf};

use draftline_core::{now_rfc3339, DraftSnapshot};
use draftline_store::{hash_id, write_atomic, StoreError};

use crate::gateway::{GatewayError, RemoteDraftGateway, RemoteDraftReceipt, RemoteDraftRecord};

/// Durable draft tier kept in a local directory, one JSON file per session.
/// Used when no remote service is configured.
#[derive(Debug, Clone)]
pub struct DirDraftGateway {
    dir: PathBuf,
}

impl DirDraftGateway {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    fn record_path(&self, session_id: &str) -> PathBuf {
        self.dir.join(format!("{}.json", hash_id(session_id)))
    }
}

fn store_err(e: std::io::Error) -> GatewayError {
    GatewayError::Store(StoreError::Io(e))
}

/// Run file work on the blocking pool.
async fn blocking<T, F>(f: F) -> Result<T, GatewayError>
where
    F: FnOnce() -> Result<T, GatewayError> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| GatewayError::Transport(format!("draft file task failed: {e}")))?
}

#[async_trait::async_trait]
impl RemoteDraftGateway for DirDraftGateway {
    async fn save_draft(
        &self,
        session_id: &str,
        snapshot: &DraftSnapshot,
    ) -> Result<RemoteDraftReceipt, GatewayError> {
        let saved_at = now_rfc3339();
        let record = RemoteDraftRecord {
            session_id: session_id.to_string(),
            snapshot: snapshot.clone(),
            saved_at: Some(saved_at.clone()),
        };
        let data = serde_json::to_vec_pretty(&record)
            .map_err(|e| GatewayError::Decode(e.to_string()))?;
        let path = self.record_path(session_id);
        blocking(move || write_atomic(&path, &data).map_err(store_err)).await?;
        Ok(RemoteDraftReceipt {
            id: hash_id(session_id),
            saved_at: Some(saved_at),
        })
    }

    async fn delete_draft(&self, session_id: &str) -> Result<(), GatewayError> {
        let path = self.record_path(session_id);
        blocking(move || match fs::remove_file(&path) {
            Ok(()) => Ok(()),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(()),
            Err(e) => Err(store_err(e)),
        })
        .await
    }

    async fn load_draft(&self, session_id: &str) -> Result<Option<DraftSnapshot>, GatewayError> {
        let path = self.record_path(session_id);
        let raw = blocking(move || match fs::read_to_string(&path) {
            Ok(r) => Ok(Some(r)),
            Err(e) if e.kind() == ErrorKind::NotFound => Ok(None),
            Err(e) => Err(store_err(e)),
        })
        .await?;
        let Some(raw) = raw else {
            return Ok(None);
        };
        let record: RemoteDraftRecord =
            serde_json::from_str(&raw).map_err(|e| GatewayError::Decode(e.to_string()))?;
        if record.session_id != session_id {
            return Ok(None);
        }
        Ok(Some(record.snapshot))
    }
}
