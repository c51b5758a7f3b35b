use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Context;
use draftline_core::{DraftlineConfig, StorageKey, KEY_SEPARATOR};
use draftline_store::FileDraftCache;
use draftline_sync::{DirDraftGateway, HttpDraftGateway, RemoteDraftGateway};

/// Store root plus the settings loaded from it.
pub struct Workspace {
    pub root: PathBuf,
    pub config: DraftlineConfig,
}

impl Workspace {
    pub fn open(store: Option<PathBuf>) -> Self {
        let root = store.unwrap_or_else(draftline_store::store_root);
        let config = DraftlineConfig::load(&draftline_store::config_path(&root));
        Self { root, config }
    }

    pub fn config_path(&self) -> PathBuf {
        draftline_store::config_path(&self.root)
    }

    pub fn cache(&self) -> FileDraftCache {
        FileDraftCache::new(draftline_store::drafts_dir(&self.root))
            .with_max_bytes(self.config.max_cache_bytes)
    }

    /// HTTP gateway when a remote URL is given or configured, otherwise the
    /// directory store under the root.
    pub fn gateway(&self, remote: Option<&str>) -> anyhow::Result<Arc<dyn RemoteDraftGateway>> {
        match remote.or(self.config.remote_url.as_deref()) {
            Some(url) => {
                let gw = HttpDraftGateway::new(url, self.config.request_timeout())
                    .with_context(|| format!("invalid remote URL {url}"))?;
                Ok(Arc::new(gw))
            }
            None => Ok(Arc::new(DirDraftGateway::new(draftline_store::remote_dir(
                &self.root,
            )))),
        }
    }
}

pub fn parse_key(raw: &str) -> anyhow::Result<StorageKey> {
    StorageKey::new(raw).with_context(|| format!("bad storage key {raw:?}"))
}

/// `shift_report:2291` → `2291`; a key without a namespace is its own session ID.
pub fn default_session_id(key: &StorageKey) -> String {
    let raw = key.as_str();
    match raw.rsplit_once(KEY_SEPARATOR) {
        Some((_, id)) if !id.is_empty() => id.to_string(),
        _ => raw.to_string(),
    }
}
