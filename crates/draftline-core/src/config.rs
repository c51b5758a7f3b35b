use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::types::{DraftSnapshot, StorageKey};

pub const DEFAULT_DEBOUNCE_MS: u64 = 1_500;
pub const DEFAULT_SERVER_SAVE_INTERVAL_MS: u64 = 30_000;
pub const DEFAULT_REQUEST_TIMEOUT_SECS: u64 = 10;
/// Roughly what a browser grants one origin for key-value storage.
pub const DEFAULT_MAX_CACHE_BYTES: u64 = 5 * 1024 * 1024;

// ── Persistent settings ──

/// Settings stored in `<store_root>/config.json`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct DraftlineConfig {
    pub debounce_ms: u64,
    pub server_save_interval_ms: u64,
    /// Base URL of the remote draft service. Unset means the local
    /// directory-backed store is used as the durable tier.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub remote_url: Option<String>,
    pub request_timeout_secs: u64,
    pub max_cache_bytes: u64,
}

impl Default for DraftlineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            server_save_interval_ms: DEFAULT_SERVER_SAVE_INTERVAL_MS,
            remote_url: None,
            request_timeout_secs: DEFAULT_REQUEST_TIMEOUT_SECS,
            max_cache_bytes: DEFAULT_MAX_CACHE_BYTES,
        }
    }
}

impl DraftlineConfig {
    /// Keys accepted in `config.json`.
    pub const KEYS: &'static [&'static str] = &[
        "debounce_ms",
        "server_save_interval_ms",
        "remote_url",
        "request_timeout_secs",
        "max_cache_bytes",
    ];

    /// Load from `path`. Returns defaults if the file is missing or unparseable.
    pub fn load(path: &Path) -> Self {
        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(_) => return Self::default(),
        };
        match serde_json::from_str(&content) {
            Ok(config) => config,
            Err(e) => {
                tracing::warn!(path = %path.display(), error = %e, "ignoring unparseable config");
                Self::default()
            }
        }
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }
}

// ── Per-session options ──

/// Options for one autosave session.
#[derive(Debug, Clone)]
pub struct AutosaveOptions {
    pub storage_key: StorageKey,
    /// Identifier the remote tier files the draft under.
    pub session_id: String,
    /// Draft the caller already hydrated from the remote tier, if any.
    pub initial_draft: Option<DraftSnapshot>,
    pub debounce: Duration,
    pub server_save_interval: Duration,
    /// `false` disables both timers and every storage access.
    pub enabled: bool,
}

impl AutosaveOptions {
    pub fn new(storage_key: StorageKey, session_id: impl Into<String>) -> Self {
        Self {
            storage_key,
            session_id: session_id.into(),
            initial_draft: None,
            debounce: Duration::from_millis(DEFAULT_DEBOUNCE_MS),
            server_save_interval: Duration::from_millis(DEFAULT_SERVER_SAVE_INTERVAL_MS),
            enabled: true,
        }
    }

    /// Take timer settings from persistent config.
    pub fn with_config(mut self, config: &DraftlineConfig) -> Self {
        self.debounce = Duration::from_millis(config.debounce_ms);
        self.server_save_interval = Duration::from_millis(config.server_save_interval_ms);
        self
    }

    pub fn with_initial_draft(mut self, draft: Option<DraftSnapshot>) -> Self {
        self.initial_draft = draft;
        self
    }

    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    pub fn with_server_save_interval(mut self, interval: Duration) -> Self {
        self.server_save_interval = interval;
        self
    }

    pub fn with_enabled(mut self, enabled: bool) -> Self {
        self.enabled = enabled;
        self
    }
}
