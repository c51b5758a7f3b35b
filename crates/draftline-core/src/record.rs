//! On-disk envelope for a locally cached draft.
//!
//! Layout (one entry per storage key):
//!
//! ```json
//! { "version": 1, "key": "shift_report:2291", "snapshot": { ... }, "savedAt": "2026-03-02T18:04:11Z" }
//! ```
//!
//! `"restored": true` is added once the user restored the draft, so later
//! mounts of the same key do not ask again. It is dropped when the entry is
//! cleared.
//!
//! `version` and `key` are optional on read: entries written before they
//! existed are treated as version 1 for the key they were found under.

use serde::{Deserialize, Serialize};

use crate::error::DraftError;
use crate::types::{is_rfc3339, DraftSnapshot, StorageKey};

/// Envelope version written by this build.
pub const RECORD_VERSION: u32 = 1;

fn default_version() -> u32 {
    1
}

fn is_false(b: &bool) -> bool {
    !*b
}

/// A draft as held by the local cache.
#[derive(Debug, Clone, PartialEq)]
pub struct CachedDraftRecord {
    pub key: StorageKey,
    pub snapshot: DraftSnapshot,
    /// RFC 3339 time of the write.
    pub saved_at: String,
    /// The recovery decision for this key was already made.
    pub restored: bool,
}

#[derive(Serialize, Deserialize)]
struct Envelope {
    #[serde(default = "default_version")]
    version: u32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    key: Option<String>,
    snapshot: DraftSnapshot,
    #[serde(rename = "savedAt")]
    saved_at: String,
    #[serde(default, skip_serializing_if = "is_false")]
    restored: bool,
}

/// Encode a record for storage.
pub fn encode_record(record: &CachedDraftRecord) -> Result<String, DraftError> {
    let envelope = Envelope {
        version: RECORD_VERSION,
        key: Some(record.key.as_str().to_string()),
        snapshot: record.snapshot.clone(),
        saved_at: record.saved_at.clone(),
        restored: record.restored,
    };
    serde_json::to_string(&envelope).map_err(DraftError::Encode)
}

/// Decode a stored entry found under `key`.
///
/// Fails closed: malformed JSON, a bad timestamp, a version newer than this
/// build, or an envelope that names a different key all yield `None`.
pub fn decode_record(key: &StorageKey, raw: &str) -> Option<CachedDraftRecord> {
    let envelope: Envelope = match serde_json::from_str(raw) {
        Ok(e) => e,
        Err(e) => {
            tracing::warn!(key = %key, error = %e, "discarding corrupt cached draft");
            return None;
        }
    };
    if envelope.version > RECORD_VERSION {
        tracing::warn!(
            key = %key,
            version = envelope.version,
            "cached draft written by a newer release, ignoring"
        );
        return None;
    }
    if let Some(stored_key) = envelope.key.as_deref() {
        if stored_key != key.as_str() {
            tracing::warn!(key = %key, stored_key, "cached draft belongs to another key");
            return None;
        }
    }
    if !is_rfc3339(&envelope.saved_at) {
        tracing::warn!(key = %key, saved_at = %envelope.saved_at, "cached draft has a bad timestamp");
        return None;
    }
    Some(CachedDraftRecord {
        key: key.clone(),
        snapshot: envelope.snapshot,
        saved_at: envelope.saved_at,
        restored: envelope.restored,
    })
}

/// Key named inside a stored entry, if the entry is readable and carries one.
pub fn peek_key(raw: &str) -> Option<StorageKey> {
    let envelope: Envelope = serde_json::from_str(raw).ok()?;
    StorageKey::new(envelope.key?).ok()
}
