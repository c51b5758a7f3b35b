use std::fmt;

use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};

use crate::error::DraftError;

/// Separator between the namespace and the session identifier in a scoped key.
pub const KEY_SEPARATOR: char = ':';

/// Current time as an RFC 3339 string.
pub fn now_rfc3339() -> String {
    time::OffsetDateTime::now_utc()
        .format(&time::format_description::well_known::Rfc3339)
        .unwrap_or_else(|_| "1970-01-01T00:00:00Z".to_string())
}

/// Whether `ts` parses as an RFC 3339 timestamp.
pub fn is_rfc3339(ts: &str) -> bool {
    time::OffsetDateTime::parse(ts, &time::format_description::well_known::Rfc3339).is_ok()
}

// ── Snapshot ──

/// The full form state of one draft, kept as an opaque JSON value.
///
/// Nothing in this workspace looks inside a snapshot. Callers convert their own
/// form type in and out with [`DraftSnapshot::from_serializable`] and
/// [`DraftSnapshot::decode`].
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DraftSnapshot(serde_json::Value);

impl DraftSnapshot {
    pub fn new(value: serde_json::Value) -> Self {
        Self(value)
    }

    /// Serialize a caller value into a snapshot.
    pub fn from_serializable<T: Serialize>(value: &T) -> Result<Self, DraftError> {
        serde_json::to_value(value)
            .map(Self)
            .map_err(DraftError::Encode)
    }

    /// Decode into a caller type. Fields the snapshot lacks fall back to the
    /// type's `#[serde(default)]` values, so older snapshot shapes still load.
    pub fn decode<T: DeserializeOwned>(&self) -> Result<T, DraftError> {
        T::deserialize(&self.0).map_err(DraftError::Decode)
    }

    pub fn as_value(&self) -> &serde_json::Value {
        &self.0
    }

    pub fn into_value(self) -> serde_json::Value {
        self.0
    }

    /// Compact JSON encoding.
    pub fn to_json(&self) -> Result<String, DraftError> {
        serde_json::to_string(&self.0).map_err(DraftError::Encode)
    }
}

impl From<serde_json::Value> for DraftSnapshot {
    fn from(value: serde_json::Value) -> Self {
        Self(value)
    }
}

// ── Storage key ──

/// Identifies one draft slot. One key holds at most one cached snapshot.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(try_from = "String", into = "String")]
pub struct StorageKey(String);

impl StorageKey {
    pub fn new(key: impl Into<String>) -> Result<Self, DraftError> {
        let key = key.into();
        if key.trim().is_empty() || key.chars().any(char::is_control) {
            return Err(DraftError::InvalidKey(key));
        }
        Ok(Self(key))
    }

    /// Key for one session of one form, e.g. `shift_report:2291`.
    pub fn scoped(namespace: &str, session_id: &str) -> Result<Self, DraftError> {
        if session_id.trim().is_empty() {
            return Err(DraftError::InvalidKey(format!(
                "{namespace}{KEY_SEPARATOR}{session_id}"
            )));
        }
        Self::new(format!("{namespace}{KEY_SEPARATOR}{session_id}"))
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for StorageKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl TryFrom<String> for StorageKey {
    type Error = DraftError;

    fn try_from(value: String) -> Result<Self, Self::Error> {
        Self::new(value)
    }
}

impl From<StorageKey> for String {
    fn from(key: StorageKey) -> Self {
        key.0
    }
}

impl std::str::FromStr for StorageKey {
    type Err = DraftError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::new(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[derive(Debug, Serialize, Deserialize, PartialEq, Default)]
    struct ReportV1 {
        #[serde(default)]
        accepted: Vec<String>,
        #[serde(default)]
        notes: String,
    }

    #[derive(Debug, Deserialize, PartialEq, Default)]
    struct ReportV2 {
        #[serde(default)]
        accepted: Vec<String>,
        #[serde(default)]
        notes: String,
        #[serde(default)]
        billing_review: bool,
        #[serde(default)]
        retail_leads: Vec<String>,
    }

    #[test]
    fn snapshot_roundtrips_caller_type() {
        let report = ReportV1 {
            accepted: vec!["R-100".into()],
            notes: "quiet shift".into(),
        };
        let snap = DraftSnapshot::from_serializable(&report).unwrap();
        let back: ReportV1 = snap.decode().unwrap();
        assert_eq!(back, report);
    }

    #[test]
    fn older_snapshot_shape_fills_defaults() {
        let snap = DraftSnapshot::new(json!({"accepted": ["R-1"], "notes": "hi"}));
        let v2: ReportV2 = snap.decode().unwrap();
        assert_eq!(v2.accepted, vec!["R-1".to_string()]);
        assert!(!v2.billing_review);
        assert!(v2.retail_leads.is_empty());
    }

    #[test]
    fn decode_wrong_shape_is_error() {
        let snap = DraftSnapshot::new(json!({"accepted": "not-a-list"}));
        assert!(matches!(
            snap.decode::<ReportV2>(),
            Err(DraftError::Decode(_))
        ));
    }

    #[test]
    fn scoped_key_format() {
        let key = StorageKey::scoped("shift_report", "2291").unwrap();
        assert_eq!(key.as_str(), "shift_report:2291");
        assert_eq!(key.to_string(), "shift_report:2291");
    }

    #[test]
    fn empty_keys_rejected() {
        assert!(StorageKey::new("").is_err());
        assert!(StorageKey::new("   ").is_err());
        assert!(StorageKey::new("a\nb").is_err());
        assert!(StorageKey::scoped("shift_report", "").is_err());
    }

    #[test]
    fn key_deserialization_validates() {
        let ok: StorageKey = serde_json::from_str("\"quote:7\"").unwrap();
        assert_eq!(ok.as_str(), "quote:7");
        assert!(serde_json::from_str::<StorageKey>("\"\"").is_err());
    }

    #[test]
    fn now_is_rfc3339() {
        assert!(is_rfc3339(&now_rfc3339()));
        assert!(!is_rfc3339("yesterday"));
    }
}
