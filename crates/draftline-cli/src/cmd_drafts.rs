use draftline_core::CachedDraftRecord;
use draftline_store::LocalDraftCache;

use crate::workspace::{parse_key, Workspace};

fn record_json(record: &CachedDraftRecord) -> serde_json::Value {
    serde_json::json!({
        "key": record.key,
        "savedAt": record.saved_at,
        "snapshot": record.snapshot,
    })
}

/// `draftline list`
pub fn list(ws: &Workspace) -> anyhow::Result<()> {
    let records = ws.cache().entries()?;
    if records.is_empty() {
        println!("No cached drafts.");
        return Ok(());
    }
    for record in &records {
        let bytes = record.snapshot.to_json()?.len();
        println!("{}  {}  {} bytes", record.key, record.saved_at, bytes);
    }
    Ok(())
}

/// `draftline show <key>`
pub fn show(ws: &Workspace, key: &str) -> anyhow::Result<()> {
    let key = parse_key(key)?;
    let Some(record) = ws.cache().read(&key) else {
        anyhow::bail!("no cached draft for {key}");
    };
    println!("{}", serde_json::to_string_pretty(&record_json(&record))?);
    Ok(())
}

/// `draftline clear <key>`
pub fn clear(ws: &Workspace, key: &str) -> anyhow::Result<()> {
    let key = parse_key(key)?;
    ws.cache().clear(&key)?;
    println!("Cleared {key}");
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use draftline_core::DraftSnapshot;

    fn workspace(dir: &tempfile::TempDir) -> Workspace {
        Workspace::open(Some(dir.path().to_path_buf()))
    }

    #[test]
    fn show_missing_is_error() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(&dir);
        assert!(show(&ws, "shift_report:1").is_err());
    }

    #[test]
    fn show_and_clear_cached_draft() {
        let dir = tempfile::tempdir().unwrap();
        let ws = workspace(&dir);
        let key = parse_key("shift_report:1").unwrap();
        ws.cache()
            .write(&key, &DraftSnapshot::new(serde_json::json!({"calls": 1})))
            .unwrap();

        show(&ws, "shift_report:1").unwrap();
        list(&ws).unwrap();
        clear(&ws, "shift_report:1").unwrap();
        clear(&ws, "shift_report:1").unwrap();
        assert!(ws.cache().read(&key).is_none());
        assert!(show(&ws, "shift_report:1").is_err());
    }

    #[test]
    fn record_json_uses_stored_field_names() {
        let record = CachedDraftRecord {
            key: parse_key("k").unwrap(),
            snapshot: DraftSnapshot::new(serde_json::json!({"a": 1})),
            saved_at: "2026-03-02T18:04:11Z".into(),
            restored: false,
        };
        let v = record_json(&record);
        assert_eq!(v["key"], "k");
        assert_eq!(v["savedAt"], "2026-03-02T18:04:11Z");
        assert_eq!(v["snapshot"]["a"], 1);
    }
}
