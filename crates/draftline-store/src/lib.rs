pub mod cache;
pub mod file;
pub mod memory;

pub use cache::{LocalDraftCache, StoreError};
pub use file::FileDraftCache;
pub use memory::MemoryDraftCache;

use draftline_core::StorageKey;
use fs2::FileExt;
use std::fs;
use std::io::Write;
use std::path::{Path, PathBuf};

/// Compute a stable file-name-safe ID for an arbitrary identifier.
/// hash_id = blake3(input) → hex string (first 32 chars).
pub fn hash_id(input: &str) -> String {
    let hash = blake3::hash(input.as_bytes());
    hash.to_hex()[..32].to_string()
}

/// File-name-safe ID for a storage key.
pub fn entry_id(key: &StorageKey) -> String {
    hash_id(key.as_str())
}

/// Return the per-user store root: `~/.local/share/draftline/`
/// Windows: `%APPDATA%\draftline\` (falls back to `%USERPROFILE%\.draftline\`)
pub fn store_root() -> PathBuf {
    if let Some(data_dir) = dirs::data_dir() {
        data_dir.join("draftline")
    } else if let Some(home) = dirs::home_dir() {
        home.join(".draftline")
    } else {
        PathBuf::from(".draftline-store")
    }
}

/// Cached drafts live in `store_root/drafts/`.
pub fn drafts_dir(root: &Path) -> PathBuf {
    root.join("drafts")
}

/// The directory-backed remote tier lives in `store_root/remote/`.
pub fn remote_dir(root: &Path) -> PathBuf {
    root.join("remote")
}

pub fn config_path(root: &Path) -> PathBuf {
    root.join("config.json")
}

/// Atomic write: write to temp file in same dir, then rename.
pub fn write_atomic(path: &Path, data: &[u8]) -> std::io::Result<()> {
    let parent = path.parent().ok_or_else(|| {
        std::io::Error::new(
            std::io::ErrorKind::InvalidInput,
            format!("no parent dir for {}", path.display()),
        )
    })?;
    fs::create_dir_all(parent)?;
    let mut tmp = tempfile::NamedTempFile::new_in(parent)?;
    tmp.write_all(data)?;
    tmp.flush()?;
    tmp.persist(path).map_err(|e| e.error)?;
    Ok(())
}

/// File-based exclusive lock guard.
pub struct LockGuard {
    _file: fs::File,
}

/// Acquire an exclusive file lock. Creates the lock file if needed.
pub fn lock_file(path: &Path) -> std::io::Result<LockGuard> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent)?;
    }
    let file = fs::OpenOptions::new()
        .create(true)
        .truncate(false)
        .write(true)
        .open(path)?;
    file.lock_exclusive()?;
    Ok(LockGuard { _file: file })
}
