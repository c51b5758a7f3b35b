use serde::{Deserialize, Serialize};

use crate::error::DraftError;

// ── Status ──

/// Remote save indicator shown next to a form.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Default)]
#[serde(rename_all = "snake_case")]
pub enum SaveStatus {
    #[default]
    Idle,
    Saving,
    Saved,
    Error,
}

// ── Valid transitions ──

const VALID_TRANSITIONS: &[(SaveStatus, &[SaveStatus])] = &[
    (SaveStatus::Idle, &[SaveStatus::Saving]),
    (SaveStatus::Saving, &[SaveStatus::Saved, SaveStatus::Error]),
    (SaveStatus::Saved, &[SaveStatus::Saving]),
    (SaveStatus::Error, &[SaveStatus::Saving]), // retry
];

pub fn is_valid_transition(from: SaveStatus, to: SaveStatus) -> bool {
    VALID_TRANSITIONS
        .iter()
        .any(|(f, targets)| *f == from && targets.contains(&to))
}

// ── Save state ──

/// Observable autosave state of one session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct SaveState {
    pub status: SaveStatus,
    /// RFC 3339 time of the last successful remote save.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub last_saved: Option<String>,
    pub has_unsaved_changes: bool,
    /// A recoverable local draft is waiting for a restore/discard decision.
    pub has_draft: bool,
}

impl SaveState {
    /// Starting state. A server-provided draft counts as already persisted.
    pub fn initial(server_hydrated: bool) -> Self {
        Self {
            status: if server_hydrated {
                SaveStatus::Saved
            } else {
                SaveStatus::Idle
            },
            ..Self::default()
        }
    }

    /// Move `status` to `to`, rejecting edges outside the transition table.
    pub fn transition(&mut self, to: SaveStatus) -> Result<(), DraftError> {
        if !is_valid_transition(self.status, to) {
            return Err(DraftError::InvalidTransition {
                from: self.status,
                to,
            });
        }
        self.status = to;
        Ok(())
    }

    pub fn begin_save(&mut self) -> Result<(), DraftError> {
        self.transition(SaveStatus::Saving)
    }

    /// Record a successful remote save. `dirty_again` is set when changes
    /// arrived while the save was in flight.
    pub fn save_succeeded(&mut self, saved_at: String, dirty_again: bool) -> Result<(), DraftError> {
        self.transition(SaveStatus::Saved)?;
        self.last_saved = Some(saved_at);
        self.has_unsaved_changes = dirty_again;
        Ok(())
    }

    /// Record a failed remote save. Unsaved changes stay pending for retry.
    pub fn save_failed(&mut self) -> Result<(), DraftError> {
        self.transition(SaveStatus::Error)
    }
}
