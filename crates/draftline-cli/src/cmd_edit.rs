use std::sync::Arc;

use draftline_core::{AutosaveOptions, DraftSnapshot, SaveState, SaveStatus};
use draftline_sync::DraftSession;
use tokio::io::{AsyncBufReadExt, BufReader};

use crate::workspace::{default_session_id, parse_key, Workspace};

/// Typed on stdin instead of a snapshot to force a flush of both tiers.
const SAVE_COMMAND: &str = ":save";

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecoveryChoice {
    Restore,
    Discard,
    /// Leave the recovered draft undecided; the next change overwrites it.
    Ask,
}

impl RecoveryChoice {
    pub fn from_flags(restore: bool, discard: bool) -> Self {
        match (restore, discard) {
            (true, _) => RecoveryChoice::Restore,
            (_, true) => RecoveryChoice::Discard,
            _ => RecoveryChoice::Ask,
        }
    }
}

pub struct EditParams<'a> {
    pub key: &'a str,
    pub session: Option<&'a str>,
    pub remote: Option<&'a str>,
    pub on_recovery: RecoveryChoice,
    pub enabled: bool,
}

/// `draftline edit <key>`
pub fn execute(ws: &Workspace, params: EditParams<'_>) -> anyhow::Result<()> {
    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(run(ws, params))
}

fn describe(state: &SaveState) -> String {
    let status = match state.status {
        SaveStatus::Idle => "idle",
        SaveStatus::Saving => "saving",
        SaveStatus::Saved => "saved",
        SaveStatus::Error => "error",
    };
    let mut line = format!("[{status}]");
    if let Some(at) = &state.last_saved {
        line.push_str(&format!(" last saved {at}"));
    }
    if state.has_unsaved_changes {
        line.push_str(" (unsaved changes)");
    }
    line
}

fn parse_line(line: &str) -> Result<DraftSnapshot, serde_json::Error> {
    serde_json::from_str::<serde_json::Value>(line).map(DraftSnapshot::new)
}

async fn run(ws: &Workspace, params: EditParams<'_>) -> anyhow::Result<()> {
    let key = parse_key(params.key)?;
    let session_id = params
        .session
        .map(str::to_string)
        .unwrap_or_else(|| default_session_id(&key));
    let gateway = ws.gateway(params.remote)?;

    let initial = if params.enabled {
        match gateway.load_draft(&session_id).await {
            Ok(draft) => draft,
            Err(e) => {
                tracing::warn!(session_id = %session_id, error = %e, "could not load server draft");
                None
            }
        }
    } else {
        None
    };
    if let Some(draft) = &initial {
        println!("Loaded server draft: {}", draft.to_json()?);
    }

    let options = AutosaveOptions::new(key, session_id)
        .with_config(&ws.config)
        .with_initial_draft(initial)
        .with_enabled(params.enabled);
    let mut session = DraftSession::mount(options, Arc::new(ws.cache()), gateway);

    let recovered_at = session.pending_draft().map(|r| r.saved_at.clone());
    if let Some(saved_at) = recovered_at {
        println!("Recovered draft from {saved_at}");
        match params.on_recovery {
            RecoveryChoice::Restore => {
                if let Some(snapshot) = session.restore_draft() {
                    println!("Restored: {}", snapshot.to_json()?);
                    session.on_change(snapshot);
                }
            }
            RecoveryChoice::Discard => {
                session.clear_draft();
                println!("Discarded.");
            }
            RecoveryChoice::Ask => {
                println!("Left undecided; rerun with --restore or --discard.");
            }
        }
    }

    let mut states = session.subscribe();
    let printer = tokio::spawn(async move {
        while states.changed().await.is_ok() {
            let state = states.borrow_and_update().clone();
            println!("{}", describe(&state));
        }
    });

    let mut lines = BufReader::new(tokio::io::stdin()).lines();
    loop {
        let line = tokio::select! {
            line = lines.next_line() => line?,
            _ = tokio::signal::ctrl_c() => None,
        };
        let Some(line) = line else { break };
        let line = line.trim();
        if line.is_empty() {
            continue;
        }
        if line == SAVE_COMMAND {
            session.save_now().await;
            continue;
        }
        match parse_line(line) {
            Ok(snapshot) => session.on_change(snapshot),
            Err(e) => eprintln!("Skipping line that is not JSON: {e}"),
        }
    }

    session.shutdown().await;
    if let Err(e) = printer.await {
        tracing::warn!(error = %e, "state printer ended abnormally");
    }
    Ok(())
}
