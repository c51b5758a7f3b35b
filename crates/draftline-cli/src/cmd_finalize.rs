use std::sync::Arc;

use draftline_core::AutosaveOptions;
use draftline_sync::DraftSession;

use crate::workspace::{default_session_id, parse_key, Workspace};

/// `draftline finalize <key>`: the form was submitted, drop both copies.
pub fn execute(
    ws: &Workspace,
    key: &str,
    session: Option<&str>,
    remote: Option<&str>,
) -> anyhow::Result<()> {
    let key = parse_key(key)?;
    let session_id = session
        .map(str::to_string)
        .unwrap_or_else(|| default_session_id(&key));
    let gateway = ws.gateway(remote)?;
    let cache = Arc::new(ws.cache());

    let rt = tokio::runtime::Runtime::new()?;
    let outcome = rt.block_on(async {
        let options = AutosaveOptions::new(key.clone(), session_id.clone()).with_config(&ws.config);
        DraftSession::mount(options, cache, gateway).finalize().await
    });

    if outcome.local_cleared {
        println!("Cleared local draft {key}");
    } else {
        println!("Local draft {key} could not be cleared (see log)");
    }
    if outcome.remote_deleted {
        println!("Deleted remote draft {session_id}");
    } else {
        println!("Remote draft {session_id} could not be deleted (see log)");
    }
    Ok(())
}
