mod cmd_config;
mod cmd_drafts;
mod cmd_edit;
mod cmd_finalize;
mod workspace;

use std::path::PathBuf;

use clap::{Parser, Subcommand};
use tracing_subscriber::layer::SubscriberExt;
use tracing_subscriber::util::SubscriberInitExt;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "draftline", version, about = "Autosaved form drafts with crash recovery")]
struct Cli {
    /// Store directory (defaults to the per-user data dir)
    #[arg(long, global = true)]
    store: Option<PathBuf>,
    #[command(subcommand)]
    cmd: Command,
}

#[derive(Subcommand)]
enum Command {
    /// List locally cached drafts
    List,
    /// Print one cached draft
    Show {
        /// Storage key (e.g. shift_report:2291)
        key: String,
    },
    /// Delete a cached draft (remote copy is kept)
    Clear {
        /// Storage key
        key: String,
    },
    /// Run an autosave session fed with JSON snapshots, one per stdin line
    Edit {
        /// Storage key
        key: String,
        /// Session ID used by the remote tier (defaults to the part after the last ':')
        #[arg(long)]
        session: Option<String>,
        /// Remote draft service base URL (overrides config)
        #[arg(long)]
        remote: Option<String>,
        /// Restore a recovered draft without asking
        #[arg(long, conflicts_with = "discard")]
        restore: bool,
        /// Discard a recovered draft without asking
        #[arg(long)]
        discard: bool,
        /// Run without any autosave
        #[arg(long)]
        disabled: bool,
    },
    /// Clear both tiers after the final submission went through
    Finalize {
        /// Storage key
        key: String,
        /// Session ID used by the remote tier
        #[arg(long)]
        session: Option<String>,
        /// Remote draft service base URL (overrides config)
        #[arg(long)]
        remote: Option<String>,
    },
    /// Manage settings in config.json
    Config {
        #[command(subcommand)]
        cmd: cmd_config::ConfigCmd,
    },
}

fn init_logging() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn"));
    tracing_subscriber::registry()
        .with(filter)
        .with(
            tracing_subscriber::fmt::layer()
                .with_target(false)
                .with_writer(std::io::stderr),
        )
        .init();
}

fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();
    init_logging();
    let ws = workspace::Workspace::open(cli.store);

    match cli.cmd {
        Command::List => cmd_drafts::list(&ws),
        Command::Show { key } => cmd_drafts::show(&ws, &key),
        Command::Clear { key } => cmd_drafts::clear(&ws, &key),
        Command::Edit {
            key,
            session,
            remote,
            restore,
            discard,
            disabled,
        } => cmd_edit::execute(
            &ws,
            cmd_edit::EditParams {
                key: &key,
                session: session.as_deref(),
                remote: remote.as_deref(),
                on_recovery: cmd_edit::RecoveryChoice::from_flags(restore, discard),
                enabled: !disabled,
            },
        ),
        Command::Finalize {
            key,
            session,
            remote,
        } => cmd_finalize::execute(&ws, &key, session.as_deref(), remote.as_deref()),
        Command::Config { cmd } => cmd_config::run(cmd, &ws),
    }
}
