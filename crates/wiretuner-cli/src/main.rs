//! WireTuner CLI
//!
//! Inspect and maintain WireTuner document files

use clap::{Parser, Subcommand};
use std::path::PathBuf;
use wiretuner_core::logging_facility::{init, Profile};
use wiretuner_core::ExError;

mod commands;

#[derive(Debug, Parser)]
#[command(name = "wiretuner")]
#[command(about = "WireTuner - Document persistence tools", long_about = None)]
struct Cli {
    /// Persistence settings (TOML); defaults apply when omitted
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Emit JSON logs on stderr
    #[arg(long, global = true)]
    json_logs: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create an empty document
    Create(commands::create::CreateArgs),
    /// Show metadata, head sequence and snapshots (upgrades older documents in place)
    Info(commands::info::InfoArgs),
    /// Load the document and report recovered anomalies (upgrades older documents in place)
    Verify(commands::verify::VerifyArgs),
    /// Reconstruct the document at a sequence (upgrades older documents in place)
    Replay(commands::replay::ReplayArgs),
    /// Snapshot the head of the log now (upgrades older documents in place)
    Snapshot(commands::snapshot::SnapshotArgs),
    /// List events in a sequence range (upgrades older documents in place)
    History(commands::history::HistoryArgs),
}

fn main() {
    let cli = Cli::parse();

    init(if cli.json_logs {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = commands::load_config(cli.config.as_deref()).and_then(|config| {
        match cli.command {
            Commands::Create(args) => commands::create::execute(args, config),
            Commands::Info(args) => commands::info::execute(args, config),
            Commands::Verify(args) => commands::verify::execute(args, config),
            Commands::Replay(args) => commands::replay::execute(args, config),
            Commands::Snapshot(args) => commands::snapshot::execute(args, config),
            Commands::History(args) => commands::history::execute(args, config),
        }
    });

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        if let Some(remediation) = e.downcast_ref::<ExError>().and_then(ExError::remediation) {
            eprintln!("{}", remediation);
        }
        std::process::exit(1);
    }
}
