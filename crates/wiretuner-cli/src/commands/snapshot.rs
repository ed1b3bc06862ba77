//! Snapshot command

use super::{open_document, CliResult};
use clap::Args;
use std::path::PathBuf;
use wiretuner_core::PersistenceConfig;
use wiretuner_engine::commands::engine_command::{
    apply_engine_command, EngineCommand, EngineCommandResult,
};
use wiretuner_engine::ForceSnapshotOutcome;

#[derive(Debug, Args)]
pub struct SnapshotArgs {
    pub file: PathBuf,
}

pub fn execute(args: SnapshotArgs, config: PersistenceConfig) -> CliResult {
    let store = open_document(&args.file, config)?;

    let outcome = match apply_engine_command(EngineCommand::ForceSnapshot, &store)? {
        EngineCommandResult::Snapshot(outcome) => outcome,
        other => return Err(format!("Unexpected result: {:?}", other).into()),
    };

    match outcome {
        ForceSnapshotOutcome::Scheduled(handle) => {
            let info = handle.wait()?;
            println!("Snapshot written:");
            println!("  snapshot_id: {}", info.id);
            println!("  sequence: {}", info.sequence);
            println!("  bytes: {}", info.size_bytes);
        }
        ForceSnapshotOutcome::AlreadyInFlight => {
            println!("A snapshot is already being written");
        }
        ForceSnapshotOutcome::NothingToSnapshot => {
            println!("Nothing to snapshot: the newest snapshot covers the head");
        }
    }
    Ok(())
}
