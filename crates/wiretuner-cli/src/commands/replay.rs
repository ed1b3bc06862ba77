//! Replay command

use super::{open_document, CliResult};
use clap::Args;
use std::path::PathBuf;
use wiretuner_core::PersistenceConfig;
use wiretuner_engine::commands::engine_command::{
    apply_engine_command, EngineCommand, EngineCommandResult,
};
use wiretuner_engine::ReplayBase;

#[derive(Debug, Args)]
pub struct ReplayArgs {
    pub file: PathBuf,

    /// Target sequence; defaults to the head of the log
    #[arg(long)]
    pub to: Option<u64>,
}

pub fn execute(args: ReplayArgs, config: PersistenceConfig) -> CliResult {
    let store = open_document(&args.file, config)?;
    let sequence = match args.to {
        Some(sequence) => sequence,
        None => store.head_sequence()?,
    };

    let r = match apply_engine_command(EngineCommand::ReconstructAt { sequence }, &store)? {
        EngineCommandResult::Reconstructed(r) => r,
        other => return Err(format!("Unexpected result: {:?}", other).into()),
    };

    let base = match r.base {
        ReplayBase::Empty => "empty".to_string(),
        ReplayBase::Snapshot { id, sequence } => format!("snapshot #{} at {}", id, sequence),
        ReplayBase::Checkpoint { sequence } => format!("checkpoint at {}", sequence),
    };

    println!("Reconstructed:");
    println!("  sequence: {}", r.sequence);
    println!("  base: {}", base);
    println!("  applied: {}", r.applied);
    if r.skipped > 0 {
        println!("  skipped: {}", r.skipped);
    }
    println!("  layers: {}", r.state.layers.len());
    println!("  objects: {}", r.state.objects.len());
    println!("  state_hash: {}", r.state_hash);
    for warning in &r.warnings {
        println!("warning: {}", warning);
    }
    Ok(())
}
