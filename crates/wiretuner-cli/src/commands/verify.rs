//! Verify command
//!
//! Performs a full load. Recovered anomalies are listed; anything the
//! recovery policy refuses exits non-zero.

use super::{open_document, CliResult};
use clap::Args;
use std::path::PathBuf;
use wiretuner_core::PersistenceConfig;

#[derive(Debug, Args)]
pub struct VerifyArgs {
    pub file: PathBuf,

    /// Treat gaps and corrupted events as fatal
    #[arg(long)]
    pub strict: bool,
}

pub fn execute(args: VerifyArgs, mut config: PersistenceConfig) -> CliResult {
    if args.strict {
        config.recovery.accept_gaps = false;
        config.recovery.accept_partial = false;
    }

    let store = open_document(&args.file, config)?;
    let head = store.head_sequence()?;
    let report = store.load()?;

    for warning in &report.warnings {
        println!("warning: {}", warning);
    }

    if report.partial {
        println!(
            "Recovered partially: reached sequence {} of {} ({} warnings)",
            report.sequence,
            head,
            report.warnings.len()
        );
    } else if report.warnings.is_empty() {
        println!("Document OK: sequence {}", report.sequence);
    } else {
        println!(
            "Document loaded with {} warnings: sequence {}",
            report.warnings.len(),
            report.sequence
        );
    }
    println!("  state_hash: {}", report.state_hash);
    Ok(())
}
