//! History command
//!
//! Usage: wiretuner history <FILE> [--from <SEQ>] [--to <SEQ>]

use super::{format_ms, open_document, CliResult};
use clap::Args;
use std::path::PathBuf;
use wiretuner_core::{ExErrorKind, PersistenceConfig};

#[derive(Debug, Args)]
pub struct HistoryArgs {
    pub file: PathBuf,

    #[arg(long, default_value_t = 1)]
    pub from: u64,

    /// Last sequence to list; defaults to the head of the log
    #[arg(long)]
    pub to: Option<u64>,
}

pub fn execute(args: HistoryArgs, config: PersistenceConfig) -> CliResult {
    let store = open_document(&args.file, config)?;
    let to = match args.to {
        Some(to) => to,
        None => store.head_sequence()?,
    };

    let mut listed = 0u64;
    for item in store.events(args.from, to) {
        match item {
            Ok(event) => {
                let origin = event
                    .origin_id
                    .as_ref()
                    .map(|o| format!(" origin={}", o.as_str()))
                    .unwrap_or_default();
                println!(
                    "{:>8}  {}  {}{}",
                    event.sequence,
                    format_ms(event.timestamp),
                    event.event_type(),
                    origin
                );
                listed += 1;
            }
            Err(err) if err.kind() == ExErrorKind::SequenceGap => {
                println!("warning: {}", err);
            }
            Err(err) => return Err(err.into()),
        }
    }

    println!("{} events", listed);
    Ok(())
}
