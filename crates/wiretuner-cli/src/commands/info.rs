//! Info command

use super::{format_ms, open_document, CliResult};
use clap::Args;
use std::path::PathBuf;
use wiretuner_core::PersistenceConfig;

#[derive(Debug, Args)]
pub struct InfoArgs {
    pub file: PathBuf,
}

pub fn execute(args: InfoArgs, config: PersistenceConfig) -> CliResult {
    let store = open_document(&args.file, config)?;
    let meta = store.metadata()?;
    let snapshots = store.snapshots()?;

    println!("Document:");
    println!("  document_id: {}", meta.document_id.as_str());
    println!("  title: {}", meta.title);
    if let Some(author) = &meta.author {
        println!("  author: {}", author);
    }
    println!("  format_version: {}", meta.format_version);
    println!("  created_at: {}", format_ms(meta.created_at));
    println!("  modified_at: {}", format_ms(meta.modified_at));
    println!("  head_sequence: {}", store.head_sequence()?);
    println!("Snapshots: {}", snapshots.len());
    for s in &snapshots {
        let compression = match s.compression {
            Some(c) => format!("{:?}", c).to_lowercase(),
            None => "invalid".to_string(),
        };
        println!(
            "  #{} sequence={} bytes={} compression={} at {}",
            s.id,
            s.sequence,
            s.size_bytes,
            compression,
            format_ms(s.created_at)
        );
    }
    Ok(())
}
