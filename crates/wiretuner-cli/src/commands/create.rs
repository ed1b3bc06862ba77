//! Create command
//!
//! Usage: wiretuner create <FILE> --title <TITLE> [--author <AUTHOR>]

use super::CliResult;
use clap::Args;
use std::path::PathBuf;
use wiretuner_core::{PersistenceConfig, VectorDocumentMaterializer};
use wiretuner_engine::{DocumentInit, DocumentStore};

#[derive(Debug, Args)]
pub struct CreateArgs {
    /// Path of the new document file
    pub file: PathBuf,

    #[arg(long)]
    pub title: String,

    #[arg(long)]
    pub author: Option<String>,
}

pub fn execute(args: CreateArgs, config: PersistenceConfig) -> CliResult {
    let mut init = DocumentInit::new(args.title);
    if let Some(author) = args.author {
        init = init.with_author(author);
    }

    let store = DocumentStore::create(&args.file, init, VectorDocumentMaterializer, config)?;
    let meta = store.metadata()?;

    println!("Document created:");
    println!("  document_id: {}", meta.document_id.as_str());
    println!("  path: {}", args.file.display());
    println!("  format_version: {}", meta.format_version);
    Ok(())
}
