pub mod create;
pub mod history;
pub mod info;
pub mod replay;
pub mod snapshot;
pub mod verify;

use std::path::Path;
use wiretuner_core::{ExError, PersistenceConfig, VectorDocumentMaterializer};
use wiretuner_engine::DocumentStore;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

pub type Document = DocumentStore<VectorDocumentMaterializer>;

pub fn load_config(path: Option<&Path>) -> Result<PersistenceConfig, Box<dyn std::error::Error>> {
    match path {
        Some(path) => Ok(PersistenceConfig::load(path).map_err(ExError::from)?),
        None => Ok(PersistenceConfig::default()),
    }
}

pub fn open_document(path: &Path, config: PersistenceConfig) -> Result<Document, ExError> {
    DocumentStore::open(path, VectorDocumentMaterializer, config)
}

/// Render epoch milliseconds as RFC 3339
pub fn format_ms(ms: i64) -> String {
    chrono::DateTime::from_timestamp_millis(ms)
        .map(|t| t.to_rfc3339())
        .unwrap_or_else(|| ms.to_string())
}
