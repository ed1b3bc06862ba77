use serde::{Deserialize, Serialize};
use wiretuner_core_types::DocumentId;

/// The single metadata row of a document file
///
/// Timestamps are Unix epoch milliseconds. `modified_at` only moves on a
/// manual save.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DocumentMetadata {
    pub document_id: DocumentId,
    pub title: String,
    pub format_version: i64,
    pub created_at: i64,
    pub modified_at: i64,
    pub author: Option<String>,
}

impl DocumentMetadata {
    /// Fresh metadata for a new document at the given format version
    pub fn new(
        title: impl Into<String>,
        author: Option<String>,
        format_version: i64,
        now_ms: i64,
    ) -> Self {
        Self {
            document_id: DocumentId::new(),
            title: title.into(),
            format_version,
            created_at: now_ms,
            modified_at: now_ms,
            author,
        }
    }
}
