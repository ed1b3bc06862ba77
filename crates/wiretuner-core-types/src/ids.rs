//! Identifier newtypes for documents and event producers

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Primary key of a document's metadata row
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(transparent)]
pub struct DocumentId(String);

impl DocumentId {
    /// Generate a new DocumentId using UUIDv7 (time ordered)
    pub fn new() -> Self {
        Self(Uuid::now_v7().to_string())
    }

    /// Get the string representation
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// Create from an existing string (read back from storage)
    pub fn from_string(s: String) -> Self {
        Self(s)
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl std::fmt::Display for DocumentId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Identifies the producer of an event (a collaboration peer, a plugin).
///
/// Local edits carry no origin.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct OriginId(String);

impl OriginId {
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl std::fmt::Display for OriginId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_document_id_generation() {
        let id1 = DocumentId::new();
        let id2 = DocumentId::new();

        assert_ne!(id1, id2);
        assert!(!id1.as_str().is_empty());
    }

    #[test]
    fn test_document_id_display() {
        let id = DocumentId::new();
        assert_eq!(format!("{}", id), id.as_str());
    }

    #[test]
    fn test_document_id_serializes_as_plain_string() {
        let id = DocumentId::from_string("doc-1".to_string());
        let json = serde_json::to_string(&id).unwrap();
        assert_eq!(json, "\"doc-1\"");

        let restored: DocumentId = serde_json::from_str(&json).unwrap();
        assert_eq!(restored, id);
    }

    #[test]
    fn test_origin_id_roundtrip() {
        let origin = OriginId::new("peer-7");
        assert_eq!(origin.as_str(), "peer-7");
        assert_eq!(origin.to_string(), "peer-7");
    }
}
