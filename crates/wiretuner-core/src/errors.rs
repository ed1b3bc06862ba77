use wiretuner_core_types::{Sequence, SequenceRange};
use thiserror::Error;

/// Result type alias using WireTunerError
pub type Result<T> = std::result::Result<T, WireTunerError>;

// ========== Error Facility ==========

/// Canonical error kind taxonomy
///
/// Each kind maps to a stable error code that callers (UI, collaboration
/// layer, CLI) can match on to render remediation messaging.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ExErrorKind {
    // Storage
    StorageUnavailable,
    IntegrityCheckFailed,

    // Versioning
    SchemaTooNew,
    InvalidFormatVersion,
    MigrationFailed,

    // Integrity of history
    SnapshotCorrupted,
    EventCorrupted,
    SequenceGap,

    // Structural/Validation
    InvalidInput,
    NotFound,

    // Integration/IO
    Io,
    Serialization,
    Compression,
    Persistence,
    Concurrency,
    Cancelled,

    // Internal
    Internal,
}

/// Whether a fault ends the operation or was recovered locally
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Severity {
    Fatal,
    Recoverable,
}

impl ExErrorKind {
    /// Get the stable error code for this kind
    pub fn code(&self) -> &'static str {
        match self {
            ExErrorKind::StorageUnavailable => "ERR_STORAGE_UNAVAILABLE",
            ExErrorKind::IntegrityCheckFailed => "ERR_INTEGRITY_CHECK_FAILED",
            ExErrorKind::SchemaTooNew => "ERR_SCHEMA_TOO_NEW",
            ExErrorKind::InvalidFormatVersion => "ERR_INVALID_FORMAT_VERSION",
            ExErrorKind::MigrationFailed => "ERR_MIGRATION_FAILED",
            ExErrorKind::SnapshotCorrupted => "ERR_SNAPSHOT_CORRUPTED",
            ExErrorKind::EventCorrupted => "ERR_EVENT_CORRUPTED",
            ExErrorKind::SequenceGap => "ERR_SEQUENCE_GAP",
            ExErrorKind::InvalidInput => "ERR_INVALID_INPUT",
            ExErrorKind::NotFound => "ERR_NOT_FOUND",
            ExErrorKind::Io => "ERR_IO",
            ExErrorKind::Serialization => "ERR_SERIALIZATION",
            ExErrorKind::Compression => "ERR_COMPRESSION",
            ExErrorKind::Persistence => "ERR_PERSISTENCE",
            ExErrorKind::Concurrency => "ERR_CONCURRENCY",
            ExErrorKind::Cancelled => "ERR_CANCELLED",
            ExErrorKind::Internal => "ERR_INTERNAL",
        }
    }

    /// Default severity of this kind when it reaches the caller
    pub fn severity(&self) -> Severity {
        match self {
            ExErrorKind::SnapshotCorrupted
            | ExErrorKind::EventCorrupted
            | ExErrorKind::SequenceGap
            | ExErrorKind::InvalidInput
            | ExErrorKind::NotFound
            | ExErrorKind::Cancelled => Severity::Recoverable,
            ExErrorKind::StorageUnavailable
            | ExErrorKind::IntegrityCheckFailed
            | ExErrorKind::SchemaTooNew
            | ExErrorKind::InvalidFormatVersion
            | ExErrorKind::MigrationFailed
            | ExErrorKind::Io
            | ExErrorKind::Serialization
            | ExErrorKind::Compression
            | ExErrorKind::Persistence
            | ExErrorKind::Concurrency
            | ExErrorKind::Internal => Severity::Fatal,
        }
    }
}

/// Canonical structured error type
///
/// Carries a stable classification plus the context a user-facing surface
/// needs: the operation, the document, the affected sequence range and a
/// remediation hint.
#[derive(Debug, Clone)]
pub struct ExError {
    kind: ExErrorKind,
    op: Option<String>,
    document_id: Option<String>,
    range: Option<SequenceRange>,
    message: String,
    remediation: Option<String>,
    source: Option<Box<ExError>>,
}

impl ExError {
    /// Create a new error with the specified kind
    pub fn new(kind: ExErrorKind) -> Self {
        Self {
            kind,
            op: None,
            document_id: None,
            range: None,
            message: String::new(),
            remediation: None,
            source: None,
        }
    }

    /// Add operation context
    pub fn with_op(mut self, op: impl Into<String>) -> Self {
        self.op = Some(op.into());
        self
    }

    /// Add document ID context
    pub fn with_document_id(mut self, id: impl Into<String>) -> Self {
        self.document_id = Some(id.into());
        self
    }

    /// Add the affected sequence range
    pub fn with_range(mut self, range: SequenceRange) -> Self {
        self.range = Some(range);
        self
    }

    /// Shorthand for a range covering one sequence
    pub fn with_sequence(self, sequence: Sequence) -> Self {
        self.with_range(SequenceRange::single(sequence))
    }

    /// Add custom message
    pub fn with_message(mut self, message: impl Into<String>) -> Self {
        self.message = message.into();
        self
    }

    /// Add a human-readable remediation hint
    pub fn with_remediation(mut self, remediation: impl Into<String>) -> Self {
        self.remediation = Some(remediation.into());
        self
    }

    /// Add source error
    pub fn with_source(mut self, source: ExError) -> Self {
        self.source = Some(Box::new(source));
        self
    }

    /// Get the error kind
    pub fn kind(&self) -> ExErrorKind {
        self.kind
    }

    /// Get the stable error code
    pub fn code(&self) -> &'static str {
        self.kind.code()
    }

    pub fn severity(&self) -> Severity {
        self.kind.severity()
    }

    pub fn is_fatal(&self) -> bool {
        self.severity() == Severity::Fatal
    }

    /// Get the operation context, if any
    pub fn op(&self) -> Option<&str> {
        self.op.as_deref()
    }

    /// Get the document ID context, if any
    pub fn document_id(&self) -> Option<&str> {
        self.document_id.as_deref()
    }

    /// Get the affected sequence range, if any
    pub fn range(&self) -> Option<SequenceRange> {
        self.range
    }

    /// Get the error message
    pub fn message(&self) -> &str {
        &self.message
    }

    pub fn remediation(&self) -> Option<&str> {
        self.remediation.as_deref()
    }

    /// Get the source error, if any
    pub fn source_error(&self) -> Option<&ExError> {
        self.source.as_deref()
    }
}

impl std::fmt::Display for ExError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "[{}]", self.code())?;
        if let Some(op) = &self.op {
            write!(f, " in operation '{}'", op)?;
        }
        if !self.message.is_empty() {
            write!(f, ": {}", self.message)?;
        }
        if let Some(range) = &self.range {
            write!(f, " (sequences {})", range)?;
        }
        if let Some(document_id) = &self.document_id {
            write!(f, " (document_id: {})", document_id)?;
        }
        Ok(())
    }
}

impl std::error::Error for ExError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.source
            .as_deref()
            .map(|e| e as &(dyn std::error::Error + 'static))
    }
}

// ========== End Error Facility ==========

/// Domain-level failures raised by the pure document layer
#[derive(Error, Debug, Clone, PartialEq)]
pub enum WireTunerError {
    // ===== Event Errors =====
    /// A known event tag whose payload does not decode
    #[error("Invalid payload for event '{event_type}' at sequence {sequence}: {reason}")]
    EventPayloadInvalid {
        event_type: String,
        sequence: Sequence,
        reason: String,
    },

    // ===== Snapshot Errors =====
    /// Stored checksum does not match the frame contents
    #[error("Snapshot checksum mismatch: expected {expected}, computed {actual}")]
    SnapshotChecksumMismatch { expected: String, actual: String },

    /// Frame too short to hold checksum and tag
    #[error("Snapshot frame truncated: {len} bytes")]
    SnapshotFrameTruncated { len: usize },

    /// Compression tag not known to this build
    #[error("Unknown snapshot compression tag: {tag}")]
    UnknownCompressionTag { tag: u8 },

    #[error("Compression error: {message}")]
    Compression { message: String },

    // ===== Version Errors =====
    #[error("Invalid format version: {version}")]
    InvalidFormatVersion { version: i64 },

    #[error("Document format version {found} is newer than supported version {supported}")]
    SchemaTooNew { found: i64, supported: i64 },

    // ===== Configuration Errors =====
    #[error("Invalid configuration for '{field}': {reason}")]
    InvalidConfig { field: String, reason: String },

    #[error("Cannot read configuration {path}: {message}")]
    ConfigIo { path: String, message: String },

    // ===== Generic Errors =====
    /// Serialization error (JSON encoding/decoding)
    #[error("Serialization error: {message}")]
    Serialization { message: String },

    /// Generic internal error
    #[error("Internal error: {message}")]
    Internal { message: String },
}

/// Conversion from WireTunerError to ExError
impl From<WireTunerError> for ExError {
    fn from(err: WireTunerError) -> Self {
        match err {
            WireTunerError::EventPayloadInvalid {
                event_type,
                sequence,
                reason,
            } => ExError::new(ExErrorKind::EventCorrupted)
                .with_sequence(sequence)
                .with_message(format!("Malformed '{}' payload: {}", event_type, reason)),

            WireTunerError::SnapshotChecksumMismatch { expected, actual } => {
                ExError::new(ExErrorKind::SnapshotCorrupted).with_message(format!(
                    "Checksum mismatch (stored {}, computed {})",
                    expected, actual
                ))
            }

            WireTunerError::SnapshotFrameTruncated { len } => {
                ExError::new(ExErrorKind::SnapshotCorrupted)
                    .with_message(format!("Snapshot frame truncated at {} bytes", len))
            }

            WireTunerError::UnknownCompressionTag { tag } => {
                ExError::new(ExErrorKind::SnapshotCorrupted)
                    .with_message(format!("Unknown compression tag {}", tag))
            }

            WireTunerError::Compression { message } => {
                ExError::new(ExErrorKind::Compression).with_message(message)
            }

            WireTunerError::InvalidFormatVersion { version } => {
                ExError::new(ExErrorKind::InvalidFormatVersion)
                    .with_message(format!("Format version {} is not valid", version))
                    .with_remediation("The file header is damaged; restore from a backup copy.")
            }

            WireTunerError::SchemaTooNew { found, supported } => {
                ExError::new(ExErrorKind::SchemaTooNew)
                    .with_message(format!(
                        "Document format version {} is newer than supported version {}",
                        found, supported
                    ))
                    .with_remediation("Update WireTuner to open this document.")
            }

            WireTunerError::InvalidConfig { field, reason } => ExError::new(
                ExErrorKind::InvalidInput,
            )
            .with_op("load_config")
            .with_message(format!("{}: {}", field, reason)),

            WireTunerError::ConfigIo { path, message } => ExError::new(ExErrorKind::Io)
                .with_op("load_config")
                .with_message(format!("{}: {}", path, message)),

            WireTunerError::Serialization { message } => {
                ExError::new(ExErrorKind::Serialization).with_message(message)
            }

            WireTunerError::Internal { message } => {
                ExError::new(ExErrorKind::Internal).with_message(message)
            }
        }
    }
}

impl From<serde_json::Error> for WireTunerError {
    fn from(err: serde_json::Error) -> Self {
        WireTunerError::Serialization {
            message: err.to_string(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_display_renders_code_op_message_and_range() {
        let err = ExError::new(ExErrorKind::SequenceGap)
            .with_op("replay")
            .with_message("Events missing")
            .with_range(SequenceRange::new(5, 9));

        assert_eq!(
            err.to_string(),
            "[ERR_SEQUENCE_GAP] in operation 'replay': Events missing (sequences 5..=9)"
        );
    }

    #[test]
    fn test_severity_split() {
        assert_eq!(ExErrorKind::SnapshotCorrupted.severity(), Severity::Recoverable);
        assert_eq!(ExErrorKind::SchemaTooNew.severity(), Severity::Fatal);
        assert!(ExError::new(ExErrorKind::StorageUnavailable).is_fatal());
    }

    #[test]
    fn test_source_chain_exposed_through_std_error() {
        use std::error::Error;

        let inner = ExError::new(ExErrorKind::Io).with_message("disk");
        let outer = ExError::new(ExErrorKind::Persistence).with_source(inner);

        assert!(outer.source().is_some());
        assert_eq!(outer.source_error().map(|e| e.kind()), Some(ExErrorKind::Io));
    }
}
