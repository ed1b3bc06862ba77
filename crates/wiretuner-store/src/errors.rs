//! Error handling for wiretuner-store
//!
//! Wraps wiretuner-core ExError with store-specific helpers

use rusqlite::ErrorCode;
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core_types::Sequence;

/// Result type alias using ExError
pub type Result<T> = std::result::Result<T, ExError>;

const REMEDIATION_DISK_FULL: &str =
    "Free disk space on the volume holding the document, then retry.";
const REMEDIATION_PERMISSION: &str =
    "Check that the document file and its folder are writable by the current user.";
const REMEDIATION_LOCKED: &str =
    "Another program is holding the document open. Close it and retry.";

/// Whether a SQLite failure is contention worth retrying
pub fn is_transient(err: &rusqlite::Error) -> bool {
    matches!(
        sqlite_code(err),
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked)
    )
}

fn sqlite_code(err: &rusqlite::Error) -> Option<ErrorCode> {
    match err {
        rusqlite::Error::SqliteFailure(e, _) => Some(e.code),
        _ => None,
    }
}

/// Create a database error from rusqlite::Error
///
/// Storage-level failures (full disk, permissions, lock contention) become
/// `StorageUnavailable` with remediation text; file damage becomes
/// `IntegrityCheckFailed`; the rest are `Persistence`.
pub fn from_rusqlite(err: rusqlite::Error) -> ExError {
    let message = err.to_string();
    match sqlite_code(&err) {
        Some(ErrorCode::DiskFull) => ExError::new(ExErrorKind::StorageUnavailable)
            .with_op("sqlite")
            .with_message(message)
            .with_remediation(REMEDIATION_DISK_FULL),
        Some(ErrorCode::ReadOnly)
        | Some(ErrorCode::PermissionDenied)
        | Some(ErrorCode::CannotOpen)
        | Some(ErrorCode::AuthorizationForStatementDenied) => {
            ExError::new(ExErrorKind::StorageUnavailable)
                .with_op("sqlite")
                .with_message(message)
                .with_remediation(REMEDIATION_PERMISSION)
        }
        Some(ErrorCode::DatabaseBusy) | Some(ErrorCode::DatabaseLocked) => {
            ExError::new(ExErrorKind::StorageUnavailable)
                .with_op("sqlite")
                .with_message(message)
                .with_remediation(REMEDIATION_LOCKED)
        }
        Some(ErrorCode::DatabaseCorrupt) | Some(ErrorCode::NotADatabase) => {
            ExError::new(ExErrorKind::IntegrityCheckFailed)
                .with_op("sqlite")
                .with_message(message)
                .with_remediation("The document file is damaged; restore it from a backup.")
        }
        _ => ExError::new(ExErrorKind::Persistence)
            .with_op("sqlite")
            .with_message(message),
    }
}

/// Retry budget spent on contention
pub fn retries_exhausted(op: &str, attempts: usize, last: rusqlite::Error) -> ExError {
    ExError::new(ExErrorKind::StorageUnavailable)
        .with_op(op.to_string())
        .with_message(format!(
            "Storage still busy after {} attempts: {}",
            attempts, last
        ))
        .with_remediation(REMEDIATION_LOCKED)
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> ExError {
    ExError::new(ExErrorKind::MigrationFailed)
        .with_op("migration")
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a checksum mismatch error
pub fn checksum_mismatch(migration_id: &str, expected: &str, actual: &str) -> ExError {
    ExError::new(ExErrorKind::IntegrityCheckFailed)
        .with_op("migration_checksum")
        .with_message(format!(
            "Checksum mismatch for migration {}: expected {}, got {}",
            migration_id, expected, actual
        ))
}

/// A stored event row that cannot be turned into an event
pub fn event_corrupted(sequence: Sequence, reason: impl Into<String>) -> ExError {
    ExError::new(ExErrorKind::EventCorrupted)
        .with_op("read_events")
        .with_sequence(sequence)
        .with_message(reason)
}

/// A mutex guarding a connection was poisoned by a panicking holder
pub fn lock_poisoned(what: &str) -> ExError {
    ExError::new(ExErrorKind::Concurrency)
        .with_op("lock")
        .with_message(format!("{} lock poisoned", what))
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> ExError {
    ExError::new(ExErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
