use wiretuner_core::errors::{ExError, ExErrorKind, Severity, WireTunerError};
use wiretuner_core_types::SequenceRange;

#[test]
fn test_payload_error_maps_to_event_corrupted_with_sequence() {
    let err = WireTunerError::EventPayloadInvalid {
        event_type: "path.created".to_string(),
        sequence: 42,
        reason: "missing field `start`".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::EventCorrupted);
    assert_eq!(ex_err.code(), "ERR_EVENT_CORRUPTED");
    assert_eq!(ex_err.range(), Some(SequenceRange::single(42)));
    assert!(ex_err.message().contains("path.created"));
}

#[test]
fn test_checksum_mismatch_maps_to_snapshot_corrupted() {
    let err = WireTunerError::SnapshotChecksumMismatch {
        expected: "aa".to_string(),
        actual: "bb".to_string(),
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::SnapshotCorrupted);
    assert_eq!(ex_err.severity(), Severity::Recoverable);
}

#[test]
fn test_schema_too_new_is_fatal_with_remediation() {
    let err = WireTunerError::SchemaTooNew {
        found: 4,
        supported: 3,
    };

    let ex_err: ExError = err.into();

    assert_eq!(ex_err.kind(), ExErrorKind::SchemaTooNew);
    assert!(ex_err.is_fatal());
    assert!(ex_err.remediation().is_some());
}

#[test]
fn test_error_kind_code_mapping() {
    // Each kind has a stable, unique code
    let kinds = vec![
        (ExErrorKind::StorageUnavailable, "ERR_STORAGE_UNAVAILABLE"),
        (ExErrorKind::SchemaTooNew, "ERR_SCHEMA_TOO_NEW"),
        (ExErrorKind::SnapshotCorrupted, "ERR_SNAPSHOT_CORRUPTED"),
        (ExErrorKind::EventCorrupted, "ERR_EVENT_CORRUPTED"),
        (ExErrorKind::SequenceGap, "ERR_SEQUENCE_GAP"),
        (ExErrorKind::MigrationFailed, "ERR_MIGRATION_FAILED"),
        (ExErrorKind::InvalidFormatVersion, "ERR_INVALID_FORMAT_VERSION"),
    ];

    for (kind, expected_code) in kinds {
        assert_eq!(kind.code(), expected_code);
    }
}

#[test]
fn test_display_includes_op_and_document() {
    let err = ExError::new(ExErrorKind::StorageUnavailable)
        .with_op("append")
        .with_document_id("doc-9")
        .with_message("database is locked");

    let rendered = err.to_string();
    assert!(rendered.starts_with("[ERR_STORAGE_UNAVAILABLE] in operation 'append'"));
    assert!(rendered.contains("doc-9"));
}
