// Integration tests for the document format migration chain

use rusqlite::Connection;
use wiretuner_core::errors::ExErrorKind;
use wiretuner_core::model::DocumentMetadata;
use wiretuner_core::snapshot::{decode_frame, is_valid_frame};
use wiretuner_core::version::CURRENT_FORMAT_VERSION;
use wiretuner_core_types::DocumentId;
use wiretuner_store::format::migrate_document;
use wiretuner_store::metadata::{insert_metadata, read_metadata};
use wiretuner_store::migrations::apply_migrations;

const LEGACY_STATE: &[u8] = br#"{"layers":{},"objects":{},"selection":[],"viewport":{"pan_x":0.0,"pan_y":0.0,"zoom":1.0}}"#;

/// A format-1 document: CamelCase tags and an unframed snapshot
fn setup_v1_document() -> (Connection, DocumentId) {
    let mut conn = Connection::open_in_memory().unwrap();
    apply_migrations(&mut conn).unwrap();
    let meta = DocumentMetadata::new("Legacy", Some("ada".to_string()), 1, 0);
    insert_metadata(&conn, &meta).unwrap();

    let doc = meta.document_id.as_str();
    conn.execute(
        "INSERT INTO events (documentId, sequence, eventType, eventPayload, timestamp)
         VALUES (?1, 1, 'LayerCreated', '{\"layer_id\":\"l1\",\"name\":\"Base\"}', 0)",
        [doc],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO events (documentId, sequence, eventType, eventPayload, timestamp)
         VALUES (?1, 2, 'StyleChanged', '{}', 0)",
        [doc],
    )
    .unwrap();
    conn.execute(
        "INSERT INTO snapshots (documentId, sequence, snapshotPayload, createdAt)
         VALUES (?1, 1, ?2, 0)",
        rusqlite::params![doc, LEGACY_STATE],
    )
    .unwrap();

    (conn, meta.document_id)
}

fn event_types(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT eventType FROM events ORDER BY sequence")
        .unwrap();
    let types = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    types
}

fn snapshot_payload(conn: &Connection) -> Vec<u8> {
    conn.query_row("SELECT snapshotPayload FROM snapshots", [], |row| row.get(0))
        .unwrap()
}

#[test]
fn test_v1_document_migrates_to_current() {
    // Given: A format-1 document
    let (mut conn, doc) = setup_v1_document();

    // When: The chain runs
    let report = migrate_document(&mut conn, &doc, 1).unwrap();

    // Then: Both single steps ran, in order
    let names: Vec<_> = report.steps.iter().map(|s| s.name).collect();
    assert_eq!(names, vec!["dotted_event_tags", "framed_snapshots"]);
    assert_eq!(report.to, CURRENT_FORMAT_VERSION);

    // And: Tags are dotted, snapshots are framed, the version is stamped
    assert_eq!(
        event_types(&conn),
        vec!["layer.created", "object.style_changed"]
    );
    let payload = snapshot_payload(&conn);
    assert!(is_valid_frame(&payload));
    assert_eq!(decode_frame(&payload).unwrap(), LEGACY_STATE);
    assert_eq!(read_metadata(&conn).unwrap().format_version, CURRENT_FORMAT_VERSION);
}

#[test]
fn test_current_document_is_untouched() {
    // Given: A document already migrated
    let (mut conn, doc) = setup_v1_document();
    migrate_document(&mut conn, &doc, 1).unwrap();
    let before = snapshot_payload(&conn);

    // When: The chain is asked to run again from the current version
    let report = migrate_document(&mut conn, &doc, CURRENT_FORMAT_VERSION).unwrap();

    // Then: Nothing runs and nothing changes
    assert!(report.is_noop());
    assert_eq!(snapshot_payload(&conn), before);
}

#[test]
fn test_v2_step_keeps_existing_frames() {
    // Given: A v2 document whose snapshot is already framed
    let (mut conn, doc) = setup_v1_document();
    migrate_document(&mut conn, &doc, 1).unwrap();
    conn.execute("UPDATE metadata SET formatVersion = 2", []).unwrap();
    let before = snapshot_payload(&conn);

    // When: The v2→v3 step runs over it
    let report = migrate_document(&mut conn, &doc, 2).unwrap();

    // Then: The frame is not rewrapped
    assert_eq!(report.steps.len(), 1);
    assert_eq!(report.steps[0].rows_changed, 0);
    assert_eq!(snapshot_payload(&conn), before);
}

#[test]
fn test_failed_step_rolls_back_everything() {
    // Given: A v1 document where snapshot updates are forced to fail
    let (mut conn, doc) = setup_v1_document();
    conn.execute_batch(
        "CREATE TRIGGER reject_snapshot_update BEFORE UPDATE ON snapshots
         BEGIN SELECT RAISE(ABORT, 'read-only snapshots'); END;",
    )
    .unwrap();

    // When: The chain runs
    let err = migrate_document(&mut conn, &doc, 1).unwrap_err();

    // Then: It fails as a migration failure
    assert_eq!(err.kind(), ExErrorKind::MigrationFailed);

    // And: The first step's tag rewrite was rolled back too
    assert_eq!(event_types(&conn), vec!["LayerCreated", "StyleChanged"]);
    assert_eq!(read_metadata(&conn).unwrap().format_version, 1);
    assert_eq!(snapshot_payload(&conn), LEGACY_STATE);
}

#[test]
fn test_newer_version_is_rejected_without_changes() {
    let (mut conn, doc) = setup_v1_document();
    let err = migrate_document(&mut conn, &doc, CURRENT_FORMAT_VERSION + 1).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::SchemaTooNew);
    assert_eq!(event_types(&conn), vec!["LayerCreated", "StyleChanged"]);
}

#[test]
fn test_zero_version_is_invalid() {
    let (mut conn, doc) = setup_v1_document();
    let err = migrate_document(&mut conn, &doc, 0).unwrap_err();
    assert_eq!(err.kind(), ExErrorKind::InvalidFormatVersion);
}
