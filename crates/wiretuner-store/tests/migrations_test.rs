// Integration tests for the container schema migration runner

use rusqlite::Connection;
use wiretuner_core::errors::ExErrorKind;

fn setup_test_db() -> Connection {
    Connection::open_in_memory().expect("Failed to create in-memory database")
}

fn get_table_names(conn: &Connection) -> Vec<String> {
    let mut stmt = conn
        .prepare("SELECT name FROM sqlite_master WHERE type = 'table' ORDER BY name")
        .unwrap();
    let names = stmt
        .query_map([], |row| row.get(0))
        .unwrap()
        .collect::<Result<Vec<String>, _>>()
        .unwrap();
    names
}

#[test]
fn test_apply_migrations_on_empty_db() {
    // Given: An empty SQLite database
    let mut conn = setup_test_db();

    // When: Migrations are applied
    let result = wiretuner_store::migrations::apply_migrations(&mut conn);

    // Then: All migrations succeed
    assert!(result.is_ok(), "Migrations should succeed: {:?}", result.err());

    // And: The three document tables plus bookkeeping exist
    let tables = get_table_names(&conn);
    for expected in ["schema_version", "metadata", "events", "snapshots", "sqlite_sequence"] {
        assert!(
            tables.contains(&expected.to_string()),
            "Missing table: {}",
            expected
        );
    }
}

#[test]
fn test_migration_idempotency() {
    // Given: A database with migrations already applied
    let mut conn = setup_test_db();
    wiretuner_store::migrations::apply_migrations(&mut conn).unwrap();

    // When: Migrations are applied again
    wiretuner_store::migrations::apply_migrations(&mut conn).unwrap();

    // Then: Each migration is recorded exactly once
    let applied = wiretuner_store::migrations::applied_migrations(&conn).unwrap();
    assert_eq!(applied, vec!["001_document_schema", "002_event_type_index"]);
    assert!(wiretuner_store::migrations::pending_migrations(&conn)
        .unwrap()
        .is_empty());
}

#[test]
fn test_tampered_checksum_rejected() {
    // Given: A migrated database whose recorded checksum was altered
    let mut conn = setup_test_db();
    wiretuner_store::migrations::apply_migrations(&mut conn).unwrap();
    conn.execute(
        "UPDATE schema_version SET checksum = 'deadbeef' WHERE migration_id = '001_document_schema'",
        [],
    )
    .unwrap();

    // When: Migrations are applied again
    let err = wiretuner_store::migrations::apply_migrations(&mut conn).unwrap_err();

    // Then: The mismatch is reported as an integrity failure
    assert_eq!(err.kind(), ExErrorKind::IntegrityCheckFailed);
}

#[test]
fn test_event_payload_must_be_json() {
    // Given: A migrated database with a document row
    let mut conn = setup_test_db();
    wiretuner_store::migrations::apply_migrations(&mut conn).unwrap();
    conn.execute(
        "INSERT INTO metadata (documentId, title, formatVersion, createdAt, modifiedAt)
         VALUES ('d', 't', 3, 0, 0)",
        [],
    )
    .unwrap();

    // When: A non-JSON payload is inserted
    let result = conn.execute(
        "INSERT INTO events (documentId, sequence, eventType, eventPayload, timestamp)
         VALUES ('d', 1, 'layer.created', 'not json', 0)",
        [],
    );

    // Then: The CHECK constraint rejects it
    assert!(result.is_err());
}

#[test]
fn test_sequence_unique_per_document() {
    let mut conn = setup_test_db();
    wiretuner_store::migrations::apply_migrations(&mut conn).unwrap();
    conn.execute_batch(
        "INSERT INTO metadata (documentId, title, formatVersion, createdAt, modifiedAt)
         VALUES ('d', 't', 3, 0, 0);
         INSERT INTO events (documentId, sequence, eventType, eventPayload, timestamp)
         VALUES ('d', 1, 'layer.created', '{}', 0);",
    )
    .unwrap();

    let duplicate = conn.execute(
        "INSERT INTO events (documentId, sequence, eventType, eventPayload, timestamp)
         VALUES ('d', 1, 'layer.created', '{}', 0)",
        [],
    );
    assert!(duplicate.is_err());
}
