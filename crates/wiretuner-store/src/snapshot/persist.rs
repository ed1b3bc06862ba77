//! SQL access to the `snapshots` table

#![allow(clippy::result_large_err)]

use super::{SnapshotInfo, SnapshotRecord};
use crate::errors::{from_rusqlite, Result};
use rusqlite::types::ValueRef;
use rusqlite::{Connection, OptionalExtension, Row};
use wiretuner_core_types::{DocumentId, Sequence};

const SELECT_RECORD: &str =
    "SELECT id, documentId, sequence, snapshotPayload, createdAt FROM snapshots";

fn record_from_row(row: &Row<'_>) -> rusqlite::Result<SnapshotRecord> {
    // a payload stored with the wrong affinity is kept as bytes and fails
    // frame verification later
    let payload = match row.get_ref(3)? {
        ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes.to_vec(),
        _ => Vec::new(),
    };
    let sequence: i64 = row.get(2)?;
    Ok(SnapshotRecord {
        id: row.get(0)?,
        document_id: DocumentId::from_string(row.get(1)?),
        sequence: sequence.max(0) as Sequence,
        payload,
        created_at: row.get(4)?,
    })
}

/// Insert a framed snapshot, returning its row id
pub fn insert_snapshot(
    conn: &Connection,
    document_id: &DocumentId,
    sequence: Sequence,
    frame: &[u8],
    created_at: i64,
) -> rusqlite::Result<i64> {
    conn.execute(
        "INSERT INTO snapshots (documentId, sequence, snapshotPayload, createdAt)
         VALUES (?1, ?2, ?3, ?4)",
        rusqlite::params![document_id.as_str(), sequence as i64, frame, created_at],
    )?;
    Ok(conn.last_insert_rowid())
}

/// Newest snapshot whose sequence does not exceed `sequence`
pub fn latest_at_or_before(
    conn: &Connection,
    document_id: &DocumentId,
    sequence: Sequence,
) -> Result<Option<SnapshotRecord>> {
    conn.query_row(
        &format!(
            "{} WHERE documentId = ?1 AND sequence <= ?2 ORDER BY sequence DESC, id DESC LIMIT 1",
            SELECT_RECORD
        ),
        rusqlite::params![document_id.as_str(), sequence as i64],
        record_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// The snapshot immediately older than `current`
///
/// Ordering is by sequence, then row id, so two snapshots at the same
/// sequence are both visited.
pub fn previous(conn: &Connection, current: &SnapshotRecord) -> Result<Option<SnapshotRecord>> {
    conn.query_row(
        &format!(
            "{} WHERE documentId = ?1
               AND (sequence < ?2 OR (sequence = ?2 AND id < ?3))
             ORDER BY sequence DESC, id DESC LIMIT 1",
            SELECT_RECORD
        ),
        rusqlite::params![
            current.document_id.as_str(),
            current.sequence as i64,
            current.id
        ],
        record_from_row,
    )
    .optional()
    .map_err(from_rusqlite)
}

/// Sequence of the newest snapshot, if any
pub fn latest_sequence(conn: &Connection, document_id: &DocumentId) -> Result<Option<Sequence>> {
    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(sequence) FROM snapshots WHERE documentId = ?1",
            [document_id.as_str()],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(max.map(|s| s.max(0) as Sequence))
}

/// All snapshots of a document, oldest first
pub fn list(conn: &Connection, document_id: &DocumentId) -> Result<Vec<SnapshotInfo>> {
    let mut stmt = conn
        .prepare(&format!(
            "{} WHERE documentId = ?1 ORDER BY sequence ASC, id ASC",
            SELECT_RECORD
        ))
        .map_err(from_rusqlite)?;
    let records = stmt
        .query_map([document_id.as_str()], record_from_row)
        .map_err(from_rusqlite)?
        .collect::<std::result::Result<Vec<_>, _>>()
        .map_err(from_rusqlite)?;
    Ok(records.iter().map(SnapshotRecord::info).collect())
}

pub fn count(conn: &Connection, document_id: &DocumentId) -> Result<u64> {
    let count: i64 = conn
        .query_row(
            "SELECT COUNT(*) FROM snapshots WHERE documentId = ?1",
            [document_id.as_str()],
            |row| row.get(0),
        )
        .map_err(from_rusqlite)?;
    Ok(count as u64)
}
