//! Metadata repository
//!
//! One row per document file. Only document creation, manual save and the
//! format migration chain write to it.

#![allow(clippy::result_large_err)]

use crate::errors::{from_rusqlite, Result};
use rusqlite::{Connection, OptionalExtension};
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core::model::DocumentMetadata;
use wiretuner_core_types::DocumentId;

fn not_a_document(reason: &str) -> ExError {
    ExError::new(ExErrorKind::IntegrityCheckFailed)
        .with_op("read_metadata")
        .with_message(format!("Not a WireTuner document: {}", reason))
}

/// Insert the metadata row of a new document
pub fn insert_metadata(conn: &Connection, meta: &DocumentMetadata) -> Result<()> {
    conn.execute(
        "INSERT INTO metadata (documentId, title, formatVersion, createdAt, modifiedAt, author)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            meta.document_id.as_str(),
            meta.title,
            meta.format_version,
            meta.created_at,
            meta.modified_at,
            meta.author,
        ],
    )
    .map_err(from_rusqlite)?;

    tracing::debug!(
        document_id = %meta.document_id,
        format_version = meta.format_version,
        "Inserted document metadata"
    );
    Ok(())
}

/// Read the document's metadata row
///
/// # Errors
///
/// Returns `IntegrityCheckFailed` if the file has no metadata table or row.
pub fn read_metadata(conn: &Connection) -> Result<DocumentMetadata> {
    if !crate::db::table_exists(conn, "metadata")? {
        return Err(not_a_document("metadata table missing"));
    }

    conn.query_row(
        "SELECT documentId, title, formatVersion, createdAt, modifiedAt, author
         FROM metadata ORDER BY rowid LIMIT 1",
        [],
        |row| {
            Ok(DocumentMetadata {
                document_id: DocumentId::from_string(row.get(0)?),
                title: row.get(1)?,
                format_version: row.get(2)?,
                created_at: row.get(3)?,
                modified_at: row.get(4)?,
                author: row.get(5)?,
            })
        },
    )
    .optional()
    .map_err(from_rusqlite)?
    .ok_or_else(|| not_a_document("metadata row missing"))
}

/// Stamp `modifiedAt`; used only by manual save
pub fn touch_modified(
    conn: &Connection,
    document_id: &DocumentId,
    now_ms: i64,
) -> rusqlite::Result<()> {
    conn.execute(
        "UPDATE metadata SET modifiedAt = ?1 WHERE documentId = ?2",
        rusqlite::params![now_ms, document_id.as_str()],
    )?;
    Ok(())
}

/// Record the format version reached by the migration chain
pub fn set_format_version(
    conn: &Connection,
    document_id: &DocumentId,
    version: i64,
) -> Result<()> {
    conn.execute(
        "UPDATE metadata SET formatVersion = ?1 WHERE documentId = ?2",
        rusqlite::params![version, document_id.as_str()],
    )
    .map_err(from_rusqlite)?;
    Ok(())
}
