//! Individual format migration steps
//!
//! Each step is idempotent: running it against a document that already has
//! the target shape changes nothing.

use rusqlite::types::ValueRef;
use rusqlite::Transaction;
use wiretuner_core::model::event;
use wiretuner_core::snapshot::{frame_legacy_payload, Compression};
use wiretuner_core_types::DocumentId;

/// Legacy CamelCase tags and their dotted replacements
pub(crate) const LEGACY_EVENT_TAGS: [(&str, &str); 13] = [
    ("LayerCreated", event::LAYER_CREATED),
    ("LayerDeleted", event::LAYER_DELETED),
    ("PathCreated", event::PATH_CREATED),
    ("AnchorAdded", event::PATH_ANCHOR_ADDED),
    ("AnchorMoved", event::PATH_ANCHOR_MOVED),
    ("PathClosed", event::PATH_CLOSED),
    ("ShapeCreated", event::SHAPE_CREATED),
    ("ObjectMoved", event::OBJECT_MOVED),
    ("ObjectDeleted", event::OBJECT_DELETED),
    ("StyleChanged", event::OBJECT_STYLE_CHANGED),
    ("SelectionChanged", event::SELECTION_CHANGED),
    ("ViewportChanged", event::VIEWPORT_CHANGED),
    ("DocumentSaved", event::DOCUMENT_SAVED),
];

/// v1 → v2: rewrite legacy event tags
pub(crate) fn rename_event_tags(
    tx: &Transaction<'_>,
    document_id: &DocumentId,
) -> rusqlite::Result<usize> {
    let mut stmt = tx.prepare_cached(
        "UPDATE events SET eventType = ?1 WHERE documentId = ?2 AND eventType = ?3",
    )?;
    let mut rows = 0;
    for (legacy, dotted) in LEGACY_EVENT_TAGS {
        rows += stmt.execute(rusqlite::params![dotted, document_id.as_str(), legacy])?;
    }
    Ok(rows)
}

/// v2 → v3: wrap unframed snapshot payloads in verified frames
///
/// Legacy payloads keep their compression: raw gzip is reframed as gzip,
/// raw state as uncompressed.
pub(crate) fn frame_snapshots(
    tx: &Transaction<'_>,
    document_id: &DocumentId,
) -> rusqlite::Result<usize> {
    let payloads: Vec<(i64, Vec<u8>)> = {
        let mut stmt =
            tx.prepare("SELECT id, snapshotPayload FROM snapshots WHERE documentId = ?1 ORDER BY id")?;
        let rows = stmt.query_map([document_id.as_str()], |row| {
            let payload = match row.get_ref(1)? {
                ValueRef::Blob(bytes) | ValueRef::Text(bytes) => bytes.to_vec(),
                _ => Vec::new(),
            };
            Ok((row.get(0)?, payload))
        })?;
        rows.collect::<rusqlite::Result<Vec<_>>>()?
    };

    let mut update = tx.prepare_cached("UPDATE snapshots SET snapshotPayload = ?1 WHERE id = ?2")?;
    let mut rows = 0;
    for (id, payload) in payloads {
        let compression = if payload.starts_with(&[0x1f, 0x8b]) {
            Compression::Gzip
        } else {
            Compression::None
        };
        let framed = match frame_legacy_payload(&payload, compression) {
            Ok(framed) => framed,
            Err(e) => {
                // an unreadable legacy payload stays as is and is skipped by
                // replay's corruption fallback
                tracing::warn!(snapshot_id = id, error = %e, "Legacy snapshot could not be reframed");
                continue;
            }
        };
        if framed != payload {
            rows += update.execute(rusqlite::params![framed, id])?;
        }
    }
    Ok(rows)
}
