//! Append-only Event Log
//!
//! ## Invariants
//!
//! - Sequences for a document start at 1 and are contiguous
//! - Appends are serialized in-process; the next sequence is only consumed
//!   once the row is committed, so a failed append leaves the log unchanged
//! - Reads are lazy, restartable and report damage without aborting:
//!   a missing range yields a `SequenceGap` item and iteration continues,
//!   a malformed row yields an `EventCorrupted` item and iteration stops

#![allow(clippy::result_large_err)]

use crate::errors::{event_corrupted, from_rusqlite, lock_poisoned, Result};
use crate::retry::with_retry;
use crate::storage::Storage;
use rusqlite::{Connection, OptionalExtension, TransactionBehavior};
use std::collections::VecDeque;
use std::sync::Mutex;
use wiretuner_core::config::RetryConfig;
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core::model::{Event, EventKind, NewEvent};
use wiretuner_core_types::{DocumentId, OriginId, Sequence, SequenceRange};

const PAGE_SIZE: usize = 256;

pub struct EventLog {
    storage: Storage,
    document_id: DocumentId,
    next_sequence: Mutex<Sequence>,
    retry: RetryConfig,
}

impl EventLog {
    /// Attach to the log of `document_id`, resuming after its highest sequence
    pub fn open(storage: Storage, document_id: DocumentId, retry: RetryConfig) -> Result<Self> {
        let head = max_sequence(&*storage.reader()?, &document_id)?;
        Ok(Self {
            storage,
            document_id,
            next_sequence: Mutex::new(head + 1),
            retry,
        })
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    /// Highest durable sequence (0 for an empty log)
    pub fn head_sequence(&self) -> Result<Sequence> {
        let next = self
            .next_sequence
            .lock()
            .map_err(|_| lock_poisoned("sequence"))?;
        Ok(*next - 1)
    }

    /// Append one event, returning it with its assigned sequence
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the event carries values the model rejects
    /// - `StorageUnavailable` if the write cannot be committed
    pub fn append(&self, event: &NewEvent) -> Result<Event> {
        self.append_with(event, |_, _| Ok(()))
    }

    /// Append one event and run `after` inside the same transaction
    ///
    /// Whatever `after` writes commits or rolls back together with the event.
    pub fn append_with<F>(&self, event: &NewEvent, after: F) -> Result<Event>
    where
        F: Fn(&Connection, &Event) -> rusqlite::Result<()>,
    {
        let mut next = self
            .next_sequence
            .lock()
            .map_err(|_| lock_poisoned("sequence"))?;
        let sequence = *next;

        event.kind.validate(sequence).map_err(|e| {
            ExError::new(ExErrorKind::InvalidInput)
                .with_op("append")
                .with_document_id(self.document_id.as_str())
                .with_message(e.to_string())
        })?;
        if event.kind.is_unknown() {
            tracing::warn!(
                event_type = event.kind.event_type(),
                sequence = sequence,
                "Appending event type unknown to this build"
            );
        }
        let payload = serde_json::to_string(&event.kind.to_payload().map_err(ExError::from)?)
            .map_err(|e| {
                ExError::new(ExErrorKind::Serialization)
                    .with_op("append")
                    .with_message(e.to_string())
            })?;

        let appended = Event {
            sequence,
            document_id: self.document_id.clone(),
            kind: event.kind.clone(),
            timestamp: chrono::Utc::now().timestamp_millis(),
            origin_id: event.origin_id.clone(),
        };

        let mut conn = self.storage.writer()?;
        with_retry(&self.retry, "append", || {
            insert_event(&mut conn, &appended, &payload, &after)
        })
        .map_err(|e| e.with_document_id(self.document_id.as_str()))?;

        *next += 1;

        tracing::debug!(
            document_id = %self.document_id,
            sequence = sequence,
            event_type = appended.event_type(),
            "Appended event"
        );
        Ok(appended)
    }

    /// Lazy iterator over `from..=to`
    pub fn read(&self, from: Sequence, to: Sequence) -> EventCursor {
        EventCursor::new(self.storage.clone(), self.document_id.clone(), from, to)
    }

    /// Sequence of the most recent event with the given tag
    pub fn last_sequence_of_type(&self, event_type: &str) -> Result<Option<Sequence>> {
        let conn = self.storage.reader()?;
        let found: Option<i64> = conn
            .query_row(
                "SELECT MAX(sequence) FROM events WHERE documentId = ?1 AND eventType = ?2",
                rusqlite::params![self.document_id.as_str(), event_type],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(found.map(|s| s as Sequence))
    }

    /// Number of stored events
    pub fn count(&self) -> Result<u64> {
        let conn = self.storage.reader()?;
        let count: i64 = conn
            .query_row(
                "SELECT COUNT(*) FROM events WHERE documentId = ?1",
                [self.document_id.as_str()],
                |row| row.get(0),
            )
            .map_err(from_rusqlite)?;
        Ok(count as u64)
    }
}

fn max_sequence(conn: &Connection, document_id: &DocumentId) -> Result<Sequence> {
    let max: Option<i64> = conn
        .query_row(
            "SELECT MAX(sequence) FROM events WHERE documentId = ?1",
            [document_id.as_str()],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?
        .flatten();
    Ok(max.unwrap_or(0).max(0) as Sequence)
}

fn insert_event<F>(
    conn: &mut Connection,
    event: &Event,
    payload: &str,
    after: &F,
) -> rusqlite::Result<()>
where
    F: Fn(&Connection, &Event) -> rusqlite::Result<()>,
{
    let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
    tx.execute(
        "INSERT INTO events (documentId, sequence, eventType, eventPayload, timestamp, originId)
         VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
        rusqlite::params![
            event.document_id.as_str(),
            event.sequence as i64,
            event.event_type(),
            payload,
            event.timestamp,
            event.origin_id.as_ref().map(|o| o.as_str()),
        ],
    )?;
    after(&tx, event)?;
    tx.commit()
}

struct RawRow {
    sequence: i64,
    body: std::result::Result<(String, String, i64, Option<String>), String>,
}

/// Lazy, restartable read over a sequence range
///
/// Items are `Ok(event)`, `Err(SequenceGap)` (iteration continues) or
/// `Err(EventCorrupted)` (iteration ends).
pub struct EventCursor {
    storage: Storage,
    document_id: DocumentId,
    from: Sequence,
    to: Sequence,
    expected: Sequence,
    fetched_through: Sequence,
    buffer: VecDeque<RawRow>,
    exhausted: bool,
    halted: bool,
    last_valid: Option<Sequence>,
}

impl EventCursor {
    fn new(storage: Storage, document_id: DocumentId, from: Sequence, to: Sequence) -> Self {
        let from = from.max(1);
        Self {
            storage,
            document_id,
            from,
            to,
            expected: from,
            fetched_through: from - 1,
            buffer: VecDeque::new(),
            exhausted: from > to,
            halted: false,
            last_valid: None,
        }
    }

    /// Rewind to the start of the range
    pub fn restart(&mut self) {
        self.expected = self.from;
        self.fetched_through = self.from - 1;
        self.buffer.clear();
        self.exhausted = self.from > self.to;
        self.halted = false;
        self.last_valid = None;
    }

    /// Sequence of the last event successfully yielded
    pub fn last_valid(&self) -> Option<Sequence> {
        self.last_valid
    }

    /// Whether iteration stopped on corruption
    pub fn halted(&self) -> bool {
        self.halted
    }

    fn fetch_page(&mut self) -> Result<()> {
        let conn = self.storage.reader()?;
        let mut stmt = conn
            .prepare_cached(
                "SELECT sequence, eventType, eventPayload, timestamp, originId
                 FROM events
                 WHERE documentId = ?1 AND sequence > ?2 AND sequence <= ?3
                 ORDER BY sequence ASC
                 LIMIT ?4",
            )
            .map_err(from_rusqlite)?;

        let rows = stmt
            .query_map(
                rusqlite::params![
                    self.document_id.as_str(),
                    self.fetched_through as i64,
                    self.to.min(i64::MAX as u64) as i64,
                    PAGE_SIZE as i64,
                ],
                |row| {
                    let sequence: i64 = row.get(0)?;
                    let body: std::result::Result<(String, String, i64, Option<String>), String> =
                        (|| Ok((row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?)))()
                            .map_err(|e: rusqlite::Error| e.to_string());
                    Ok(RawRow { sequence, body })
                },
            )
            .map_err(from_rusqlite)?
            .collect::<std::result::Result<Vec<_>, _>>()
            .map_err(from_rusqlite)?;

        if rows.len() < PAGE_SIZE {
            self.exhausted = true;
        }
        if let Some(last) = rows.last() {
            self.fetched_through = last.sequence.max(0) as Sequence;
        }
        self.buffer.extend(rows);
        Ok(())
    }

    fn decode(&self, raw: RawRow) -> Result<Event> {
        let sequence = raw.sequence as Sequence;
        let (event_type, payload, timestamp, origin) = raw
            .body
            .map_err(|reason| event_corrupted(sequence, format!("Unreadable row: {}", reason)))?;

        let value: serde_json::Value = serde_json::from_str(&payload)
            .map_err(|e| event_corrupted(sequence, format!("Payload is not JSON: {}", e)))?;

        let kind = EventKind::decode(&event_type, value, sequence).map_err(|e| {
            ExError::from(e)
                .with_op("read_events")
                .with_document_id(self.document_id.as_str())
        })?;

        Ok(Event {
            sequence,
            document_id: self.document_id.clone(),
            kind,
            timestamp,
            origin_id: origin.map(OriginId::new),
        })
    }

    fn halt(&mut self, err: ExError) -> Option<Result<Event>> {
        self.halted = true;
        self.buffer.clear();
        tracing::warn!(
            document_id = %self.document_id,
            last_valid = ?self.last_valid,
            code = err.code(),
            "Event log read halted on corruption"
        );
        Some(Err(err.with_document_id(self.document_id.as_str())))
    }
}

impl Iterator for EventCursor {
    type Item = Result<Event>;

    fn next(&mut self) -> Option<Self::Item> {
        if self.halted {
            return None;
        }

        if self.buffer.is_empty() && !self.exhausted {
            if let Err(err) = self.fetch_page() {
                return self.halt(err);
            }
        }

        let raw = self.buffer.pop_front()?;

        if raw.sequence < self.expected as i64 {
            let sequence = raw.sequence;
            return self.halt(
                ExError::new(ExErrorKind::EventCorrupted)
                    .with_op("read_events")
                    .with_message(format!(
                        "Non-monotonic sequence {} after {}",
                        sequence,
                        self.expected.saturating_sub(1)
                    )),
            );
        }

        let sequence = raw.sequence as Sequence;
        if sequence > self.expected {
            let missing = SequenceRange::new(self.expected, sequence - 1);
            self.expected = sequence;
            self.buffer.push_front(raw);
            tracing::warn!(
                document_id = %self.document_id,
                range = %missing,
                "Sequence gap in event log"
            );
            return Some(Err(ExError::new(ExErrorKind::SequenceGap)
                .with_op("read_events")
                .with_document_id(self.document_id.as_str())
                .with_range(missing)
                .with_message(format!("{} event(s) missing", missing.len()))));
        }

        match self.decode(raw) {
            Ok(event) => {
                self.expected = sequence + 1;
                self.last_valid = Some(sequence);
                Some(Ok(event))
            }
            Err(err) => self.halt(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::insert_metadata;
    use crate::migrations::apply_migrations;
    use wiretuner_core::model::event::LayerCreated;
    use wiretuner_core::model::DocumentMetadata;

    fn setup() -> EventLog {
        let storage = Storage::in_memory().unwrap();
        let meta = DocumentMetadata::new("Test", None, 3, 0);
        {
            let mut conn = storage.writer().unwrap();
            apply_migrations(&mut conn).unwrap();
            insert_metadata(&conn, &meta).unwrap();
        }
        EventLog::open(storage, meta.document_id, RetryConfig::default()).unwrap()
    }

    fn layer(id: &str) -> NewEvent {
        NewEvent::new(EventKind::LayerCreated(LayerCreated {
            layer_id: id.to_string(),
            name: id.to_string(),
        }))
    }

    #[test]
    fn test_sequences_start_at_one_and_increase() {
        let log = setup();
        assert_eq!(log.head_sequence().unwrap(), 0);

        let a = log.append(&layer("a")).unwrap();
        let b = log.append(&layer("b")).unwrap();

        assert_eq!(a.sequence, 1);
        assert_eq!(b.sequence, 2);
        assert_eq!(log.head_sequence().unwrap(), 2);
    }

    #[test]
    fn test_read_returns_range_in_order() {
        let log = setup();
        for i in 0..5 {
            log.append(&layer(&format!("l{}", i))).unwrap();
        }

        let sequences: Vec<Sequence> = log
            .read(2, 4)
            .map(|e| e.unwrap().sequence)
            .collect();
        assert_eq!(sequences, vec![2, 3, 4]);
    }

    #[test]
    fn test_empty_range() {
        let log = setup();
        log.append(&layer("a")).unwrap();
        assert_eq!(log.read(5, 4).count(), 0);
    }

    #[test]
    fn test_failed_after_hook_rolls_back_append() {
        let log = setup();
        let result = log.append_with(&layer("a"), |_, _| {
            Err(rusqlite::Error::InvalidQuery)
        });

        assert!(result.is_err());
        assert_eq!(log.head_sequence().unwrap(), 0);
        assert_eq!(log.count().unwrap(), 0);

        // the sequence was not consumed
        assert_eq!(log.append(&layer("b")).unwrap().sequence, 1);
    }

    #[test]
    fn test_invalid_event_rejected_before_write() {
        let log = setup();
        let bad = NewEvent::new(EventKind::LayerCreated(LayerCreated {
            layer_id: String::new(),
            name: "x".to_string(),
        }));

        let err = log.append(&bad).unwrap_err();
        assert_eq!(err.kind(), ExErrorKind::InvalidInput);
        assert_eq!(log.count().unwrap(), 0);
    }

    #[test]
    fn test_restart_replays_from_beginning() {
        let log = setup();
        for i in 0..3 {
            log.append(&layer(&format!("l{}", i))).unwrap();
        }

        let mut cursor = log.read(1, 3);
        assert_eq!(cursor.by_ref().count(), 3);
        cursor.restart();
        assert_eq!(cursor.count(), 3);
    }

    #[test]
    fn test_last_sequence_of_type() {
        let log = setup();
        assert_eq!(
            log.last_sequence_of_type("layer.created").unwrap(),
            None
        );
        log.append(&layer("a")).unwrap();
        log.append(&layer("b")).unwrap();
        assert_eq!(
            log.last_sequence_of_type("layer.created").unwrap(),
            Some(2)
        );
    }
}
