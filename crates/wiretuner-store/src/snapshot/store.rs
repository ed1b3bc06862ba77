//! Single-flight snapshot creation
//!
//! `maybe_create` runs on the caller's thread and only evaluates thresholds.
//! Capture, encoding, compression and the insert run on a dedicated worker
//! thread; the caller gets a `SnapshotHandle` to await or drop. While a
//! creation is in flight further triggers are dropped, not queued.

#![allow(clippy::result_large_err)]

use super::persist;
use super::trigger::{SnapshotTrigger, TriggerReason};
use super::{SnapshotInfo, SnapshotRecord};
use crate::errors::{lock_poisoned, Result};
use crate::retry::with_retry;
use crate::storage::Storage;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use wiretuner_core::config::{PersistenceConfig, RetryConfig};
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core::snapshot::{encode_frame, Compression};
use wiretuner_core::{log_op_end, log_op_error, log_op_start};
use wiretuner_core_types::{DocumentId, Sequence};

/// Outcome of a threshold check
#[derive(Debug)]
pub enum MaybeCreate {
    /// No threshold crossed
    NotDue,
    /// Forced, but nothing was appended since the last snapshot
    NothingToSnapshot,
    /// A creation is already running; this trigger was dropped
    Coalesced,
    Scheduled(SnapshotHandle),
}

impl MaybeCreate {
    pub fn into_handle(self) -> Option<SnapshotHandle> {
        match self {
            MaybeCreate::Scheduled(handle) => Some(handle),
            _ => None,
        }
    }
}

/// Completion of a background snapshot
///
/// Await it from async code or call `wait` from a plain thread. Dropping the
/// handle does not cancel the snapshot.
#[derive(Debug)]
pub struct SnapshotHandle {
    sequence: Sequence,
    reason: TriggerReason,
    rx: oneshot::Receiver<Result<SnapshotInfo>>,
}

fn worker_gone() -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("create_snapshot")
        .with_message("Snapshot worker exited without reporting")
}

impl SnapshotHandle {
    pub fn sequence(&self) -> Sequence {
        self.sequence
    }

    pub fn reason(&self) -> TriggerReason {
        self.reason
    }

    /// Block until the snapshot is committed or has failed
    ///
    /// Must not be called from within an async runtime.
    pub fn wait(self) -> Result<SnapshotInfo> {
        self.rx.blocking_recv().unwrap_or_else(|_| Err(worker_gone()))
    }
}

impl Future for SnapshotHandle {
    type Output = Result<SnapshotInfo>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        Pin::new(&mut self.rx)
            .poll(cx)
            .map(|received| received.unwrap_or_else(|_| Err(worker_gone())))
    }
}

/// Snapshot Store for one document
#[derive(Clone)]
pub struct SnapshotStore {
    storage: Storage,
    document_id: DocumentId,
    compression: Compression,
    retry: RetryConfig,
    trigger: Arc<Mutex<SnapshotTrigger>>,
    in_flight: Arc<AtomicBool>,
}

impl SnapshotStore {
    /// Attach to the snapshots of `document_id`, measuring thresholds from
    /// the newest stored snapshot
    pub fn new(storage: Storage, document_id: DocumentId, config: &PersistenceConfig) -> Result<Self> {
        let last = persist::latest_sequence(&*storage.reader()?, &document_id)?.unwrap_or(0);
        let trigger = SnapshotTrigger::new(
            config.snapshot.event_threshold,
            config.elapsed_threshold(),
            last,
        );
        Ok(Self {
            storage,
            document_id,
            compression: config.snapshot.compression,
            retry: config.retry.clone(),
            trigger: Arc::new(Mutex::new(trigger)),
            in_flight: Arc::new(AtomicBool::new(false)),
        })
    }

    pub fn document_id(&self) -> &DocumentId {
        &self.document_id
    }

    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::Acquire)
    }

    /// Sequence covered by the newest committed snapshot (0 if none)
    pub fn last_snapshot_sequence(&self) -> Result<Sequence> {
        let trigger = self.trigger.lock().map_err(|_| lock_poisoned("snapshot trigger"))?;
        Ok(trigger.last_sequence())
    }

    /// Check thresholds at `current_sequence` and schedule a snapshot if due
    ///
    /// `capture` runs on the worker thread and must return the serialized
    /// state at exactly the sequence it is given.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the worker thread cannot be started; creation
    /// failures are reported through the handle.
    pub fn maybe_create<F>(
        &self,
        current_sequence: Sequence,
        force: bool,
        capture: F,
    ) -> Result<MaybeCreate>
    where
        F: FnOnce(Sequence) -> Result<Vec<u8>> + Send + 'static,
    {
        let reason = {
            let trigger = self.trigger.lock().map_err(|_| lock_poisoned("snapshot trigger"))?;
            match trigger.reason(current_sequence, force, Instant::now()) {
                Some(reason) => reason,
                None if force && !trigger.has_new_events(current_sequence) => {
                    return Ok(MaybeCreate::NothingToSnapshot)
                }
                None => return Ok(MaybeCreate::NotDue),
            }
        };

        if self
            .in_flight
            .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
            .is_err()
        {
            tracing::debug!(
                document_id = %self.document_id,
                sequence = current_sequence,
                reason = reason.as_str(),
                "Snapshot already in flight, trigger coalesced"
            );
            return Ok(MaybeCreate::Coalesced);
        }

        let (tx, rx) = oneshot::channel();
        let job = self.clone();
        let spawned = std::thread::Builder::new()
            .name("wiretuner-snapshot".to_string())
            .spawn(move || {
                let result = job.create(current_sequence, reason, capture);
                job.in_flight.store(false, Ordering::Release);
                // the caller may have dropped the handle
                let _ = tx.send(result);
            });

        if let Err(e) = spawned {
            self.in_flight.store(false, Ordering::Release);
            return Err(ExError::new(ExErrorKind::Internal)
                .with_op("create_snapshot")
                .with_message(format!("Cannot start snapshot worker: {}", e)));
        }

        Ok(MaybeCreate::Scheduled(SnapshotHandle {
            sequence: current_sequence,
            reason,
            rx,
        }))
    }

    fn create<F>(&self, sequence: Sequence, reason: TriggerReason, capture: F) -> Result<SnapshotInfo>
    where
        F: FnOnce(Sequence) -> Result<Vec<u8>>,
    {
        log_op_start!(
            "create_snapshot",
            document_id = %self.document_id,
            sequence = sequence,
            reason = reason.as_str()
        );
        let start = Instant::now();

        let result = self.create_impl(sequence, capture).map_err(|e| {
            let e = e.with_document_id(self.document_id.as_str());
            log_op_error!(
                "create_snapshot",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "create_snapshot",
            duration_ms = start.elapsed().as_millis() as u64,
            snapshot_id = result.id,
            size_bytes = result.size_bytes as u64
        );
        Ok(result)
    }

    fn create_impl<F>(&self, sequence: Sequence, capture: F) -> Result<SnapshotInfo>
    where
        F: FnOnce(Sequence) -> Result<Vec<u8>>,
    {
        let state_bytes = capture(sequence)?;
        let frame = encode_frame(&state_bytes, self.compression).map_err(ExError::from)?;
        let created_at = chrono::Utc::now().timestamp_millis();

        let id = {
            let conn = self.storage.writer()?;
            with_retry(&self.retry, "create_snapshot", || {
                persist::insert_snapshot(&conn, &self.document_id, sequence, &frame, created_at)
            })?
        };

        self.trigger
            .lock()
            .map_err(|_| lock_poisoned("snapshot trigger"))?
            .record(sequence, Instant::now());

        Ok(SnapshotInfo {
            id,
            sequence,
            created_at,
            size_bytes: frame.len(),
            compression: Some(self.compression),
        })
    }

    pub fn latest_at_or_before(&self, sequence: Sequence) -> Result<Option<SnapshotRecord>> {
        persist::latest_at_or_before(&*self.storage.reader()?, &self.document_id, sequence)
    }

    pub fn previous(&self, current: &SnapshotRecord) -> Result<Option<SnapshotRecord>> {
        persist::previous(&*self.storage.reader()?, current)
    }

    pub fn list(&self) -> Result<Vec<SnapshotInfo>> {
        persist::list(&*self.storage.reader()?, &self.document_id)
    }

    pub fn count(&self) -> Result<u64> {
        persist::count(&*self.storage.reader()?, &self.document_id)
    }
}

impl std::fmt::Debug for SnapshotStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SnapshotStore")
            .field("document_id", &self.document_id)
            .field("compression", &self.compression)
            .field("in_flight", &self.is_in_flight())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::metadata::insert_metadata;
    use crate::migrations::apply_migrations;
    use std::sync::mpsc;
    use wiretuner_core::model::DocumentMetadata;
    use wiretuner_core::snapshot::decode_frame;

    fn setup(config: &PersistenceConfig) -> SnapshotStore {
        let storage = Storage::in_memory().unwrap();
        let meta = DocumentMetadata::new("Test", None, 3, 0);
        {
            let mut conn = storage.writer().unwrap();
            apply_migrations(&mut conn).unwrap();
            insert_metadata(&conn, &meta).unwrap();
        }
        SnapshotStore::new(storage, meta.document_id, config).unwrap()
    }

    fn capture(body: &'static str) -> impl FnOnce(Sequence) -> Result<Vec<u8>> + Send + 'static {
        move |_| Ok(body.as_bytes().to_vec())
    }

    #[test]
    fn test_not_due_below_threshold() {
        let store = setup(&PersistenceConfig::default());
        let outcome = store.maybe_create(999, false, capture("s")).unwrap();
        assert!(matches!(outcome, MaybeCreate::NotDue));
    }

    #[test]
    fn test_threshold_schedules_and_persists() {
        let store = setup(&PersistenceConfig::default());
        let handle = store
            .maybe_create(1000, false, capture("state"))
            .unwrap()
            .into_handle()
            .unwrap();
        assert_eq!(handle.reason(), TriggerReason::EventCount);

        let info = handle.wait().unwrap();
        assert_eq!(info.sequence, 1000);
        assert_eq!(store.last_snapshot_sequence().unwrap(), 1000);

        let record = store.latest_at_or_before(1000).unwrap().unwrap();
        assert_eq!(decode_frame(&record.payload).unwrap(), b"state");
    }

    #[test]
    fn test_concurrent_trigger_is_coalesced() {
        let store = setup(&PersistenceConfig::default());
        let (release_tx, release_rx) = mpsc::channel::<()>();

        let handle = store
            .maybe_create(5, true, move |_| {
                release_rx.recv().ok();
                Ok(b"slow".to_vec())
            })
            .unwrap()
            .into_handle()
            .unwrap();

        let second = store.maybe_create(6, true, capture("fast")).unwrap();
        assert!(matches!(second, MaybeCreate::Coalesced));

        release_tx.send(()).unwrap();
        handle.wait().unwrap();
        assert!(!store.is_in_flight());
        assert_eq!(store.count().unwrap(), 1);
    }

    #[test]
    fn test_forced_without_new_events() {
        let store = setup(&PersistenceConfig::default());
        assert!(matches!(
            store.maybe_create(0, true, capture("s")).unwrap(),
            MaybeCreate::NothingToSnapshot
        ));
    }

    #[test]
    fn test_failed_capture_releases_flag_and_keeps_trigger() {
        let store = setup(&PersistenceConfig::default());
        let handle = store
            .maybe_create(3, true, |_| Err(ExError::new(ExErrorKind::Internal)))
            .unwrap()
            .into_handle()
            .unwrap();

        assert!(handle.wait().is_err());
        assert!(!store.is_in_flight());
        assert_eq!(store.last_snapshot_sequence().unwrap(), 0);
        assert_eq!(store.count().unwrap(), 0);
    }

    #[tokio::test]
    async fn test_handle_is_awaitable() {
        let store = setup(&PersistenceConfig::default());
        let handle = store
            .maybe_create(1, true, capture("s"))
            .unwrap()
            .into_handle()
            .unwrap();
        let info = handle.await.unwrap();
        assert_eq!(info.sequence, 1);
        assert!(info.is_valid());
    }
}
