//! Persistence Facade
//!
//! `DocumentStore` is the only component tools, rendering and collaboration
//! layers talk to. Every operation returns `Result<_, ExError>`.
//!
//! ## Workflows
//!
//! - `record_event`: append, restart the auto-save window, check snapshot
//!   thresholds
//! - `save_manual`: flush auto-save, skip if nothing changed since the last
//!   manual save, otherwise append a save marker with the `modifiedAt`
//!   update in the same transaction and force a snapshot
//! - `load`: integrity check, then replay to the head of the log
//!
//! Opening a document validates the file and runs the version gate before
//! anything is written to it.

#![allow(clippy::result_large_err)]

use crate::autosave::{Autosave, AutosaveStatus};
use crate::replay::{Reconstruction, ReplayBase, ReplayEngine, ReplayHandle};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Instant;
use wiretuner_core::config::PersistenceConfig;
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core::model::event::DocumentSaved;
use wiretuner_core::model::{event, DocumentMetadata, EventKind, NewEvent};
use wiretuner_core::telemetry::{AnomalySink, TracingSink};
use wiretuner_core::version::{VersionStatus, CURRENT_FORMAT_VERSION};
use wiretuner_core::{log_op_end, log_op_error, log_op_start, StateMaterializer};
use wiretuner_core_types::Sequence;
use wiretuner_store::errors::{io_error, lock_poisoned, Result};
use wiretuner_store::format::migrate_document;
use wiretuner_store::metadata::{insert_metadata, read_metadata, touch_modified};
use wiretuner_store::migrations::apply_migrations;
use wiretuner_store::{
    db, EventCursor, EventLog, MaybeCreate, SnapshotHandle, SnapshotInfo, SnapshotStore, Storage,
};

/// Fields of a new document
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DocumentInit {
    pub title: String,
    pub author: Option<String>,
}

impl DocumentInit {
    pub fn new(title: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            author: None,
        }
    }

    pub fn with_author(mut self, author: impl Into<String>) -> Self {
        self.author = Some(author.into());
        self
    }
}

#[derive(Debug)]
pub struct RecordOutcome {
    pub sequence: Sequence,
    /// Present when this append crossed a snapshot threshold
    pub snapshot: Option<SnapshotHandle>,
}

#[derive(Debug)]
pub enum SaveOutcome {
    Saved {
        sequence: Sequence,
        modified_at: i64,
        /// Absent if another snapshot was already being written
        snapshot: Option<SnapshotHandle>,
    },
    NoChanges {
        sequence: Sequence,
    },
}

#[derive(Debug)]
pub enum ForceSnapshotOutcome {
    Scheduled(SnapshotHandle),
    AlreadyInFlight,
    NothingToSnapshot,
}

/// Result of `load`
#[derive(Debug, Clone)]
pub struct LoadReport<S> {
    pub state: S,
    pub sequence: Sequence,
    pub state_hash: String,
    /// Recovered anomalies; empty for a clean load
    pub warnings: Vec<ExError>,
    pub partial: bool,
    pub base: ReplayBase,
}

impl<S> From<Reconstruction<S>> for LoadReport<S> {
    fn from(r: Reconstruction<S>) -> Self {
        Self {
            state: r.state,
            sequence: r.sequence,
            state_hash: r.state_hash,
            warnings: r.warnings,
            partial: r.partial,
            base: r.base,
        }
    }
}

/// An open document
pub struct DocumentStore<M: StateMaterializer> {
    storage: Storage,
    path: PathBuf,
    metadata: Mutex<DocumentMetadata>,
    events: Arc<EventLog>,
    snapshots: SnapshotStore,
    replay: ReplayEngine<M>,
    autosave: Autosave,
    last_manual_save: Mutex<Sequence>,
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

impl<M: StateMaterializer> DocumentStore<M> {
    /// Create a new document file
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the file already exists or the config is invalid
    /// - `StorageUnavailable` if the file cannot be created
    pub fn create(
        path: impl AsRef<Path>,
        init: DocumentInit,
        materializer: M,
        config: PersistenceConfig,
    ) -> Result<Self> {
        let path = path.as_ref();
        log_op_start!("create_document", path = %path.display());
        let start = Instant::now();

        let result = Self::create_impl(path, init, materializer, config).map_err(|e| {
            log_op_error!(
                "create_document",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "create_document",
            duration_ms = start.elapsed().as_millis() as u64,
            document_id = %result.document_id()
        );
        Ok(result)
    }

    fn create_impl(
        path: &Path,
        init: DocumentInit,
        materializer: M,
        config: PersistenceConfig,
    ) -> Result<Self> {
        config.validate().map_err(ExError::from)?;
        if path.try_exists().map_err(|e| io_error("create_document", e))? {
            return Err(ExError::new(ExErrorKind::InvalidInput)
                .with_op("create_document")
                .with_message(format!("{} already exists", path.display())));
        }

        let storage = Storage::open_file(path)?;
        let meta = DocumentMetadata::new(init.title, init.author, CURRENT_FORMAT_VERSION, now_ms());
        {
            let mut conn = storage.writer()?;
            apply_migrations(&mut conn)?;
            insert_metadata(&conn, &meta)?;
        }

        Self::assemble(storage, path, meta, materializer, config)
    }

    /// Open an existing document file
    ///
    /// The file is checked and its format version gated through a read-only
    /// connection; a document from a newer build is rejected untouched.
    ///
    /// # Errors
    ///
    /// - `NotFound` if the file does not exist
    /// - `IntegrityCheckFailed` if it is damaged or not a document
    /// - `SchemaTooNew` if it was written by a newer format version
    /// - `MigrationFailed` if an older format cannot be upgraded
    pub fn open(path: impl AsRef<Path>, materializer: M, config: PersistenceConfig) -> Result<Self> {
        let path = path.as_ref();
        log_op_start!("open_document", path = %path.display());
        let start = Instant::now();

        let result = Self::open_impl(path, materializer, config).map_err(|e| {
            log_op_error!(
                "open_document",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "open_document",
            duration_ms = start.elapsed().as_millis() as u64,
            document_id = %result.document_id(),
            head = result.events.head_sequence().unwrap_or(0)
        );
        Ok(result)
    }

    fn open_impl(path: &Path, materializer: M, config: PersistenceConfig) -> Result<Self> {
        config.validate().map_err(ExError::from)?;
        if !path.try_exists().map_err(|e| io_error("open_document", e))? {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("open_document")
                .with_message(format!("{} does not exist", path.display())));
        }

        let stored = {
            let conn = db::open_read_only(path)?;
            db::quick_check(&conn)?;
            let meta = read_metadata(&conn)?;
            VersionStatus::check(meta.format_version)
                .and_then(VersionStatus::require_readable)
                .map_err(|e| ExError::from(e).with_document_id(meta.document_id.as_str()))?;
            meta
        };

        let storage = Storage::open_file(path)?;
        let meta = {
            let mut conn = storage.writer()?;
            apply_migrations(&mut conn)?;
            let report = migrate_document(&mut conn, &stored.document_id, stored.format_version)?;
            if !report.is_noop() {
                tracing::info!(
                    document_id = %stored.document_id,
                    from = report.from,
                    to = report.to,
                    "Document format upgraded"
                );
            }
            read_metadata(&conn)?
        };

        Self::assemble(storage, path, meta, materializer, config)
    }

    fn assemble(
        storage: Storage,
        path: &Path,
        meta: DocumentMetadata,
        materializer: M,
        config: PersistenceConfig,
    ) -> Result<Self> {
        let events = Arc::new(EventLog::open(
            storage.clone(),
            meta.document_id.clone(),
            config.retry.clone(),
        )?);
        let snapshots = SnapshotStore::new(storage.clone(), meta.document_id.clone(), &config)?;
        let sink: Arc<dyn AnomalySink> = Arc::new(TracingSink);
        let replay = ReplayEngine::new(
            Arc::new(materializer),
            Arc::clone(&events),
            snapshots.clone(),
            &config,
            sink,
        );

        let head = events.head_sequence()?;
        let autosave = Autosave::start(config.idle_window(), head)?;
        let last_manual_save = events
            .last_sequence_of_type(event::DOCUMENT_SAVED)?
            .unwrap_or(0);

        Ok(Self {
            storage,
            path: path.to_path_buf(),
            metadata: Mutex::new(meta),
            events,
            snapshots,
            replay,
            autosave,
            last_manual_save: Mutex::new(last_manual_save),
        })
    }

    /// Route recovered anomalies to `sink` instead of the log
    pub fn with_anomaly_sink(mut self, sink: Arc<dyn AnomalySink>) -> Self {
        self.replay.set_sink(sink);
        self
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn document_id(&self) -> wiretuner_core_types::DocumentId {
        self.events.document_id().clone()
    }

    /// Append one event
    ///
    /// # Errors
    ///
    /// - `InvalidInput` if the event carries values the model rejects
    /// - `StorageUnavailable` if it cannot be made durable
    pub fn record_event(&self, event: NewEvent) -> Result<RecordOutcome> {
        let appended = self.events.append(&event)?;
        self.autosave.notify(appended.sequence);

        let snapshot = self
            .snapshots
            .maybe_create(appended.sequence, false, self.capture())?
            .into_handle();
        if let Some(handle) = &snapshot {
            tracing::debug!(
                sequence = appended.sequence,
                reason = handle.reason().as_str(),
                "Snapshot scheduled"
            );
        }

        Ok(RecordOutcome {
            sequence: appended.sequence,
            snapshot,
        })
    }

    /// Rebuild the document at the head of the log
    ///
    /// # Errors
    ///
    /// - `IntegrityCheckFailed` if the file fails its integrity check
    /// - recovery-policy refusals and storage failures from replay
    pub fn load(&self) -> Result<LoadReport<M::State>> {
        log_op_start!("load", document_id = %self.document_id());
        let start = Instant::now();

        let result = self.load_impl().map_err(|e| {
            let e = e.with_document_id(self.document_id().as_str());
            log_op_error!(
                "load",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "load",
            duration_ms = start.elapsed().as_millis() as u64,
            sequence = result.sequence,
            warnings = result.warnings.len() as u64,
            partial = result.partial
        );
        Ok(result)
    }

    fn load_impl(&self) -> Result<LoadReport<M::State>> {
        db::quick_check(&*self.storage.reader()?)?;
        let head = self.events.head_sequence()?;
        Ok(self.replay.reconstruct(head)?.into())
    }

    /// User-initiated save
    ///
    /// # Errors
    ///
    /// Returns `StorageUnavailable` if the save marker cannot be written.
    pub fn save_manual(&self) -> Result<SaveOutcome> {
        log_op_start!("save_manual", document_id = %self.document_id());
        let start = Instant::now();

        let result = self.save_manual_impl().map_err(|e| {
            log_op_error!(
                "save_manual",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        match &result {
            SaveOutcome::Saved { sequence, .. } => log_op_end!(
                "save_manual",
                duration_ms = start.elapsed().as_millis() as u64,
                sequence = *sequence,
                outcome = "saved"
            ),
            SaveOutcome::NoChanges { sequence } => log_op_end!(
                "save_manual",
                duration_ms = start.elapsed().as_millis() as u64,
                sequence = *sequence,
                outcome = "no_changes"
            ),
        }
        Ok(result)
    }

    fn save_manual_impl(&self) -> Result<SaveOutcome> {
        self.autosave.flush()?;

        let mut last_save = self
            .last_manual_save
            .lock()
            .map_err(|_| lock_poisoned("manual save"))?;
        let head = self.events.head_sequence()?;
        if head == *last_save {
            return Ok(SaveOutcome::NoChanges { sequence: head });
        }

        let modified_at = now_ms();
        let document_id = self.document_id();
        let marker = NewEvent::new(EventKind::DocumentSaved(DocumentSaved { label: None }));
        let appended = self.events.append_with(&marker, |conn, _| {
            touch_modified(conn, &document_id, modified_at)
        })?;
        *last_save = appended.sequence;
        self.autosave.notify(appended.sequence);

        self.metadata
            .lock()
            .map_err(|_| lock_poisoned("metadata"))?
            .modified_at = modified_at;

        let snapshot = self
            .snapshots
            .maybe_create(appended.sequence, true, self.capture())?
            .into_handle();

        Ok(SaveOutcome::Saved {
            sequence: appended.sequence,
            modified_at,
            snapshot,
        })
    }

    /// Snapshot the head of the log now, regardless of thresholds
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the snapshot worker cannot be started.
    pub fn force_snapshot(&self) -> Result<ForceSnapshotOutcome> {
        let head = self.events.head_sequence()?;
        Ok(
            match self.snapshots.maybe_create(head, true, self.capture())? {
                MaybeCreate::Scheduled(handle) => ForceSnapshotOutcome::Scheduled(handle),
                MaybeCreate::Coalesced => ForceSnapshotOutcome::AlreadyInFlight,
                MaybeCreate::NothingToSnapshot | MaybeCreate::NotDue => {
                    ForceSnapshotOutcome::NothingToSnapshot
                }
            },
        )
    }

    /// Rebuild the document as of `sequence`
    ///
    /// # Errors
    ///
    /// As `ReplayEngine::reconstruct`.
    pub fn reconstruct_at(&self, sequence: Sequence) -> Result<Reconstruction<M::State>> {
        self.replay.reconstruct(sequence)
    }

    /// Rebuild on a worker thread; drop the handle to abandon it
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the worker thread cannot be started.
    pub fn reconstruct_at_async(&self, sequence: Sequence) -> Result<ReplayHandle<M::State>> {
        self.replay.spawn(sequence)
    }

    /// Flush auto-save and snapshot any unsnapshotted events, waiting for
    /// the snapshot to commit
    ///
    /// # Errors
    ///
    /// Returns the snapshot's failure, if any.
    pub fn close(self) -> Result<Option<SnapshotInfo>> {
        self.autosave.flush()?;
        match self.force_snapshot()? {
            ForceSnapshotOutcome::Scheduled(handle) => Ok(Some(handle.wait()?)),
            ForceSnapshotOutcome::AlreadyInFlight | ForceSnapshotOutcome::NothingToSnapshot => {
                Ok(None)
            }
        }
    }

    pub fn metadata(&self) -> Result<DocumentMetadata> {
        Ok(self
            .metadata
            .lock()
            .map_err(|_| lock_poisoned("metadata"))?
            .clone())
    }

    pub fn head_sequence(&self) -> Result<Sequence> {
        self.events.head_sequence()
    }

    pub fn snapshots(&self) -> Result<Vec<SnapshotInfo>> {
        self.snapshots.list()
    }

    pub fn autosave_status(&self) -> AutosaveStatus {
        self.autosave.status()
    }

    /// Raw events in `from..=to`
    pub fn events(&self, from: Sequence, to: Sequence) -> EventCursor {
        self.events.read(from, to)
    }

    pub fn cached_sequences(&self) -> Result<Vec<Sequence>> {
        self.replay.cached_sequences()
    }

    /// Serialized state at exactly the given sequence, built on the
    /// snapshot worker from immutable history
    fn capture(&self) -> impl FnOnce(Sequence) -> Result<Vec<u8>> + Send + 'static {
        let replay = self.replay.clone();
        move |sequence| {
            let reconstruction = replay.reconstruct(sequence)?;
            if reconstruction.partial || reconstruction.sequence != sequence {
                return Err(ExError::new(ExErrorKind::EventCorrupted)
                    .with_op("create_snapshot")
                    .with_range(wiretuner_core_types::SequenceRange::new(
                        reconstruction.sequence + 1,
                        sequence,
                    ))
                    .with_message("History is incomplete; refusing to snapshot a partial state"));
            }
            replay
                .materializer()
                .serialize(&reconstruction.state)
                .map_err(ExError::from)
        }
    }
}

impl<M: StateMaterializer> std::fmt::Debug for DocumentStore<M> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("DocumentStore")
            .field("path", &self.path)
            .field("document_id", &self.events.document_id())
            .finish()
    }
}
