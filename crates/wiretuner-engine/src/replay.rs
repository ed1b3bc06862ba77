//! Replay Engine
//!
//! Rebuilds materialized state at a target sequence from the newest usable
//! base (checkpoint, verified snapshot, or the empty state) plus the events
//! after it.
//!
//! ## Recovery
//!
//! - A snapshot failing verification is reported, its derived checkpoints are
//!   dropped, and the next older snapshot is tried; with none left replay
//!   starts from empty
//! - Unknown event types are skipped with a warning
//! - Gaps and corrupted events follow `RecoveryConfig`: either a warning on a
//!   possibly-incomplete (or partial) result, or a fatal error
//!
//! ## Cancellation
//!
//! `reconstruct_cancellable` polls its flag between events. A cancelled
//! replay returns `Cancelled` and commits nothing to the checkpoint cache.

#![allow(clippy::result_large_err)]

use std::collections::VecDeque;
use std::future::Future;
use std::pin::Pin;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::task::{Context, Poll};
use std::time::Instant;
use tokio::sync::oneshot;
use wiretuner_core::checkpoint_cache::CheckpointCache;
use wiretuner_core::config::{PersistenceConfig, RecoveryConfig};
use wiretuner_core::errors::{ExError, ExErrorKind};
use wiretuner_core::snapshot::{decode_frame, state_hash};
use wiretuner_core::telemetry::{Anomaly, AnomalySink};
use wiretuner_core::{log_op_end, log_op_error, log_op_start, StateMaterializer};
use wiretuner_core_types::{Sequence, SequenceRange};
use wiretuner_store::errors::{lock_poisoned, Result};
use wiretuner_store::{EventLog, SnapshotRecord, SnapshotStore};

/// Where a reconstruction started
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReplayBase {
    Empty,
    Snapshot { id: i64, sequence: Sequence },
    Checkpoint { sequence: Sequence },
}

impl ReplayBase {
    pub fn sequence(&self) -> Sequence {
        match self {
            ReplayBase::Empty => 0,
            ReplayBase::Snapshot { sequence, .. } | ReplayBase::Checkpoint { sequence } => {
                *sequence
            }
        }
    }
}

/// Result of a reconstruction
#[derive(Debug, Clone)]
pub struct Reconstruction<S> {
    pub state: S,
    /// Last sequence folded into `state`
    pub sequence: Sequence,
    pub target: Sequence,
    pub base: ReplayBase,
    pub applied: u64,
    /// Events of unknown type passed over
    pub skipped: u64,
    /// Recovered anomalies, in the order found
    pub warnings: Vec<ExError>,
    /// True when corruption stopped replay before `target`
    pub partial: bool,
    pub state_hash: String,
}

struct Base<S> {
    state: S,
    base: ReplayBase,
    snapshot_id: Option<i64>,
}

/// Anomalies found by one replay pass
///
/// A silent pass neither reports nor collects; it re-walks ground an earlier
/// pass already reported on.
struct Findings<'a> {
    sink: Option<&'a dyn AnomalySink>,
    warnings: Vec<ExError>,
}

impl<'a> Findings<'a> {
    fn reporting(sink: &'a dyn AnomalySink) -> Self {
        Self {
            sink: Some(sink),
            warnings: Vec::new(),
        }
    }

    fn silent() -> Self {
        Self {
            sink: None,
            warnings: Vec::new(),
        }
    }

    fn note(&mut self, err: ExError) {
        if let Some(sink) = self.sink {
            sink.report(&Anomaly::from_error(&err, true));
            self.warnings.push(err);
        }
    }
}

/// Replay over one document's Event Log and Snapshot Store
pub struct ReplayEngine<M: StateMaterializer> {
    materializer: Arc<M>,
    events: Arc<EventLog>,
    snapshots: SnapshotStore,
    cache: Arc<Mutex<CheckpointCache<M::State>>>,
    checkpoint_interval: u64,
    /// Most interval checkpoints one replay holds before committing
    stash_capacity: usize,
    recovery: RecoveryConfig,
    sink: Arc<dyn AnomalySink>,
}

impl<M: StateMaterializer> Clone for ReplayEngine<M> {
    fn clone(&self) -> Self {
        Self {
            materializer: Arc::clone(&self.materializer),
            events: Arc::clone(&self.events),
            snapshots: self.snapshots.clone(),
            cache: Arc::clone(&self.cache),
            checkpoint_interval: self.checkpoint_interval,
            stash_capacity: self.stash_capacity,
            recovery: self.recovery.clone(),
            sink: Arc::clone(&self.sink),
        }
    }
}

impl<M: StateMaterializer> ReplayEngine<M> {
    pub fn new(
        materializer: Arc<M>,
        events: Arc<EventLog>,
        snapshots: SnapshotStore,
        config: &PersistenceConfig,
        sink: Arc<dyn AnomalySink>,
    ) -> Self {
        Self {
            materializer,
            events,
            snapshots,
            cache: Arc::new(Mutex::new(CheckpointCache::new(
                config.checkpoints.max_entries,
                config.checkpoints.byte_budget,
            ))),
            checkpoint_interval: config.checkpoints.interval,
            stash_capacity: config.checkpoints.max_entries,
            recovery: config.recovery.clone(),
            sink,
        }
    }

    pub fn materializer(&self) -> &M {
        &self.materializer
    }

    pub fn set_sink(&mut self, sink: Arc<dyn AnomalySink>) {
        self.sink = sink;
    }

    /// Sequences currently held by the checkpoint cache
    pub fn cached_sequences(&self) -> Result<Vec<Sequence>> {
        Ok(self.lock_cache()?.sequences())
    }

    pub fn clear_cache(&self) -> Result<()> {
        self.lock_cache()?.clear();
        Ok(())
    }

    /// Drop every checkpoint derived from the given snapshot
    pub fn invalidate_snapshot(&self, snapshot_id: i64) -> Result<usize> {
        Ok(self.lock_cache()?.invalidate_snapshot(snapshot_id))
    }

    fn lock_cache(&self) -> Result<std::sync::MutexGuard<'_, CheckpointCache<M::State>>> {
        self.cache.lock().map_err(|_| lock_poisoned("checkpoint cache"))
    }

    /// Rebuild the state at `target`
    ///
    /// # Errors
    ///
    /// - `NotFound` if `target` is beyond the head of the log
    /// - `SequenceGap` / `EventCorrupted` when the recovery policy refuses them
    /// - `StorageUnavailable` and friends from the store
    pub fn reconstruct(&self, target: Sequence) -> Result<Reconstruction<M::State>> {
        self.reconstruct_cancellable(target, &AtomicBool::new(false))
    }

    /// As `reconstruct`, abandoning work once `cancel` is set
    ///
    /// # Errors
    ///
    /// As `reconstruct`, plus `Cancelled`.
    pub fn reconstruct_cancellable(
        &self,
        target: Sequence,
        cancel: &AtomicBool,
    ) -> Result<Reconstruction<M::State>> {
        log_op_start!("reconstruct", target = target);
        let start = Instant::now();

        let findings = Findings::reporting(&*self.sink);
        let result = self.reconstruct_impl(target, cancel, findings).map_err(|e| {
            let e = e.with_document_id(self.events.document_id().as_str());
            log_op_error!(
                "reconstruct",
                e.clone(),
                duration_ms = start.elapsed().as_millis() as u64
            );
            e
        })?;

        log_op_end!(
            "reconstruct",
            duration_ms = start.elapsed().as_millis() as u64,
            sequence = result.sequence,
            base = result.base.sequence(),
            applied = result.applied,
            warnings = result.warnings.len() as u64
        );
        Ok(result)
    }

    /// Run a reconstruction on a worker thread
    ///
    /// Dropping the returned handle cancels the replay.
    ///
    /// # Errors
    ///
    /// Returns `Internal` if the worker thread cannot be started.
    pub fn spawn(&self, target: Sequence) -> Result<ReplayHandle<M::State>> {
        let cancel = Arc::new(AtomicBool::new(false));
        let (tx, rx) = oneshot::channel();
        let engine = self.clone();
        let flag = Arc::clone(&cancel);

        std::thread::Builder::new()
            .name("wiretuner-replay".to_string())
            .spawn(move || {
                let result = engine.reconstruct_cancellable(target, &flag);
                let _ = tx.send(result);
            })
            .map_err(|e| {
                ExError::new(ExErrorKind::Internal)
                    .with_op("reconstruct")
                    .with_message(format!("Cannot start replay worker: {}", e))
            })?;

        Ok(ReplayHandle {
            rx: Some(rx),
            cancel,
        })
    }

    fn reconstruct_impl(
        &self,
        target: Sequence,
        cancel: &AtomicBool,
        mut findings: Findings<'_>,
    ) -> Result<Reconstruction<M::State>> {
        let head = self.events.head_sequence()?;
        if target > head {
            return Err(ExError::new(ExErrorKind::NotFound)
                .with_op("reconstruct")
                .with_sequence(target)
                .with_message(format!("Sequence {} is beyond the head {}", target, head)));
        }

        let Base {
            mut state,
            base,
            snapshot_id,
        } = self.find_base(target, &mut findings)?;

        let mut reached = base.sequence();
        let mut applied = 0u64;
        let mut skipped = 0u64;
        let mut partial = false;
        let mut stash: VecDeque<(Sequence, M::State)> = VecDeque::new();

        for item in self.events.read(reached + 1, target) {
            if cancel.load(Ordering::Acquire) {
                return Err(cancelled(target));
            }

            let event = match item {
                Ok(event) => event,
                Err(err) if err.kind() == ExErrorKind::SequenceGap => {
                    if !self.recovery.accept_gaps {
                        return Err(err);
                    }
                    findings.note(err);
                    continue;
                }
                Err(err) if err.kind() == ExErrorKind::EventCorrupted => {
                    let err = err.with_range(SequenceRange::new(reached + 1, target));
                    if !self.recovery.accept_partial {
                        return Err(err);
                    }
                    findings.note(err);
                    partial = true;
                    break;
                }
                Err(err) => return Err(err),
            };

            if event.kind.is_unknown() {
                tracing::warn!(
                    sequence = event.sequence,
                    event_type = event.event_type(),
                    "Skipping event type unknown to this build"
                );
                skipped += 1;
                reached = event.sequence;
                continue;
            }

            state = match self.materializer.apply_event(state, &event) {
                Ok(next) => next,
                Err(e) => {
                    let err = ExError::from(e)
                        .with_op("reconstruct")
                        .with_range(SequenceRange::new(event.sequence, target));
                    return self.settle_for_prefix(event.sequence, target, cancel, err, findings);
                }
            };
            applied += 1;
            reached = event.sequence;

            if self.checkpoint_interval > 0
                && self.stash_capacity > 0
                && reached % self.checkpoint_interval == 0
            {
                // keep only the newest entries the cache can hold
                if stash.len() == self.stash_capacity {
                    stash.pop_front();
                }
                stash.push_back((reached, state.clone()));
            }
        }

        if cancel.load(Ordering::Acquire) {
            return Err(cancelled(target));
        }

        let bytes = self.materializer.serialize(&state).map_err(ExError::from)?;
        let hash = state_hash(&bytes);

        let final_is_new = !matches!(base, ReplayBase::Checkpoint { sequence } if sequence == reached);
        if final_is_new && !stash.iter().any(|(s, _)| *s == reached) {
            stash.push_back((reached, state.clone()));
        }
        self.commit_checkpoints(stash, bytes.len(), snapshot_id)?;

        Ok(Reconstruction {
            state,
            sequence: reached,
            target,
            base,
            applied,
            skipped,
            warnings: findings.warnings,
            partial,
            state_hash: hash,
        })
    }

    /// Recover from an event the materializer refused
    ///
    /// The working state was consumed by the failed apply, so the prefix up
    /// to the previous sequence is rebuilt silently and returned as partial
    /// with the anomalies of the failed pass.
    fn settle_for_prefix(
        &self,
        failed: Sequence,
        target: Sequence,
        cancel: &AtomicBool,
        err: ExError,
        mut findings: Findings<'_>,
    ) -> Result<Reconstruction<M::State>> {
        let err = ExError::new(ExErrorKind::EventCorrupted)
            .with_op("reconstruct")
            .with_range(err.range().unwrap_or_else(|| SequenceRange::new(failed, target)))
            .with_message(format!("Event {} cannot be applied", failed))
            .with_source(err);
        if !self.recovery.accept_partial {
            return Err(err);
        }
        findings.note(err);

        let mut prefix = self.reconstruct_impl(failed - 1, cancel, Findings::silent())?;
        prefix.target = target;
        prefix.partial = true;
        prefix.warnings = findings.warnings;
        Ok(prefix)
    }

    /// Newest usable starting point at or below `target`
    fn find_base(&self, target: Sequence, findings: &mut Findings<'_>) -> Result<Base<M::State>> {
        let checkpoint = self.lock_cache()?.nearest_at_or_before(target);
        let floor = checkpoint.as_ref().map(|c| c.sequence);

        let mut candidate = self.snapshots.latest_at_or_before(target)?;
        while let Some(record) = candidate {
            if floor.is_some_and(|f| f >= record.sequence) {
                break;
            }
            match self.decode_snapshot(&record) {
                Ok(state) => {
                    tracing::debug!(
                        snapshot_id = record.id,
                        sequence = record.sequence,
                        "Replay base is snapshot"
                    );
                    return Ok(Base {
                        state,
                        base: ReplayBase::Snapshot {
                            id: record.id,
                            sequence: record.sequence,
                        },
                        snapshot_id: Some(record.id),
                    });
                }
                Err(err) => {
                    findings.note(err);
                    self.lock_cache()?.invalidate_snapshot(record.id);
                    candidate = self.snapshots.previous(&record)?;
                }
            }
        }

        // the cache may have lost entries to invalidation above
        let checkpoint = match checkpoint {
            Some(c) if self.lock_cache()?.contains(c.sequence) => Some(c),
            _ => None,
        };

        Ok(match checkpoint {
            Some(c) => Base {
                state: c.state,
                base: ReplayBase::Checkpoint {
                    sequence: c.sequence,
                },
                snapshot_id: c.base_snapshot_id,
            },
            None => Base {
                state: self.materializer.empty_state(),
                base: ReplayBase::Empty,
                snapshot_id: None,
            },
        })
    }

    fn decode_snapshot(&self, record: &SnapshotRecord) -> Result<M::State> {
        let corrupted = |reason: String| {
            ExError::new(ExErrorKind::SnapshotCorrupted)
                .with_op("reconstruct")
                .with_document_id(record.document_id.as_str())
                .with_sequence(record.sequence)
                .with_message(format!(
                    "Snapshot {} at sequence {} rejected, falling back: {}",
                    record.id, record.sequence, reason
                ))
        };

        let bytes = decode_frame(&record.payload).map_err(|e| corrupted(e.to_string()))?;
        self.materializer
            .deserialize(&bytes)
            .map_err(|e| corrupted(e.to_string()))
    }

    fn commit_checkpoints(
        &self,
        stash: VecDeque<(Sequence, M::State)>,
        final_size: usize,
        snapshot_id: Option<i64>,
    ) -> Result<()> {
        if stash.is_empty() {
            return Ok(());
        }
        // sizes are measured once; interval entries are charged like the final one
        let mut cache = self.lock_cache()?;
        for (sequence, state) in stash {
            cache.insert(sequence, state, final_size, snapshot_id);
        }
        Ok(())
    }
}

fn cancelled(target: Sequence) -> ExError {
    ExError::new(ExErrorKind::Cancelled)
        .with_op("reconstruct")
        .with_sequence(target)
        .with_message("Replay abandoned by caller")
}

/// A reconstruction running on a worker thread
///
/// Await it, or call `wait` from a plain thread. Dropping it cancels the
/// replay and discards its checkpoints.
pub struct ReplayHandle<S> {
    rx: Option<oneshot::Receiver<Result<Reconstruction<S>>>>,
    cancel: Arc<AtomicBool>,
}

impl<S> ReplayHandle<S> {
    pub fn cancel(&self) {
        self.cancel.store(true, Ordering::Release);
    }

    /// Block until the replay finishes
    ///
    /// Must not be called from within an async runtime.
    pub fn wait(mut self) -> Result<Reconstruction<S>> {
        match self.rx.take() {
            Some(rx) => rx.blocking_recv().unwrap_or_else(|_| Err(worker_gone())),
            None => Err(worker_gone()),
        }
    }
}

fn worker_gone() -> ExError {
    ExError::new(ExErrorKind::Internal)
        .with_op("reconstruct")
        .with_message("Replay worker exited without reporting")
}

impl<S> Future for ReplayHandle<S> {
    type Output = Result<Reconstruction<S>>;

    fn poll(mut self: Pin<&mut Self>, cx: &mut Context<'_>) -> Poll<Self::Output> {
        match self.rx.as_mut() {
            Some(rx) => Pin::new(rx)
                .poll(cx)
                .map(|received| received.unwrap_or_else(|_| Err(worker_gone()))),
            None => Poll::Ready(Err(worker_gone())),
        }
    }
}

impl<S> Drop for ReplayHandle<S> {
    fn drop(&mut self) {
        self.cancel();
    }
}
