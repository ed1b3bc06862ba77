//! Engine-level commands over an open document.

#![allow(clippy::result_large_err)]

use crate::facade::{DocumentStore, ForceSnapshotOutcome, RecordOutcome, SaveOutcome};
use crate::replay::Reconstruction;
use wiretuner_core::model::NewEvent;
use wiretuner_core::StateMaterializer;
use wiretuner_core_types::Sequence;
use wiretuner_store::errors::Result;

/// Engine-level commands that require I/O.
#[derive(Debug, Clone)]
pub enum EngineCommand {
    /// Append one event to the log.
    RecordEvent { event: NewEvent },
    /// User-initiated save.
    SaveManual,
    /// Snapshot the head of the log regardless of thresholds.
    ForceSnapshot,
    /// Rebuild the document as of a sequence (scrubbing, undo/redo).
    ReconstructAt { sequence: Sequence },
}

/// Result of applying an engine command.
#[derive(Debug)]
pub enum EngineCommandResult<S> {
    EventRecorded(RecordOutcome),
    Saved(SaveOutcome),
    Snapshot(ForceSnapshotOutcome),
    Reconstructed(Box<Reconstruction<S>>),
}

/// Apply an engine command to an open document.
pub fn apply_engine_command<M: StateMaterializer>(
    cmd: EngineCommand,
    store: &DocumentStore<M>,
) -> Result<EngineCommandResult<M::State>> {
    match cmd {
        EngineCommand::RecordEvent { event } => {
            Ok(EngineCommandResult::EventRecorded(store.record_event(event)?))
        }
        EngineCommand::SaveManual => Ok(EngineCommandResult::Saved(store.save_manual()?)),
        EngineCommand::ForceSnapshot => {
            Ok(EngineCommandResult::Snapshot(store.force_snapshot()?))
        }
        EngineCommand::ReconstructAt { sequence } => Ok(EngineCommandResult::Reconstructed(
            Box::new(store.reconstruct_at(sequence)?),
        )),
    }
}
