//! Snapshot Store
//!
//! Provides:
//! - Persistence of framed (checksummed, compression-tagged) state captures
//! - Threshold evaluation (event count, elapsed time, forced)
//! - Single-flight background creation handing back a future

mod persist;
mod store;
mod trigger;

pub use persist::{count, insert_snapshot, latest_at_or_before, latest_sequence, list, previous};
pub use store::{MaybeCreate, SnapshotHandle, SnapshotStore};
pub use trigger::{SnapshotTrigger, TriggerReason};

use wiretuner_core::snapshot::{verify_frame, Compression};
use wiretuner_core_types::{DocumentId, Sequence};

/// A stored snapshot row, payload still framed
#[derive(Debug, Clone, PartialEq)]
pub struct SnapshotRecord {
    pub id: i64,
    pub document_id: DocumentId,
    pub sequence: Sequence,
    pub payload: Vec<u8>,
    pub created_at: i64,
}

impl SnapshotRecord {
    pub fn info(&self) -> SnapshotInfo {
        SnapshotInfo {
            id: self.id,
            sequence: self.sequence,
            created_at: self.created_at,
            size_bytes: self.payload.len(),
            compression: verify_frame(&self.payload).ok().map(|(c, _)| c),
        }
    }
}

/// Summary of a snapshot for listings
///
/// `compression` is `None` when the frame fails verification.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SnapshotInfo {
    pub id: i64,
    pub sequence: Sequence,
    pub created_at: i64,
    pub size_bytes: usize,
    pub compression: Option<Compression>,
}

impl SnapshotInfo {
    pub fn is_valid(&self) -> bool {
        self.compression.is_some()
    }
}
