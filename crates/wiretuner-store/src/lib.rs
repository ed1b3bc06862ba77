//! WireTuner Store - single-file SQLite document container
//!
//! Provides:
//! - Connection management and integrity checks
//! - Embedded, checksummed container schema migrations
//! - The append-only Event Log with bounded retry on contention
//! - The Snapshot Store with single-flight background creation
//! - Metadata repository and the document format migration chain

pub mod db;
pub mod errors;
pub mod event_log;
pub mod format;
pub mod metadata;
pub mod migrations;
pub mod retry;
pub mod snapshot;
pub mod storage;

// Re-export key types
pub use errors::Result;
pub use event_log::{EventCursor, EventLog};
pub use snapshot::{MaybeCreate, SnapshotHandle, SnapshotInfo, SnapshotRecord, SnapshotStore};
pub use storage::Storage;
