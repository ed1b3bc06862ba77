//! WireTuner Engine - Orchestration layer
//!
//! Provides:
//! - The Replay Engine (snapshot + delta replay, corruption fallback,
//!   checkpoint cache, cancellation)
//! - The auto-save debouncer
//! - The Persistence Facade (`DocumentStore`), the only surface exposed to
//!   tools, rendering and collaboration layers
//! - Engine command dispatch

pub mod autosave;
pub mod commands;
pub mod facade;
pub mod replay;

pub use autosave::AutosaveStatus;
pub use facade::{
    DocumentInit, DocumentStore, ForceSnapshotOutcome, LoadReport, RecordOutcome, SaveOutcome,
};
pub use replay::{Reconstruction, ReplayBase, ReplayEngine, ReplayHandle};
