//! WireTuner Core - document model and durability primitives
//!
//! This crate holds everything about a document that does not touch storage:
//! - The closed event model (`EventKind`) with a forward-compatible `Unknown` arm
//! - The materialized `DocumentState` and the pure `apply_event` function
//! - The `StateMaterializer` seam used by the replay engine
//! - Snapshot frame codec (checksum + compression tag) and state hashing
//! - Checkpoint cache for repeated seeks
//! - Format version gate
//! - Error, logging and telemetry facilities, plus configuration

pub mod apply;
pub mod checkpoint_cache;
pub mod config;
pub mod errors;
pub mod logging_facility;
pub mod materializer;
pub mod model;
pub mod ops;
pub mod snapshot;
pub mod telemetry;
pub mod version;

// Re-export commonly used types
pub use apply::apply_event;
pub use checkpoint_cache::CheckpointCache;
pub use config::PersistenceConfig;
pub use errors::{ExError, ExErrorKind, Result, Severity, WireTunerError};
pub use materializer::{StateMaterializer, VectorDocumentMaterializer};
pub use model::{DocumentMetadata, DocumentState, Event, EventKind, NewEvent};
pub use telemetry::{Anomaly, AnomalySink, TracingSink};
pub use version::{VersionStatus, CURRENT_FORMAT_VERSION};

#[doc(hidden)]
pub use wiretuner_core_types;
