//! Document format migration chain
//!
//! Provides:
//! - Ordered single-step migrations (v1→v2, v2→v3)
//! - Atomic application of every pending step for a document

mod chain;
mod steps;

pub use chain::{migrate_document, registry, FormatMigration, MigrationReport, StepReport};
