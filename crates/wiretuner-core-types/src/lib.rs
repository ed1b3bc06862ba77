//! Core types shared across WireTuner persistence facilities
//!
//! This crate provides foundational types used by the error, logging,
//! storage and replay layers:
//!
//! - **Identifiers**: DocumentId, OriginId
//! - **Sequencing**: Sequence, SequenceRange
//! - **Schema constants**: Canonical field keys and event names

pub mod ids;
pub mod schema;
pub mod sequence;

pub use ids::{DocumentId, OriginId};
pub use sequence::{Sequence, SequenceRange};
