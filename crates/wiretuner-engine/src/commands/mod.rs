//! Command orchestration layer.
//!
//! Gives embedders a single dispatch point over the facade's mutating and
//! seeking operations.

pub mod engine_command;
