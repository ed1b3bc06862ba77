//! State transitions, one module per concern.
//!
//! Every function takes the state by value and returns the next state.
//! Edits that reference a missing layer or object leave the state unchanged.

pub mod layer_ops;
pub mod object_ops;
pub mod view_ops;
