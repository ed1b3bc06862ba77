//! Snapshot payload encoding.
//!
//! ## Responsibilities
//!
//! - Frame serialized state as `[sha256][compression tag][body]`
//! - Verify and unwrap frames read back from storage
//! - Compute the state hash used to compare reconstructions
//!
//! ## Non-Responsibilities
//!
//! - Persistence (handled by `wiretuner-store`)
//! - Scheduling snapshot creation (handled by `wiretuner-store`)

pub mod digest;
pub mod frame;

pub use digest::state_hash;
pub use frame::{
    decode_frame, encode_frame, frame_legacy_payload, is_valid_frame, verify_frame, Compression, FRAME_HEADER_LEN,
};
