//! Deterministic digests over serialized state

use sha2::{Digest, Sha256};

/// Lowercase hex SHA-256 of serialized state bytes (64 characters)
///
/// ```
/// use wiretuner_core::snapshot::digest::state_hash;
///
/// let digest = state_hash(b"{}");
/// assert_eq!(digest.len(), 64);
/// ```
pub fn state_hash(bytes: &[u8]) -> String {
    hex::encode(sha256(bytes))
}

pub(crate) fn sha256(bytes: &[u8]) -> [u8; 32] {
    let mut hasher = Sha256::new();
    hasher.update(bytes);
    hasher.finalize().into()
}
