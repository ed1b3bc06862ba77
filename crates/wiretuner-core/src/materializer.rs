//! State materializer seam
//!
//! The replay engine and the snapshot store never look inside a state; they
//! only move it through this trait. The vector document implementation is the
//! default; tests and embedders may supply their own.

use crate::apply::apply_event;
use crate::errors::{Result, WireTunerError};
use crate::model::{DocumentState, Event};
use crate::snapshot::digest::state_hash;

/// Converts between materialized state, bytes and events
pub trait StateMaterializer: Send + Sync + 'static {
    type State: Clone + Send + Sync + 'static;

    /// Canonical state at sequence 0
    fn empty_state(&self) -> Self::State;

    /// # Errors
    ///
    /// Returns an error if the state cannot be encoded.
    fn serialize(&self, state: &Self::State) -> Result<Vec<u8>>;

    /// # Errors
    ///
    /// Returns an error if the bytes do not describe a state.
    fn deserialize(&self, bytes: &[u8]) -> Result<Self::State>;

    /// # Errors
    ///
    /// Returns an error if the event cannot be applied to the state.
    fn apply_event(&self, state: Self::State, event: &Event) -> Result<Self::State>;

    /// Hex digest of the serialized state
    ///
    /// # Errors
    ///
    /// Propagates serialization failures.
    fn state_hash(&self, state: &Self::State) -> Result<String> {
        Ok(state_hash(&self.serialize(state)?))
    }
}

/// Materializer for the vector document model, encoding state as JSON
#[derive(Debug, Clone, Copy, Default)]
pub struct VectorDocumentMaterializer;

impl StateMaterializer for VectorDocumentMaterializer {
    type State = DocumentState;

    fn empty_state(&self) -> DocumentState {
        DocumentState::new()
    }

    fn serialize(&self, state: &DocumentState) -> Result<Vec<u8>> {
        Ok(serde_json::to_vec(state)?)
    }

    fn deserialize(&self, bytes: &[u8]) -> Result<DocumentState> {
        serde_json::from_slice(bytes).map_err(|e| WireTunerError::Serialization {
            message: format!("snapshot state does not decode: {}", e),
        })
    }

    fn apply_event(&self, state: DocumentState, event: &Event) -> Result<DocumentState> {
        apply_event(state, event)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_empty_state_survives_serialize_deserialize() {
        let m = VectorDocumentMaterializer;
        let bytes = m.serialize(&m.empty_state()).unwrap();
        assert_eq!(m.deserialize(&bytes).unwrap(), DocumentState::new());
    }

    #[test]
    fn test_garbage_does_not_deserialize() {
        let m = VectorDocumentMaterializer;
        assert!(m.deserialize(b"not json").is_err());
    }

    #[test]
    fn test_hash_of_empty_state_is_stable() {
        let m = VectorDocumentMaterializer;
        let a = m.state_hash(&m.empty_state()).unwrap();
        let b = m.state_hash(&DocumentState::default()).unwrap();
        assert_eq!(a, b);
    }
}
