//! Functional-boundary apply function
//!
//! `apply_event()` is the single transition function of the document model.
//! It takes ownership of the current state and returns the next one; it never
//! mutates shared state and never retains the result.
//!
//! ## Determinism Contract
//!
//! The same ordered events applied to the same base state always produce the
//! same state, and therefore the same serialized bytes and state hash.
//!
//! ## Example
//!
//! ```
//! use wiretuner_core::apply::apply_event;
//! use wiretuner_core::model::event::LayerCreated;
//! use wiretuner_core::model::{DocumentState, Event, EventKind};
//! use wiretuner_core_types::DocumentId;
//!
//! let event = Event {
//!     sequence: 1,
//!     document_id: DocumentId::from_string("doc".to_string()),
//!     kind: EventKind::LayerCreated(LayerCreated {
//!         layer_id: "l1".to_string(),
//!         name: "Background".to_string(),
//!     }),
//!     timestamp: 0,
//!     origin_id: None,
//! };
//!
//! let state = apply_event(DocumentState::new(), &event).unwrap();
//! assert_eq!(state.layers.len(), 1);
//! ```

use crate::errors::Result;
use crate::model::{DocumentState, Event, EventKind};
use crate::ops::{layer_ops, object_ops, view_ops};

/// Apply one event to a state, returning the next state
///
/// Unknown variants and save markers leave the state unchanged. Callers that
/// need to report skipped unknown events should check `EventKind::is_unknown`
/// before calling.
///
/// # Errors
///
/// Returns `WireTunerError::EventPayloadInvalid` if the event carries values
/// the model cannot hold (non-finite coordinates, non-positive zoom).
pub fn apply_event(state: DocumentState, event: &Event) -> Result<DocumentState> {
    event.kind.validate(event.sequence)?;

    let next = match &event.kind {
        EventKind::LayerCreated(p) => layer_ops::create_layer(state, p, event.sequence),
        EventKind::LayerDeleted(p) => layer_ops::delete_layer(state, p),
        EventKind::PathCreated(p) => object_ops::create_path(state, p),
        EventKind::PathAnchorAdded(p) => object_ops::add_anchor(state, p),
        EventKind::PathAnchorMoved(p) => object_ops::move_anchor(state, p),
        EventKind::PathClosed(p) => object_ops::close_path(state, p),
        EventKind::ShapeCreated(p) => object_ops::create_shape(state, p),
        EventKind::ObjectMoved(p) => object_ops::move_object(state, p),
        EventKind::ObjectDeleted(p) => object_ops::delete_object(state, p),
        EventKind::ObjectStyleChanged(p) => object_ops::change_style(state, p),
        EventKind::SelectionChanged(p) => view_ops::change_selection(state, p),
        EventKind::ViewportChanged(p) => view_ops::change_viewport(state, p),
        EventKind::DocumentSaved(_) | EventKind::Unknown { .. } => state,
    };

    Ok(next)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::{LayerCreated, ObjectMoved, ViewportChanged};
    use serde_json::json;
    use wiretuner_core_types::DocumentId;

    fn event(sequence: u64, kind: EventKind) -> Event {
        Event {
            sequence,
            document_id: DocumentId::from_string("doc".to_string()),
            kind,
            timestamp: 0,
            origin_id: None,
        }
    }

    #[test]
    fn test_unknown_event_leaves_state_unchanged() {
        let state = apply_event(
            DocumentState::new(),
            &event(
                1,
                EventKind::LayerCreated(LayerCreated {
                    layer_id: "l1".to_string(),
                    name: "Base".to_string(),
                }),
            ),
        )
        .unwrap();

        let after = apply_event(
            state.clone(),
            &event(
                2,
                EventKind::Unknown {
                    event_type: "mesh.created".to_string(),
                    payload: json!({}),
                },
            ),
        )
        .unwrap();

        assert_eq!(state, after);
    }

    #[test]
    fn test_move_missing_object_is_noop() {
        let state = apply_event(
            DocumentState::new(),
            &event(
                1,
                EventKind::ObjectMoved(ObjectMoved {
                    object_id: "ghost".to_string(),
                    dx: 1.0,
                    dy: 1.0,
                }),
            ),
        )
        .unwrap();
        assert!(state.is_empty());
    }

    #[test]
    fn test_invalid_viewport_is_rejected() {
        let result = apply_event(
            DocumentState::new(),
            &event(
                1,
                EventKind::ViewportChanged(ViewportChanged {
                    pan_x: f64::NAN,
                    pan_y: 0.0,
                    zoom: 1.0,
                }),
            ),
        );
        assert!(result.is_err());
    }
}
