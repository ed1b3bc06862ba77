use crate::model::event::{SelectionChanged, ViewportChanged};
use crate::model::state::{DocumentState, Viewport};

/// Replace the selection; ids of objects that do not exist are dropped
pub fn change_selection(mut state: DocumentState, payload: &SelectionChanged) -> DocumentState {
    state.selection = payload
        .object_ids
        .iter()
        .filter(|id| state.objects.contains_key(*id))
        .cloned()
        .collect();
    state
}

pub fn change_viewport(mut state: DocumentState, payload: &ViewportChanged) -> DocumentState {
    state.viewport = Viewport {
        pan_x: payload.pan_x,
        pan_y: payload.pan_y,
        zoom: payload.zoom,
    };
    state
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_selection_drops_missing_objects() {
        let state = change_selection(
            DocumentState::new(),
            &SelectionChanged {
                object_ids: vec!["nope".to_string()],
            },
        );
        assert!(state.selection.is_empty());
    }
}
