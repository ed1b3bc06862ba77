use crate::model::event::{LayerCreated, LayerDeleted};
use crate::model::state::{DocumentState, Layer};
use wiretuner_core_types::Sequence;

/// Add a layer; a duplicate id keeps the existing layer
pub fn create_layer(
    mut state: DocumentState,
    payload: &LayerCreated,
    sequence: Sequence,
) -> DocumentState {
    state
        .layers
        .entry(payload.layer_id.clone())
        .or_insert_with(|| Layer {
            id: payload.layer_id.clone(),
            name: payload.name.clone(),
            created_at_sequence: sequence,
        });
    state
}

/// Remove a layer together with its objects, deselecting them
pub fn delete_layer(mut state: DocumentState, payload: &LayerDeleted) -> DocumentState {
    if state.layers.remove(&payload.layer_id).is_none() {
        return state;
    }

    let doomed: Vec<String> = state
        .objects_on_layer(&payload.layer_id)
        .map(|object| object.id.clone())
        .collect();
    for id in &doomed {
        state.objects.remove(id);
        state.selection.remove(id);
    }
    state
}
