use crate::model::event::{
    ObjectDeleted, ObjectMoved, ObjectStyleChanged, PathAnchorAdded, PathAnchorMoved, PathClosed,
    PathCreated, ShapeCreated,
};
use crate::model::state::{DocumentState, Geometry, VectorObject};

fn insert_object(mut state: DocumentState, object: VectorObject) -> DocumentState {
    if !state.layers.contains_key(&object.layer_id) || state.objects.contains_key(&object.id) {
        return state;
    }
    state.objects.insert(object.id.clone(), object);
    state
}

pub fn create_path(state: DocumentState, payload: &PathCreated) -> DocumentState {
    insert_object(
        state,
        VectorObject {
            id: payload.object_id.clone(),
            layer_id: payload.layer_id.clone(),
            geometry: Geometry::Path {
                anchors: vec![payload.start],
                closed: false,
            },
            style: payload.style.clone().unwrap_or_default(),
        },
    )
}

pub fn create_shape(state: DocumentState, payload: &ShapeCreated) -> DocumentState {
    insert_object(
        state,
        VectorObject {
            id: payload.object_id.clone(),
            layer_id: payload.layer_id.clone(),
            geometry: Geometry::Shape {
                kind: payload.kind,
                origin: payload.origin,
                width: payload.width,
                height: payload.height,
            },
            style: payload.style.clone().unwrap_or_default(),
        },
    )
}

/// Append an anchor to an open path
pub fn add_anchor(mut state: DocumentState, payload: &PathAnchorAdded) -> DocumentState {
    if let Some(VectorObject {
        geometry: Geometry::Path { anchors, closed },
        ..
    }) = state.objects.get_mut(&payload.object_id)
    {
        if !*closed {
            anchors.push(payload.anchor);
        }
    }
    state
}

pub fn move_anchor(mut state: DocumentState, payload: &PathAnchorMoved) -> DocumentState {
    if let Some(VectorObject {
        geometry: Geometry::Path { anchors, .. },
        ..
    }) = state.objects.get_mut(&payload.object_id)
    {
        if let Some(anchor) = anchors.get_mut(payload.index) {
            *anchor = payload.to;
        }
    }
    state
}

pub fn close_path(mut state: DocumentState, payload: &PathClosed) -> DocumentState {
    if let Some(VectorObject {
        geometry: Geometry::Path { closed, .. },
        ..
    }) = state.objects.get_mut(&payload.object_id)
    {
        *closed = true;
    }
    state
}

pub fn move_object(mut state: DocumentState, payload: &ObjectMoved) -> DocumentState {
    if let Some(object) = state.objects.get_mut(&payload.object_id) {
        object.geometry.translate(payload.dx, payload.dy);
    }
    state
}

pub fn delete_object(mut state: DocumentState, payload: &ObjectDeleted) -> DocumentState {
    if state.objects.remove(&payload.object_id).is_some() {
        state.selection.remove(&payload.object_id);
    }
    state
}

pub fn change_style(mut state: DocumentState, payload: &ObjectStyleChanged) -> DocumentState {
    if let Some(object) = state.objects.get_mut(&payload.object_id) {
        object.style = payload.style.clone();
    }
    state
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::event::LayerCreated;
    use crate::model::state::Point;
    use crate::ops::layer_ops;

    fn with_path() -> DocumentState {
        let state = layer_ops::create_layer(
            DocumentState::new(),
            &LayerCreated {
                layer_id: "l1".to_string(),
                name: "Base".to_string(),
            },
            1,
        );
        create_path(
            state,
            &PathCreated {
                object_id: "p1".to_string(),
                layer_id: "l1".to_string(),
                start: Point::new(0.0, 0.0),
                style: None,
            },
        )
    }

    #[test]
    fn test_path_on_missing_layer_is_noop() {
        let state = create_path(
            DocumentState::new(),
            &PathCreated {
                object_id: "p1".to_string(),
                layer_id: "ghost".to_string(),
                start: Point::new(0.0, 0.0),
                style: None,
            },
        );
        assert!(state.objects.is_empty());
    }

    #[test]
    fn test_closed_path_rejects_new_anchors() {
        let state = with_path();
        let state = close_path(
            state,
            &PathClosed {
                object_id: "p1".to_string(),
            },
        );
        let state = add_anchor(
            state,
            &PathAnchorAdded {
                object_id: "p1".to_string(),
                anchor: Point::new(5.0, 5.0),
            },
        );

        match &state.objects["p1"].geometry {
            Geometry::Path { anchors, closed } => {
                assert!(*closed);
                assert_eq!(anchors.len(), 1);
            }
            other => panic!("unexpected geometry: {:?}", other),
        }
    }

    #[test]
    fn test_move_anchor_out_of_range_is_noop() {
        let before = with_path();
        let after = move_anchor(
            before.clone(),
            &PathAnchorMoved {
                object_id: "p1".to_string(),
                index: 4,
                to: Point::new(1.0, 1.0),
            },
        );
        assert_eq!(before, after);
    }

    #[test]
    fn test_delete_object_deselects() {
        let mut state = with_path();
        state.selection.insert("p1".to_string());
        let state = delete_object(
            state,
            &ObjectDeleted {
                object_id: "p1".to_string(),
            },
        );
        assert!(state.selection.is_empty());
        assert!(state.objects.is_empty());
    }
}
