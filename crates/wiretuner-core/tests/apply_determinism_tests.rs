//! Property tests for the document transition function.

use proptest::prelude::*;
use wiretuner_core::materializer::{StateMaterializer, VectorDocumentMaterializer};
use wiretuner_core::model::event::{
    LayerCreated, LayerDeleted, ObjectDeleted, ObjectMoved, PathAnchorAdded, PathCreated,
    SelectionChanged, ViewportChanged,
};
use wiretuner_core::model::state::Point;
use wiretuner_core::model::{DocumentState, Event, EventKind};
use wiretuner_core_types::DocumentId;

fn arb_kind() -> impl Strategy<Value = EventKind> {
    let id = prop::sample::select(vec!["a", "b", "c"]);
    let layer = prop::sample::select(vec!["l1", "l2"]);
    let coord = -1000.0f64..1000.0;
    prop_oneof![
        layer.clone().prop_map(|l| EventKind::LayerCreated(LayerCreated {
            layer_id: l.to_string(),
            name: format!("Layer {}", l),
        })),
        layer.clone().prop_map(|l| EventKind::LayerDeleted(LayerDeleted {
            layer_id: l.to_string(),
        })),
        (id.clone(), layer, coord.clone(), coord.clone()).prop_map(|(o, l, x, y)| {
            EventKind::PathCreated(PathCreated {
                object_id: o.to_string(),
                layer_id: l.to_string(),
                start: Point::new(x, y),
                style: None,
            })
        }),
        (id.clone(), coord.clone(), coord.clone()).prop_map(|(o, x, y)| {
            EventKind::PathAnchorAdded(PathAnchorAdded {
                object_id: o.to_string(),
                anchor: Point::new(x, y),
            })
        }),
        (id.clone(), coord.clone(), coord.clone()).prop_map(|(o, dx, dy)| {
            EventKind::ObjectMoved(ObjectMoved {
                object_id: o.to_string(),
                dx,
                dy,
            })
        }),
        id.clone().prop_map(|o| EventKind::ObjectDeleted(ObjectDeleted {
            object_id: o.to_string(),
        })),
        prop::collection::vec(id, 0..3).prop_map(|ids| {
            EventKind::SelectionChanged(SelectionChanged {
                object_ids: ids.into_iter().map(str::to_string).collect(),
            })
        }),
        (coord.clone(), coord, 0.1f64..10.0).prop_map(|(pan_x, pan_y, zoom)| {
            EventKind::ViewportChanged(ViewportChanged { pan_x, pan_y, zoom })
        }),
    ]
}

fn to_events(kinds: Vec<EventKind>) -> Vec<Event> {
    let document_id = DocumentId::from_string("prop-doc".to_string());
    kinds
        .into_iter()
        .enumerate()
        .map(|(i, kind)| Event {
            sequence: i as u64 + 1,
            document_id: document_id.clone(),
            kind,
            timestamp: 0,
            origin_id: None,
        })
        .collect()
}

fn replay(
    m: &VectorDocumentMaterializer,
    base: DocumentState,
    events: &[Event],
) -> DocumentState {
    events
        .iter()
        .try_fold(base, |state, event| m.apply_event(state, event))
        .unwrap()
}

proptest! {
    #[test]
    fn prop_replay_is_deterministic(kinds in prop::collection::vec(arb_kind(), 0..60)) {
        let m = VectorDocumentMaterializer;
        let events = to_events(kinds);

        let first = replay(&m, m.empty_state(), &events);
        let second = replay(&m, m.empty_state(), &events);

        prop_assert_eq!(m.state_hash(&first).unwrap(), m.state_hash(&second).unwrap());
        prop_assert_eq!(m.serialize(&first).unwrap(), m.serialize(&second).unwrap());
    }

    #[test]
    fn prop_serialized_midpoint_resumes_identically(
        kinds in prop::collection::vec(arb_kind(), 1..60),
        split in 0usize..60,
    ) {
        let m = VectorDocumentMaterializer;
        let events = to_events(kinds);
        let split = split.min(events.len());

        let straight = replay(&m, m.empty_state(), &events);

        let midpoint = replay(&m, m.empty_state(), &events[..split]);
        let restored = m.deserialize(&m.serialize(&midpoint).unwrap()).unwrap();
        let resumed = replay(&m, restored, &events[split..]);

        prop_assert_eq!(m.state_hash(&straight).unwrap(), m.state_hash(&resumed).unwrap());
    }

    #[test]
    fn prop_selection_only_references_live_objects(
        kinds in prop::collection::vec(arb_kind(), 0..60),
    ) {
        let m = VectorDocumentMaterializer;
        let state = replay(&m, m.empty_state(), &to_events(kinds));

        for id in &state.selection {
            prop_assert!(state.objects.contains_key(id));
        }
        for object in state.objects.values() {
            prop_assert!(state.layers.contains_key(&object.layer_id));
        }
    }
}
