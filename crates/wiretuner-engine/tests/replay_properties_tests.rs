//! Property tests: reconstruction through snapshots and checkpoints matches
//! a plain fold of the log from the empty document.

use proptest::prelude::*;
use tempfile::TempDir;
use wiretuner_core::config::PersistenceConfig;
use wiretuner_core::materializer::{StateMaterializer, VectorDocumentMaterializer};
use wiretuner_core::model::event::{LayerCreated, ObjectMoved, PathAnchorAdded, PathCreated};
use wiretuner_core::model::state::Point;
use wiretuner_core::model::{DocumentState, Event, EventKind, NewEvent};
use wiretuner_core::snapshot::state_hash;
use wiretuner_core_types::DocumentId;
use wiretuner_engine::{DocumentInit, DocumentStore};

fn arb_kind() -> impl Strategy<Value = EventKind> {
    let object = prop::sample::select(vec!["p1", "p2"]);
    let coord = -500.0f64..500.0;
    prop_oneof![
        Just(EventKind::LayerCreated(LayerCreated {
            layer_id: "base".to_string(),
            name: "Base".to_string(),
        })),
        (object.clone(), coord.clone(), coord.clone()).prop_map(|(o, x, y)| {
            EventKind::PathCreated(PathCreated {
                object_id: o.to_string(),
                layer_id: "base".to_string(),
                start: Point::new(x, y),
                style: None,
            })
        }),
        (object.clone(), coord.clone(), coord.clone()).prop_map(|(o, x, y)| {
            EventKind::PathAnchorAdded(PathAnchorAdded {
                object_id: o.to_string(),
                anchor: Point::new(x, y),
            })
        }),
        (object, coord.clone(), coord).prop_map(|(o, dx, dy)| {
            EventKind::ObjectMoved(ObjectMoved {
                object_id: o.to_string(),
                dx,
                dy,
            })
        }),
    ]
}

fn fold_hash(kinds: &[EventKind]) -> String {
    let m = VectorDocumentMaterializer;
    let document_id = DocumentId::from_string("fold".to_string());
    let state: DocumentState = kinds
        .iter()
        .enumerate()
        .map(|(i, kind)| Event {
            sequence: i as u64 + 1,
            document_id: document_id.clone(),
            kind: kind.clone(),
            timestamp: 0,
            origin_id: None,
        })
        .try_fold(m.empty_state(), |state, event| m.apply_event(state, &event))
        .unwrap();
    state_hash(&m.serialize(&state).unwrap())
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(12))]

    #[test]
    fn prop_reconstruction_matches_plain_fold(
        kinds in prop::collection::vec(arb_kind(), 1..40),
        threshold in 2u64..12,
        interval in 1u64..8,
        target_pick in 0usize..40,
    ) {
        let dir = TempDir::new().unwrap();
        let mut config = PersistenceConfig::default();
        config.snapshot.event_threshold = threshold;
        config.checkpoints.interval = interval;

        let store = DocumentStore::create(
            dir.path().join("prop.wiretuner"),
            DocumentInit::new("Prop"),
            VectorDocumentMaterializer,
            config,
        )
        .unwrap();
        for kind in &kinds {
            let outcome = store.record_event(NewEvent::new(kind.clone())).unwrap();
            if let Some(handle) = outcome.snapshot {
                handle.wait().unwrap();
            }
        }

        let target = (target_pick % kinds.len()) + 1;
        let r = store.reconstruct_at(target as u64).unwrap();

        prop_assert!(!r.partial);
        prop_assert_eq!(r.sequence, target as u64);
        prop_assert_eq!(r.state_hash, fold_hash(&kinds[..target]));
    }

    #[test]
    fn prop_repeated_reconstruction_is_stable(
        kinds in prop::collection::vec(arb_kind(), 1..30),
    ) {
        let dir = TempDir::new().unwrap();
        let mut config = PersistenceConfig::default();
        config.snapshot.event_threshold = 5;
        config.checkpoints.interval = 3;

        let store = DocumentStore::create(
            dir.path().join("stable.wiretuner"),
            DocumentInit::new("Stable"),
            VectorDocumentMaterializer,
            config,
        )
        .unwrap();
        for kind in &kinds {
            if let Some(handle) = store.record_event(NewEvent::new(kind.clone())).unwrap().snapshot {
                handle.wait().unwrap();
            }
        }

        let head = kinds.len() as u64;
        let cold = store.reconstruct_at(head).unwrap();
        let warm = store.reconstruct_at(head).unwrap();
        let reopened = store.load().unwrap();

        prop_assert_eq!(&cold.state_hash, &warm.state_hash);
        prop_assert_eq!(&cold.state_hash, &reopened.state_hash);
    }
}
