//! Event model
//!
//! Events are persisted as an `(eventType, eventPayload)` pair. In memory they
//! are a closed union with one variant per known tag plus an `Unknown` arm that
//! carries tags written by newer builds, so replay can skip them instead of
//! failing.

use crate::errors::{Result, WireTunerError};
use crate::model::state::{Point, ShapeKind, Style};
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use wiretuner_core_types::{DocumentId, OriginId, Sequence};

pub const LAYER_CREATED: &str = "layer.created";
pub const LAYER_DELETED: &str = "layer.deleted";
pub const PATH_CREATED: &str = "path.created";
pub const PATH_ANCHOR_ADDED: &str = "path.anchor_added";
pub const PATH_ANCHOR_MOVED: &str = "path.anchor_moved";
pub const PATH_CLOSED: &str = "path.closed";
pub const SHAPE_CREATED: &str = "shape.created";
pub const OBJECT_MOVED: &str = "object.moved";
pub const OBJECT_DELETED: &str = "object.deleted";
pub const OBJECT_STYLE_CHANGED: &str = "object.style_changed";
pub const SELECTION_CHANGED: &str = "selection.changed";
pub const VIEWPORT_CHANGED: &str = "viewport.changed";
pub const DOCUMENT_SAVED: &str = "document.saved";

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerCreated {
    pub layer_id: String,
    pub name: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LayerDeleted {
    pub layer_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathCreated {
    pub object_id: String,
    pub layer_id: String,
    pub start: Point,
    #[serde(default)]
    pub style: Option<Style>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAnchorAdded {
    pub object_id: String,
    pub anchor: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathAnchorMoved {
    pub object_id: String,
    pub index: usize,
    pub to: Point,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PathClosed {
    pub object_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ShapeCreated {
    pub object_id: String,
    pub layer_id: String,
    pub kind: ShapeKind,
    pub origin: Point,
    pub width: f64,
    pub height: f64,
    #[serde(default)]
    pub style: Option<Style>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectMoved {
    pub object_id: String,
    pub dx: f64,
    pub dy: f64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectDeleted {
    pub object_id: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ObjectStyleChanged {
    pub object_id: String,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SelectionChanged {
    pub object_ids: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ViewportChanged {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

/// Save marker appended by a manual save; carries no state change
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentSaved {
    #[serde(default)]
    pub label: Option<String>,
}

/// Closed set of event variants known to this build
#[derive(Debug, Clone, PartialEq)]
pub enum EventKind {
    LayerCreated(LayerCreated),
    LayerDeleted(LayerDeleted),
    PathCreated(PathCreated),
    PathAnchorAdded(PathAnchorAdded),
    PathAnchorMoved(PathAnchorMoved),
    PathClosed(PathClosed),
    ShapeCreated(ShapeCreated),
    ObjectMoved(ObjectMoved),
    ObjectDeleted(ObjectDeleted),
    ObjectStyleChanged(ObjectStyleChanged),
    SelectionChanged(SelectionChanged),
    ViewportChanged(ViewportChanged),
    DocumentSaved(DocumentSaved),
    /// Tag not recognised by this build; kept verbatim
    Unknown { event_type: String, payload: Value },
}

fn decode_payload<T: DeserializeOwned>(
    event_type: &str,
    sequence: Sequence,
    payload: Value,
) -> Result<T> {
    serde_json::from_value(payload).map_err(|e| WireTunerError::EventPayloadInvalid {
        event_type: event_type.to_string(),
        sequence,
        reason: e.to_string(),
    })
}

fn encode_payload<T: Serialize>(payload: &T) -> Result<Value> {
    Ok(serde_json::to_value(payload)?)
}

impl EventKind {
    /// Persisted tag of this variant
    pub fn event_type(&self) -> &str {
        match self {
            EventKind::LayerCreated(_) => LAYER_CREATED,
            EventKind::LayerDeleted(_) => LAYER_DELETED,
            EventKind::PathCreated(_) => PATH_CREATED,
            EventKind::PathAnchorAdded(_) => PATH_ANCHOR_ADDED,
            EventKind::PathAnchorMoved(_) => PATH_ANCHOR_MOVED,
            EventKind::PathClosed(_) => PATH_CLOSED,
            EventKind::ShapeCreated(_) => SHAPE_CREATED,
            EventKind::ObjectMoved(_) => OBJECT_MOVED,
            EventKind::ObjectDeleted(_) => OBJECT_DELETED,
            EventKind::ObjectStyleChanged(_) => OBJECT_STYLE_CHANGED,
            EventKind::SelectionChanged(_) => SELECTION_CHANGED,
            EventKind::ViewportChanged(_) => VIEWPORT_CHANGED,
            EventKind::DocumentSaved(_) => DOCUMENT_SAVED,
            EventKind::Unknown { event_type, .. } => event_type,
        }
    }

    pub fn is_unknown(&self) -> bool {
        matches!(self, EventKind::Unknown { .. })
    }

    pub fn is_save_marker(&self) -> bool {
        matches!(self, EventKind::DocumentSaved(_))
    }

    /// Encode the payload for persistence
    ///
    /// # Errors
    ///
    /// Returns `WireTunerError::Serialization` if the payload cannot be encoded.
    pub fn to_payload(&self) -> Result<Value> {
        match self {
            EventKind::LayerCreated(p) => encode_payload(p),
            EventKind::LayerDeleted(p) => encode_payload(p),
            EventKind::PathCreated(p) => encode_payload(p),
            EventKind::PathAnchorAdded(p) => encode_payload(p),
            EventKind::PathAnchorMoved(p) => encode_payload(p),
            EventKind::PathClosed(p) => encode_payload(p),
            EventKind::ShapeCreated(p) => encode_payload(p),
            EventKind::ObjectMoved(p) => encode_payload(p),
            EventKind::ObjectDeleted(p) => encode_payload(p),
            EventKind::ObjectStyleChanged(p) => encode_payload(p),
            EventKind::SelectionChanged(p) => encode_payload(p),
            EventKind::ViewportChanged(p) => encode_payload(p),
            EventKind::DocumentSaved(p) => encode_payload(p),
            EventKind::Unknown { payload, .. } => Ok(payload.clone()),
        }
    }

    /// Decode a persisted `(eventType, eventPayload)` pair
    ///
    /// Unrecognised tags decode to `Unknown`. A recognised tag whose payload
    /// does not match, or carries non-finite geometry, is corruption.
    ///
    /// # Errors
    ///
    /// Returns `WireTunerError::EventPayloadInvalid` for malformed payloads.
    pub fn decode(event_type: &str, payload: Value, sequence: Sequence) -> Result<Self> {
        let kind = match event_type {
            LAYER_CREATED => EventKind::LayerCreated(decode_payload(event_type, sequence, payload)?),
            LAYER_DELETED => EventKind::LayerDeleted(decode_payload(event_type, sequence, payload)?),
            PATH_CREATED => EventKind::PathCreated(decode_payload(event_type, sequence, payload)?),
            PATH_ANCHOR_ADDED => {
                EventKind::PathAnchorAdded(decode_payload(event_type, sequence, payload)?)
            }
            PATH_ANCHOR_MOVED => {
                EventKind::PathAnchorMoved(decode_payload(event_type, sequence, payload)?)
            }
            PATH_CLOSED => EventKind::PathClosed(decode_payload(event_type, sequence, payload)?),
            SHAPE_CREATED => EventKind::ShapeCreated(decode_payload(event_type, sequence, payload)?),
            OBJECT_MOVED => EventKind::ObjectMoved(decode_payload(event_type, sequence, payload)?),
            OBJECT_DELETED => {
                EventKind::ObjectDeleted(decode_payload(event_type, sequence, payload)?)
            }
            OBJECT_STYLE_CHANGED => {
                EventKind::ObjectStyleChanged(decode_payload(event_type, sequence, payload)?)
            }
            SELECTION_CHANGED => {
                EventKind::SelectionChanged(decode_payload(event_type, sequence, payload)?)
            }
            VIEWPORT_CHANGED => {
                EventKind::ViewportChanged(decode_payload(event_type, sequence, payload)?)
            }
            DOCUMENT_SAVED => {
                EventKind::DocumentSaved(decode_payload(event_type, sequence, payload)?)
            }
            other => EventKind::Unknown {
                event_type: other.to_string(),
                payload,
            },
        };
        kind.validate(sequence)?;
        Ok(kind)
    }

    /// Reject geometry that would poison the materialized state
    ///
    /// # Errors
    ///
    /// Returns `WireTunerError::EventPayloadInvalid` for non-finite numbers,
    /// a non-positive zoom or an empty identifier.
    pub fn validate(&self, sequence: Sequence) -> Result<()> {
        let invalid = |reason: &str| WireTunerError::EventPayloadInvalid {
            event_type: self.event_type().to_string(),
            sequence,
            reason: reason.to_string(),
        };

        let ok = match self {
            EventKind::LayerCreated(p) => !p.layer_id.is_empty(),
            EventKind::LayerDeleted(p) => !p.layer_id.is_empty(),
            EventKind::PathCreated(p) => !p.object_id.is_empty() && p.start.is_finite(),
            EventKind::PathAnchorAdded(p) => p.anchor.is_finite(),
            EventKind::PathAnchorMoved(p) => p.to.is_finite(),
            EventKind::ShapeCreated(p) => {
                !p.object_id.is_empty()
                    && p.origin.is_finite()
                    && p.width.is_finite()
                    && p.height.is_finite()
            }
            EventKind::ObjectMoved(p) => p.dx.is_finite() && p.dy.is_finite(),
            EventKind::ViewportChanged(p) => {
                p.pan_x.is_finite() && p.pan_y.is_finite() && p.zoom.is_finite() && p.zoom > 0.0
            }
            EventKind::ObjectStyleChanged(p) => {
                p.style.stroke_width.is_finite() && p.style.opacity.is_finite()
            }
            EventKind::PathClosed(_)
            | EventKind::ObjectDeleted(_)
            | EventKind::SelectionChanged(_)
            | EventKind::DocumentSaved(_)
            | EventKind::Unknown { .. } => true,
        };

        if ok {
            Ok(())
        } else {
            Err(invalid("identifier empty or value out of range"))
        }
    }
}

/// Event as read back from the log
#[derive(Debug, Clone, PartialEq)]
pub struct Event {
    pub sequence: Sequence,
    pub document_id: DocumentId,
    pub kind: EventKind,
    /// Unix epoch milliseconds
    pub timestamp: i64,
    pub origin_id: Option<OriginId>,
}

impl Event {
    pub fn event_type(&self) -> &str {
        self.kind.event_type()
    }
}

/// Event submitted by a producer; the log assigns sequence and timestamp
#[derive(Debug, Clone, PartialEq)]
pub struct NewEvent {
    pub kind: EventKind,
    pub origin_id: Option<OriginId>,
}

impl NewEvent {
    pub fn new(kind: EventKind) -> Self {
        Self {
            kind,
            origin_id: None,
        }
    }

    pub fn with_origin(mut self, origin: OriginId) -> Self {
        self.origin_id = Some(origin);
        self
    }
}

impl From<EventKind> for NewEvent {
    fn from(kind: EventKind) -> Self {
        NewEvent::new(kind)
    }
}
