//! Materialized document state
//!
//! All collections are ordered so that serializing the same state always
//! yields the same bytes, which is what state hashing relies on.

use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, BTreeSet};

#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Point {
    pub x: f64,
    pub y: f64,
}

impl Point {
    pub fn new(x: f64, y: f64) -> Self {
        Self { x, y }
    }

    pub fn is_finite(&self) -> bool {
        self.x.is_finite() && self.y.is_finite()
    }

    pub fn translated(&self, dx: f64, dy: f64) -> Self {
        Self {
            x: self.x + dx,
            y: self.y + dy,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Layer {
    pub id: String,
    pub name: String,
    /// Sequence of the event that created the layer; orders layers for painting
    pub created_at_sequence: u64,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ShapeKind {
    Rectangle,
    Ellipse,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Geometry {
    Path { anchors: Vec<Point>, closed: bool },
    Shape {
        kind: ShapeKind,
        origin: Point,
        width: f64,
        height: f64,
    },
}

impl Geometry {
    pub fn translate(&mut self, dx: f64, dy: f64) {
        match self {
            Geometry::Path { anchors, .. } => {
                for anchor in anchors.iter_mut() {
                    *anchor = anchor.translated(dx, dy);
                }
            }
            Geometry::Shape { origin, .. } => *origin = origin.translated(dx, dy),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Style {
    pub fill: Option<String>,
    pub stroke: Option<String>,
    pub stroke_width: f64,
    pub opacity: f64,
}

impl Default for Style {
    fn default() -> Self {
        Self {
            fill: None,
            stroke: Some("#000000".to_string()),
            stroke_width: 1.0,
            opacity: 1.0,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct VectorObject {
    pub id: String,
    pub layer_id: String,
    pub geometry: Geometry,
    pub style: Style,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Viewport {
    pub pan_x: f64,
    pub pan_y: f64,
    pub zoom: f64,
}

impl Default for Viewport {
    fn default() -> Self {
        Self {
            pan_x: 0.0,
            pan_y: 0.0,
            zoom: 1.0,
        }
    }
}

/// In-memory reconstruction of a document
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct DocumentState {
    pub layers: BTreeMap<String, Layer>,
    pub objects: BTreeMap<String, VectorObject>,
    pub selection: BTreeSet<String>,
    pub viewport: Viewport,
}

impl DocumentState {
    /// Canonical empty state (sequence 0)
    pub fn new() -> Self {
        Self::default()
    }

    /// Objects on a layer, in id order
    pub fn objects_on_layer<'a>(
        &'a self,
        layer_id: &'a str,
    ) -> impl Iterator<Item = &'a VectorObject> + 'a {
        self.objects
            .values()
            .filter(move |object| object.layer_id == layer_id)
    }

    pub fn is_empty(&self) -> bool {
        self.layers.is_empty() && self.objects.is_empty() && self.selection.is_empty()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_geometry_translate_moves_every_anchor() {
        let mut geometry = Geometry::Path {
            anchors: vec![Point::new(0.0, 0.0), Point::new(10.0, 5.0)],
            closed: false,
        };
        geometry.translate(1.0, -1.0);

        assert_eq!(
            geometry,
            Geometry::Path {
                anchors: vec![Point::new(1.0, -1.0), Point::new(11.0, 4.0)],
                closed: false,
            }
        );
    }

    #[test]
    fn test_serialization_is_order_independent_of_insertion() {
        let mut a = DocumentState::new();
        let mut b = DocumentState::new();
        for id in ["l2", "l1"] {
            a.layers.insert(
                id.to_string(),
                Layer {
                    id: id.to_string(),
                    name: id.to_string(),
                    created_at_sequence: 1,
                },
            );
        }
        for id in ["l1", "l2"] {
            b.layers.insert(
                id.to_string(),
                Layer {
                    id: id.to_string(),
                    name: id.to_string(),
                    created_at_sequence: 1,
                },
            );
        }

        assert_eq!(
            serde_json::to_vec(&a).unwrap(),
            serde_json::to_vec(&b).unwrap()
        );
    }
}
