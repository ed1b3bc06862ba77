pub mod event;
pub mod metadata;
pub mod state;

pub use event::{Event, EventKind, NewEvent};
pub use metadata::DocumentMetadata;
pub use state::{DocumentState, Geometry, Layer, Point, ShapeKind, Style, VectorObject, Viewport};
