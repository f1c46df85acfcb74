//! Keeps an interactive map canvas in step with changing pin and area
//! snapshots, and drives polygon drawing on the same canvas.
//!
//! Everything here is surface-agnostic; the browser client supplies the
//! MapLibre implementation of the traits in [`surface`].

pub mod areas;
pub mod colors;
pub mod config;
pub mod draw;
pub mod error;
pub mod geojson;
pub mod markers;
pub mod model;
pub mod reconcile;
pub mod scheduler;
pub mod surface;
pub mod view;

#[cfg(test)]
mod testing;

pub use areas::{AreaLayerManager, AreaReport};
pub use config::{EngineConfig, LayerNames, MovePolicy};
pub use draw::{DrawEvent, DrawObserver, DrawSession, DrawState, KeyPress, Modifiers};
pub use error::{ConfigError, GeometryError, SurfaceError};
pub use markers::{LabelMarkerFactory, MarkerFactory, MarkerVisual};
pub use model::{Area, Bounds, Geometry, LatLng, Pin, Snapshot};
pub use reconcile::{ReconcileReport, Reconciler};
pub use scheduler::{ManualTimer, RenderScheduler, TimerBackend};
pub use surface::{DrawTool, LayerSurface, LibraryMode, MarkerSurface};
pub use view::{MapView, PassReport};
