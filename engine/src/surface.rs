//! Capabilities the engine needs from the map canvas.
//!
//! The browser client implements these over MapLibre GL and Mapbox GL Draw;
//! tests use a recording fake. Every call is synchronous and takes effect
//! immediately.

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::SurfaceError;
use crate::geojson::FeatureCollection;
use crate::model::{Bounds, Geometry, LatLng};

/// Optional pieces handed to the surface when a marker is first placed.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerOptions<H> {
    pub handle: Option<H>,
    pub content: Option<String>,
}

impl<H> Default for MarkerOptions<H> {
    fn default() -> Self {
        Self {
            handle: None,
            content: None,
        }
    }
}

pub trait MarkerSurface {
    /// Opaque visual owned by the surface (a DOM element in the browser).
    type Handle: Clone;

    fn add_marker(
        &mut self,
        id: &str,
        coords: LatLng,
        opts: MarkerOptions<Self::Handle>,
    ) -> Result<(), SurfaceError>;

    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError>;

    fn update_marker_content(&mut self, id: &str, content: &str) -> Result<(), SurfaceError>;
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LayerKind {
    Fill,
    Line,
}

/// Style layer definition in the map library's JSON shape.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct LayerSpec {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: LayerKind,
    pub source: String,
    pub paint: serde_json::Value,
}

pub trait LayerSurface {
    fn has_layer(&self, name: &str) -> bool;
    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError>;
    fn remove_layer(&mut self, name: &str) -> Result<(), SurfaceError>;

    fn has_source(&self, name: &str) -> bool;
    fn add_source(&mut self, name: &str, data: &FeatureCollection) -> Result<(), SurfaceError>;
    fn set_source_data(&mut self, name: &str, data: &FeatureCollection)
    -> Result<(), SurfaceError>;
    fn remove_source(&mut self, name: &str) -> Result<(), SurfaceError>;

    fn set_feature_state(
        &mut self,
        source: &str,
        feature_id: &str,
        key: &str,
        value: bool,
    ) -> Result<(), SurfaceError>;
}

/// Drawing library modes the engine cares about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LibraryMode {
    DrawPolygon,
    SimpleSelect,
    DirectSelect,
    Other(String),
}

impl LibraryMode {
    pub fn parse(s: &str) -> Self {
        match s {
            "draw_polygon" => Self::DrawPolygon,
            "simple_select" => Self::SimpleSelect,
            "direct_select" => Self::DirectSelect,
            other => Self::Other(other.to_string()),
        }
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::DrawPolygon => "draw_polygon",
            Self::SimpleSelect => "simple_select",
            Self::DirectSelect => "direct_select",
            Self::Other(mode) => mode,
        }
    }
}

impl fmt::Display for LibraryMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Interactive polygon tool layered on the canvas.
pub trait DrawTool {
    fn change_mode(&mut self, mode: &LibraryMode) -> Result<(), SurfaceError>;

    /// Adds a feature and returns the id the library assigned to it, if any.
    fn add_feature(&mut self, geometry: &Geometry) -> Result<Option<String>, SurfaceError>;

    fn delete_all(&mut self) -> Result<(), SurfaceError>;

    /// Recenters the view on the given box.
    fn fit_bounds(&mut self, bounds: Bounds) -> Result<(), SurfaceError>;
}
