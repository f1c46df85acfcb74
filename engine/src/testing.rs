//! Recording fakes shared by the unit tests.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use crate::draw::DrawObserver;
use crate::error::SurfaceError;
use crate::geojson::FeatureCollection;
use crate::model::{Bounds, Geometry, LatLng};
use crate::surface::{DrawTool, LayerSpec, LayerSurface, LibraryMode, MarkerOptions, MarkerSurface};

#[derive(Debug, Clone, PartialEq)]
pub enum SurfaceCall {
    AddMarker {
        id: String,
        coords: LatLng,
        handle: Option<u32>,
        content: Option<String>,
    },
    RemoveMarker(String),
    UpdateMarkerContent {
        id: String,
        content: String,
    },
    AddLayer(String),
    RemoveLayer(String),
    AddSource {
        name: String,
        features: usize,
    },
    SetSourceData {
        name: String,
        features: usize,
    },
    RemoveSource(String),
    SetFeatureState {
        feature: String,
        value: bool,
    },
    ChangeMode(String),
    AddFeature,
    DeleteAll,
    FitBounds(Bounds),
}

impl SurfaceCall {
    pub fn is_marker_call(&self) -> bool {
        matches!(
            self,
            Self::AddMarker { .. } | Self::RemoveMarker(_) | Self::UpdateMarkerContent { .. }
        )
    }

    pub fn marker_id(&self) -> Option<&str> {
        match self {
            Self::AddMarker { id, .. }
            | Self::RemoveMarker(id)
            | Self::UpdateMarkerContent { id, .. } => Some(id),
            _ => None,
        }
    }
}

/// In-memory surface that records every call and can be told to fail.
#[derive(Debug, Default)]
pub struct RecordingSurface {
    pub calls: Vec<SurfaceCall>,
    pub markers: BTreeMap<String, (LatLng, String)>,
    pub layers: BTreeSet<String>,
    pub sources: BTreeMap<String, FeatureCollection>,
    pub features: BTreeMap<String, Geometry>,
    pub mode: Option<String>,
    /// Operation names that return an error instead of applying.
    pub failing: HashSet<&'static str>,
    next_feature: u32,
}

impl RecordingSurface {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn take_calls(&mut self) -> Vec<SurfaceCall> {
        std::mem::take(&mut self.calls)
    }

    pub fn fail(&mut self, operation: &'static str) {
        self.failing.insert(operation);
    }

    fn check(&self, operation: &'static str) -> Result<(), SurfaceError> {
        if self.failing.contains(operation) {
            return Err(SurfaceError::rejected(operation, "injected failure"));
        }
        Ok(())
    }
}

impl MarkerSurface for RecordingSurface {
    type Handle = u32;

    fn add_marker(
        &mut self,
        id: &str,
        coords: LatLng,
        opts: MarkerOptions<u32>,
    ) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::AddMarker {
            id: id.to_string(),
            coords,
            handle: opts.handle,
            content: opts.content.clone(),
        });
        self.check("add_marker")?;
        self.markers
            .insert(id.to_string(), (coords, opts.content.unwrap_or_default()));
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::RemoveMarker(id.to_string()));
        self.check("remove_marker")?;
        self.markers
            .remove(id)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::MissingMarker(id.to_string()))
    }

    fn update_marker_content(&mut self, id: &str, content: &str) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::UpdateMarkerContent {
            id: id.to_string(),
            content: content.to_string(),
        });
        self.check("update_marker_content")?;
        let marker = self
            .markers
            .get_mut(id)
            .ok_or_else(|| SurfaceError::MissingMarker(id.to_string()))?;
        marker.1 = content.to_string();
        Ok(())
    }
}

impl LayerSurface for RecordingSurface {
    fn has_layer(&self, name: &str) -> bool {
        self.layers.contains(name)
    }

    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::AddLayer(spec.id.clone()));
        self.check("add_layer")?;
        if !self.sources.contains_key(&spec.source) {
            return Err(SurfaceError::MissingSource(spec.source.clone()));
        }
        self.layers.insert(spec.id.clone());
        Ok(())
    }

    fn remove_layer(&mut self, name: &str) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::RemoveLayer(name.to_string()));
        self.check("remove_layer")?;
        if !self.layers.remove(name) {
            return Err(SurfaceError::MissingLayer(name.to_string()));
        }
        Ok(())
    }

    fn has_source(&self, name: &str) -> bool {
        self.sources.contains_key(name)
    }

    fn add_source(&mut self, name: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::AddSource {
            name: name.to_string(),
            features: data.len(),
        });
        self.check("add_source")?;
        self.sources.insert(name.to_string(), data.clone());
        Ok(())
    }

    fn set_source_data(
        &mut self,
        name: &str,
        data: &FeatureCollection,
    ) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::SetSourceData {
            name: name.to_string(),
            features: data.len(),
        });
        self.check("set_source_data")?;
        let source = self
            .sources
            .get_mut(name)
            .ok_or_else(|| SurfaceError::MissingSource(name.to_string()))?;
        *source = data.clone();
        Ok(())
    }

    fn remove_source(&mut self, name: &str) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::RemoveSource(name.to_string()));
        self.check("remove_source")?;
        if self.layers.iter().any(|layer| layer.starts_with(name)) {
            return Err(SurfaceError::rejected(
                "remove_source",
                "source still in use by a layer",
            ));
        }
        self.sources
            .remove(name)
            .map(|_| ())
            .ok_or_else(|| SurfaceError::MissingSource(name.to_string()))
    }

    fn set_feature_state(
        &mut self,
        _source: &str,
        feature_id: &str,
        _key: &str,
        value: bool,
    ) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::SetFeatureState {
            feature: feature_id.to_string(),
            value,
        });
        self.check("set_feature_state")
    }
}

impl DrawTool for RecordingSurface {
    fn change_mode(&mut self, mode: &LibraryMode) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::ChangeMode(mode.to_string()));
        self.check("change_mode")?;
        self.mode = Some(mode.to_string());
        Ok(())
    }

    fn add_feature(&mut self, geometry: &Geometry) -> Result<Option<String>, SurfaceError> {
        self.calls.push(SurfaceCall::AddFeature);
        self.check("add_feature")?;
        self.next_feature += 1;
        let id = format!("feature-{}", self.next_feature);
        self.features.insert(id.clone(), geometry.clone());
        Ok(Some(id))
    }

    fn delete_all(&mut self) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::DeleteAll);
        self.check("delete_all")?;
        self.features.clear();
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<(), SurfaceError> {
        self.calls.push(SurfaceCall::FitBounds(bounds));
        self.check("fit_bounds")
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum Notification {
    PolygonChanged(Option<Geometry>),
    Saved(Geometry),
    Cancelled,
}

/// Draw observer that records every callback.
#[derive(Debug, Default)]
pub struct RecordingObserver {
    pub notifications: Vec<Notification>,
}

impl DrawObserver for RecordingObserver {
    fn on_polygon_change(&mut self, geometry: Option<&Geometry>) {
        self.notifications
            .push(Notification::PolygonChanged(geometry.cloned()));
    }

    fn on_save(&mut self, geometry: &Geometry) {
        self.notifications.push(Notification::Saved(geometry.clone()));
    }

    fn on_cancel(&mut self) {
        self.notifications.push(Notification::Cancelled);
    }
}

pub fn unit_square(x: f64, y: f64) -> Geometry {
    Geometry::Polygon(vec![vec![
        [x, y],
        [x + 1.0, y],
        [x + 1.0, y + 1.0],
        [x, y + 1.0],
        [x, y],
    ]])
}
