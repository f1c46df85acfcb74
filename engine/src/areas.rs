use serde_json::json;
use tracing::{debug, warn};

use crate::colors::hex_css;
use crate::config::{AreaPaint, EngineConfig, LayerNames};
use crate::error::SurfaceError;
use crate::geojson::{Feature, FeatureCollection};
use crate::model::Area;
use crate::surface::{LayerKind, LayerSpec, LayerSurface};

/// Feature-state key driving the fill opacity rule.
pub const HOVER_STATE: &str = "hover";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct AreaReport {
    pub rendered: usize,
    pub skipped_invalid: usize,
    /// The source was created on this pass (as opposed to updated).
    pub created: bool,
    pub cleared: bool,
    pub failed: bool,
}

/// Renders every area as one feature collection behind a fill layer and an
/// outline layer. Create once, then replace data wholesale.
#[derive(Debug, Clone)]
pub struct AreaLayerManager {
    names: LayerNames,
    paint: AreaPaint,
    hovered: Option<String>,
}

impl Default for AreaLayerManager {
    fn default() -> Self {
        Self::new(LayerNames::default(), AreaPaint::default())
    }
}

impl AreaLayerManager {
    pub fn new(names: LayerNames, paint: AreaPaint) -> Self {
        Self {
            names,
            paint,
            hovered: None,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.layers.clone(), config.area_paint.clone())
    }

    pub fn hovered(&self) -> Option<&str> {
        self.hovered.as_deref()
    }

    pub fn fill_layer_spec(&self) -> LayerSpec {
        let (r, g, b) = self.paint.fill_color;
        LayerSpec {
            id: self.names.area_fill.clone(),
            kind: LayerKind::Fill,
            source: self.names.area_source.clone(),
            paint: json!({
                "fill-color": hex_css(r, g, b),
                "fill-opacity": [
                    "case",
                    ["boolean", ["feature-state", HOVER_STATE], false],
                    self.paint.fill_opacity_hover,
                    self.paint.fill_opacity
                ]
            }),
        }
    }

    pub fn outline_layer_spec(&self) -> LayerSpec {
        let (r, g, b) = self.paint.outline_color;
        LayerSpec {
            id: self.names.area_outline.clone(),
            kind: LayerKind::Line,
            source: self.names.area_source.clone(),
            paint: json!({
                "line-color": hex_css(r, g, b),
                "line-width": self.paint.outline_width
            }),
        }
    }

    /// One feature per area with a valid geometry.
    pub fn build_collection(&self, areas: &[Area]) -> (FeatureCollection, usize) {
        let mut skipped = 0;
        let collection = areas
            .iter()
            .filter(|area| match area.geometry.validate() {
                Ok(()) => true,
                Err(e) => {
                    skipped += 1;
                    warn!(id = %area.id, error = %e, "skipping area with malformed geometry");
                    false
                }
            })
            .map(Feature::from_area)
            .collect();
        (collection, skipped)
    }

    pub fn render_areas<S>(&mut self, surface: &mut S, areas: &[Area]) -> AreaReport
    where
        S: LayerSurface + ?Sized,
    {
        let (collection, skipped_invalid) = self.build_collection(areas);
        let mut report = AreaReport {
            skipped_invalid,
            ..AreaReport::default()
        };

        if collection.is_empty() {
            report.failed = !self.clear(surface);
            report.cleared = true;
            return report;
        }

        if let Some(hovered) = self.hovered.as_deref()
            && !collection.features.iter().any(|f| f.id == hovered)
        {
            self.hovered = None;
        }

        match self.upsert(surface, &collection) {
            Ok(created) => {
                report.created = created;
                report.rendered = collection.len();
                debug!(areas = report.rendered, created, "rendered area layers");
            }
            Err(e) => {
                report.failed = true;
                warn!(error = %e, "failed to render area layers");
            }
        }
        report
    }

    fn upsert<S>(&self, surface: &mut S, data: &FeatureCollection) -> Result<bool, SurfaceError>
    where
        S: LayerSurface + ?Sized,
    {
        let source = &self.names.area_source;
        let created = if surface.has_source(source) {
            surface.set_source_data(source, data)?;
            false
        } else {
            surface.add_source(source, data)?;
            true
        };

        for spec in [self.fill_layer_spec(), self.outline_layer_spec()] {
            if !surface.has_layer(&spec.id) {
                surface.add_layer(&spec)?;
            }
        }
        Ok(created)
    }

    /// Remove fill layer, outline layer and source, in that order, skipping
    /// whatever is absent. Returns `false` if any removal failed.
    pub fn clear<S>(&mut self, surface: &mut S) -> bool
    where
        S: LayerSurface + ?Sized,
    {
        self.hovered = None;
        let mut ok = true;

        for layer in [&self.names.area_fill, &self.names.area_outline] {
            if surface.has_layer(layer)
                && let Err(e) = surface.remove_layer(layer)
            {
                ok = false;
                warn!(layer = %layer, error = %e, "failed to remove area layer");
            }
        }

        let source = &self.names.area_source;
        if surface.has_source(source)
            && let Err(e) = surface.remove_source(source)
        {
            ok = false;
            warn!(source = %source, error = %e, "failed to remove area source");
        }
        ok
    }

    /// Move the hover highlight to `area_id` (or nowhere).
    pub fn set_hovered<S>(&mut self, surface: &mut S, area_id: Option<&str>)
    where
        S: LayerSurface + ?Sized,
    {
        if self.hovered.as_deref() == area_id {
            return;
        }
        let source = &self.names.area_source;
        if !surface.has_source(source) {
            self.hovered = None;
            return;
        }

        if let Some(previous) = self.hovered.take()
            && let Err(e) = surface.set_feature_state(source, &previous, HOVER_STATE, false)
        {
            warn!(id = %previous, error = %e, "failed to clear area hover state");
        }
        if let Some(id) = area_id {
            match surface.set_feature_state(source, id, HOVER_STATE, true) {
                Ok(()) => self.hovered = Some(id.to_string()),
                Err(e) => warn!(id, error = %e, "failed to set area hover state"),
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::{DEFAULT_AREA_FILL_LAYER, DEFAULT_AREA_OUTLINE_LAYER, DEFAULT_AREA_SOURCE};
    use crate::model::Geometry;
    use crate::testing::{RecordingSurface, SurfaceCall, unit_square};

    fn area(id: &str, x: f64) -> Area {
        Area::new(id, unit_square(x, 0.0))
    }

    #[test]
    fn repeated_render_creates_layers_once() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();

        let first = manager.render_areas(&mut surface, &[area("a", 0.0)]);
        let second = manager.render_areas(&mut surface, &[area("a", 0.0)]);

        assert!(first.created);
        assert!(!second.created);
        assert_eq!(
            surface.take_calls(),
            vec![
                SurfaceCall::AddSource {
                    name: DEFAULT_AREA_SOURCE.to_string(),
                    features: 1
                },
                SurfaceCall::AddLayer(DEFAULT_AREA_FILL_LAYER.to_string()),
                SurfaceCall::AddLayer(DEFAULT_AREA_OUTLINE_LAYER.to_string()),
                SurfaceCall::SetSourceData {
                    name: DEFAULT_AREA_SOURCE.to_string(),
                    features: 1
                },
            ]
        );
    }

    #[test]
    fn update_replaces_data_wholesale() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();

        manager.render_areas(&mut surface, &[area("a", 0.0)]);
        let report = manager.render_areas(&mut surface, &[area("b", 3.0), area("c", 6.0)]);

        assert_eq!(report.rendered, 2);
        let ids: Vec<_> = surface.sources[DEFAULT_AREA_SOURCE]
            .features
            .iter()
            .map(|f| f.id.as_str())
            .collect();
        assert_eq!(ids, vec!["b", "c"]);
    }

    #[test]
    fn missing_layer_is_recreated_without_duplicates() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();

        manager.render_areas(&mut surface, &[area("a", 0.0)]);
        surface.layers.remove(DEFAULT_AREA_OUTLINE_LAYER);
        surface.take_calls();
        manager.render_areas(&mut surface, &[area("a", 0.0)]);

        let calls = surface.take_calls();
        assert_eq!(
            calls[1],
            SurfaceCall::AddLayer(DEFAULT_AREA_OUTLINE_LAYER.to_string())
        );
        assert_eq!(calls.len(), 2);
    }

    #[test]
    fn empty_snapshot_removes_layers_then_source() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();

        manager.render_areas(&mut surface, &[area("a", 0.0)]);
        surface.take_calls();
        let report = manager.render_areas(&mut surface, &[]);

        assert!(report.cleared);
        assert!(!report.failed);
        assert_eq!(
            surface.take_calls(),
            vec![
                SurfaceCall::RemoveLayer(DEFAULT_AREA_FILL_LAYER.to_string()),
                SurfaceCall::RemoveLayer(DEFAULT_AREA_OUTLINE_LAYER.to_string()),
                SurfaceCall::RemoveSource(DEFAULT_AREA_SOURCE.to_string()),
            ]
        );
        assert!(surface.sources.is_empty());
        assert!(surface.layers.is_empty());
    }

    #[test]
    fn empty_snapshot_on_bare_surface_is_silent() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();

        let report = manager.render_areas(&mut surface, &[]);

        assert!(report.cleared);
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn malformed_area_is_skipped_and_the_rest_render() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();
        let broken = Area::new("broken", Geometry::Polygon(vec![vec![[0.0, 0.0], [1.0, 1.0]]]));

        let report = manager.render_areas(&mut surface, &[broken, area("ok", 0.0)]);

        assert_eq!(report.skipped_invalid, 1);
        assert_eq!(report.rendered, 1);
        assert_eq!(surface.sources[DEFAULT_AREA_SOURCE].features[0].id, "ok");
    }

    #[test]
    fn adapter_failure_is_absorbed() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();
        surface.fail("add_layer");

        let report = manager.render_areas(&mut surface, &[area("a", 0.0)]);

        assert!(report.failed);
        assert!(surface.layers.is_empty());

        surface.failing.clear();
        let report = manager.render_areas(&mut surface, &[area("a", 0.0)]);
        assert!(!report.failed);
        assert_eq!(surface.layers.len(), 2);
    }

    #[test]
    fn fill_opacity_follows_hover_state() {
        let spec = AreaLayerManager::default().fill_layer_spec();
        assert_eq!(spec.paint["fill-opacity"][0], "case");
        assert_eq!(spec.paint["fill-opacity"][1][1][1], HOVER_STATE);
        assert_eq!(spec.paint["fill-color"], "#2563eb");
    }

    #[test]
    fn hover_moves_between_areas() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();
        manager.render_areas(&mut surface, &[area("a", 0.0), area("b", 3.0)]);
        surface.take_calls();

        manager.set_hovered(&mut surface, Some("a"));
        manager.set_hovered(&mut surface, Some("a"));
        manager.set_hovered(&mut surface, Some("b"));
        manager.set_hovered(&mut surface, None);

        assert_eq!(
            surface.take_calls(),
            vec![
                SurfaceCall::SetFeatureState {
                    feature: "a".to_string(),
                    value: true
                },
                SurfaceCall::SetFeatureState {
                    feature: "a".to_string(),
                    value: false
                },
                SurfaceCall::SetFeatureState {
                    feature: "b".to_string(),
                    value: true
                },
                SurfaceCall::SetFeatureState {
                    feature: "b".to_string(),
                    value: false
                },
            ]
        );
        assert_eq!(manager.hovered(), None);
    }

    #[test]
    fn hovered_area_is_forgotten_when_it_disappears() {
        let mut surface = RecordingSurface::new();
        let mut manager = AreaLayerManager::default();
        manager.render_areas(&mut surface, &[area("a", 0.0), area("b", 3.0)]);
        manager.set_hovered(&mut surface, Some("a"));

        manager.render_areas(&mut surface, &[area("b", 3.0)]);

        assert_eq!(manager.hovered(), None);
    }
}
