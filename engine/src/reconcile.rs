use std::collections::BTreeMap;

use tracing::{debug, warn};

use crate::config::{DEFAULT_KEY_PRECISION, EngineConfig, MovePolicy};
use crate::error::SurfaceError;
use crate::markers::MarkerFactory;
use crate::model::{LatLng, Pin};
use crate::surface::{MarkerOptions, MarkerSurface};

/// One entry of the change-detection key: id plus position quantized to the
/// key precision.
#[derive(Debug, Clone, PartialEq, Eq)]
struct KeyEntry {
    id: String,
    lat: i64,
    lng: i64,
}

#[derive(Debug, Clone)]
struct RenderedMarker<H> {
    /// Kept alive for the surface; never inspected here.
    _handle: Option<H>,
    content: String,
    position: (i64, i64),
}

/// Counts for one reconcile pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct ReconcileReport {
    /// The snapshot matched the previous one; nothing was touched.
    pub skipped: bool,
    pub added: usize,
    pub removed: usize,
    pub refreshed: usize,
    /// Survivors re-added at a new position (`MovePolicy::Recreate` only).
    pub moved: usize,
    pub dropped_invalid: usize,
    pub failed: usize,
}

/// Keeps the markers on one surface in step with the latest pin snapshot.
///
/// Owns the record of what is on screen; one instance per surface.
#[derive(Debug)]
pub struct Reconciler<H> {
    rendered: BTreeMap<String, RenderedMarker<H>>,
    last_key: Option<Vec<KeyEntry>>,
    scale: f64,
    move_policy: MovePolicy,
}

impl<H> Default for Reconciler<H> {
    fn default() -> Self {
        Self::new(DEFAULT_KEY_PRECISION, MovePolicy::default())
    }
}

impl<H> Reconciler<H> {
    pub fn new(key_precision: u32, move_policy: MovePolicy) -> Self {
        Self {
            rendered: BTreeMap::new(),
            last_key: None,
            scale: 10f64.powi(key_precision as i32),
            move_policy,
        }
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self::new(config.key_precision, config.move_policy)
    }

    pub fn rendered_ids(&self) -> impl Iterator<Item = &str> {
        self.rendered.keys().map(String::as_str)
    }

    pub fn is_rendered(&self, id: &str) -> bool {
        self.rendered.contains_key(id)
    }

    pub fn rendered_count(&self) -> usize {
        self.rendered.len()
    }

    /// Last content applied to a rendered marker.
    pub fn rendered_content(&self, id: &str) -> Option<&str> {
        self.rendered.get(id).map(|marker| marker.content.as_str())
    }

    /// Forget the change-detection key so the next snapshot is applied even if
    /// it is identical (e.g. after the surface reloaded its style).
    pub fn invalidate(&mut self) {
        self.last_key = None;
    }

    fn quantize(&self, coords: LatLng) -> (i64, i64) {
        (
            (coords.lat * self.scale).round() as i64,
            (coords.lng * self.scale).round() as i64,
        )
    }
}

impl<H: Clone> Reconciler<H> {
    pub fn reconcile<S, F>(&mut self, surface: &mut S, factory: &F, pins: &[Pin]) -> ReconcileReport
    where
        S: MarkerSurface<Handle = H> + ?Sized,
        F: MarkerFactory<H> + ?Sized,
    {
        let mut report = ReconcileReport::default();

        let mut current: BTreeMap<&str, &Pin> = BTreeMap::new();
        for pin in pins {
            if !pin.has_valid_coordinates() {
                report.dropped_invalid += 1;
                debug!(id = %pin.id, "skipping pin with non-finite coordinates");
                continue;
            }
            if current.contains_key(pin.id.as_str()) {
                debug!(id = %pin.id, "ignoring duplicate pin id in snapshot");
                continue;
            }
            current.insert(pin.id.as_str(), pin);
        }

        let key: Vec<KeyEntry> = current
            .iter()
            .map(|(id, pin)| {
                let (lat, lng) = self.quantize(pin.coordinates);
                KeyEntry {
                    id: (*id).to_string(),
                    lat,
                    lng,
                }
            })
            .collect();

        if self.last_key.as_ref() == Some(&key) {
            report.skipped = true;
            return report;
        }

        let stale: Vec<String> = self
            .rendered
            .keys()
            .filter(|id| !current.contains_key(id.as_str()))
            .cloned()
            .collect();
        for id in stale {
            if self.remove_one(surface, &id) {
                report.removed += 1;
            } else {
                report.failed += 1;
            }
        }

        for entry in &key {
            let Some(&pin) = current.get(entry.id.as_str()) else {
                continue;
            };
            let position = (entry.lat, entry.lng);

            let moved = self
                .rendered
                .get(&entry.id)
                .is_some_and(|marker| marker.position != position);
            if moved && self.move_policy == MovePolicy::Recreate {
                if !self.remove_one(surface, &entry.id) {
                    report.failed += 1;
                    continue;
                }
                if self.add_one(surface, factory, pin, position, &mut report) {
                    report.moved += 1;
                } else {
                    report.removed += 1;
                }
                continue;
            }

            if let Some(marker) = self.rendered.get_mut(&entry.id) {
                let content = factory.content(pin);
                match surface.update_marker_content(&entry.id, &content) {
                    Ok(()) => {
                        marker.content = content;
                        report.refreshed += 1;
                    }
                    Err(e) => {
                        report.failed += 1;
                        warn!(id = %entry.id, error = %e, "failed to refresh marker content");
                        // Gone from the surface; the next pass adds it again.
                        if matches!(e, SurfaceError::MissingMarker(_)) {
                            self.rendered.remove(&entry.id);
                        }
                    }
                }
            } else if self.add_one(surface, factory, pin, position, &mut report) {
                report.added += 1;
            }
        }

        // A failed call leaves the screen behind the record; let the next
        // snapshot retry even if it is identical.
        self.last_key = if report.failed == 0 { Some(key) } else { None };

        debug!(
            added = report.added,
            removed = report.removed,
            refreshed = report.refreshed,
            moved = report.moved,
            dropped_invalid = report.dropped_invalid,
            failed = report.failed,
            "reconciled pin snapshot"
        );
        report
    }

    fn add_one<S, F>(
        &mut self,
        surface: &mut S,
        factory: &F,
        pin: &Pin,
        position: (i64, i64),
        report: &mut ReconcileReport,
    ) -> bool
    where
        S: MarkerSurface<Handle = H> + ?Sized,
        F: MarkerFactory<H> + ?Sized,
    {
        let visual = factory.create(pin);
        let opts = MarkerOptions {
            handle: visual.handle.clone(),
            content: Some(visual.content.clone()),
        };
        match surface.add_marker(&pin.id, pin.coordinates, opts) {
            Ok(()) => {
                self.rendered.insert(
                    pin.id.clone(),
                    RenderedMarker {
                        _handle: visual.handle,
                        content: visual.content,
                        position,
                    },
                );
                true
            }
            Err(e) => {
                report.failed += 1;
                warn!(id = %pin.id, error = %e, "failed to add marker");
                false
            }
        }
    }

    /// Drops the record only once the marker is off the surface. A marker the
    /// surface no longer knows counts as removed.
    fn remove_one<S>(&mut self, surface: &mut S, id: &str) -> bool
    where
        S: MarkerSurface<Handle = H> + ?Sized,
    {
        match surface.remove_marker(id) {
            Ok(()) | Err(SurfaceError::MissingMarker(_)) => {
                self.rendered.remove(id);
                true
            }
            Err(e) => {
                warn!(id, error = %e, "failed to remove marker");
                false
            }
        }
    }

    /// Remove every rendered marker and forget all state, including records
    /// whose removal failed. Returns how many markers were removed.
    pub fn clear<S>(&mut self, surface: &mut S) -> usize
    where
        S: MarkerSurface<Handle = H> + ?Sized,
    {
        let ids: Vec<String> = self.rendered.keys().cloned().collect();
        let removed = ids
            .iter()
            .filter(|id| self.remove_one(surface, id))
            .count();
        self.rendered.clear();
        self.last_key = None;
        removed
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::markers::{LabelMarkerFactory, MarkerVisual};
    use crate::testing::{RecordingSurface, SurfaceCall};

    fn reconciler() -> Reconciler<u32> {
        Reconciler::default()
    }

    fn pins(ids: &[(&str, f64, f64)]) -> Vec<Pin> {
        ids.iter()
            .map(|(id, lat, lng)| Pin::new(*id, *lat, *lng).with_label(id.to_uppercase()))
            .collect()
    }

    /// Hands out increasing handle numbers so tests can see them travel.
    struct HandleFactory {
        next: std::cell::Cell<u32>,
    }

    impl MarkerFactory<u32> for HandleFactory {
        fn content(&self, pin: &Pin) -> String {
            format!("pin:{}", pin.id)
        }

        fn create(&self, pin: &Pin) -> MarkerVisual<u32> {
            let handle = self.next.get();
            self.next.set(handle + 1);
            MarkerVisual {
                handle: Some(handle),
                content: self.content(pin),
            }
        }
    }

    #[test]
    fn identical_snapshot_issues_no_calls() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        let snapshot = pins(&[("a", 48.85, 2.35), ("b", 45.76, 4.83)]);

        let first = r.reconcile(&mut surface, &factory, &snapshot);
        assert_eq!(first.added, 2);
        surface.take_calls();

        let second = r.reconcile(&mut surface, &factory, &snapshot);
        assert!(second.skipped);
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn sub_precision_jitter_is_ignored() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();

        r.reconcile(&mut surface, &factory, &pins(&[("a", 48.850_000_1, 2.35)]));
        surface.take_calls();
        let report = r.reconcile(&mut surface, &factory, &pins(&[("a", 48.850_000_4, 2.35)]));

        assert!(report.skipped);
        assert!(surface.calls.is_empty());
    }

    #[test]
    fn minimal_churn_removes_adds_and_refreshes_once() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();

        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));
        surface.take_calls();

        let report = r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0), ("c", 3.0, 3.0)]));
        let calls = surface.take_calls();

        assert_eq!(calls.len(), 3);
        assert_eq!(calls[0], SurfaceCall::RemoveMarker("b".to_string()));
        let adds: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::AddMarker { .. }))
            .collect();
        assert_eq!(adds.len(), 1);
        assert_eq!(adds[0].marker_id(), Some("c"));
        let updates: Vec<_> = calls
            .iter()
            .filter(|c| matches!(c, SurfaceCall::UpdateMarkerContent { .. }))
            .collect();
        assert_eq!(updates.len(), 1);
        assert_eq!(updates[0].marker_id(), Some("a"));

        assert_eq!(
            report,
            ReconcileReport {
                added: 1,
                removed: 1,
                refreshed: 1,
                ..ReconcileReport::default()
            }
        );
        assert_eq!(r.rendered_ids().collect::<Vec<_>>(), vec!["a", "c"]);
    }

    #[test]
    fn removals_precede_additions() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();

        r.reconcile(&mut surface, &factory, &pins(&[("z", 1.0, 1.0)]));
        surface.take_calls();
        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));

        let calls = surface.take_calls();
        assert_eq!(calls[0], SurfaceCall::RemoveMarker("z".to_string()));
        assert_eq!(calls[1].marker_id(), Some("a"));
    }

    #[test]
    fn surviving_pin_keeps_its_position_when_moved() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();

        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));
        surface.take_calls();
        let report = r.reconcile(&mut surface, &factory, &pins(&[("a", 5.0, 5.0)]));

        let calls = surface.take_calls();
        assert_eq!(calls.len(), 1);
        assert!(matches!(&calls[0], SurfaceCall::UpdateMarkerContent { id, .. } if id == "a"));
        assert_eq!(report.moved, 0);
        assert_eq!(surface.markers["a"].0, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn recreate_policy_moves_surviving_pin() {
        let mut surface = RecordingSurface::new();
        let mut r: Reconciler<u32> = Reconciler::new(DEFAULT_KEY_PRECISION, MovePolicy::Recreate);
        let factory = LabelMarkerFactory::default();

        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));
        surface.take_calls();
        let report = r.reconcile(&mut surface, &factory, &pins(&[("a", 5.0, 5.0), ("b", 2.0, 2.0)]));

        let calls = surface.take_calls();
        assert_eq!(calls[0], SurfaceCall::RemoveMarker("a".to_string()));
        assert!(
            matches!(&calls[1], SurfaceCall::AddMarker { id, coords, .. } if id == "a" && *coords == LatLng::new(5.0, 5.0))
        );
        assert!(matches!(&calls[2], SurfaceCall::UpdateMarkerContent { id, .. } if id == "b"));
        assert_eq!(
            report,
            ReconcileReport {
                moved: 1,
                refreshed: 1,
                ..ReconcileReport::default()
            }
        );
    }

    #[test]
    fn non_finite_pins_never_reach_the_surface() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        let mut snapshot = pins(&[("good", 1.0, 1.0), ("bad", 0.0, 0.0), ("worse", 0.0, 0.0)]);
        snapshot[1].coordinates.lat = f64::NAN;
        snapshot[2].coordinates.lng = f64::INFINITY;

        let report = r.reconcile(&mut surface, &factory, &snapshot);

        assert_eq!(report.dropped_invalid, 2);
        assert_eq!(report.added, 1);
        assert!(
            surface
                .calls
                .iter()
                .all(|call| call.marker_id() == Some("good"))
        );
    }

    #[test]
    fn pin_that_turns_invalid_is_removed() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();

        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));
        let mut snapshot = pins(&[("a", 1.0, 1.0)]);
        snapshot[0].coordinates.lat = f64::NAN;
        r.reconcile(&mut surface, &factory, &snapshot);

        assert!(!r.is_rendered("a"));
        assert!(surface.markers.is_empty());
    }

    #[test]
    fn duplicate_ids_keep_first_occurrence() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();

        let report = r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0), ("a", 9.0, 9.0)]));

        assert_eq!(report.added, 1);
        assert_eq!(surface.markers["a"].0, LatLng::new(1.0, 1.0));
    }

    #[test]
    fn factory_handle_is_passed_on_add_only() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = HandleFactory {
            next: std::cell::Cell::new(7),
        };

        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));
        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]));

        let calls = surface.take_calls();
        assert_eq!(
            calls,
            vec![
                SurfaceCall::AddMarker {
                    id: "a".to_string(),
                    coords: LatLng::new(1.0, 1.0),
                    handle: Some(7),
                    content: Some("pin:a".to_string()),
                },
                SurfaceCall::UpdateMarkerContent {
                    id: "a".to_string(),
                    content: "pin:a".to_string(),
                },
                SurfaceCall::AddMarker {
                    id: "b".to_string(),
                    coords: LatLng::new(2.0, 2.0),
                    handle: Some(8),
                    content: Some("pin:b".to_string()),
                },
            ]
        );
        assert_eq!(r.rendered_content("b"), Some("pin:b"));
    }

    #[test]
    fn failed_add_is_retried_on_next_snapshot() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        let snapshot = pins(&[("a", 1.0, 1.0)]);

        surface.fail("add_marker");
        let report = r.reconcile(&mut surface, &factory, &snapshot);
        assert_eq!(report.failed, 1);
        assert!(!r.is_rendered("a"));

        surface.failing.clear();
        let report = r.reconcile(&mut surface, &factory, &snapshot);
        assert!(!report.skipped);
        assert_eq!(report.added, 1);
        assert!(r.is_rendered("a"));
    }

    #[test]
    fn failed_removal_keeps_the_record_and_is_retried() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));

        surface.fail("remove_marker");
        let report = r.reconcile(&mut surface, &factory, &[]);
        assert_eq!(report.failed, 1);
        assert_eq!(report.removed, 0);
        assert!(r.is_rendered("a"));
        assert!(surface.markers.contains_key("a"));

        surface.failing.clear();
        let report = r.reconcile(&mut surface, &factory, &[]);
        assert!(!report.skipped);
        assert_eq!(report.removed, 1);
        assert!(!r.is_rendered("a"));
        assert!(surface.markers.is_empty());
    }

    #[test]
    fn marker_already_gone_from_surface_counts_as_removed() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));
        surface.markers.clear();

        let report = r.reconcile(&mut surface, &factory, &[]);

        assert_eq!(report.removed, 1);
        assert_eq!(report.failed, 0);
        assert!(!r.is_rendered("a"));
    }

    #[test]
    fn marker_missing_on_refresh_is_added_again() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        let snapshot = pins(&[("a", 1.0, 1.0)]);
        r.reconcile(&mut surface, &factory, &snapshot);
        r.invalidate();
        surface.markers.clear();

        let report = r.reconcile(&mut surface, &factory, &snapshot);
        assert_eq!(report.failed, 1);
        assert!(!r.is_rendered("a"));

        let report = r.reconcile(&mut surface, &factory, &snapshot);
        assert!(!report.skipped);
        assert_eq!(report.added, 1);
        assert!(surface.markers.contains_key("a"));
    }

    #[test]
    fn clear_forgets_markers_even_when_removal_fails() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        r.reconcile(&mut surface, &factory, &pins(&[("a", 1.0, 1.0)]));

        surface.fail("remove_marker");
        assert_eq!(r.clear(&mut surface), 0);
        assert_eq!(r.rendered_count(), 0);
    }

    #[test]
    fn clear_removes_everything_and_resets_key() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        let snapshot = pins(&[("a", 1.0, 1.0), ("b", 2.0, 2.0)]);

        r.reconcile(&mut surface, &factory, &snapshot);
        assert_eq!(r.clear(&mut surface), 2);
        assert_eq!(r.rendered_count(), 0);
        assert!(surface.markers.is_empty());

        let report = r.reconcile(&mut surface, &factory, &snapshot);
        assert_eq!(report.added, 2);
    }

    #[test]
    fn invalidate_forces_a_refresh() {
        let mut surface = RecordingSurface::new();
        let mut r = reconciler();
        let factory = LabelMarkerFactory::default();
        let snapshot = pins(&[("a", 1.0, 1.0)]);

        r.reconcile(&mut surface, &factory, &snapshot);
        r.invalidate();
        let report = r.reconcile(&mut surface, &factory, &snapshot);

        assert!(!report.skipped);
        assert_eq!(report.refreshed, 1);
    }
}
