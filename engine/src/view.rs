//! One map canvas: markers, area layers and the draw session over a single
//! surface, updated through a debounced render pass.

use std::cell::RefCell;
use std::rc::{Rc, Weak};

use tracing::{debug, info};

use crate::areas::{AreaLayerManager, AreaReport};
use crate::config::EngineConfig;
use crate::draw::{DrawEvent, DrawObserver, DrawSession, DrawState};
use crate::error::ConfigError;
use crate::markers::MarkerFactory;
use crate::model::{Geometry, Snapshot};
use crate::reconcile::{ReconcileReport, Reconciler};
use crate::scheduler::{RenderScheduler, TimerBackend};
use crate::surface::{DrawTool, LayerSurface, MarkerSurface};

/// Outcome of one render pass.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct PassReport {
    pub markers: ReconcileReport,
    pub areas: AreaReport,
}

struct ViewState<S: MarkerSurface, F> {
    surface: S,
    factory: F,
    reconciler: Reconciler<S::Handle>,
    areas: AreaLayerManager,
    draw: DrawSession,
    observer: Box<dyn DrawObserver>,
    last_pass: Option<PassReport>,
    destroyed: bool,
}

impl<S, F> ViewState<S, F>
where
    S: MarkerSurface + LayerSurface,
    S::Handle: Clone,
    F: MarkerFactory<S::Handle>,
{
    fn apply(&mut self, snapshot: &Snapshot) -> PassReport {
        let markers = self
            .reconciler
            .reconcile(&mut self.surface, &self.factory, &snapshot.pins);
        let areas = self.areas.render_areas(&mut self.surface, &snapshot.areas);
        let report = PassReport { markers, areas };
        self.last_pass = Some(report);
        report
    }
}

pub struct MapView<S: MarkerSurface, F, T: TimerBackend> {
    state: Rc<RefCell<ViewState<S, F>>>,
    scheduler: RenderScheduler<T>,
}

impl<S, F, T> MapView<S, F, T>
where
    S: MarkerSurface + LayerSurface + DrawTool + 'static,
    S::Handle: Clone + 'static,
    F: MarkerFactory<S::Handle> + 'static,
    T: TimerBackend + 'static,
{
    pub fn new(
        surface: S,
        factory: F,
        timer: T,
        observer: Box<dyn DrawObserver>,
        config: &EngineConfig,
    ) -> Result<Self, ConfigError> {
        config.validate()?;
        let state = ViewState {
            surface,
            factory,
            reconciler: Reconciler::from_config(config),
            areas: AreaLayerManager::from_config(config),
            draw: DrawSession::new(),
            observer,
            last_pass: None,
            destroyed: false,
        };
        Ok(Self {
            state: Rc::new(RefCell::new(state)),
            scheduler: RenderScheduler::new(timer, config.debounce_window()),
        })
    }

    /// Queue a render pass for `snapshot`. Bursts within the debounce window
    /// collapse into one pass over the latest snapshot.
    pub fn push_snapshot(&self, snapshot: Snapshot) {
        if self.is_destroyed() {
            debug!("snapshot pushed to destroyed map view, ignoring");
            return;
        }
        let weak: Weak<RefCell<ViewState<S, F>>> = Rc::downgrade(&self.state);
        self.scheduler.schedule(move || {
            let Some(state) = weak.upgrade() else {
                return;
            };
            let mut state = state.borrow_mut();
            if state.destroyed {
                return;
            }
            state.apply(&snapshot);
        });
    }

    /// Run a pass right away, dropping any queued one.
    pub fn apply_now(&self, snapshot: &Snapshot) -> Option<PassReport> {
        self.scheduler.cancel();
        let mut state = self.state.borrow_mut();
        if state.destroyed {
            return None;
        }
        Some(state.apply(snapshot))
    }

    pub fn is_pending(&self) -> bool {
        self.scheduler.is_pending()
    }

    pub fn last_pass(&self) -> Option<PassReport> {
        self.state.borrow().last_pass
    }

    pub fn draw(&self, event: DrawEvent) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.destroyed {
            return;
        }
        state
            .draw
            .handle(event, &mut state.surface, state.observer.as_mut());
    }

    pub fn sync_external_geometry(&self, geometry: Option<&Geometry>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.destroyed {
            return;
        }
        state
            .draw
            .sync_external(geometry, &mut state.surface, state.observer.as_mut());
    }

    pub fn draw_state(&self) -> DrawState {
        self.state.borrow().draw.state().clone()
    }

    pub fn set_observer(&self, observer: Box<dyn DrawObserver>) {
        self.state.borrow_mut().observer = observer;
    }

    pub fn set_hovered_area(&self, area_id: Option<&str>) {
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.destroyed {
            return;
        }
        state.areas.set_hovered(&mut state.surface, area_id);
    }

    /// Force the next pass to run even if its snapshot is unchanged, e.g.
    /// after the surface reloaded its style.
    pub fn invalidate(&self) {
        self.state.borrow_mut().reconciler.invalidate();
    }

    /// Borrow the surface, e.g. to inspect it in tests or reach the widget.
    pub fn with_surface<R>(&self, f: impl FnOnce(&S) -> R) -> R {
        f(&self.state.borrow().surface)
    }

    pub fn rendered_markers(&self) -> usize {
        self.state.borrow().reconciler.rendered_count()
    }

    pub fn is_destroyed(&self) -> bool {
        self.state.borrow().destroyed
    }

    /// Tear down in order: pending pass, markers, area layers, draw features.
    /// Safe to call more than once.
    pub fn destroy(&self) {
        self.scheduler.cancel();
        let mut guard = self.state.borrow_mut();
        let state = &mut *guard;
        if state.destroyed {
            return;
        }
        let markers = state.reconciler.clear(&mut state.surface);
        state.areas.clear(&mut state.surface);
        state.draw.reset(&mut state.surface);
        state.destroyed = true;
        info!(markers, "map view destroyed");
    }
}
