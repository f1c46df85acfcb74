//! Interactive polygon authoring.
//!
//! `transition` is a pure function from `(state, event)` to the next state plus
//! the effects to perform. `DrawSession` holds the state and carries those
//! effects out against a `DrawTool` and a `DrawObserver`.

use tracing::{debug, warn};

use crate::model::{Bounds, Geometry};
use crate::surface::{DrawTool, LibraryMode};

#[derive(Debug, Clone, Default, PartialEq)]
pub enum DrawState {
    #[default]
    Idle,
    /// The library is in polygon-creation mode; nothing finished yet.
    Drawing,
    /// A result exists and the user is dragging its vertices.
    Editing {
        geometry: Geometry,
        feature_id: Option<String>,
    },
    HasResult {
        geometry: Geometry,
        feature_id: Option<String>,
    },
}

impl DrawState {
    pub fn geometry(&self) -> Option<&Geometry> {
        match self {
            Self::Editing { geometry, .. } | Self::HasResult { geometry, .. } => Some(geometry),
            Self::Idle | Self::Drawing => None,
        }
    }

    pub fn feature_id(&self) -> Option<&str> {
        match self {
            Self::Editing { feature_id, .. } | Self::HasResult { feature_id, .. } => {
                feature_id.as_deref()
            }
            Self::Idle | Self::Drawing => None,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Drawing => "drawing",
            Self::Editing { .. } => "editing",
            Self::HasResult { .. } => "has_result",
        }
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct Modifiers {
    pub ctrl: bool,
    pub alt: bool,
    pub meta: bool,
    pub shift: bool,
}

impl Modifiers {
    pub const fn any(self) -> bool {
        self.ctrl || self.alt || self.meta || self.shift
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct KeyPress {
    /// `KeyboardEvent.key` value, e.g. `"Enter"`.
    pub key: String,
    pub modifiers: Modifiers,
}

impl KeyPress {
    pub fn plain(key: impl Into<String>) -> Self {
        Self {
            key: key.into(),
            modifiers: Modifiers::default(),
        }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawEvent {
    Start,
    /// Library finished a polygon (`draw.create`).
    GeometryCompleted {
        geometry: Geometry,
        feature_id: Option<String>,
    },
    /// Library edited the existing result (`draw.update`).
    GeometryModified { geometry: Geometry },
    /// Library removed the feature itself (`draw.delete`).
    GeometryDeleted,
    ModeChanged(LibraryMode),
    Delete,
    Save,
    Cancel,
    KeyPressed(KeyPress),
    /// Geometry pushed from outside, e.g. the stored polygon of the entity
    /// being edited.
    ExternalGeometry(Geometry),
    FeatureAssigned(String),
}

#[derive(Debug, Clone, PartialEq)]
pub enum DrawEffect {
    EnterPolygonMode,
    EnterSelectMode,
    ClearFeatures,
    AddFeature(Geometry),
    FitBounds(Bounds),
    PolygonChanged(Option<Geometry>),
    Saved(Geometry),
    Cancelled,
}

pub fn transition(state: &DrawState, event: &DrawEvent) -> (DrawState, Vec<DrawEffect>) {
    use DrawEffect as E;
    use DrawState as S;

    let unchanged = || (state.clone(), Vec::new());

    match (state, event) {
        (S::Idle, DrawEvent::Start) => (S::Drawing, vec![E::EnterPolygonMode]),
        (_, DrawEvent::Start) => unchanged(),

        (S::Drawing, DrawEvent::GeometryCompleted { geometry, feature_id }) => (
            S::HasResult {
                geometry: geometry.clone(),
                feature_id: feature_id.clone(),
            },
            vec![E::PolygonChanged(Some(geometry.clone()))],
        ),
        (_, DrawEvent::GeometryCompleted { .. }) => unchanged(),

        (S::HasResult { feature_id, .. }, DrawEvent::GeometryModified { geometry }) => (
            S::HasResult {
                geometry: geometry.clone(),
                feature_id: feature_id.clone(),
            },
            vec![E::PolygonChanged(Some(geometry.clone()))],
        ),
        (S::Editing { feature_id, .. }, DrawEvent::GeometryModified { geometry }) => (
            S::Editing {
                geometry: geometry.clone(),
                feature_id: feature_id.clone(),
            },
            vec![E::PolygonChanged(Some(geometry.clone()))],
        ),
        (_, DrawEvent::GeometryModified { .. }) => unchanged(),

        (S::Idle, DrawEvent::Delete | DrawEvent::GeometryDeleted) => unchanged(),
        (_, DrawEvent::Delete) => (
            S::Idle,
            vec![E::ClearFeatures, E::PolygonChanged(None)],
        ),
        (_, DrawEvent::GeometryDeleted) => (S::Idle, vec![E::PolygonChanged(None)]),

        (S::HasResult { geometry, .. } | S::Editing { geometry, .. }, DrawEvent::Save) => {
            (state.clone(), vec![E::Saved(geometry.clone())])
        }
        (_, DrawEvent::Save) => unchanged(),

        (S::Idle, DrawEvent::Cancel) => unchanged(),
        (_, DrawEvent::Cancel) => (
            S::Idle,
            vec![E::ClearFeatures, E::EnterSelectMode, E::Cancelled],
        ),

        (
            S::HasResult {
                geometry,
                feature_id,
            },
            DrawEvent::ModeChanged(LibraryMode::DirectSelect),
        ) => (
            S::Editing {
                geometry: geometry.clone(),
                feature_id: feature_id.clone(),
            },
            Vec::new(),
        ),
        (
            S::Editing {
                geometry,
                feature_id,
            },
            DrawEvent::ModeChanged(LibraryMode::SimpleSelect),
        ) => (
            S::HasResult {
                geometry: geometry.clone(),
                feature_id: feature_id.clone(),
            },
            Vec::new(),
        ),
        // The library dropped an unfinished polygon on its own.
        (S::Drawing, DrawEvent::ModeChanged(LibraryMode::SimpleSelect)) => (S::Idle, Vec::new()),
        (_, DrawEvent::ModeChanged(_)) => unchanged(),

        (_, DrawEvent::KeyPressed(press)) => match press.key.as_str() {
            "Enter" if !press.modifiers.any() => transition(state, &DrawEvent::Save),
            "Escape" => transition(state, &DrawEvent::Cancel),
            _ => unchanged(),
        },

        (_, DrawEvent::ExternalGeometry(incoming)) => {
            if state.geometry() == Some(incoming) {
                return unchanged();
            }
            let mut effects = vec![E::ClearFeatures, E::AddFeature(incoming.clone())];
            if let Some(bounds) = incoming.bounds() {
                effects.push(E::FitBounds(bounds));
            }
            (
                S::HasResult {
                    geometry: incoming.clone(),
                    feature_id: None,
                },
                effects,
            )
        }

        (S::HasResult { geometry, .. }, DrawEvent::FeatureAssigned(id)) => (
            S::HasResult {
                geometry: geometry.clone(),
                feature_id: Some(id.clone()),
            },
            Vec::new(),
        ),
        (S::Editing { geometry, .. }, DrawEvent::FeatureAssigned(id)) => (
            S::Editing {
                geometry: geometry.clone(),
                feature_id: Some(id.clone()),
            },
            Vec::new(),
        ),
        (_, DrawEvent::FeatureAssigned(_)) => unchanged(),
    }
}

/// Callbacks fired as the session changes. All methods default to no-ops.
pub trait DrawObserver {
    fn on_polygon_change(&mut self, _geometry: Option<&Geometry>) {}
    fn on_save(&mut self, _geometry: &Geometry) {}
    fn on_cancel(&mut self) {}
}

/// Observer that ignores everything.
#[derive(Debug, Default, Clone, Copy)]
pub struct NoopObserver;

impl DrawObserver for NoopObserver {}

#[derive(Debug, Default)]
pub struct DrawSession {
    state: DrawState,
}

impl DrawSession {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn state(&self) -> &DrawState {
        &self.state
    }

    pub fn geometry(&self) -> Option<&Geometry> {
        self.state.geometry()
    }

    pub fn is_active(&self) -> bool {
        self.state != DrawState::Idle
    }

    /// Feed one event through the machine and carry out its effects.
    pub fn handle<T, O>(&mut self, event: DrawEvent, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        let (next, effects) = transition(&self.state, &event);
        if next.name() != self.state.name() {
            debug!(from = self.state.name(), to = next.name(), "draw session transition");
        }
        self.state = next;

        for effect in effects {
            self.perform(effect, tool, observer);
        }
    }

    fn perform<T, O>(&mut self, effect: DrawEffect, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        match effect {
            DrawEffect::EnterPolygonMode => {
                if let Err(e) = tool.change_mode(&LibraryMode::DrawPolygon) {
                    warn!(error = %e, "failed to enter polygon mode");
                }
            }
            DrawEffect::EnterSelectMode => {
                if let Err(e) = tool.change_mode(&LibraryMode::SimpleSelect) {
                    warn!(error = %e, "failed to enter select mode");
                }
            }
            DrawEffect::ClearFeatures => {
                if let Err(e) = tool.delete_all() {
                    warn!(error = %e, "failed to clear draw features");
                }
            }
            DrawEffect::AddFeature(geometry) => match tool.add_feature(&geometry) {
                Ok(Some(id)) => {
                    let (next, _) = transition(&self.state, &DrawEvent::FeatureAssigned(id));
                    self.state = next;
                }
                Ok(None) => {}
                Err(e) => warn!(error = %e, "failed to add draw feature"),
            },
            DrawEffect::FitBounds(bounds) => {
                if let Err(e) = tool.fit_bounds(bounds) {
                    warn!(error = %e, "failed to fit view to geometry");
                }
            }
            DrawEffect::PolygonChanged(geometry) => observer.on_polygon_change(geometry.as_ref()),
            DrawEffect::Saved(geometry) => observer.on_save(&geometry),
            DrawEffect::Cancelled => observer.on_cancel(),
        }
    }

    pub fn start<T, O>(&mut self, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        self.handle(DrawEvent::Start, tool, observer);
    }

    pub fn delete<T, O>(&mut self, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        self.handle(DrawEvent::Delete, tool, observer);
    }

    pub fn save<T, O>(&mut self, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        self.handle(DrawEvent::Save, tool, observer);
    }

    pub fn cancel<T, O>(&mut self, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        self.handle(DrawEvent::Cancel, tool, observer);
    }

    pub fn key_pressed<T, O>(&mut self, press: KeyPress, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        self.handle(DrawEvent::KeyPressed(press), tool, observer);
    }

    /// React to a geometry pushed from outside. `None` leaves the session
    /// alone so an empty initial value never wipes a drawing in progress.
    pub fn sync_external<T, O>(&mut self, geometry: Option<&Geometry>, tool: &mut T, observer: &mut O)
    where
        T: DrawTool + ?Sized,
        O: DrawObserver + ?Sized,
    {
        if let Some(geometry) = geometry {
            self.handle(DrawEvent::ExternalGeometry(geometry.clone()), tool, observer);
        }
    }

    /// Drop everything without firing callbacks. Used on teardown.
    pub fn reset<T>(&mut self, tool: &mut T)
    where
        T: DrawTool + ?Sized,
    {
        if self.state == DrawState::Idle {
            return;
        }
        if let Err(e) = tool.delete_all() {
            warn!(error = %e, "failed to clear draw features on reset");
        }
        self.state = DrawState::Idle;
    }
}
