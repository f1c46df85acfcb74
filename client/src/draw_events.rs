use std::rc::Rc;

use serde::Deserialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;

use parcelmap_engine::draw::DrawEvent;
use parcelmap_engine::model::Geometry;
use parcelmap_engine::surface::LibraryMode;

use crate::maplibre::Map;

/// Events the draw control fires on the map.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LibraryEvent {
    Create,
    Update,
    Delete,
    ModeChange,
}

impl LibraryEvent {
    pub const ALL: [LibraryEvent; 4] = [
        LibraryEvent::Create,
        LibraryEvent::Update,
        LibraryEvent::Delete,
        LibraryEvent::ModeChange,
    ];

    pub fn name(self) -> &'static str {
        match self {
            Self::Create => "draw.create",
            Self::Update => "draw.update",
            Self::Delete => "draw.delete",
            Self::ModeChange => "draw.modechange",
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct DrawnFeature {
    #[serde(default)]
    pub id: Option<String>,
    pub geometry: Geometry,
}

#[derive(Debug, Default, Deserialize)]
pub struct FeaturesPayload {
    #[serde(default)]
    pub features: Vec<DrawnFeature>,
}

#[derive(Debug, Deserialize)]
pub struct ModePayload {
    pub mode: String,
}

/// Map a feature-carrying library event onto the session's vocabulary.
/// Only the first feature matters: the session holds a single polygon.
pub fn from_features(kind: LibraryEvent, payload: FeaturesPayload) -> Option<DrawEvent> {
    match kind {
        LibraryEvent::Create => {
            let feature = payload.features.into_iter().next()?;
            Some(DrawEvent::GeometryCompleted {
                geometry: feature.geometry,
                feature_id: feature.id,
            })
        }
        LibraryEvent::Update => {
            let feature = payload.features.into_iter().next()?;
            Some(DrawEvent::GeometryModified {
                geometry: feature.geometry,
            })
        }
        LibraryEvent::Delete => Some(DrawEvent::GeometryDeleted),
        LibraryEvent::ModeChange => None,
    }
}

pub fn from_mode(payload: ModePayload) -> DrawEvent {
    DrawEvent::ModeChanged(LibraryMode::parse(&payload.mode))
}

/// Decode a raw event object. Struct decoding only reads the named fields,
/// so the `target` map reference on the event is never walked.
fn translate(kind: LibraryEvent, event: JsValue) -> Option<DrawEvent> {
    let decoded = match kind {
        LibraryEvent::ModeChange => serde_wasm_bindgen::from_value::<ModePayload>(event)
            .map(from_mode)
            .map(Some),
        _ => serde_wasm_bindgen::from_value::<FeaturesPayload>(event)
            .map(|payload| from_features(kind, payload)),
    };
    match decoded {
        Ok(event) => event,
        Err(e) => {
            tracing::warn!(event = kind.name(), error = %e, "undecodable draw event");
            None
        }
    }
}

/// Draw-control listeners registered on one map.
pub struct DrawEventBinding {
    map: Map,
    handlers: Vec<(LibraryEvent, Closure<dyn Fn(JsValue)>)>,
}

impl DrawEventBinding {
    pub fn attach(map: &Map, sink: Rc<dyn Fn(DrawEvent)>) -> Self {
        let handlers = LibraryEvent::ALL
            .into_iter()
            .map(|kind| {
                let sink = sink.clone();
                let handler = Closure::<dyn Fn(JsValue)>::new(move |event: JsValue| {
                    if let Some(event) = translate(kind, event) {
                        sink(event);
                    }
                });
                map.on(kind.name(), handler.as_ref().unchecked_ref());
                (kind, handler)
            })
            .collect();
        Self {
            map: map.clone(),
            handlers,
        }
    }

    pub fn detach(self) {
        for (kind, handler) in &self.handlers {
            self.map.off(kind.name(), handler.as_ref().unchecked_ref());
        }
    }
}
