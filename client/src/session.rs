//! The single live map on the page and the host state that outlives it.
//!
//! The map view is not `Send`, so it lives in a thread-local slot rather than
//! in a leptos signal, and component cleanup reaches it through [`teardown`].

use std::cell::RefCell;
use std::rc::Rc;

use js_sys::{Function, Object, Reflect};
use serde::Serialize;
use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::HtmlElement;

use parcelmap_engine::draw::{DrawEvent, DrawObserver};
use parcelmap_engine::markers::LabelMarkerFactory;
use parcelmap_engine::model::{Area, Geometry, Pin, Snapshot};
use parcelmap_engine::view::MapView;

use crate::draw_events::DrawEventBinding;
use crate::keyboard;
use crate::maplibre::{Map, MapboxDraw};
use crate::markers::DomMarkerFactory;
use crate::settings::Settings;
use crate::surface::MapLibreSurface;
use crate::timer::GlooTimer;

pub type ClientView = MapView<MapLibreSurface, DomMarkerFactory, GlooTimer>;

struct MapListener {
    event: &'static str,
    layer: Option<String>,
    handler: Closure<dyn Fn(JsValue)>,
}

struct MapSession {
    map: Map,
    draw: MapboxDraw,
    settings: Settings,
    view: Option<ClientView>,
    draw_events: Option<DrawEventBinding>,
    listeners: Vec<MapListener>,
}

#[derive(Debug, Clone, PartialEq)]
enum Notice {
    PolygonChanged(Option<Geometry>),
    Saved(Geometry),
    Cancelled,
}

/// State the host page sets through the bridge. Survives remounts.
#[derive(Default)]
struct HostState {
    snapshot: Snapshot,
    initial_polygon: Option<Geometry>,
    on_polygon_change: Option<Function>,
    on_save: Option<Function>,
    on_cancel: Option<Function>,
    queued: Vec<Notice>,
}

thread_local! {
    static MAP_SESSION: RefCell<Option<MapSession>> = const { RefCell::new(None) };
    static HOST: RefCell<HostState> = RefCell::new(HostState::default());
}

/// Queues draw notifications; [`flush_notices`] delivers them once the view
/// is no longer borrowed, so host callbacks may call back into the bridge.
struct HostObserver;

impl DrawObserver for HostObserver {
    fn on_polygon_change(&mut self, geometry: Option<&Geometry>) {
        queue(Notice::PolygonChanged(geometry.cloned()));
    }

    fn on_save(&mut self, geometry: &Geometry) {
        queue(Notice::Saved(geometry.clone()));
    }

    fn on_cancel(&mut self) {
        queue(Notice::Cancelled);
    }
}

fn queue(notice: Notice) {
    HOST.with(|host| host.borrow_mut().queued.push(notice));
}

fn to_js<T: Serialize>(value: &T) -> Result<JsValue, serde_wasm_bindgen::Error> {
    value.serialize(&serde_wasm_bindgen::Serializer::json_compatible())
}

/// What a host callback is called with.
#[derive(Debug, PartialEq)]
enum Payload<'a> {
    None,
    Null,
    Geometry(&'a Geometry),
}

fn payload(notice: &Notice) -> Payload<'_> {
    match notice {
        Notice::PolygonChanged(Some(geometry)) | Notice::Saved(geometry) => {
            Payload::Geometry(geometry)
        }
        Notice::PolygonChanged(None) => Payload::Null,
        Notice::Cancelled => Payload::None,
    }
}

fn flush_notices() {
    let pending: Vec<(Notice, Option<Function>)> = HOST.with(|host| {
        let mut host = host.borrow_mut();
        let queued = std::mem::take(&mut host.queued);
        queued
            .into_iter()
            .map(|notice| {
                let callback = match notice {
                    Notice::PolygonChanged(_) => host.on_polygon_change.clone(),
                    Notice::Saved(_) => host.on_save.clone(),
                    Notice::Cancelled => host.on_cancel.clone(),
                };
                (notice, callback)
            })
            .collect()
    });

    for (notice, callback) in pending {
        let Some(callback) = callback else {
            continue;
        };
        let result = match payload(&notice) {
            Payload::None => callback.call0(&JsValue::NULL),
            Payload::Null => callback.call1(&JsValue::NULL, &JsValue::NULL),
            // A geometry that fails to serialize must not reach the host as
            // `null`, which would read as a deletion.
            Payload::Geometry(geometry) => match to_js(geometry) {
                Ok(arg) => callback.call1(&JsValue::NULL, &arg),
                Err(e) => {
                    tracing::warn!(notice = ?notice, error = %e, "geometry not serializable, callback skipped");
                    continue;
                }
            },
        };
        if let Err(e) = result {
            tracing::warn!(notice = ?notice, error = ?e, "host callback threw");
        }
    }
}

/// Run `f` against the live view, if one is mounted, then deliver any draw
/// notifications it produced.
pub fn with_view<R>(f: impl FnOnce(&ClientView) -> R) -> Option<R> {
    let result = MAP_SESSION.with(|slot| {
        slot.borrow()
            .as_ref()
            .and_then(|session| session.view.as_ref())
            .map(f)
    });
    flush_notices();
    result
}

pub fn dispatch(event: DrawEvent) {
    with_view(|view| view.draw(event));
}

pub fn set_pins(pins: Vec<Pin>) {
    let snapshot = HOST.with(|host| {
        let mut host = host.borrow_mut();
        host.snapshot.pins = pins;
        host.snapshot.clone()
    });
    with_view(|view| view.push_snapshot(snapshot));
}

pub fn set_areas(areas: Vec<Area>) {
    let snapshot = HOST.with(|host| {
        let mut host = host.borrow_mut();
        host.snapshot.areas = areas;
        host.snapshot.clone()
    });
    with_view(|view| view.push_snapshot(snapshot));
}

pub fn set_initial_polygon(geometry: Option<Geometry>) {
    HOST.with(|host| host.borrow_mut().initial_polygon = geometry.clone());
    with_view(|view| view.sync_external_geometry(geometry.as_ref()));
}

pub enum Callback {
    PolygonChange,
    Save,
    Cancel,
}

pub fn set_callback(kind: Callback, callback: Option<Function>) {
    HOST.with(|host| {
        let mut host = host.borrow_mut();
        match kind {
            Callback::PolygonChange => host.on_polygon_change = callback,
            Callback::Save => host.on_save = callback,
            Callback::Cancel => host.on_cancel = callback,
        }
    });
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), String> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(|e| format!("{e:?}"))
}

fn map_options(container: &HtmlElement, settings: &Settings) -> Result<Object, String> {
    let options = Object::new();
    set(&options, "container", container)?;
    set(&options, "style", &JsValue::from_str(&settings.style_url))?;
    let center = to_js(&settings.center).map_err(|e| e.to_string())?;
    set(&options, "center", &center)?;
    set(&options, "zoom", &JsValue::from_f64(settings.zoom))?;
    Ok(options)
}

fn draw_options() -> Result<Object, String> {
    let controls = Object::new();
    set(&controls, "polygon", &JsValue::TRUE)?;
    set(&controls, "trash", &JsValue::TRUE)?;
    let options = Object::new();
    set(&options, "displayControlsDefault", &JsValue::FALSE)?;
    set(&options, "controls", &controls)?;
    Ok(options)
}

/// Create the map inside `container`. The view is built once the map fires
/// `load`; anything pushed before then is applied at that point.
pub fn mount(container: &HtmlElement, settings: &Settings) -> Result<(), String> {
    teardown();

    let map = Map::new(&map_options(container, settings)?.into());
    let draw = MapboxDraw::new(&draw_options()?.into());
    map.add_control(&draw);

    let load_handler = Closure::<dyn Fn(JsValue)>::new(|_: JsValue| on_load());
    map.on("load", load_handler.as_ref().unchecked_ref());
    let style_handler = Closure::<dyn Fn(JsValue)>::new(|_: JsValue| on_style_reload());
    map.on("style.load", style_handler.as_ref().unchecked_ref());

    MAP_SESSION.with(|slot| {
        *slot.borrow_mut() = Some(MapSession {
            map,
            draw,
            settings: settings.clone(),
            view: None,
            draw_events: None,
            listeners: vec![
                MapListener {
                    event: "load",
                    layer: None,
                    handler: load_handler,
                },
                MapListener {
                    event: "style.load",
                    layer: None,
                    handler: style_handler,
                },
            ],
        });
    });
    Ok(())
}

fn on_load() {
    let built = MAP_SESSION.with(|slot| {
        let mut slot = slot.borrow_mut();
        let session = slot.as_mut()?;
        if session.view.is_some() {
            return None;
        }
        let surface = MapLibreSurface::new(session.map.clone(), session.draw.clone());
        let factory = DomMarkerFactory::new(LabelMarkerFactory {
            show_label: session.settings.show_labels,
            ..LabelMarkerFactory::default()
        });
        match MapView::new(
            surface,
            factory,
            GlooTimer,
            Box::new(HostObserver),
            &session.settings.engine,
        ) {
            Ok(view) => {
                session.view = Some(view);
                Some(session.map.clone())
            }
            Err(e) => {
                tracing::error!(error = %e, "invalid engine config, map stays empty");
                None
            }
        }
    });
    let Some(map) = built else {
        return;
    };

    let (snapshot, initial) = HOST.with(|host| {
        let host = host.borrow();
        (host.snapshot.clone(), host.initial_polygon.clone())
    });
    with_view(|view| {
        view.apply_now(&snapshot);
        view.sync_external_geometry(initial.as_ref());
    });

    let draw_events = DrawEventBinding::attach(&map, Rc::new(dispatch));
    keyboard::bind(|press| dispatch(DrawEvent::KeyPressed(press)));
    let hover = hover_listeners(&map);

    MAP_SESSION.with(|slot| {
        if let Some(session) = slot.borrow_mut().as_mut() {
            session.draw_events = Some(draw_events);
            session.listeners.extend(hover);
        }
    });
    tracing::info!(pins = snapshot.pins.len(), areas = snapshot.areas.len(), "map ready");
}

/// A style swap drops custom sources and layers; re-run the last snapshot.
fn on_style_reload() {
    let snapshot = HOST.with(|host| host.borrow().snapshot.clone());
    with_view(|view| {
        view.invalidate();
        view.apply_now(&snapshot);
    });
}

fn hovered_feature_id(event: &JsValue) -> Option<String> {
    let features = Reflect::get(event, &JsValue::from_str("features")).ok()?;
    let first = features.dyn_into::<js_sys::Array>().ok()?.get(0);
    let id = Reflect::get(&first, &JsValue::from_str("id")).ok()?;
    id.as_string()
}

fn hover_listeners(map: &Map) -> Vec<MapListener> {
    let Some(fill_layer) = MAP_SESSION.with(|slot| {
        slot.borrow()
            .as_ref()
            .map(|s| s.settings.engine.layers.area_fill.clone())
    }) else {
        return Vec::new();
    };

    let on_move = Closure::<dyn Fn(JsValue)>::new(|event: JsValue| {
        let id = hovered_feature_id(&event);
        with_view(|view| view.set_hovered_area(id.as_deref()));
    });
    let on_leave = Closure::<dyn Fn(JsValue)>::new(|_: JsValue| {
        with_view(|view| view.set_hovered_area(None));
    });
    map.on_layer("mousemove", &fill_layer, on_move.as_ref().unchecked_ref());
    map.on_layer("mouseleave", &fill_layer, on_leave.as_ref().unchecked_ref());

    vec![
        MapListener {
            event: "mousemove",
            layer: Some(fill_layer.clone()),
            handler: on_move,
        },
        MapListener {
            event: "mouseleave",
            layer: Some(fill_layer),
            handler: on_leave,
        },
    ]
}

/// Tear the live map down: listeners, then the view (pending pass, markers,
/// area layers, draw features), then the map itself.
pub fn teardown() {
    let Some(session) = MAP_SESSION.with(|slot| slot.borrow_mut().take()) else {
        return;
    };
    keyboard::unbind();
    if let Some(binding) = session.draw_events {
        binding.detach();
    }
    for listener in &session.listeners {
        let handler: &Function = listener.handler.as_ref().unchecked_ref();
        match listener.layer.as_deref() {
            Some(layer) => session.map.off_layer(listener.event, layer, handler),
            None => session.map.off(listener.event, handler),
        };
    }
    if let Some(view) = session.view {
        view.destroy();
    }
    HOST.with(|host| host.borrow_mut().queued.clear());
    session.map.remove();
}
