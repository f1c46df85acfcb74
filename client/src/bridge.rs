//! Functions the host page calls. Values cross as plain JS objects shaped
//! like the engine's serde model.

use js_sys::Function;
use serde::de::DeserializeOwned;
use wasm_bindgen::prelude::*;

use parcelmap_engine::draw::DrawEvent;
use parcelmap_engine::model::{Geometry, decode_each};

use crate::session::{self, Callback};
use crate::settings::Settings;

/// Entries that do not decode are dropped; `null` or `undefined` is an empty
/// list. Anything else that is not an array leaves the map untouched.
fn decode_list<T: DeserializeOwned>(value: JsValue, kind: &'static str) -> Option<Vec<T>> {
    if value.is_null() || value.is_undefined() {
        return Some(Vec::new());
    }
    match serde_wasm_bindgen::from_value::<Vec<serde_json::Value>>(value) {
        Ok(values) => Some(decode_each(values, kind)),
        Err(e) => {
            tracing::warn!(kind, error = %e, "expected an array, update ignored");
            None
        }
    }
}

#[wasm_bindgen]
pub fn push_pins(pins: JsValue) {
    if let Some(pins) = decode_list(pins, "pin") {
        session::set_pins(pins);
    }
}

#[wasm_bindgen]
pub fn push_areas(areas: JsValue) {
    if let Some(areas) = decode_list(areas, "area") {
        session::set_areas(areas);
    }
}

/// Load the polygon of the record being edited. `null` keeps whatever is
/// currently drawn; so does a value that is not a polygon.
#[wasm_bindgen]
pub fn set_initial_polygon(geometry: JsValue) {
    let geometry: Option<Geometry> = if geometry.is_null() || geometry.is_undefined() {
        None
    } else {
        match serde_wasm_bindgen::from_value(geometry) {
            Ok(geometry) => Some(geometry),
            Err(e) => {
                tracing::warn!(error = %e, "initial polygon ignored");
                None
            }
        }
    };
    session::set_initial_polygon(geometry);
}

#[wasm_bindgen]
pub fn start_drawing() {
    session::dispatch(DrawEvent::Start);
}

#[wasm_bindgen]
pub fn delete_drawing() {
    session::dispatch(DrawEvent::Delete);
}

#[wasm_bindgen]
pub fn save_drawing() {
    session::dispatch(DrawEvent::Save);
}

#[wasm_bindgen]
pub fn cancel_drawing() {
    session::dispatch(DrawEvent::Cancel);
}

/// `callback(geometry | null)` after every change to the drawn polygon.
#[wasm_bindgen]
pub fn on_polygon_change(callback: Option<Function>) {
    session::set_callback(Callback::PolygonChange, callback);
}

/// `callback(geometry)` when the user saves.
#[wasm_bindgen]
pub fn on_save(callback: Option<Function>) {
    session::set_callback(Callback::Save, callback);
}

#[wasm_bindgen]
pub fn on_cancel(callback: Option<Function>) {
    session::set_callback(Callback::Cancel, callback);
}

/// Persist settings for the next mount. Invalid engine values fall back to
/// defaults.
#[wasm_bindgen]
pub fn save_settings(settings: JsValue) {
    match serde_wasm_bindgen::from_value::<Settings>(settings) {
        Ok(settings) => settings.sanitized().save(),
        Err(e) => tracing::warn!(error = %e, "settings not saved"),
    }
}
