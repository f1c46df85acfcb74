use std::collections::HashMap;

use js_sys::{Array, Object, Reflect};
use serde::Serialize;
use wasm_bindgen::{JsCast, JsValue};
use web_sys::HtmlElement;

use parcelmap_engine::error::SurfaceError;
use parcelmap_engine::geojson::FeatureCollection;
use parcelmap_engine::model::{Bounds, Geometry, LatLng};
use parcelmap_engine::surface::{
    DrawTool, LayerSpec, LayerSurface, LibraryMode, MarkerOptions, MarkerSurface,
};

use crate::maplibre::{Map, MapboxDraw, Marker};

/// Padding around a polygon when the view is fitted to it.
const FIT_PADDING_PX: f64 = 48.0;

/// Adapter over one MapLibre map and its draw control.
pub struct MapLibreSurface {
    map: Map,
    draw: MapboxDraw,
    markers: HashMap<String, Marker>,
}

impl MapLibreSurface {
    pub fn new(map: Map, draw: MapboxDraw) -> Self {
        Self {
            map,
            draw,
            markers: HashMap::new(),
        }
    }
}

pub(crate) fn js_error(e: JsValue) -> SurfaceError {
    if let Some(message) = e.as_string() {
        return SurfaceError::Js(message);
    }
    if let Some(error) = e.dyn_ref::<js_sys::Error>() {
        return SurfaceError::Js(String::from(error.message()));
    }
    SurfaceError::Js(format!("{e:?}"))
}

/// Serialize into plain JS objects (not `Map`s), which is what MapLibre expects.
fn to_js<T: Serialize + ?Sized>(value: &T) -> Result<JsValue, SurfaceError> {
    value
        .serialize(&serde_wasm_bindgen::Serializer::json_compatible())
        .map_err(|e| SurfaceError::Js(e.to_string()))
}

fn set(target: &Object, key: &str, value: &JsValue) -> Result<(), SurfaceError> {
    Reflect::set(target, &JsValue::from_str(key), value)
        .map(|_| ())
        .map_err(js_error)
}

fn lng_lat(coords: LatLng) -> JsValue {
    Array::of2(&coords.lng.into(), &coords.lat.into()).into()
}

fn marker_element(opts: &MarkerOptions<HtmlElement>) -> Result<HtmlElement, SurfaceError> {
    if let Some(element) = opts.handle.clone() {
        return Ok(element);
    }
    let document = web_sys::window()
        .and_then(|w| w.document())
        .ok_or_else(|| SurfaceError::rejected("add_marker", "no document"))?;
    let element = document
        .create_element("div")
        .map_err(js_error)?
        .dyn_into::<HtmlElement>()
        .map_err(|_| SurfaceError::rejected("add_marker", "div is not an HtmlElement"))?;
    if let Some(content) = opts.content.as_deref() {
        element.set_inner_html(content);
    }
    Ok(element)
}

impl MarkerSurface for MapLibreSurface {
    type Handle = HtmlElement;

    fn add_marker(
        &mut self,
        id: &str,
        coords: LatLng,
        opts: MarkerOptions<HtmlElement>,
    ) -> Result<(), SurfaceError> {
        if self.markers.contains_key(id) {
            return Err(SurfaceError::rejected("add_marker", "id already placed"));
        }
        let element = marker_element(&opts)?;
        element.set_attribute("data-pin-id", id).map_err(js_error)?;

        let options = Object::new();
        set(&options, "element", &element)?;
        set(&options, "anchor", &JsValue::from_str("bottom"))?;

        let marker = Marker::new(&options);
        marker.set_lng_lat(&lng_lat(coords)).add_to(&self.map);
        self.markers.insert(id.to_string(), marker);
        Ok(())
    }

    fn remove_marker(&mut self, id: &str) -> Result<(), SurfaceError> {
        let marker = self
            .markers
            .remove(id)
            .ok_or_else(|| SurfaceError::MissingMarker(id.to_string()))?;
        marker.remove();
        Ok(())
    }

    fn update_marker_content(&mut self, id: &str, content: &str) -> Result<(), SurfaceError> {
        let marker = self
            .markers
            .get(id)
            .ok_or_else(|| SurfaceError::MissingMarker(id.to_string()))?;
        // Content always lives inside the marker root, whoever built it.
        marker.get_element().set_inner_html(content);
        Ok(())
    }
}

impl LayerSurface for MapLibreSurface {
    fn has_layer(&self, name: &str) -> bool {
        let layer = self.map.get_layer(name);
        !layer.is_undefined() && !layer.is_null()
    }

    fn add_layer(&mut self, spec: &LayerSpec) -> Result<(), SurfaceError> {
        self.map.add_layer(&to_js(spec)?).map_err(js_error)?;
        Ok(())
    }

    fn remove_layer(&mut self, name: &str) -> Result<(), SurfaceError> {
        if !self.has_layer(name) {
            return Err(SurfaceError::MissingLayer(name.to_string()));
        }
        self.map.remove_layer(name).map_err(js_error)?;
        Ok(())
    }

    fn has_source(&self, name: &str) -> bool {
        self.map.get_source(name).is_some()
    }

    fn add_source(&mut self, name: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        let source = Object::new();
        set(&source, "type", &JsValue::from_str("geojson"))?;
        set(&source, "data", &to_js(data)?)?;
        // Feature state is keyed by the area id carried in the properties.
        set(&source, "promoteId", &JsValue::from_str("id"))?;
        self.map.add_source(name, &source).map_err(js_error)?;
        Ok(())
    }

    fn set_source_data(&mut self, name: &str, data: &FeatureCollection) -> Result<(), SurfaceError> {
        let source = self
            .map
            .get_source(name)
            .ok_or_else(|| SurfaceError::MissingSource(name.to_string()))?;
        source.set_data(&to_js(data)?).map_err(js_error)?;
        Ok(())
    }

    fn remove_source(&mut self, name: &str) -> Result<(), SurfaceError> {
        if !self.has_source(name) {
            return Err(SurfaceError::MissingSource(name.to_string()));
        }
        self.map.remove_source(name).map_err(js_error)?;
        Ok(())
    }

    fn set_feature_state(
        &mut self,
        source: &str,
        feature_id: &str,
        key: &str,
        value: bool,
    ) -> Result<(), SurfaceError> {
        let feature = Object::new();
        set(&feature, "source", &JsValue::from_str(source))?;
        set(&feature, "id", &JsValue::from_str(feature_id))?;
        let state = Object::new();
        set(&state, key, &JsValue::from_bool(value))?;
        self.map
            .set_feature_state(&feature, &state)
            .map_err(js_error)
    }
}

impl DrawTool for MapLibreSurface {
    fn change_mode(&mut self, mode: &LibraryMode) -> Result<(), SurfaceError> {
        self.draw.change_mode(mode.as_str()).map_err(js_error)?;
        Ok(())
    }

    fn add_feature(&mut self, geometry: &Geometry) -> Result<Option<String>, SurfaceError> {
        let ids = self.draw.add(&to_js(geometry)?).map_err(js_error)?;
        Ok(ids.get(0).as_string())
    }

    fn delete_all(&mut self) -> Result<(), SurfaceError> {
        self.draw.delete_all().map_err(js_error)?;
        Ok(())
    }

    fn fit_bounds(&mut self, bounds: Bounds) -> Result<(), SurfaceError> {
        let corners = to_js(&[[bounds.west, bounds.south], [bounds.east, bounds.north]])?;
        let options = Object::new();
        set(&options, "padding", &JsValue::from_f64(FIT_PADDING_PX))?;
        self.map.fit_bounds(&corners, &options).map_err(js_error)?;
        Ok(())
    }
}
