//! Bindings to the MapLibre GL and Mapbox GL Draw globals loaded by the host page.

use wasm_bindgen::prelude::*;

#[wasm_bindgen]
extern "C" {
    #[wasm_bindgen(js_namespace = maplibregl, js_name = Map)]
    #[derive(Debug, Clone)]
    pub type Map;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "Map")]
    pub fn new(options: &JsValue) -> Map;

    #[wasm_bindgen(method, js_name = getLayer)]
    pub fn get_layer(this: &Map, id: &str) -> JsValue;

    #[wasm_bindgen(method, catch, js_name = addLayer)]
    pub fn add_layer(this: &Map, layer: &JsValue) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, catch, js_name = removeLayer)]
    pub fn remove_layer(this: &Map, id: &str) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, js_name = getSource)]
    pub fn get_source(this: &Map, id: &str) -> Option<GeoJsonSource>;

    #[wasm_bindgen(method, catch, js_name = addSource)]
    pub fn add_source(this: &Map, id: &str, source: &JsValue) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, catch, js_name = removeSource)]
    pub fn remove_source(this: &Map, id: &str) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, catch, js_name = setFeatureState)]
    pub fn set_feature_state(this: &Map, feature: &JsValue, state: &JsValue) -> Result<(), JsValue>;

    #[wasm_bindgen(method, catch, js_name = fitBounds)]
    pub fn fit_bounds(this: &Map, bounds: &JsValue, options: &JsValue) -> Result<Map, JsValue>;

    #[wasm_bindgen(method, js_name = addControl)]
    pub fn add_control(this: &Map, control: &JsValue) -> Map;

    #[wasm_bindgen(method)]
    pub fn on(this: &Map, event: &str, listener: &js_sys::Function) -> Map;

    #[wasm_bindgen(method, js_name = on)]
    pub fn on_layer(this: &Map, event: &str, layer: &str, listener: &js_sys::Function) -> Map;

    #[wasm_bindgen(method)]
    pub fn off(this: &Map, event: &str, listener: &js_sys::Function) -> Map;

    #[wasm_bindgen(method, js_name = off)]
    pub fn off_layer(this: &Map, event: &str, layer: &str, listener: &js_sys::Function) -> Map;

    #[wasm_bindgen(method)]
    pub fn remove(this: &Map);

    #[wasm_bindgen(js_namespace = maplibregl, js_name = GeoJSONSource)]
    #[derive(Debug, Clone)]
    pub type GeoJsonSource;

    #[wasm_bindgen(method, catch, js_name = setData)]
    pub fn set_data(this: &GeoJsonSource, data: &JsValue) -> Result<GeoJsonSource, JsValue>;

    #[wasm_bindgen(js_namespace = maplibregl, js_name = Marker)]
    #[derive(Debug, Clone)]
    pub type Marker;

    #[wasm_bindgen(constructor, js_namespace = maplibregl, js_class = "Marker")]
    pub fn new(options: &JsValue) -> Marker;

    #[wasm_bindgen(method, js_name = setLngLat)]
    pub fn set_lng_lat(this: &Marker, lng_lat: &JsValue) -> Marker;

    #[wasm_bindgen(method, js_name = addTo)]
    pub fn add_to(this: &Marker, map: &Map) -> Marker;

    #[wasm_bindgen(method)]
    pub fn remove(this: &Marker) -> Marker;

    #[wasm_bindgen(method, js_name = getElement)]
    pub fn get_element(this: &Marker) -> web_sys::HtmlElement;

    #[wasm_bindgen(js_name = MapboxDraw)]
    #[derive(Debug, Clone)]
    pub type MapboxDraw;

    #[wasm_bindgen(constructor, js_class = "MapboxDraw")]
    pub fn new(options: &JsValue) -> MapboxDraw;

    #[wasm_bindgen(method, catch, js_name = changeMode)]
    pub fn change_mode(this: &MapboxDraw, mode: &str) -> Result<MapboxDraw, JsValue>;

    /// Returns the array of feature ids that were added.
    #[wasm_bindgen(method, catch)]
    pub fn add(this: &MapboxDraw, geojson: &JsValue) -> Result<js_sys::Array, JsValue>;

    #[wasm_bindgen(method, catch, js_name = deleteAll)]
    pub fn delete_all(this: &MapboxDraw) -> Result<MapboxDraw, JsValue>;
}
