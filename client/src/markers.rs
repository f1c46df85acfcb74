use wasm_bindgen::JsCast;
use web_sys::{Document, HtmlElement};

use parcelmap_engine::markers::{LabelMarkerFactory, MarkerFactory, MarkerVisual};
use parcelmap_engine::model::Pin;

/// Builds a DOM root per pin so the marker keeps its element (and any
/// listeners attached to it) across content refreshes.
pub struct DomMarkerFactory {
    labels: LabelMarkerFactory,
    document: Option<Document>,
}

impl DomMarkerFactory {
    pub fn new(labels: LabelMarkerFactory) -> Self {
        Self {
            labels,
            document: web_sys::window().and_then(|w| w.document()),
        }
    }

    fn root(&self, pin: &Pin) -> Option<HtmlElement> {
        let element = self
            .document
            .as_ref()?
            .create_element("div")
            .ok()?
            .dyn_into::<HtmlElement>()
            .ok()?;
        element.set_class_name("pm-marker-root");
        if let Some(label) = pin.label.as_deref() {
            element.set_attribute("aria-label", label).ok()?;
        }
        Some(element)
    }
}

impl MarkerFactory<HtmlElement> for DomMarkerFactory {
    fn content(&self, pin: &Pin) -> String {
        MarkerFactory::<HtmlElement>::content(&self.labels, pin)
    }

    fn create(&self, pin: &Pin) -> MarkerVisual<HtmlElement> {
        let content = self.content(pin);
        let handle = self.root(pin);
        if let Some(root) = handle.as_ref() {
            root.set_inner_html(&content);
        }
        MarkerVisual { handle, content }
    }
}
