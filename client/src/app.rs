use std::cell::Cell;
use std::rc::Rc;

use leptos::prelude::*;

use crate::session;
use crate::settings::Settings;

#[component]
pub fn App() -> impl IntoView {
    let settings = Settings::load();
    view! {
        <div style="width: 100%; height: 100%; position: relative;">
            <MapCanvas settings />
        </div>
    }
}

/// Hosts the MapLibre map. The live view sits in the session slot; this
/// component only creates it on mount and tears it down on cleanup.
#[component]
pub fn MapCanvas(settings: Settings) -> impl IntoView {
    let container_ref = NodeRef::<leptos::html::Div>::new();
    let mounted = Rc::new(Cell::new(false));

    Effect::new(move || {
        if mounted.get() {
            return;
        }
        let Some(container) = container_ref.get() else {
            return;
        };
        mounted.set(true);
        if let Err(e) = session::mount(&container, &settings) {
            tracing::error!(error = %e, "failed to create map");
        }
    });

    on_cleanup(session::teardown);

    view! {
        <div
            node_ref=container_ref
            class="parcelmap-canvas"
            style="position: absolute; inset: 0;"
        />
    }
}
