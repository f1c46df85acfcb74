use std::cell::RefCell;

use wasm_bindgen::JsCast;
use wasm_bindgen::prelude::*;
use web_sys::KeyboardEvent;

use parcelmap_engine::draw::{KeyPress, Modifiers};

struct KeydownBinding {
    window: web_sys::Window,
    handler: Closure<dyn Fn(KeyboardEvent)>,
}

thread_local! {
    static KEYDOWN_BINDING: RefCell<Option<KeydownBinding>> = const { RefCell::new(None) };
}

pub fn key_press(e: &KeyboardEvent) -> KeyPress {
    KeyPress {
        key: e.key(),
        modifiers: Modifiers {
            ctrl: e.ctrl_key(),
            alt: e.alt_key(),
            meta: e.meta_key(),
            shift: e.shift_key(),
        },
    }
}

fn typing_in_field(e: &KeyboardEvent) -> bool {
    let tag = e
        .target()
        .and_then(|t| t.dyn_into::<web_sys::HtmlElement>().ok())
        .map(|el| el.tag_name())
        .unwrap_or_default();
    matches!(tag.as_str(), "INPUT" | "TEXTAREA" | "SELECT")
}

/// Route document key presses to `on_key`, replacing any earlier binding.
/// Presses inside form fields are left to the field.
pub fn bind(on_key: impl Fn(KeyPress) + 'static) {
    unbind();
    let Some(window) = web_sys::window() else {
        return;
    };

    let handler = Closure::<dyn Fn(KeyboardEvent)>::new(move |e: KeyboardEvent| {
        if e.repeat() || typing_in_field(&e) {
            return;
        }
        on_key(key_press(&e));
    });

    if window
        .add_event_listener_with_callback("keydown", handler.as_ref().unchecked_ref())
        .is_ok()
    {
        KEYDOWN_BINDING.with(|slot| {
            *slot.borrow_mut() = Some(KeydownBinding { window, handler });
        });
    }
}

pub fn unbind() {
    KEYDOWN_BINDING.with(|slot| {
        if let Some(old) = slot.borrow_mut().take() {
            let _ = old
                .window
                .remove_event_listener_with_callback("keydown", old.handler.as_ref().unchecked_ref());
        }
    });
}
