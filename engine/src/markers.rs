use std::fmt::Write;

use crate::colors::{UNCATEGORIZED_COLOR, border_shade, category_color, hex_css, label_text_color};
use crate::model::Pin;

/// What a factory produces for a newly placed pin.
#[derive(Debug, Clone, PartialEq)]
pub struct MarkerVisual<H> {
    /// `None` lets the surface build its default marker.
    pub handle: Option<H>,
    pub content: String,
}

/// Strategy for building marker visuals. The reconciler never constructs
/// visuals itself.
pub trait MarkerFactory<H> {
    /// Content string for a pin. Called for every refresh.
    fn content(&self, pin: &Pin) -> String;

    /// Visual for a pin that is not yet on screen.
    fn create(&self, pin: &Pin) -> MarkerVisual<H> {
        MarkerVisual {
            handle: None,
            content: self.content(pin),
        }
    }
}

/// Fill color for a pin: explicit color, then category hash, then gray.
pub fn pin_color(pin: &Pin) -> (u8, u8, u8) {
    pin.color
        .or_else(|| pin.category.as_deref().map(category_color))
        .unwrap_or(UNCATEGORIZED_COLOR)
}

/// Default factory: a pill with the pin's glyph and label as HTML.
#[derive(Debug, Clone)]
pub struct LabelMarkerFactory {
    pub show_label: bool,
    /// Longest label kept before truncating with an ellipsis.
    pub max_label_chars: usize,
}

impl Default for LabelMarkerFactory {
    fn default() -> Self {
        Self {
            show_label: true,
            max_label_chars: 24,
        }
    }
}

impl<H> MarkerFactory<H> for LabelMarkerFactory {
    fn content(&self, pin: &Pin) -> String {
        let (r, g, b) = pin_color(pin);
        let border = border_shade(r, g, b);
        let text = label_text_color(r, g, b);

        let mut html = String::with_capacity(160);
        let _ = write!(
            html,
            r#"<div class="pm-marker" style="background:{};border-color:{};color:{}""#,
            hex_css(r, g, b),
            hex_css(border.0, border.1, border.2),
            hex_css(text.0, text.1, text.2),
        );
        if let Some(description) = pin.description.as_deref() {
            html.push_str(r#" title=""#);
            push_escaped(&mut html, description);
            html.push('"');
        }
        html.push('>');
        if let Some(icon) = pin.icon.as_deref() {
            html.push_str(r#"<span class="pm-marker-icon">"#);
            push_escaped(&mut html, icon);
            html.push_str("</span>");
        }
        if self.show_label
            && let Some(label) = pin.label.as_deref()
        {
            html.push_str(r#"<span class="pm-marker-label">"#);
            push_escaped(&mut html, &truncate_label(label, self.max_label_chars));
            html.push_str("</span>");
        }
        if !pin.media.is_empty() {
            let _ = write!(
                html,
                r#"<span class="pm-marker-media">{}</span>"#,
                pin.media.len()
            );
        }
        html.push_str("</div>");
        html
    }
}

pub fn truncate_label(label: &str, max_chars: usize) -> String {
    if label.chars().count() <= max_chars {
        return label.to_string();
    }
    let mut out: String = label.chars().take(max_chars.saturating_sub(1)).collect();
    out.push('\u{2026}');
    out
}

pub fn push_escaped(buf: &mut String, raw: &str) {
    for c in raw.chars() {
        match c {
            '&' => buf.push_str("&amp;"),
            '<' => buf.push_str("&lt;"),
            '>' => buf.push_str("&gt;"),
            '"' => buf.push_str("&quot;"),
            '\'' => buf.push_str("&#39;"),
            _ => buf.push(c),
        }
    }
}
