/// Marker color for pins without an explicit color and without a category.
pub const UNCATEGORIZED_COLOR: (u8, u8, u8) = (100, 116, 139);

/// Deterministic category color via CRC32 hash of the category tag.
/// Returns (r, g, b) from first 3 bytes of hash.
pub fn category_color(category: &str) -> (u8, u8, u8) {
    let hash = crc32fast::hash(category.as_bytes());
    let bytes = hash.to_be_bytes();
    (bytes[0], bytes[1], bytes[2])
}

/// Format RGB as a CSS hex color string.
pub fn hex_css(r: u8, g: u8, b: u8) -> String {
    format!("#{r:02x}{g:02x}{b:02x}")
}

/// Darker shade of a color, used for marker borders.
pub fn border_shade(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (h, s, l) = rgb_to_hsl(r, g, b);
    hsl_to_rgb(h, s, l * 0.7)
}

/// Black or white, whichever reads better on top of the given fill.
pub fn label_text_color(r: u8, g: u8, b: u8) -> (u8, u8, u8) {
    let (_, _, l) = rgb_to_hsl(r, g, b);
    if l > 0.6 { (17, 24, 39) } else { (255, 255, 255) }
}

/// Convert RGB to HSL. Returns (h: 0..360, s: 0..1, l: 0..1).
fn rgb_to_hsl(r: u8, g: u8, b: u8) -> (f64, f64, f64) {
    let r = r as f64 / 255.0;
    let g = g as f64 / 255.0;
    let b = b as f64 / 255.0;

    let max = r.max(g).max(b);
    let min = r.min(g).min(b);
    let l = (max + min) / 2.0;

    if (max - min).abs() < f64::EPSILON {
        return (0.0, 0.0, l);
    }

    let d = max - min;
    let s = if l > 0.5 {
        d / (2.0 - max - min)
    } else {
        d / (max + min)
    };

    let h = if (max - r).abs() < f64::EPSILON {
        let mut h = (g - b) / d;
        if g < b {
            h += 6.0;
        }
        h
    } else if (max - g).abs() < f64::EPSILON {
        (b - r) / d + 2.0
    } else {
        (r - g) / d + 4.0
    };

    (h * 60.0, s, l)
}

/// Convert HSL to RGB.
fn hsl_to_rgb(h: f64, s: f64, l: f64) -> (u8, u8, u8) {
    if s.abs() < f64::EPSILON {
        let v = (l * 255.0).round() as u8;
        return (v, v, v);
    }

    let q = if l < 0.5 {
        l * (1.0 + s)
    } else {
        l + s - l * s
    };
    let p = 2.0 * l - q;
    let h = h / 360.0;

    let r = hue_to_rgb(p, q, h + 1.0 / 3.0);
    let g = hue_to_rgb(p, q, h);
    let b = hue_to_rgb(p, q, h - 1.0 / 3.0);

    (
        (r * 255.0).round() as u8,
        (g * 255.0).round() as u8,
        (b * 255.0).round() as u8,
    )
}

fn hue_to_rgb(p: f64, q: f64, mut t: f64) -> f64 {
    if t < 0.0 {
        t += 1.0;
    }
    if t > 1.0 {
        t -= 1.0;
    }
    if t < 1.0 / 6.0 {
        p + (q - p) * 6.0 * t
    } else if t < 1.0 / 2.0 {
        q
    } else if t < 2.0 / 3.0 {
        p + (q - p) * (2.0 / 3.0 - t) * 6.0
    } else {
        p
    }
}

#[cfg(test)]
mod tests {
    use super::{
        UNCATEGORIZED_COLOR, border_shade, category_color, hex_css, label_text_color, rgb_to_hsl,
    };

    #[test]
    fn border_shade_of_gray_stays_gray() {
        let (r, g, b) = border_shade(200, 200, 200);
        assert_eq!(r, g);
        assert_eq!(g, b);
        assert!(r < 200);
    }

    #[test]
    fn uncategorized_pins_get_white_labels() {
        let (r, g, b) = UNCATEGORIZED_COLOR;
        assert_eq!(label_text_color(r, g, b), (255, 255, 255));
    }

    #[test]
    fn hex_css_pads_components() {
        assert_eq!(hex_css(0, 10, 255), "#000aff");
    }

    #[test]
    fn border_shade_is_darker() {
        let (_, _, before) = rgb_to_hsl(37, 91, 201);
        let (r, g, b) = border_shade(37, 91, 201);
        let (_, _, after) = rgb_to_hsl(r, g, b);
        assert!(after < before);
    }

    #[test]
    fn label_text_contrasts_with_fill() {
        assert_eq!(label_text_color(250, 250, 250), (17, 24, 39));
        assert_eq!(label_text_color(20, 30, 90), (255, 255, 255));
    }

    #[test]
    fn category_color_is_deterministic() {
        let a = category_color("apartment");
        let b = category_color("apartment");
        assert_eq!(a, b);
    }

    #[test]
    fn category_color_varies_for_different_tags() {
        assert_ne!(category_color("apartment"), category_color("office"));
    }
}
