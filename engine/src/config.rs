use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::error::ConfigError;

pub const DEFAULT_DEBOUNCE_MS: u64 = 50;
/// 6 decimal places is roughly 0.1 m at the equator.
pub const DEFAULT_KEY_PRECISION: u32 = 6;
pub const MAX_KEY_PRECISION: u32 = 9;

pub const DEFAULT_AREA_SOURCE: &str = "parcelmap-areas";
pub const DEFAULT_AREA_FILL_LAYER: &str = "parcelmap-areas-fill";
pub const DEFAULT_AREA_OUTLINE_LAYER: &str = "parcelmap-areas-outline";
/// Prefix the draw library uses for its own sources and layers.
pub const DEFAULT_DRAW_PREFIX: &str = "gl-draw";

pub const DEFAULT_AREA_COLOR: (u8, u8, u8) = (37, 99, 235);
pub const DEFAULT_FILL_OPACITY: f64 = 0.2;
pub const DEFAULT_FILL_OPACITY_HOVER: f64 = 0.4;
pub const DEFAULT_OUTLINE_WIDTH: f64 = 2.0;

/// What happens to a rendered pin whose id survives but whose coordinates moved.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MovePolicy {
    /// Leave the marker where it was first placed; only its content refreshes.
    #[default]
    KeepPosition,
    /// Remove and re-add the marker at the new position.
    Recreate,
}

/// Source and layer ids shared by every component drawing on one surface.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct LayerNames {
    pub area_source: String,
    pub area_fill: String,
    pub area_outline: String,
    pub draw_prefix: String,
}

impl Default for LayerNames {
    fn default() -> Self {
        Self {
            area_source: DEFAULT_AREA_SOURCE.to_string(),
            area_fill: DEFAULT_AREA_FILL_LAYER.to_string(),
            area_outline: DEFAULT_AREA_OUTLINE_LAYER.to_string(),
            draw_prefix: DEFAULT_DRAW_PREFIX.to_string(),
        }
    }
}

impl LayerNames {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let named = [
            ("area_source", &self.area_source),
            ("area_fill", &self.area_fill),
            ("area_outline", &self.area_outline),
        ];
        for (field, name) in named {
            if name.trim().is_empty() {
                return Err(ConfigError::EmptyName { field });
            }
            if !self.draw_prefix.is_empty() && name.starts_with(&self.draw_prefix) {
                return Err(ConfigError::ReservedPrefix {
                    name: name.clone(),
                    prefix: self.draw_prefix.clone(),
                });
            }
        }
        for (i, (first, a)) in named.iter().enumerate() {
            for (second, b) in &named[i + 1..] {
                if a == b {
                    return Err(ConfigError::NameCollision {
                        first: *first,
                        second: *second,
                        name: (*a).clone(),
                    });
                }
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AreaPaint {
    pub fill_color: (u8, u8, u8),
    pub fill_opacity: f64,
    pub fill_opacity_hover: f64,
    pub outline_color: (u8, u8, u8),
    pub outline_width: f64,
}

impl Default for AreaPaint {
    fn default() -> Self {
        Self {
            fill_color: DEFAULT_AREA_COLOR,
            fill_opacity: DEFAULT_FILL_OPACITY,
            fill_opacity_hover: DEFAULT_FILL_OPACITY_HOVER,
            outline_color: DEFAULT_AREA_COLOR,
            outline_width: DEFAULT_OUTLINE_WIDTH,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub debounce_ms: u64,
    pub key_precision: u32,
    pub move_policy: MovePolicy,
    pub layers: LayerNames,
    pub area_paint: AreaPaint,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            debounce_ms: DEFAULT_DEBOUNCE_MS,
            key_precision: DEFAULT_KEY_PRECISION,
            move_policy: MovePolicy::default(),
            layers: LayerNames::default(),
            area_paint: AreaPaint::default(),
        }
    }
}

impl EngineConfig {
    pub fn debounce_window(&self) -> Duration {
        Duration::from_millis(self.debounce_ms)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.debounce_ms == 0 {
            return Err(ConfigError::ZeroDebounceWindow);
        }
        if self.key_precision > MAX_KEY_PRECISION {
            return Err(ConfigError::KeyPrecision(self.key_precision));
        }
        self.layers.validate()
    }
}
