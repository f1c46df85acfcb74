use gloo_storage::Storage;
use serde::{Deserialize, Serialize};

use parcelmap_engine::config::EngineConfig;

pub const SETTINGS_KEY: &str = "parcelmap_settings";

const DEFAULT_STYLE_URL: &str = "https://demotiles.maplibre.org/style.json";

/// Persisted client settings. Every field falls back to its default, so an
/// older or partial blob in storage still loads.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    pub style_url: String,
    /// `[lng, lat]`, the order MapLibre takes.
    pub center: [f64; 2],
    pub zoom: f64,
    pub show_labels: bool,
    pub log_level: String,
    pub engine: EngineConfig,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            style_url: DEFAULT_STYLE_URL.to_string(),
            center: [2.3522, 48.8566],
            zoom: 11.0,
            show_labels: true,
            log_level: "info".to_string(),
            engine: EngineConfig::default(),
        }
    }
}

impl Settings {
    pub fn load() -> Self {
        let saved: Settings = gloo_storage::LocalStorage::get(SETTINGS_KEY).unwrap_or_default();
        saved.sanitized()
    }

    pub fn save(&self) {
        if let Err(e) = gloo_storage::LocalStorage::set(SETTINGS_KEY, self) {
            tracing::warn!(error = %e, "failed to persist settings");
        }
    }

    /// Replace an engine config that fails validation with the default one.
    pub fn sanitized(mut self) -> Self {
        if let Err(e) = self.engine.validate() {
            tracing::warn!(error = %e, "ignoring invalid stored engine config");
            self.engine = EngineConfig::default();
        }
        self
    }
}
