use serde::de::DeserializeOwned;
use serde::{Deserialize, Deserializer, Serialize};
use tracing::warn;

use crate::error::GeometryError;

/// Smallest closed ring: a triangle plus the repeated first position.
pub const MIN_RING_POSITIONS: usize = 4;

/// WGS84 coordinate in degrees.
///
/// A missing, `null` or non-numeric component deserializes as `NaN` so one
/// bad pin drops out of the validity filter instead of failing the whole
/// snapshot.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct LatLng {
    #[serde(default = "missing_degrees", deserialize_with = "lenient_degrees")]
    pub lat: f64,
    #[serde(default = "missing_degrees", deserialize_with = "lenient_degrees")]
    pub lng: f64,
}

impl LatLng {
    pub const fn new(lat: f64, lng: f64) -> Self {
        Self { lat, lng }
    }

    pub const fn missing() -> Self {
        Self {
            lat: f64::NAN,
            lng: f64::NAN,
        }
    }

    pub fn is_finite(&self) -> bool {
        self.lat.is_finite() && self.lng.is_finite()
    }

    /// GeoJSON position order.
    pub const fn to_position(self) -> Position {
        [self.lng, self.lat]
    }
}

fn missing_degrees() -> f64 {
    f64::NAN
}

fn lenient_degrees<'de, D: Deserializer<'de>>(deserializer: D) -> Result<f64, D::Error> {
    let value = serde_json::Value::deserialize(deserializer)?;
    Ok(value.as_f64().unwrap_or(f64::NAN))
}

fn default_visible() -> bool {
    true
}

/// Point entity ("pin") as supplied by the data layer.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Pin {
    pub id: String,
    #[serde(default = "LatLng::missing")]
    pub coordinates: LatLng,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    /// Single glyph (emoji or icon-font code point) drawn inside the marker.
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub icon: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub color: Option<(u8, u8, u8)>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    pub media: Vec<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Pin {
    pub fn new(id: impl Into<String>, lat: f64, lng: f64) -> Self {
        Self {
            id: id.into(),
            coordinates: LatLng::new(lat, lng),
            label: None,
            description: None,
            icon: None,
            color: None,
            visible: true,
            media: Vec::new(),
            category: None,
        }
    }

    pub fn with_label(mut self, label: impl Into<String>) -> Self {
        self.label = Some(label.into());
        self
    }

    pub fn with_category(mut self, category: impl Into<String>) -> Self {
        self.category = Some(category.into());
        self
    }

    pub fn has_valid_coordinates(&self) -> bool {
        self.coordinates.is_finite()
    }
}

/// `[lng, lat]`, GeoJSON order.
pub type Position = [f64; 2];
pub type Ring = Vec<Position>;

/// Polygon or multi-polygon in GeoJSON layout.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "coordinates")]
pub enum Geometry {
    Polygon(Vec<Ring>),
    MultiPolygon(Vec<Vec<Ring>>),
}

impl Geometry {
    /// Every polygon as its list of rings (outer ring first).
    pub fn polygons(&self) -> &[Vec<Ring>] {
        match self {
            Self::Polygon(rings) => std::slice::from_ref(rings),
            Self::MultiPolygon(polygons) => polygons,
        }
    }

    pub fn positions(&self) -> impl Iterator<Item = &Position> {
        self.polygons().iter().flatten().flatten()
    }

    /// Bounding box over every position. `None` for an empty geometry or one
    /// containing a non-finite coordinate.
    pub fn bounds(&self) -> Option<Bounds> {
        let mut bounds: Option<Bounds> = None;
        for &[lng, lat] in self.positions() {
            if !lng.is_finite() || !lat.is_finite() {
                return None;
            }
            match bounds.as_mut() {
                Some(b) => b.extend(lng, lat),
                None => bounds = Some(Bounds::point(lng, lat)),
            }
        }
        bounds
    }

    pub fn validate(&self) -> Result<(), GeometryError> {
        let polygons = self.polygons();
        if polygons.is_empty() {
            return Err(GeometryError::Empty);
        }
        for (polygon, rings) in polygons.iter().enumerate() {
            if rings.is_empty() {
                return Err(GeometryError::Empty);
            }
            for (ring, positions) in rings.iter().enumerate() {
                if positions.len() < MIN_RING_POSITIONS {
                    return Err(GeometryError::RingTooShort {
                        polygon,
                        ring,
                        len: positions.len(),
                    });
                }
                if positions.iter().flatten().any(|v| !v.is_finite()) {
                    return Err(GeometryError::NonFinite { polygon, ring });
                }
                if positions.first() != positions.last() {
                    return Err(GeometryError::NotClosed { polygon, ring });
                }
            }
        }
        Ok(())
    }
}

/// Axis-aligned box in degrees.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Bounds {
    pub west: f64,
    pub south: f64,
    pub east: f64,
    pub north: f64,
}

impl Bounds {
    pub const fn point(lng: f64, lat: f64) -> Self {
        Self {
            west: lng,
            south: lat,
            east: lng,
            north: lat,
        }
    }

    pub fn extend(&mut self, lng: f64, lat: f64) {
        self.west = self.west.min(lng);
        self.east = self.east.max(lng);
        self.south = self.south.min(lat);
        self.north = self.north.max(lat);
    }
}

/// Polygon entity ("area").
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Area {
    pub id: String,
    pub geometry: Geometry,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    #[serde(default = "default_visible")]
    pub visible: bool,
    #[serde(default)]
    #[serde(skip_serializing_if = "Option::is_none")]
    pub category: Option<String>,
}

impl Area {
    pub fn new(id: impl Into<String>, geometry: Geometry) -> Self {
        Self {
            id: id.into(),
            geometry,
            name: None,
            description: None,
            visible: true,
            category: None,
        }
    }
}

/// Decode a list one element at a time, dropping the elements that do not fit
/// `T` so the rest of the list survives.
pub fn decode_each<T: DeserializeOwned>(values: Vec<serde_json::Value>, kind: &'static str) -> Vec<T> {
    values
        .into_iter()
        .enumerate()
        .filter_map(|(index, value)| match serde_json::from_value(value) {
            Ok(entity) => Some(entity),
            Err(e) => {
                warn!(kind, index, error = %e, "skipping undecodable entry");
                None
            }
        })
        .collect()
}

/// Everything the data layer pushes in one update.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct Snapshot {
    #[serde(default)]
    pub pins: Vec<Pin>,
    #[serde(default)]
    pub areas: Vec<Area>,
}
