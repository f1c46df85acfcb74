//! Error types for the engine.
//!
//! None of these escape the public reconcile/render/draw operations; they are
//! logged where they occur and the pass carries on.

use thiserror::Error;

/// Failure reported by a rendering surface adapter.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum SurfaceError {
    /// The surface refused the call (style not loaded, bad spec, ...)
    #[error("surface rejected {operation}: {reason}")]
    Rejected {
        /// Adapter operation name.
        operation: &'static str,
        /// Reason given by the surface.
        reason: String,
    },

    #[error("no marker with id {0}")]
    MissingMarker(String),

    #[error("no layer named {0}")]
    MissingLayer(String),

    #[error("no source named {0}")]
    MissingSource(String),

    /// Exception thrown by the JavaScript map library.
    #[error("map library error: {0}")]
    Js(String),
}

impl SurfaceError {
    pub fn rejected(operation: &'static str, reason: impl Into<String>) -> Self {
        Self::Rejected {
            operation,
            reason: reason.into(),
        }
    }
}

/// Structural problem with a polygon geometry.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum GeometryError {
    #[error("geometry has no polygons or a polygon has no rings")]
    Empty,

    #[error("ring {ring} of polygon {polygon} has {len} positions, need at least 4")]
    RingTooShort {
        polygon: usize,
        ring: usize,
        len: usize,
    },

    #[error("ring {ring} of polygon {polygon} is not closed")]
    NotClosed { polygon: usize, ring: usize },

    #[error("ring {ring} of polygon {polygon} has a non-finite coordinate")]
    NonFinite { polygon: usize, ring: usize },
}

/// Invalid engine configuration.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ConfigError {
    #[error("{field} must not be empty")]
    EmptyName { field: &'static str },

    #[error("{first} and {second} share the name {name:?}")]
    NameCollision {
        first: &'static str,
        second: &'static str,
        name: String,
    },

    #[error("layer {name:?} uses the reserved draw prefix {prefix:?}")]
    ReservedPrefix { name: String, prefix: String },

    #[error("debounce window must be greater than zero")]
    ZeroDebounceWindow,

    #[error("key precision {0} is outside 0..=9")]
    KeyPrecision(u32),
}
