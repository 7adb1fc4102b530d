//! Error types for the dispatch core.
//!
//! Only malformed input is an error here. Unreachable routes, infeasible flow
//! networks and empty action masks degrade to empty results instead.

use thiserror::Error;

use crate::config::ConfigError;

/// Main error type for dispatch operations.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// Two inputs that must have the same length do not.
    #[error("shape mismatch for {what}: expected {expected}, got {actual}")]
    ShapeMismatch {
        what: &'static str,
        expected: usize,
        actual: usize,
    },

    /// A zone index does not exist in the current snapshot or environment.
    #[error("zone index {zone} out of range for {zones} zones")]
    ZoneOutOfRange { zone: usize, zones: usize },

    /// The same rider, driver or zone id appears twice in one input.
    #[error("duplicate id: {0}")]
    DuplicateId(String),

    /// Latitude or longitude outside the valid range (or not finite).
    #[error("invalid coordinate ({lat}, {lng})")]
    InvalidCoordinate { lat: f64, lng: f64 },

    /// Invalid configuration.
    #[error(transparent)]
    Config(#[from] ConfigError),

    /// The bounded worker pool for route queries could not be created.
    #[error("failed to build route query pool: {0}")]
    ThreadPool(String),
}

/// Result type alias for dispatch operations.
pub type Result<T> = std::result::Result<T, DispatchError>;
