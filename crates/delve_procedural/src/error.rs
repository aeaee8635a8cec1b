//! # Topology Error Types
//!
//! Invalid generation parameters. A structurally weak graph is not an error;
//! see `ValidationReport`.

use thiserror::Error;

/// Errors raised before any graph is produced.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum TopologyError {
    /// Configured node bounds are unusable.
    #[error("invalid node bounds: min {min}, max {max}")]
    InvalidNodeBounds {
        /// Configured minimum.
        min: u32,
        /// Configured maximum.
        max: u32,
    },

    /// Hidden-edge fraction range is outside `0.0..=1.0` or inverted.
    #[error("invalid hidden-edge fraction range {min}..={max}")]
    InvalidHiddenFraction {
        /// Configured minimum.
        min: f64,
        /// Configured maximum.
        max: f64,
    },

    /// The layout produced fewer nodes than a graph needs.
    #[error("layout produced {0} nodes; at least 3 are required")]
    LayoutTooSmall(usize),
}

/// Result type for topology generation.
pub type TopologyResult<T> = Result<T, TopologyError>;
