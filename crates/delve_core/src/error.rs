//! # Model Error Types
//!
//! Errors raised when persisted tags cannot be mapped back onto the model.

use thiserror::Error;

/// Errors that can occur while decoding model values.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum ModelError {
    /// A hierarchy level tag was not recognised.
    #[error("unknown chunk level: {0}")]
    UnknownLevel(String),

    /// A structural node type tag was not recognised.
    #[error("unknown node type: {0}")]
    UnknownNodeType(String),

    /// A biome theme tag was not recognised.
    #[error("unknown biome theme: {0}")]
    UnknownTheme(String),
}

/// Result type for model decoding.
pub type ModelResult<T> = Result<T, ModelError>;
