//! # Generation Error Types
//!
//! Failures surfaced by the world engine. Rejected mutations and missing
//! text-generation output are not errors; they are ordinary outcomes.

use delve_core::{ChunkId, ChunkLevel, NodeId};
use delve_persistence::PersistenceError;
use delve_procedural::TopologyError;
use thiserror::Error;

use crate::config::ConfigError;

/// Errors that can occur while generating or navigating the world.
#[derive(Error, Debug)]
pub enum GenerationError {
    /// No topology attempt passed validation. Fatal for the chunk.
    #[error(
        "subzone {chunk} failed validation after {attempts} attempts: {}",
        .reasons.join("; ")
    )]
    RetriesExhausted {
        /// Subzone being generated.
        chunk: ChunkId,
        /// Attempts made.
        attempts: u32,
        /// Failure reasons of the last attempt.
        reasons: Vec<String>,
    },

    /// The requested level cannot be created under the parent.
    #[error("cannot create a {requested} chunk under a {parent} chunk")]
    InvalidLevel {
        /// Level of the parent.
        parent: ChunkLevel,
        /// Level requested.
        requested: ChunkLevel,
    },

    /// A chunk identity that storage does not know.
    #[error("unknown chunk: {0}")]
    UnknownChunk(ChunkId),

    /// A node identity that storage does not know.
    #[error("unknown node: {0}")]
    UnknownNode(NodeId),

    /// Storage failed.
    #[error("persistence error: {0}")]
    Persistence(#[from] PersistenceError),

    /// Topology parameters were unusable.
    #[error("topology error: {0}")]
    Topology(#[from] TopologyError),

    /// Settings failed their consistency check.
    #[error("configuration error: {0}")]
    Config(#[from] ConfigError),

    /// No world seed is stored yet.
    #[error("world is not initialized")]
    WorldNotInitialized,
}

/// Result type for world engine operations.
pub type GenerationResult<T> = Result<T, GenerationError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_retries_exhausted_lists_reasons() {
        let err = GenerationError::RetriesExhausted {
            chunk: ChunkId::new("world/r0/z0/s0"),
            attempts: 5,
            reasons: vec!["no cycle".to_string(), "2 frontiers".to_string()],
        };
        let message = err.to_string();
        assert!(message.contains("after 5 attempts"));
        assert!(message.contains("no cycle; 2 frontiers"));
    }

    #[test]
    fn test_persistence_error_converts() {
        let err: GenerationError = PersistenceError::NotFound("chunk world".to_string()).into();
        assert!(matches!(err, GenerationError::Persistence(_)));
    }
}
