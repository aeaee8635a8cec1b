//! # DELVE Core
//!
//! The data model shared by every DELVE crate.
//!
//! ## Design Principles
//!
//! 1. **Identity, not ownership**: parents list child identities; lookups go
//!    through storage, so the in-memory world never forms pointer cycles
//! 2. **Deterministic**: every generation seed derives from the world seed and
//!    a chunk identity
//! 3. **Closed types**: structural node types are a sum type matched
//!    exhaustively wherever behaviour branches on them
//!
//! ## Hierarchy
//!
//! ```text
//! World ──> Region ──> Zone ──> Subzone ──> Space
//!                                  │
//!                                  └── graph of GraphNodes (one per Space)
//! ```
//!
//! ## Core Components
//!
//! - `ChunkNode`: one scope of the world with inherited lore and theme
//! - `GraphNode` / `Edge`: the navigable topology of a Subzone
//! - `SpaceContent`: the per-space stub, filled lazily on first visit
//! - `WorldSeed`: the singleton world record
//! - `GenerationSeed`: deterministic 64-bit seeds derived from identities

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod chunk;
pub mod constants;
pub mod content;
pub mod error;
pub mod graph;
pub mod ids;
pub mod seed;
pub mod theme;

pub use chunk::{ChunkLevel, ChunkNode, RegionTier};
pub use content::{Brightness, Entity, Resource, SpaceContent, Terrain, Trap};
pub use error::{ModelError, ModelResult};
pub use graph::{Edge, EdgeKind, GraphNode, NodeType, Position, TraversalCondition};
pub use ids::{ChunkId, EdgeId, NodeId};
pub use seed::{GenerationSeed, WorldSeed};
pub use theme::BiomeTheme;
