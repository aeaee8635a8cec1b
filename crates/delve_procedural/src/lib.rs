//! # DELVE Procedural Topology
//!
//! Deterministic synthesis of Subzone graphs.
//!
//! ## Design Principles
//!
//! 1. **Deterministic**: the same (chunk identity, seed) pair always produces
//!    the same graph
//! 2. **Connected by construction**: a Kruskal spanning tree is the backbone
//! 3. **Explorable**: extra loop edges, hidden passages and typed rooms on top
//! 4. **Checked**: the validator gates every generated or mutated graph
//!
//! ## Pipeline
//!
//! ```text
//! theme ──> LayoutKind ──> LayoutPlan (positions + candidate adjacency)
//!                              │
//!                              ▼
//!                       Kruskal MST (union-find)
//!                              │
//!                              ▼
//!           loops ──> node types ──> hidden edges ──> Vec<GraphNode>
//!                                                        │
//!                                                        ▼
//!                                              TopologyValidator
//! ```
//!
//! ## Example
//!
//! ```rust,ignore
//! use delve_procedural::{TopologyGenerator, TopologyParams, TopologyValidator};
//!
//! let generator = TopologyGenerator::default();
//! let nodes = generator.generate(&params)?;
//! let report = TopologyValidator::validate(&nodes);
//! assert!(report.passed());
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod directions;
pub mod error;
pub mod layout;
pub mod mst;
pub mod mutation;
pub mod topology;
pub mod traversal;
pub mod validator;

pub use directions::DirectionAllocator;
pub use error::{TopologyError, TopologyResult};
pub use layout::{LayoutKind, LayoutPlan};
pub use mst::{kruskal, UnionFind, WeightedEdge};
pub use mutation::{carve_edge, carve_targets, collapse_edge, MutationError};
pub use topology::{TopologyConfig, TopologyGenerator, TopologyParams};
pub use traversal::NodeIndex;
pub use validator::{
    ValidationCheck, ValidationFailure, ValidationProfile, ValidationReport, TopologyValidator,
};
