//! # Identities
//!
//! Chunk and node identities are path-like strings built from the parent
//! identity, so the same lineage always yields the same identity and
//! therefore the same generation seed.
//!
//! ```text
//! world
//! world/r0
//! world/r0/z1
//! world/r0/z1/s0
//! world/r0/z1/s0/n7      <- a Space chunk and its graph node
//! ```

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::chunk::ChunkLevel;

/// Identity of a chunk at any hierarchy level.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct ChunkId(String);

impl ChunkId {
    /// Identity of the world root.
    pub const ROOT: &'static str = "world";

    /// Creates an identity from a raw string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// The world root identity.
    #[must_use]
    pub fn root() -> Self {
        Self(Self::ROOT.to_string())
    }

    /// Derives the identity of the `index`-th child at `level`.
    #[must_use]
    pub fn child(&self, level: ChunkLevel, index: usize) -> Self {
        Self(format!("{}/{}{}", self.0, level.id_prefix(), index))
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }

    /// True if `other` lies strictly below this chunk in the hierarchy.
    #[must_use]
    pub fn is_ancestor_of(&self, other: &Self) -> bool {
        other
            .0
            .strip_prefix(self.0.as_str())
            .is_some_and(|rest| rest.starts_with('/'))
    }
}

impl fmt::Display for ChunkId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Identity of a graph node. Always equal to the identity of its Space chunk.
#[derive(Clone, Debug, Default, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct NodeId(String);

impl NodeId {
    /// Creates an identity from a raw string.
    #[must_use]
    pub fn new(raw: impl Into<String>) -> Self {
        Self(raw.into())
    }

    /// Identity of the `index`-th node of a Subzone.
    #[must_use]
    pub fn in_subzone(subzone: &ChunkId, index: usize) -> Self {
        Self(subzone.child(ChunkLevel::Space, index).0)
    }

    /// The Space chunk backing this node.
    #[must_use]
    pub fn chunk_id(&self) -> ChunkId {
        ChunkId(self.0.clone())
    }

    /// Returns the raw string.
    #[must_use]
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for NodeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&ChunkId> for NodeId {
    fn from(value: &ChunkId) -> Self {
        Self(value.0.clone())
    }
}

/// Identity of a passage between two nodes.
///
/// The pair is stored in canonical order, so `A -> B` and `B -> A` share an
/// identity: revealing a hidden passage reveals both of its directions.
#[derive(Clone, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct EdgeId {
    low: NodeId,
    high: NodeId,
}

impl EdgeId {
    /// Creates the identity of the passage between `a` and `b`.
    #[must_use]
    pub fn between(a: &NodeId, b: &NodeId) -> Self {
        if a <= b {
            Self { low: a.clone(), high: b.clone() }
        } else {
            Self { low: b.clone(), high: a.clone() }
        }
    }
}

impl fmt::Display for EdgeId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}<->{}", self.low, self.high)
    }
}
