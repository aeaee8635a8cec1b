//! # Chunk Hierarchy
//!
//! Typed scopes of the world, from the single World root down to individual
//! Spaces. A chunk carries the lore and theme its children inherit.
//!
//! Every non-root chunk has exactly one parent, and that parent must already
//! exist in storage when the child is persisted. Graph nodes reference their
//! Subzone by identity, so this ordering is load-bearing.

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::constants::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use crate::error::{ModelError, ModelResult};
use crate::ids::ChunkId;
use crate::theme::BiomeTheme;

/// Hierarchy level of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum ChunkLevel {
    /// The single root of the world.
    World,
    /// A large themed area with a depth tier.
    Region,
    /// A cluster of Subzones inside a Region.
    Zone,
    /// The unit of topology generation: owns one graph.
    Subzone,
    /// One explorable room, backed by one graph node.
    Space,
}

impl ChunkLevel {
    /// The level directly below this one, if any.
    #[must_use]
    pub const fn child(self) -> Option<Self> {
        match self {
            Self::World => Some(Self::Region),
            Self::Region => Some(Self::Zone),
            Self::Zone => Some(Self::Subzone),
            Self::Subzone => Some(Self::Space),
            Self::Space => None,
        }
    }

    /// The level directly above this one, if any.
    #[must_use]
    pub const fn parent(self) -> Option<Self> {
        match self {
            Self::World => None,
            Self::Region => Some(Self::World),
            Self::Zone => Some(Self::Region),
            Self::Subzone => Some(Self::Zone),
            Self::Space => Some(Self::Subzone),
        }
    }

    /// Short prefix used when deriving child identities.
    #[must_use]
    pub const fn id_prefix(self) -> &'static str {
        match self {
            Self::World => "w",
            Self::Region => "r",
            Self::Zone => "z",
            Self::Subzone => "s",
            Self::Space => "n",
        }
    }

    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::World => "world",
            Self::Region => "region",
            Self::Zone => "zone",
            Self::Subzone => "subzone",
            Self::Space => "space",
        }
    }
}

impl fmt::Display for ChunkLevel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for ChunkLevel {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "world" => Ok(Self::World),
            "region" => Ok(Self::Region),
            "zone" => Ok(Self::Zone),
            "subzone" => Ok(Self::Subzone),
            "space" => Ok(Self::Space),
            other => Err(ModelError::UnknownLevel(other.to_string())),
        }
    }
}

/// How deep a Region sits. Deeper tiers are strictly harder.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum RegionTier {
    /// Near the surface.
    Upper,
    /// The middle depths.
    Mid,
    /// The deepest reaches.
    Lower,
}

impl RegionTier {
    /// Tier for the `index`-th Region created under one parent (cycles).
    #[must_use]
    pub const fn for_index(index: usize) -> Self {
        match index % 3 {
            0 => Self::Upper,
            1 => Self::Mid,
            _ => Self::Lower,
        }
    }

    /// Difficulty added on top of the parent's difficulty.
    #[must_use]
    pub const fn difficulty_bonus(self) -> u8 {
        match self {
            Self::Upper => 1,
            Self::Mid => 5,
            Self::Lower => 10,
        }
    }
}

/// One node in the five-level world hierarchy.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct ChunkNode {
    /// Identity.
    pub id: ChunkId,
    /// Hierarchy level.
    pub level: ChunkLevel,
    /// Parent identity, `None` only at the World root.
    pub parent: Option<ChunkId>,
    /// Ordered child identities.
    pub children: Vec<ChunkId>,
    /// Lore inherited (and varied) from the parent.
    pub lore: String,
    /// Biome theme tag.
    pub theme: BiomeTheme,
    /// Size estimate: child count for upper levels, node count for Subzones.
    pub size_estimate: u32,
    /// Mob density in `0.0..=1.0`.
    pub mob_density: f32,
    /// Difficulty in `MIN_DIFFICULTY..=MAX_DIFFICULTY`.
    pub difficulty: u8,
    /// Depth tier, set on Regions only.
    pub tier: Option<RegionTier>,
    /// Number of Subzones traversed along this chunk's lineage.
    pub depth: u32,
    /// Coarse navigation between sibling chunks, keyed by a label.
    pub adjacency: BTreeMap<String, ChunkId>,
}

impl ChunkNode {
    /// Creates the World root.
    #[must_use]
    pub fn root(lore: impl Into<String>, theme: BiomeTheme) -> Self {
        Self {
            id: ChunkId::root(),
            level: ChunkLevel::World,
            parent: None,
            children: Vec::new(),
            lore: lore.into(),
            theme,
            size_estimate: 3,
            mob_density: 0.2,
            difficulty: MIN_DIFFICULTY,
            tier: None,
            depth: 0,
            adjacency: BTreeMap::new(),
        }
    }

    /// Returns true if this is the World root.
    #[must_use]
    pub fn is_root(&self) -> bool {
        self.parent.is_none()
    }

    /// Clamps a raw difficulty into the legal range.
    #[must_use]
    pub fn clamp_difficulty(raw: i32) -> u8 {
        raw.clamp(i32::from(MIN_DIFFICULTY), i32::from(MAX_DIFFICULTY)) as u8
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_level_chain() {
        let mut level = ChunkLevel::World;
        let mut seen = vec![level];
        while let Some(next) = level.child() {
            assert_eq!(next.parent(), Some(level));
            seen.push(next);
            level = next;
        }
        assert_eq!(seen.len(), 5);
        assert_eq!(level, ChunkLevel::Space);
    }

    #[test]
    fn test_level_tag_roundtrip() {
        for level in [
            ChunkLevel::World,
            ChunkLevel::Region,
            ChunkLevel::Zone,
            ChunkLevel::Subzone,
            ChunkLevel::Space,
        ] {
            assert_eq!(level.as_str().parse::<ChunkLevel>(), Ok(level));
        }
        assert!("dimension".parse::<ChunkLevel>().is_err());
    }

    #[test]
    fn test_deeper_tiers_are_harder() {
        assert!(RegionTier::Mid.difficulty_bonus() > RegionTier::Upper.difficulty_bonus());
        assert!(RegionTier::Lower.difficulty_bonus() > RegionTier::Mid.difficulty_bonus());
        assert_eq!(RegionTier::for_index(4), RegionTier::Mid);
    }

    #[test]
    fn test_difficulty_clamp() {
        assert_eq!(ChunkNode::clamp_difficulty(-3), MIN_DIFFICULTY);
        assert_eq!(ChunkNode::clamp_difficulty(99), MAX_DIFFICULTY);
        assert_eq!(ChunkNode::clamp_difficulty(7), 7);
    }
}
