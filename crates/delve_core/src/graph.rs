//! # Graph Topology Model
//!
//! Per-Subzone navigation graph. Each node is one Space; each edge is a
//! directed, labelled passage.
//!
//! Edges are directed but structurally paired: a traversable connection is
//! stored on both endpoints unless the edge kind is explicitly one-way
//! (breakout passages).

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};
use crate::ids::{ChunkId, EdgeId, NodeId};

/// Integer lattice position of a node inside its Subzone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct Position {
    /// East-west axis (east is positive).
    pub x: i32,
    /// North-south axis (south is positive).
    pub y: i32,
}

impl Position {
    /// Creates a position.
    #[inline]
    #[must_use]
    pub const fn new(x: i32, y: i32) -> Self {
        Self { x, y }
    }

    /// Euclidean distance to another position.
    #[inline]
    #[must_use]
    pub fn distance(self, other: Self) -> f64 {
        let dx = f64::from(self.x - other.x);
        let dy = f64::from(self.y - other.y);
        (dx * dx + dy * dy).sqrt()
    }

    /// Chebyshev (king-move) distance to another position.
    #[inline]
    #[must_use]
    pub fn chebyshev(self, other: Self) -> i32 {
        (self.x - other.x).abs().max((self.y - other.y).abs())
    }
}

/// Structural role of a node in its Subzone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum NodeType {
    /// Safe gathering point; entry of the Subzone.
    Hub,
    /// Corridor-like node with two exits.
    Linear,
    /// Junction with three or more exits.
    Branching,
    /// Single-exit cul-de-sac.
    DeadEnd,
    /// Reward room, often behind a hidden passage.
    TreasureRoom,
    /// The Subzone's boss lair, farthest from the hub.
    Boss,
    /// Expansion point toward not-yet-generated chunks.
    Frontier,
    /// Node hosting a quest hook.
    Questable,
}

impl NodeType {
    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Hub => "hub",
            Self::Linear => "linear",
            Self::Branching => "branching",
            Self::DeadEnd => "dead_end",
            Self::TreasureRoom => "treasure_room",
            Self::Boss => "boss",
            Self::Frontier => "frontier",
            Self::Questable => "questable",
        }
    }

    /// True if no hostile entities may spawn here.
    #[must_use]
    pub const fn is_safe(self) -> bool {
        match self {
            Self::Hub => true,
            Self::Linear
            | Self::Branching
            | Self::DeadEnd
            | Self::TreasureRoom
            | Self::Boss
            | Self::Frontier
            | Self::Questable => false,
        }
    }
}

impl fmt::Display for NodeType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for NodeType {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        match s {
            "hub" => Ok(Self::Hub),
            "linear" => Ok(Self::Linear),
            "branching" => Ok(Self::Branching),
            "dead_end" => Ok(Self::DeadEnd),
            "treasure_room" => Ok(Self::TreasureRoom),
            "boss" => Ok(Self::Boss),
            "frontier" => Ok(Self::Frontier),
            "questable" => Ok(Self::Questable),
            other => Err(ModelError::UnknownNodeType(other.to_string())),
        }
    }
}

/// How an edge came to exist.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum EdgeKind {
    /// Produced by topology generation.
    Passage,
    /// Dug by a player.
    Carved,
    /// Links a Frontier node to the hub of a sibling Subzone.
    Frontier,
    /// One-way drop from a Frontier node into a new Region.
    Breakout,
}

impl EdgeKind {
    /// True if this kind is stored on both endpoints.
    #[must_use]
    pub const fn is_paired(self) -> bool {
        match self {
            Self::Passage | Self::Carved | Self::Frontier => true,
            Self::Breakout => false,
        }
    }
}

/// A requirement that must be met to traverse an edge.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TraversalCondition {
    /// A named skill check against a difficulty class.
    SkillCheck {
        /// Skill name, e.g. `perception`.
        skill: String,
        /// Difficulty class.
        difficulty: u8,
    },
    /// An item that must be carried.
    RequiresItem {
        /// Item identity.
        item_id: String,
    },
}

/// A directed, labelled passage from one node to another.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct Edge {
    /// Destination node.
    pub target: NodeId,
    /// Direction label as the player sees it.
    pub direction: String,
    /// Hidden until revealed.
    pub hidden: bool,
    /// Conditions attached to traversal.
    pub conditions: Vec<TraversalCondition>,
    /// Origin of this edge.
    pub kind: EdgeKind,
}

impl Edge {
    /// Creates a visible, unconditional passage.
    #[must_use]
    pub fn passage(target: NodeId, direction: impl Into<String>) -> Self {
        Self {
            target,
            direction: direction.into(),
            hidden: false,
            conditions: Vec::new(),
            kind: EdgeKind::Passage,
        }
    }

    /// Sets the edge kind.
    #[must_use]
    pub fn with_kind(mut self, kind: EdgeKind) -> Self {
        self.kind = kind;
        self
    }

    /// Perception difficulty, if this edge is gated by one.
    #[must_use]
    pub fn perception_difficulty(&self) -> Option<u8> {
        self.conditions.iter().find_map(|condition| match condition {
            TraversalCondition::SkillCheck { skill, difficulty }
                if skill == crate::constants::PERCEPTION_SKILL =>
            {
                Some(*difficulty)
            }
            TraversalCondition::SkillCheck { .. } | TraversalCondition::RequiresItem { .. } => {
                None
            }
        })
    }
}

/// One node of a Subzone graph; one-to-one with a Space chunk.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct GraphNode {
    /// Identity (equal to the Space chunk identity).
    pub id: NodeId,
    /// Owning Subzone.
    pub chunk_id: ChunkId,
    /// Lattice position; absent for non-spatial layouts.
    pub position: Option<Position>,
    /// Structural type.
    pub node_type: NodeType,
    /// Ordered outgoing edges.
    pub edges: Vec<Edge>,
}

impl GraphNode {
    /// Creates a node without edges.
    #[must_use]
    pub fn new(id: NodeId, chunk_id: ChunkId, position: Option<Position>) -> Self {
        Self {
            id,
            chunk_id,
            position,
            node_type: NodeType::Linear,
            edges: Vec::new(),
        }
    }

    /// The edge leading to `target`, if any.
    #[must_use]
    pub fn edge_to(&self, target: &NodeId) -> Option<&Edge> {
        self.edges.iter().find(|edge| &edge.target == target)
    }

    /// The edge labelled `direction` (case-insensitive), if any.
    #[must_use]
    pub fn edge_by_direction(&self, direction: &str) -> Option<&Edge> {
        self.edges
            .iter()
            .find(|edge| edge.direction.eq_ignore_ascii_case(direction))
    }

    /// True if an edge to `target` exists.
    #[must_use]
    pub fn connects_to(&self, target: &NodeId) -> bool {
        self.edge_to(target).is_some()
    }

    /// True if `direction` is already used by an outgoing edge.
    #[must_use]
    pub fn has_direction(&self, direction: &str) -> bool {
        self.edge_by_direction(direction).is_some()
    }

    /// Identity of the passage through `edge`.
    #[must_use]
    pub fn edge_id(&self, edge: &Edge) -> EdgeId {
        EdgeId::between(&self.id, &edge.target)
    }

    /// Number of outgoing edges.
    #[must_use]
    pub fn out_degree(&self) -> usize {
        self.edges.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::constants::PERCEPTION_SKILL;

    #[test]
    fn test_position_distances() {
        let a = Position::new(0, 0);
        let b = Position::new(3, 4);
        assert!((a.distance(b) - 5.0).abs() < f64::EPSILON);
        assert_eq!(a.chebyshev(b), 4);
    }

    #[test]
    fn test_node_type_tags() {
        for ty in [
            NodeType::Hub,
            NodeType::Linear,
            NodeType::Branching,
            NodeType::DeadEnd,
            NodeType::TreasureRoom,
            NodeType::Boss,
            NodeType::Frontier,
            NodeType::Questable,
        ] {
            assert_eq!(ty.as_str().parse::<NodeType>(), Ok(ty));
        }
        assert!(NodeType::Hub.is_safe());
        assert!(!NodeType::Boss.is_safe());
    }

    #[test]
    fn test_edge_lookup_is_case_insensitive() {
        let mut node = GraphNode::new(NodeId::new("a"), ChunkId::new("s"), None);
        node.edges.push(Edge::passage(NodeId::new("b"), "North"));
        assert!(node.has_direction("north"));
        assert!(node.connects_to(&NodeId::new("b")));
        assert_eq!(node.out_degree(), 1);
    }

    #[test]
    fn test_perception_difficulty() {
        let mut edge = Edge::passage(NodeId::new("b"), "down");
        assert_eq!(edge.perception_difficulty(), None);
        edge.conditions.push(TraversalCondition::SkillCheck {
            skill: PERCEPTION_SKILL.to_string(),
            difficulty: 17,
        });
        assert_eq!(edge.perception_difficulty(), Some(17));
    }

    #[test]
    fn test_breakout_is_one_way() {
        assert!(!EdgeKind::Breakout.is_paired());
        assert!(EdgeKind::Carved.is_paired());
    }
}
