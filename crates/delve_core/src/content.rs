//! # Space Content
//!
//! The per-space record a player actually sees. It is created as a stub when
//! its Subzone is generated and filled on the first visit.
//!
//! An empty description is the stub marker. Filling is idempotent: once the
//! description is set, later fills leave the record untouched.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::graph::GraphNode;
use crate::ids::NodeId;

/// Ambient light level of a space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Brightness {
    /// No light at all.
    Pitch,
    /// Faint light.
    #[default]
    Dim,
    /// Comfortably lit.
    Lit,
    /// Brightly lit.
    Bright,
}

/// Terrain classification of a space.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Terrain {
    /// Dressed stone floors.
    #[default]
    Stone,
    /// Broken ground.
    Rubble,
    /// Standing water.
    Water,
    /// Soft mud or silt.
    Mud,
    /// Slick ice.
    Ice,
    /// Carpet of fungus.
    Fungal,
    /// Cooling lava crust.
    Ash,
    /// No floor worth the name.
    Void,
}

/// A trap placed in a space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Trap {
    /// Trap name.
    pub name: String,
    /// Difficulty to detect or disarm.
    pub difficulty: u8,
    /// Still armed.
    pub armed: bool,
}

/// A gatherable resource in a space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Resource {
    /// Resource name.
    pub name: String,
    /// Units available.
    pub quantity: u32,
}

/// A creature or NPC present in a space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Entity {
    /// Instance identity, unique within the world.
    pub id: String,
    /// Creature kind.
    pub kind: String,
    /// Challenge level.
    pub level: u8,
    /// Attacks on sight.
    pub hostile: bool,
}

/// Content of one Space.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct SpaceContent {
    /// The Space chunk this content belongs to.
    pub space_id: NodeId,
    /// Description text; empty while the space is a stub.
    pub description: String,
    /// Direction label -> destination, mirroring the node's edges.
    pub exits: BTreeMap<String, NodeId>,
    /// Ambient light.
    pub brightness: Brightness,
    /// Terrain class.
    pub terrain: Terrain,
    /// Placed traps.
    pub traps: Vec<Trap>,
    /// Gatherable resources.
    pub resources: Vec<Resource>,
    /// Creatures currently present.
    pub entities: Vec<Entity>,
    /// Items players left behind.
    pub items_dropped: Vec<String>,
    /// Player-caused state (door unlocked, chest opened, ...).
    pub state_flags: BTreeMap<String, bool>,
}

impl SpaceContent {
    /// Creates an empty stub whose exits mirror the node's edges.
    #[must_use]
    pub fn stub(node: &GraphNode) -> Self {
        let mut content = Self {
            space_id: node.id.clone(),
            ..Self::default()
        };
        content.sync_exits(node);
        content
    }

    /// True until the first fill.
    #[must_use]
    pub fn is_stub(&self) -> bool {
        self.description.is_empty()
    }

    /// Rebuilds the exit map from the node's edges.
    pub fn sync_exits(&mut self, node: &GraphNode) {
        self.exits = node
            .edges
            .iter()
            .map(|edge| (edge.direction.clone(), edge.target.clone()))
            .collect();
    }

    /// Reads a state flag (unset flags are false).
    #[must_use]
    pub fn flag(&self, name: &str) -> bool {
        self.state_flags.get(name).copied().unwrap_or(false)
    }

    /// Sets a state flag.
    pub fn set_flag(&mut self, name: impl Into<String>, value: bool) {
        self.state_flags.insert(name.into(), value);
    }

    /// Removes an entity by identity. Returns it if present.
    pub fn remove_entity(&mut self, entity_id: &str) -> Option<Entity> {
        let index = self.entities.iter().position(|e| e.id == entity_id)?;
        Some(self.entities.remove(index))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::graph::Edge;
    use crate::ids::ChunkId;

    #[test]
    fn test_stub_mirrors_edges() {
        let mut node = GraphNode::new(NodeId::new("s/n0"), ChunkId::new("s"), None);
        node.edges.push(Edge::passage(NodeId::new("s/n1"), "north"));
        node.edges.push(Edge::passage(NodeId::new("s/n2"), "climb"));

        let stub = SpaceContent::stub(&node);
        assert!(stub.is_stub());
        assert_eq!(stub.exits.len(), 2);
        assert_eq!(stub.exits.get("climb"), Some(&NodeId::new("s/n2")));
    }

    #[test]
    fn test_flags_and_entity_removal() {
        let mut content = SpaceContent::default();
        assert!(!content.flag("chest_opened"));
        content.set_flag("chest_opened", true);
        assert!(content.flag("chest_opened"));

        content.entities.push(Entity {
            id: "rat_1".to_string(),
            kind: "giant rat".to_string(),
            level: 1,
            hostile: true,
        });
        assert!(content.remove_entity("rat_1").is_some());
        assert!(content.remove_entity("rat_1").is_none());
    }

    #[test]
    fn test_content_serializes_as_structured_text() {
        let mut content = SpaceContent::default();
        content.set_flag("door_unlocked", true);
        let json = serde_json::to_string(&content).unwrap();
        let back: SpaceContent = serde_json::from_str(&json).unwrap();
        assert_eq!(back, content);
    }
}
