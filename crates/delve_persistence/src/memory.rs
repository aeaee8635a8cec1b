//! # In-Memory Store
//!
//! A `WorldStore` held entirely in process memory behind one `RwLock`.
//! Enforces the same referential rules as the SQLite store. Batches are
//! applied to a copy and swapped in only if every write succeeds.

use std::collections::{HashMap, HashSet};

use delve_core::{ChunkId, ChunkNode, GraphNode, NodeId, SpaceContent, WorldSeed};
use parking_lot::RwLock;

use crate::error::{PersistenceError, PersistenceResult};
use crate::repository::{
    ChunkRepository, CorpseRecord, CorpseRepository, GraphNodeRepository, RespawnRecord,
    RespawnRepository, SeedRepository, SpaceContentRepository, WorldStore,
};

#[derive(Clone, Debug, Default)]
struct MemoryState {
    chunks: HashMap<ChunkId, ChunkNode>,
    nodes: HashMap<NodeId, GraphNode>,
    /// Save order of nodes per Subzone.
    node_order: HashMap<ChunkId, Vec<NodeId>>,
    contents: HashMap<NodeId, SpaceContent>,
    seed: Option<WorldSeed>,
    corpses: Vec<CorpseRecord>,
    respawns: HashMap<NodeId, RespawnRecord>,
}

impl MemoryState {
    fn require_chunk(&self, child: &str, parent: &ChunkId) -> PersistenceResult<()> {
        if self.chunks.contains_key(parent) {
            Ok(())
        } else {
            Err(PersistenceError::MissingParent {
                child: child.to_string(),
                parent: parent.to_string(),
            })
        }
    }

    fn put_chunk(&mut self, chunk: &ChunkNode) -> PersistenceResult<()> {
        if let Some(parent) = &chunk.parent {
            self.require_chunk(chunk.id.as_str(), parent)?;
        }
        self.chunks.insert(chunk.id.clone(), chunk.clone());
        Ok(())
    }

    fn put_node(&mut self, node: &GraphNode) -> PersistenceResult<()> {
        self.require_chunk(node.id.as_str(), &node.chunk_id)?;
        if self.nodes.insert(node.id.clone(), node.clone()).is_none() {
            self.node_order
                .entry(node.chunk_id.clone())
                .or_default()
                .push(node.id.clone());
        }
        Ok(())
    }

    fn put_content(&mut self, content: &SpaceContent) -> PersistenceResult<()> {
        self.require_chunk(content.space_id.as_str(), &content.space_id.chunk_id())?;
        self.contents
            .insert(content.space_id.clone(), content.clone());
        Ok(())
    }

    /// The chunk and every chunk beneath it.
    fn subtree(&self, root: &ChunkId) -> HashSet<ChunkId> {
        let mut set = HashSet::from([root.clone()]);
        loop {
            let before = set.len();
            for chunk in self.chunks.values() {
                if chunk.parent.as_ref().is_some_and(|p| set.contains(p)) {
                    set.insert(chunk.id.clone());
                }
            }
            if set.len() == before {
                return set;
            }
        }
    }
}

/// In-process `WorldStore`.
#[derive(Debug, Default)]
pub struct MemoryStore {
    state: RwLock<MemoryState>,
}

impl MemoryStore {
    /// Creates an empty store.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored chunks.
    #[must_use]
    pub fn chunk_count(&self) -> usize {
        self.state.read().chunks.len()
    }
}

impl ChunkRepository for MemoryStore {
    fn save_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()> {
        self.state.write().put_chunk(chunk)
    }

    fn find_chunk(&self, id: &ChunkId) -> PersistenceResult<Option<ChunkNode>> {
        Ok(self.state.read().chunks.get(id).cloned())
    }

    fn update_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()> {
        let mut state = self.state.write();
        if !state.chunks.contains_key(&chunk.id) {
            return Err(PersistenceError::NotFound(chunk.id.to_string()));
        }
        state.put_chunk(chunk)
    }

    fn delete_chunk(&self, id: &ChunkId) -> PersistenceResult<bool> {
        let mut state = self.state.write();
        if !state.chunks.contains_key(id) {
            return Ok(false);
        }
        let doomed = state.subtree(id);
        state.chunks.retain(|key, _| !doomed.contains(key));
        state
            .nodes
            .retain(|_, node| !doomed.contains(&node.chunk_id) && !doomed.contains(&node.id.chunk_id()));
        state.node_order.retain(|key, _| !doomed.contains(key));
        for order in state.node_order.values_mut() {
            order.retain(|node| !doomed.contains(&node.chunk_id()));
        }
        state
            .contents
            .retain(|space, _| !doomed.contains(&space.chunk_id()));
        state
            .corpses
            .retain(|corpse| !doomed.contains(&corpse.space_id.chunk_id()));
        state
            .respawns
            .retain(|space, _| !doomed.contains(&space.chunk_id()));
        Ok(true)
    }
}

impl GraphNodeRepository for MemoryStore {
    fn save_node(&self, node: &GraphNode) -> PersistenceResult<()> {
        self.state.write().put_node(node)
    }

    fn find_node(&self, id: &NodeId) -> PersistenceResult<Option<GraphNode>> {
        Ok(self.state.read().nodes.get(id).cloned())
    }

    fn update_node(&self, node: &GraphNode) -> PersistenceResult<()> {
        let mut state = self.state.write();
        if !state.nodes.contains_key(&node.id) {
            return Err(PersistenceError::NotFound(node.id.to_string()));
        }
        state.put_node(node)
    }

    fn delete_node(&self, id: &NodeId) -> PersistenceResult<bool> {
        let mut state = self.state.write();
        let Some(node) = state.nodes.remove(id) else {
            return Ok(false);
        };
        if let Some(order) = state.node_order.get_mut(&node.chunk_id) {
            order.retain(|other| other != id);
        }
        Ok(true)
    }

    fn nodes_in_chunk(&self, chunk: &ChunkId) -> PersistenceResult<Vec<GraphNode>> {
        let state = self.state.read();
        let nodes = state
            .node_order
            .get(chunk)
            .map(|order| {
                order
                    .iter()
                    .filter_map(|id| state.nodes.get(id).cloned())
                    .collect()
            })
            .unwrap_or_default();
        Ok(nodes)
    }
}

impl SpaceContentRepository for MemoryStore {
    fn save_content(&self, content: &SpaceContent) -> PersistenceResult<()> {
        self.state.write().put_content(content)
    }

    fn find_content(&self, space: &NodeId) -> PersistenceResult<Option<SpaceContent>> {
        Ok(self.state.read().contents.get(space).cloned())
    }

    fn update_content(&self, content: &SpaceContent) -> PersistenceResult<()> {
        let mut state = self.state.write();
        if !state.contents.contains_key(&content.space_id) {
            return Err(PersistenceError::NotFound(content.space_id.to_string()));
        }
        state.put_content(content)
    }

    fn delete_content(&self, space: &NodeId) -> PersistenceResult<bool> {
        Ok(self.state.write().contents.remove(space).is_some())
    }
}

impl SeedRepository for MemoryStore {
    fn save_seed(&self, seed: &WorldSeed) -> PersistenceResult<bool> {
        let mut state = self.state.write();
        if state.seed.is_some() {
            return Ok(false);
        }
        state.seed = Some(seed.clone());
        Ok(true)
    }

    fn find_seed(&self) -> PersistenceResult<Option<WorldSeed>> {
        Ok(self.state.read().seed.clone())
    }

    fn update_seed(&self, seed: &WorldSeed) -> PersistenceResult<()> {
        let mut state = self.state.write();
        match state.seed.as_mut() {
            Some(stored) => {
                *stored = seed.clone();
                Ok(())
            }
            None => Err(PersistenceError::NotFound("world seed".to_string())),
        }
    }

    fn delete_seed(&self) -> PersistenceResult<bool> {
        Ok(self.state.write().seed.take().is_some())
    }
}

impl CorpseRepository for MemoryStore {
    fn save_corpse(&self, corpse: &CorpseRecord) -> PersistenceResult<()> {
        let mut state = self.state.write();
        state.require_chunk("corpse", &corpse.space_id.chunk_id())?;
        state.corpses.push(corpse.clone());
        Ok(())
    }

    fn find_corpses(&self, space: &NodeId) -> PersistenceResult<Vec<CorpseRecord>> {
        let state = self.state.read();
        let mut corpses: Vec<CorpseRecord> = state
            .corpses
            .iter()
            .filter(|corpse| &corpse.space_id == space)
            .cloned()
            .collect();
        corpses.sort_by_key(|corpse| corpse.died_at);
        Ok(corpses)
    }

    fn delete_corpses(&self, space: &NodeId) -> PersistenceResult<usize> {
        let mut state = self.state.write();
        let before = state.corpses.len();
        state.corpses.retain(|corpse| &corpse.space_id != space);
        Ok(before - state.corpses.len())
    }
}

impl RespawnRepository for MemoryStore {
    fn save_respawn(&self, record: &RespawnRecord) -> PersistenceResult<()> {
        let mut state = self.state.write();
        state.require_chunk("respawn", &record.space_id.chunk_id())?;
        state.respawns.insert(record.space_id.clone(), record.clone());
        Ok(())
    }

    fn find_respawn(&self, space: &NodeId) -> PersistenceResult<Option<RespawnRecord>> {
        Ok(self.state.read().respawns.get(space).cloned())
    }

    fn due_respawns(&self, now: u64) -> PersistenceResult<Vec<RespawnRecord>> {
        let state = self.state.read();
        let mut due: Vec<RespawnRecord> = state
            .respawns
            .values()
            .filter(|record| record.due_at <= now)
            .cloned()
            .collect();
        due.sort_by(|a, b| (a.due_at, &a.space_id).cmp(&(b.due_at, &b.space_id)));
        Ok(due)
    }

    fn delete_respawn(&self, space: &NodeId) -> PersistenceResult<bool> {
        Ok(self.state.write().respawns.remove(space).is_some())
    }
}

impl WorldStore for MemoryStore {
    fn save_batch(
        &self,
        chunks: &[ChunkNode],
        nodes: &[GraphNode],
        contents: &[SpaceContent],
    ) -> PersistenceResult<()> {
        let mut state = self.state.write();
        let mut staged = state.clone();
        for chunk in chunks {
            staged.put_chunk(chunk)?;
        }
        for node in nodes {
            staged.put_node(node)?;
        }
        for content in contents {
            staged.put_content(content)?;
        }
        *state = staged;
        Ok(())
    }

    fn reset_world(&self) -> PersistenceResult<()> {
        *self.state.write() = MemoryState::default();
        Ok(())
    }
}
