//! # World Persistence
//!
//! A cache of the currently loaded part of the world in front of a
//! `WorldStore`.
//!
//! ## Design
//!
//! - Chunks and graph nodes write through (`persist_*`), so a child is
//!   never stored without its parent and a passage never loses its pair
//! - Space content that changes during play is staged (`stage_content`)
//!   and marked dirty; `save_world_state` flushes it in one batch
//! - `prefetch_adjacent_spaces` warms the cache for a node's neighbours
//! - `retain_around` drops clean entries far from a node; dirty content
//!   stays until it has been saved
//!
//! Store writes happen while the cache lock is held, so a flush can never
//! overwrite a newer write-through with an older cached copy.

use std::collections::{BTreeSet, HashMap};
use std::sync::Arc;

use delve_core::{ChunkId, ChunkNode, GraphNode, NodeId, SpaceContent};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::error::PersistenceResult;
use crate::repository::{
    ChunkRepository, GraphNodeRepository, SpaceContentRepository, WorldStore,
};

#[derive(Debug, Default)]
struct WorldCache {
    chunks: HashMap<ChunkId, ChunkNode>,
    nodes: HashMap<NodeId, GraphNode>,
    contents: HashMap<NodeId, SpaceContent>,
    dirty: BTreeSet<NodeId>,
}

impl WorldCache {
    fn len(&self) -> usize {
        self.chunks.len() + self.nodes.len() + self.contents.len()
    }
}

/// Counts of what one `save_world_state` call wrote.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct SaveSummary {
    /// Space contents written.
    pub contents: usize,
}

impl SaveSummary {
    /// True if nothing was written.
    #[must_use]
    pub const fn is_empty(&self) -> bool {
        self.contents == 0
    }
}

/// Loaded-state cache with batched saves.
pub struct WorldPersistence {
    store: Arc<dyn WorldStore>,
    cache: Mutex<WorldCache>,
}

impl std::fmt::Debug for WorldPersistence {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let cache = self.cache.lock();
        f.debug_struct("WorldPersistence")
            .field("chunks", &cache.chunks.len())
            .field("nodes", &cache.nodes.len())
            .field("contents", &cache.contents.len())
            .field("dirty", &cache.dirty.len())
            .finish_non_exhaustive()
    }
}

impl WorldPersistence {
    /// Wraps a store with an empty cache.
    #[must_use]
    pub fn new(store: Arc<dyn WorldStore>) -> Self {
        Self {
            store,
            cache: Mutex::new(WorldCache::default()),
        }
    }

    /// The underlying store.
    #[must_use]
    pub fn store(&self) -> &Arc<dyn WorldStore> {
        &self.store
    }

    // =========================================================================
    // READS
    // =========================================================================

    /// A chunk, from cache or store.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn chunk(&self, id: &ChunkId) -> PersistenceResult<Option<ChunkNode>> {
        let mut cache = self.cache.lock();
        if let Some(chunk) = cache.chunks.get(id) {
            return Ok(Some(chunk.clone()));
        }
        let loaded = self.store.find_chunk(id)?;
        if let Some(chunk) = &loaded {
            cache.chunks.insert(id.clone(), chunk.clone());
        }
        Ok(loaded)
    }

    /// A graph node, from cache or store.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn node(&self, id: &NodeId) -> PersistenceResult<Option<GraphNode>> {
        let mut cache = self.cache.lock();
        if let Some(node) = cache.nodes.get(id) {
            return Ok(Some(node.clone()));
        }
        let loaded = self.store.find_node(id)?;
        if let Some(node) = &loaded {
            cache.nodes.insert(id.clone(), node.clone());
        }
        Ok(loaded)
    }

    /// Space content, from cache or store.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn content(&self, id: &NodeId) -> PersistenceResult<Option<SpaceContent>> {
        let mut cache = self.cache.lock();
        if let Some(content) = cache.contents.get(id) {
            return Ok(Some(content.clone()));
        }
        let loaded = self.store.find_content(id)?;
        if let Some(content) = &loaded {
            cache.contents.insert(id.clone(), content.clone());
        }
        Ok(loaded)
    }

    /// Every node of a Subzone, in generation order.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn subzone_nodes(&self, subzone: &ChunkId) -> PersistenceResult<Vec<GraphNode>> {
        let mut cache = self.cache.lock();
        let stored = self.store.nodes_in_chunk(subzone)?;
        Ok(stored
            .into_iter()
            .map(|node| {
                cache
                    .nodes
                    .entry(node.id.clone())
                    .or_insert(node)
                    .clone()
            })
            .collect())
    }

    // =========================================================================
    // WRITES
    // =========================================================================

    /// Writes chunks, nodes and contents through to the store as one batch.
    ///
    /// Contents written here are no longer dirty.
    ///
    /// # Errors
    ///
    /// The store's error; the cache is left unchanged on failure.
    pub fn persist_batch(
        &self,
        chunks: &[ChunkNode],
        nodes: &[GraphNode],
        contents: &[SpaceContent],
    ) -> PersistenceResult<()> {
        let mut cache = self.cache.lock();
        self.store.save_batch(chunks, nodes, contents)?;
        for chunk in chunks {
            cache.chunks.insert(chunk.id.clone(), chunk.clone());
        }
        for node in nodes {
            cache.nodes.insert(node.id.clone(), node.clone());
        }
        for content in contents {
            cache.dirty.remove(&content.space_id);
            cache
                .contents
                .insert(content.space_id.clone(), content.clone());
        }
        Ok(())
    }

    /// Writes one chunk through.
    ///
    /// # Errors
    ///
    /// The store's error.
    pub fn persist_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()> {
        self.persist_batch(std::slice::from_ref(chunk), &[], &[])
    }

    /// Writes one space's content through.
    ///
    /// # Errors
    ///
    /// The store's error.
    pub fn persist_content(&self, content: &SpaceContent) -> PersistenceResult<()> {
        self.persist_batch(&[], &[], std::slice::from_ref(content))
    }

    /// Updates cached content; written on the next `save_world_state`.
    pub fn stage_content(&self, content: SpaceContent) {
        let mut cache = self.cache.lock();
        cache.dirty.insert(content.space_id.clone());
        cache.contents.insert(content.space_id.clone(), content);
    }

    /// Number of contents waiting for the next save.
    #[must_use]
    pub fn dirty_count(&self) -> usize {
        self.cache.lock().dirty.len()
    }

    /// Number of cached chunks, nodes and contents.
    #[must_use]
    pub fn cached_count(&self) -> usize {
        self.cache.lock().len()
    }

    /// Saves every dirty content in one batch.
    ///
    /// Dirty marks are cleared only if the batch succeeds.
    ///
    /// # Errors
    ///
    /// The store's error; dirty entries stay dirty for the next attempt.
    pub fn save_world_state(&self) -> PersistenceResult<SaveSummary> {
        let mut cache = self.cache.lock();
        let contents: Vec<SpaceContent> = cache
            .dirty
            .iter()
            .filter_map(|id| cache.contents.get(id).cloned())
            .collect();

        let summary = SaveSummary {
            contents: contents.len(),
        };
        if summary.is_empty() {
            return Ok(summary);
        }

        self.store.save_batch(&[], &[], &contents)?;
        cache.dirty.clear();
        info!(contents = summary.contents, "saved world state");
        Ok(summary)
    }

    /// Loads the neighbours of `node` (graph node and content) into the cache.
    ///
    /// Returns how many neighbours were newly loaded.
    ///
    /// # Errors
    ///
    /// Storage errors.
    pub fn prefetch_adjacent_spaces(&self, node: &NodeId) -> PersistenceResult<usize> {
        let Some(origin) = self.node(node)? else {
            return Ok(0);
        };
        let mut loaded = 0;
        for edge in &origin.edges {
            let cached = {
                let cache = self.cache.lock();
                cache.nodes.contains_key(&edge.target) && cache.contents.contains_key(&edge.target)
            };
            if cached {
                continue;
            }
            self.node(&edge.target)?;
            self.content(&edge.target)?;
            loaded += 1;
        }
        debug!(node = %node, loaded, "prefetched adjacent spaces");
        Ok(loaded)
    }

    /// Keeps the Subzone of `node`, every Subzone its passages lead into,
    /// and their ancestors; drops every other clean entry.
    ///
    /// Returns how many entries were dropped.
    ///
    /// # Errors
    ///
    /// Storage errors while reading the kept neighbourhood.
    pub fn retain_around(&self, node: &NodeId) -> PersistenceResult<usize> {
        let Some(origin) = self.node(node)? else {
            return Ok(0);
        };
        let mut keep = BTreeSet::from([origin.chunk_id.clone()]);
        for member in self.subzone_nodes(&origin.chunk_id)? {
            for edge in &member.edges {
                if let Some(target) = self.node(&edge.target)? {
                    keep.insert(target.chunk_id);
                }
            }
        }

        let mut cache = self.cache.lock();
        let before = cache.len();
        let WorldCache {
            chunks,
            nodes,
            contents,
            dirty,
        } = &mut *cache;
        nodes.retain(|_, node| keep.contains(&node.chunk_id));
        contents.retain(|id, _| dirty.contains(id) || nodes.contains_key(id));
        chunks.retain(|id, chunk| {
            keep.contains(id)
                || chunk.parent.as_ref().is_some_and(|parent| keep.contains(parent))
                || keep.iter().any(|kept| id.is_ancestor_of(kept))
        });
        let dropped = before - cache.len();
        debug!(node = %node, subzones = keep.len(), dropped, "trimmed world cache");
        Ok(dropped)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::memory::MemoryStore;
    use delve_core::{BiomeTheme, ChunkLevel, Edge};

    fn seeded() -> (Arc<MemoryStore>, WorldPersistence, Vec<GraphNode>) {
        let store = Arc::new(MemoryStore::new());
        let persistence = WorldPersistence::new(store.clone());

        let root = ChunkNode::root("lore", BiomeTheme::Caverns);
        let subzone = ChunkNode {
            id: root.id.child(ChunkLevel::Subzone, 0),
            level: ChunkLevel::Subzone,
            parent: Some(root.id.clone()),
            ..root.clone()
        };
        let mut chunks = vec![root, subzone.clone()];
        let mut nodes = Vec::new();
        for i in 0..3 {
            let id = NodeId::in_subzone(&subzone.id, i);
            chunks.push(ChunkNode {
                id: id.chunk_id(),
                level: ChunkLevel::Space,
                parent: Some(subzone.id.clone()),
                ..subzone.clone()
            });
            nodes.push(GraphNode::new(id, subzone.id.clone(), None));
        }
        let (a, b, c) = (nodes[0].id.clone(), nodes[1].id.clone(), nodes[2].id.clone());
        nodes[0].edges.push(Edge::passage(b, "east"));
        nodes[0].edges.push(Edge::passage(c, "west"));
        nodes[1].edges.push(Edge::passage(a.clone(), "west"));
        nodes[2].edges.push(Edge::passage(a, "east"));
        let contents: Vec<SpaceContent> = nodes.iter().map(SpaceContent::stub).collect();

        persistence.persist_batch(&chunks, &nodes, &contents).unwrap();
        (store, WorldPersistence::new(persistence.store().clone()), nodes)
    }

    #[test]
    fn test_staged_content_saved_in_batch() {
        let (store, persistence, nodes) = seeded();
        let mut content = persistence.content(&nodes[1].id).unwrap().unwrap();
        content.set_flag("door_unlocked", true);
        persistence.stage_content(content.clone());
        assert_eq!(persistence.dirty_count(), 1);
        assert!(!store.find_content(&nodes[1].id).unwrap().unwrap().flag("door_unlocked"));

        let summary = persistence.save_world_state().unwrap();
        assert_eq!(summary.contents, 1);
        assert_eq!(persistence.dirty_count(), 0);
        assert_eq!(store.find_content(&nodes[1].id).unwrap(), Some(content));
        assert!(persistence.save_world_state().unwrap().is_empty());
    }

    #[test]
    fn test_prefetch_loads_neighbours_once() {
        let (_store, persistence, nodes) = seeded();
        assert_eq!(persistence.prefetch_adjacent_spaces(&nodes[0].id).unwrap(), 2);
        assert_eq!(persistence.prefetch_adjacent_spaces(&nodes[0].id).unwrap(), 0);
    }

    #[test]
    fn test_subzone_nodes_in_order() {
        let (_store, persistence, nodes) = seeded();
        let subzone = nodes[0].chunk_id.clone();
        assert_eq!(persistence.subzone_nodes(&subzone).unwrap(), nodes);
    }

    #[test]
    fn test_write_through_clears_dirty_mark() {
        let (store, persistence, nodes) = seeded();
        let mut staged = persistence.content(&nodes[2].id).unwrap().unwrap();
        staged.set_flag("lever_pulled", true);
        persistence.stage_content(staged.clone());

        staged.items_dropped.push("item_002".to_string());
        persistence.persist_content(&staged).unwrap();
        assert_eq!(persistence.dirty_count(), 0);
        assert_eq!(store.find_content(&nodes[2].id).unwrap(), Some(staged));
    }

    #[test]
    fn test_retain_around_keeps_neighbourhood_and_dirty() {
        let (store, persistence, nodes) = seeded();
        let home = nodes[0].chunk_id.clone();
        let parent = persistence.chunk(&home).unwrap().unwrap().parent.unwrap();

        let far = ChunkNode {
            id: parent.child(ChunkLevel::Subzone, 1),
            level: ChunkLevel::Subzone,
            parent: Some(parent.clone()),
            ..persistence.chunk(&home).unwrap().unwrap()
        };
        let far_nodes: Vec<GraphNode> = (0..2)
            .map(|i| GraphNode::new(NodeId::in_subzone(&far.id, i), far.id.clone(), None))
            .collect();
        let far_contents: Vec<SpaceContent> = far_nodes.iter().map(SpaceContent::stub).collect();
        let mut far_chunks = vec![far.clone()];
        far_chunks.extend(far_nodes.iter().map(|node| ChunkNode {
            id: node.id.chunk_id(),
            level: ChunkLevel::Space,
            parent: Some(far.id.clone()),
            ..far.clone()
        }));
        persistence
            .persist_batch(&far_chunks, &far_nodes, &far_contents)
            .unwrap();
        let mut unsaved = far_contents[1].clone();
        unsaved.set_flag("chest_opened", true);
        persistence.stage_content(unsaved.clone());

        let dropped = persistence.retain_around(&nodes[0].id).unwrap();
        // Three far chunks, both far nodes and the clean far content.
        assert_eq!(dropped, 6);
        assert_eq!(persistence.dirty_count(), 1);
        assert!(persistence.chunk(&home).unwrap().is_some());

        persistence.save_world_state().unwrap();
        assert_eq!(store.find_content(&unsaved.space_id).unwrap(), Some(unsaved));
        assert_eq!(
            persistence.node(&far_nodes[0].id).unwrap().as_ref(),
            Some(&far_nodes[0])
        );
    }
}
