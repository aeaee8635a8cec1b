//! # Repositories
//!
//! One trait per entity kind, each with save / find / update / delete.
//! `save_*` is an idempotent upsert; `update_*` requires the row to exist.
//!
//! ## Write Order
//!
//! ```text
//! chunk(parent) ──> chunk(child) ──> graph node / space content / corpses
//! ```
//!
//! A non-root chunk is rejected with `MissingParent` until its parent is
//! stored. Graph nodes need their Subzone chunk; space content, corpses and
//! respawn records need their Space chunk.

use delve_core::{ChunkId, ChunkNode, Entity, GraphNode, NodeId, SpaceContent, WorldSeed};
use serde::{Deserialize, Serialize};

use crate::error::PersistenceResult;

/// A slain entity awaiting respawn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CorpseRecord {
    /// Space where the entity died.
    pub space_id: NodeId,
    /// The entity as it was when it died.
    pub entity: Entity,
    /// Unix time of death, in seconds.
    pub died_at: u64,
}

/// Pending respawn for one space.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct RespawnRecord {
    /// Space to repopulate.
    pub space_id: NodeId,
    /// Unix time, in seconds, from which the space may respawn.
    pub due_at: u64,
    /// Entities removed since the last respawn.
    pub removed: u32,
}

/// Chunk hierarchy storage.
pub trait ChunkRepository: Send + Sync {
    /// Inserts or replaces a chunk. Fails if its parent is not stored.
    ///
    /// # Errors
    ///
    /// `MissingParent` for orphans; storage errors otherwise.
    fn save_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()>;

    /// Loads a chunk.
    ///
    /// # Errors
    ///
    /// Storage or decoding errors.
    fn find_chunk(&self, id: &ChunkId) -> PersistenceResult<Option<ChunkNode>>;

    /// Replaces an existing chunk.
    ///
    /// # Errors
    ///
    /// `NotFound` if the chunk is not stored.
    fn update_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()>;

    /// Deletes a chunk and everything stored beneath it. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn delete_chunk(&self, id: &ChunkId) -> PersistenceResult<bool>;
}

/// Subzone graph storage.
pub trait GraphNodeRepository: Send + Sync {
    /// Inserts or replaces a node. Fails if its Subzone is not stored.
    ///
    /// # Errors
    ///
    /// `MissingParent` if the owning chunk is missing.
    fn save_node(&self, node: &GraphNode) -> PersistenceResult<()>;

    /// Loads a node.
    ///
    /// # Errors
    ///
    /// Storage or decoding errors.
    fn find_node(&self, id: &NodeId) -> PersistenceResult<Option<GraphNode>>;

    /// Replaces an existing node.
    ///
    /// # Errors
    ///
    /// `NotFound` if the node is not stored.
    fn update_node(&self, node: &GraphNode) -> PersistenceResult<()>;

    /// Deletes a node. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn delete_node(&self, id: &NodeId) -> PersistenceResult<bool>;

    /// Every node of a Subzone, in the order they were first saved.
    ///
    /// # Errors
    ///
    /// Storage or decoding errors.
    fn nodes_in_chunk(&self, chunk: &ChunkId) -> PersistenceResult<Vec<GraphNode>>;
}

/// Space content storage.
pub trait SpaceContentRepository: Send + Sync {
    /// Inserts or replaces content. Fails if the Space chunk is not stored.
    ///
    /// # Errors
    ///
    /// `MissingParent` if the Space chunk is missing.
    fn save_content(&self, content: &SpaceContent) -> PersistenceResult<()>;

    /// Loads content.
    ///
    /// # Errors
    ///
    /// Storage or decoding errors.
    fn find_content(&self, space: &NodeId) -> PersistenceResult<Option<SpaceContent>>;

    /// Replaces existing content.
    ///
    /// # Errors
    ///
    /// `NotFound` if no content is stored for the space.
    fn update_content(&self, content: &SpaceContent) -> PersistenceResult<()>;

    /// Deletes content. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn delete_content(&self, space: &NodeId) -> PersistenceResult<bool>;
}

/// The singleton world seed.
pub trait SeedRepository: Send + Sync {
    /// Stores the seed unless one exists. Returns false if one already did.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn save_seed(&self, seed: &WorldSeed) -> PersistenceResult<bool>;

    /// Loads the seed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn find_seed(&self) -> PersistenceResult<Option<WorldSeed>>;

    /// Replaces the stored seed.
    ///
    /// # Errors
    ///
    /// `NotFound` if the world is not initialized.
    fn update_seed(&self, seed: &WorldSeed) -> PersistenceResult<()>;

    /// Deletes the seed. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn delete_seed(&self) -> PersistenceResult<bool>;
}

/// Corpses of slain entities.
pub trait CorpseRepository: Send + Sync {
    /// Stores a corpse.
    ///
    /// # Errors
    ///
    /// `MissingParent` if the space is not stored.
    fn save_corpse(&self, corpse: &CorpseRecord) -> PersistenceResult<()>;

    /// Corpses lying in a space, oldest first.
    ///
    /// # Errors
    ///
    /// Storage or decoding errors.
    fn find_corpses(&self, space: &NodeId) -> PersistenceResult<Vec<CorpseRecord>>;

    /// Removes every corpse in a space. Returns how many were removed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn delete_corpses(&self, space: &NodeId) -> PersistenceResult<usize>;
}

/// Pending respawns.
pub trait RespawnRepository: Send + Sync {
    /// Inserts or replaces the respawn record of a space.
    ///
    /// # Errors
    ///
    /// `MissingParent` if the space is not stored.
    fn save_respawn(&self, record: &RespawnRecord) -> PersistenceResult<()>;

    /// Loads the respawn record of a space.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn find_respawn(&self, space: &NodeId) -> PersistenceResult<Option<RespawnRecord>>;

    /// Records due at or before `now`, earliest first.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn due_respawns(&self, now: u64) -> PersistenceResult<Vec<RespawnRecord>>;

    /// Deletes the respawn record of a space. Returns whether it existed.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn delete_respawn(&self, space: &NodeId) -> PersistenceResult<bool>;
}

/// A complete world store.
pub trait WorldStore:
    ChunkRepository
    + GraphNodeRepository
    + SpaceContentRepository
    + SeedRepository
    + CorpseRepository
    + RespawnRepository
{
    /// Saves chunks, then nodes, then content, as one unit where the store
    /// supports it. Chunks must be ordered parents first.
    ///
    /// # Errors
    ///
    /// The first failing write; transactional stores roll back the batch.
    fn save_batch(
        &self,
        chunks: &[ChunkNode],
        nodes: &[GraphNode],
        contents: &[SpaceContent],
    ) -> PersistenceResult<()>;

    /// Deletes every entity of the world, seed included.
    ///
    /// # Errors
    ///
    /// Storage errors.
    fn reset_world(&self) -> PersistenceResult<()>;
}
