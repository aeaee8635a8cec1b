//! # Respawn Manager
//!
//! Tracks slain creatures and repopulates their spaces once the respawn
//! delay has passed.
//!
//! ```text
//! record_death ──> corpse row + respawn row (due_at = now + delay)
//!                                   │
//! respawn_world ── due rows ──> populator(round = due_at) ──> entities
//!                                   └── state flags and dropped items kept
//! ```

use std::sync::Arc;
use std::time::{SystemTime, UNIX_EPOCH};

use delve_core::seed::purpose;
use delve_core::{Entity, NodeId, WorldSeed};
use delve_persistence::{
    CorpseRecord, CorpseRepository, RespawnRecord, RespawnRepository, SeedRepository,
    WorldPersistence,
};
use tracing::{debug, info};

use crate::config::RespawnConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::events::{emit, EventSender, WorldEvent};
use crate::generator::WriteLock;
use crate::populator::{ContentPopulator, PopulationRequest};

/// What one `respawn_world` pass did.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub struct RespawnReport {
    /// Spaces repopulated.
    pub spaces: usize,
    /// Creatures placed across those spaces.
    pub entities: usize,
}

/// Records deaths and repopulates spaces.
pub struct RespawnManager {
    persistence: Arc<WorldPersistence>,
    populator: Arc<dyn ContentPopulator>,
    respawn_after_secs: u64,
    writer: WriteLock,
    events: Option<EventSender>,
}

impl std::fmt::Debug for RespawnManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RespawnManager")
            .field("respawn_after_secs", &self.respawn_after_secs)
            .finish_non_exhaustive()
    }
}

impl RespawnManager {
    /// Creates a manager sharing `writer` with the rest of the world.
    #[must_use]
    pub fn new(
        config: &RespawnConfig,
        persistence: Arc<WorldPersistence>,
        populator: Arc<dyn ContentPopulator>,
        writer: WriteLock,
    ) -> Self {
        Self {
            persistence,
            populator,
            respawn_after_secs: config.respawn_after_secs,
            writer,
            events: None,
        }
    }

    /// Publishes respawn events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Removes `entity_id` from `space` and schedules the space to respawn.
    ///
    /// Returns the removed entity, or `None` if it was not there.
    ///
    /// # Errors
    ///
    /// `UnknownNode` if the space has no content; storage failures.
    pub fn record_death(
        &self,
        space: &NodeId,
        entity_id: &str,
        now: u64,
    ) -> GenerationResult<Option<Entity>> {
        let _writer = self.writer.lock();
        let mut content = self
            .persistence
            .content(space)?
            .ok_or_else(|| GenerationError::UnknownNode(space.clone()))?;
        let Some(entity) = content.remove_entity(entity_id) else {
            debug!(space = %space, entity = entity_id, "no such entity");
            return Ok(None);
        };

        let store = self.persistence.store();
        store.save_corpse(&CorpseRecord {
            space_id: space.clone(),
            entity: entity.clone(),
            died_at: now,
        })?;
        let removed = store
            .find_respawn(space)?
            .map_or(0, |record| record.removed);
        store.save_respawn(&RespawnRecord {
            space_id: space.clone(),
            due_at: now.saturating_add(self.respawn_after_secs),
            removed: removed + 1,
        })?;
        self.persistence.persist_content(&content)?;

        debug!(space = %space, entity = %entity.id, "recorded death");
        Ok(Some(entity))
    }

    /// Repopulates every space due at the current wall-clock time.
    ///
    /// # Errors
    ///
    /// See [`RespawnManager::respawn_world_at`].
    pub fn respawn_world(&self) -> GenerationResult<RespawnReport> {
        let now = SystemTime::now()
            .duration_since(UNIX_EPOCH)
            .map_or(0, |elapsed| elapsed.as_secs());
        self.respawn_world_at(now)
    }

    /// Repopulates every space whose respawn is due at `now`.
    ///
    /// The entity list is rolled again; state flags and dropped items are
    /// left exactly as they were.
    ///
    /// # Errors
    ///
    /// `WorldNotInitialized` without a seed; storage failures.
    pub fn respawn_world_at(&self, now: u64) -> GenerationResult<RespawnReport> {
        let store = self.persistence.store();
        let due = store.due_respawns(now)?;
        if due.is_empty() {
            return Ok(RespawnReport::default());
        }
        let world = store.find_seed()?.ok_or(GenerationError::WorldNotInitialized)?;

        let mut report = RespawnReport::default();
        for record in due {
            let Some(placed) = self.respawn_space(&world, &record)? else {
                continue;
            };
            report.spaces += 1;
            report.entities += placed;
            emit(
                self.events.as_ref(),
                WorldEvent::SpaceRespawned {
                    space: record.space_id.clone(),
                    entities: placed,
                },
            );
        }
        info!(spaces = report.spaces, entities = report.entities, "respawn pass complete");
        Ok(report)
    }

    fn respawn_space(&self, world: &WorldSeed, record: &RespawnRecord) -> GenerationResult<Option<usize>> {
        let space = &record.space_id;
        let Some(node) = self.persistence.node(space)? else {
            debug!(space = %space, "respawn for missing space dropped");
            self.persistence.store().delete_respawn(space)?;
            return Ok(None);
        };
        let subzone = self
            .persistence
            .chunk(&node.chunk_id)?
            .ok_or_else(|| GenerationError::UnknownChunk(node.chunk_id.clone()))?;

        let population = self.populator.populate(&PopulationRequest {
            space,
            node_type: node.node_type,
            theme: subzone.theme,
            difficulty: subzone.difficulty,
            mob_density: subzone.mob_density,
            seed: world.for_chunk(&space.chunk_id()).derive(purpose::RESPAWN),
            round: record.due_at,
        });

        let _writer = self.writer.lock();
        let Some(mut content) = self.persistence.content(space)? else {
            return Ok(None);
        };
        content.entities = population.entities;
        let placed = content.entities.len();
        self.persistence.persist_content(&content)?;

        let store = self.persistence.store();
        store.delete_respawn(space)?;
        let cleared = store.delete_corpses(space)?;
        debug!(space = %space, placed, cleared, "respawned space");
        Ok(Some(placed))
    }
}
