//! # World
//!
//! One handle over a persisted world: generation, movement, perception,
//! mutation, respawn and autosave, all sharing a single writer lock and
//! one event bus.

use std::collections::HashMap;
use std::sync::Arc;

use delve_core::{ChunkId, ChunkLevel, ChunkNode, NodeId, SpaceContent, WorldSeed};
use delve_persistence::{WorldPersistence, WorldStore};
use parking_lot::Mutex;
use tracing::{debug, info};

use crate::autosave::{spawn_autosave, AutosaveHandle};
use crate::config::WorldConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::events::{EventBus, EventReceiver, WorldEvent};
use crate::exits::{ExitResolution, ExitResolver, RevealedEdges};
use crate::generator::{FrontierExpansion, WorldGenerator};
use crate::mutation::{CarveRequest, CollapseRequest, EdgeModifier, MutationOutcome};
use crate::populator::ContentPopulator;
use crate::respawn::RespawnManager;
use crate::text::TextGenerator;

/// Result of a movement command.
#[derive(Clone, Debug, PartialEq)]
pub enum MoveOutcome {
    /// The player arrived.
    Moved {
        /// Destination space.
        to: NodeId,
        /// Its (now filled) content.
        content: SpaceContent,
        /// Set when the destination was an unexpanded Frontier.
        expansion: Option<FrontierExpansion>,
    },
    /// No visible exit matched.
    NoExit,
    /// Several exits matched equally well.
    Ambiguous(Vec<String>),
}

/// A world instance.
pub struct World {
    config: WorldConfig,
    generator: WorldGenerator,
    resolver: ExitResolver,
    modifier: EdgeModifier,
    respawn: RespawnManager,
    revealed: Mutex<HashMap<String, RevealedEdges>>,
    autosave: Mutex<Option<AutosaveHandle>>,
    bus: EventBus,
}

impl std::fmt::Debug for World {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("World")
            .field("config", &self.config)
            .field("generator", &self.generator)
            .finish_non_exhaustive()
    }
}

impl World {
    /// Opens a world over `store`. Call [`World::initialize`] before use.
    ///
    /// # Errors
    ///
    /// `Config` for inconsistent settings, `Topology` for unusable ones.
    pub fn open(
        config: WorldConfig,
        store: Arc<dyn WorldStore>,
        text: Arc<dyn TextGenerator>,
        populator: Arc<dyn ContentPopulator>,
    ) -> GenerationResult<Self> {
        config.check()?;
        let bus = EventBus::default();
        let persistence = Arc::new(WorldPersistence::new(store));

        let generator =
            WorldGenerator::new(&config.generation, persistence.clone(), text.clone(), populator.clone())?
                .with_events(bus.sender());
        let writer = generator.writer();
        let modifier = EdgeModifier::new(&config.mutation, persistence.clone(), writer.clone())
            .with_events(bus.sender());
        let respawn = RespawnManager::new(&config.respawn, persistence, populator, writer)
            .with_events(bus.sender());
        let resolver = ExitResolver::new(&config.exits, text);

        Ok(Self {
            config,
            generator,
            resolver,
            modifier,
            respawn,
            revealed: Mutex::new(HashMap::new()),
            autosave: Mutex::new(None),
            bus,
        })
    }

    /// Creates the world, or loads it if a seed is already stored.
    ///
    /// # Errors
    ///
    /// See [`WorldGenerator::initialize_world`].
    pub async fn initialize(&self, seed: &str, global_lore: &str) -> GenerationResult<WorldSeed> {
        self.generator.initialize_world(seed, global_lore).await
    }

    /// Generates a chunk of `level` under `parent`.
    ///
    /// # Errors
    ///
    /// See [`WorldGenerator::generate_chunk`].
    pub async fn generate_chunk(&self, parent: &ChunkId, level: ChunkLevel) -> GenerationResult<ChunkNode> {
        self.generator.generate_chunk(parent, level).await
    }

    /// Content of a space, filling it first if it is still a stub.
    ///
    /// # Errors
    ///
    /// See [`WorldGenerator::fill_space_content`].
    pub async fn enter(&self, space: &NodeId) -> GenerationResult<SpaceContent> {
        self.generator.fill_space_content(space).await
    }

    /// Moves `player` from `current` through the exit named by `direction`.
    ///
    /// A Frontier destination is expanded first; the destination is then
    /// filled and its neighbours prefetched. Cached state far from the
    /// destination is released.
    ///
    /// # Errors
    ///
    /// `UnknownNode`, `UnknownChunk` or any generation failure on arrival.
    pub async fn move_player(
        &self,
        player: &str,
        current: &NodeId,
        direction: &str,
    ) -> GenerationResult<MoveOutcome> {
        let persistence = self.generator.persistence();
        let node = persistence
            .node(current)?
            .ok_or_else(|| GenerationError::UnknownNode(current.clone()))?;
        let subzone = persistence
            .chunk(&node.chunk_id)?
            .ok_or_else(|| GenerationError::UnknownChunk(node.chunk_id.clone()))?;
        let revealed = self.revealed_for(player);

        let edge = match self.resolver.resolve(&node, direction, &revealed, subzone.theme).await {
            ExitResolution::Found(edge) => edge,
            ExitResolution::NotFound => return Ok(MoveOutcome::NoExit),
            ExitResolution::Ambiguous(labels) => return Ok(MoveOutcome::Ambiguous(labels)),
        };
        let to = edge.target;

        let expansion = self.generator.expand_frontier(&to).await?;
        let content = self.generator.fill_space_content(&to).await?;
        persistence.prefetch_adjacent_spaces(&to)?;
        persistence.retain_around(&to)?;
        if let Some(autosave) = self.autosave.lock().as_ref() {
            autosave.note_move();
        }

        debug!(player, from = %current, to = %to, "player moved");
        self.bus.sender().send(WorldEvent::PlayerMoved {
            player: player.to_string(),
            from: current.clone(),
            to: to.clone(),
        });
        Ok(MoveOutcome::Moved {
            to,
            content,
            expansion,
        })
    }

    /// Searches `node` with a perception roll, revealing every hidden exit
    /// whose difficulty is at most `roll`. Returns the newly revealed labels.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or storage failures.
    pub fn search(&self, node: &NodeId, player: &str, roll: u8) -> GenerationResult<Vec<String>> {
        let node = self
            .generator
            .persistence()
            .node(node)?
            .ok_or_else(|| GenerationError::UnknownNode(node.clone()))?;

        let directions: Vec<String> = {
            let mut revealed = self.revealed.lock();
            let known = revealed.entry(player.to_string()).or_default();
            node.edges
                .iter()
                .filter(|edge| edge.hidden)
                .filter(|edge| edge.perception_difficulty().is_some_and(|dc| dc <= roll))
                .filter(|edge| known.reveal(node.edge_id(edge)))
                .map(|edge| edge.direction.clone())
                .collect()
        };

        if !directions.is_empty() {
            info!(player, space = %node.id, ?directions, "revealed hidden exits");
            self.bus.sender().send(WorldEvent::EdgesRevealed {
                player: player.to_string(),
                space: node.id.clone(),
                directions: directions.clone(),
            });
        }
        Ok(directions)
    }

    /// Applies a player-caused change, such as a state flag or a dropped
    /// item, to a space. The change is staged for the next save.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or storage failures.
    pub fn update_space(
        &self,
        space: &NodeId,
        change: impl FnOnce(&mut SpaceContent),
    ) -> GenerationResult<SpaceContent> {
        let persistence = self.generator.persistence();
        let writer = self.generator.writer();
        let _writer = writer.lock();
        let mut content = persistence
            .content(space)?
            .ok_or_else(|| GenerationError::UnknownNode(space.clone()))?;
        change(&mut content);
        persistence.stage_content(content.clone());
        Ok(content)
    }

    /// Digs a passage for a player.
    ///
    /// # Errors
    ///
    /// See [`EdgeModifier::carve`].
    pub fn carve(&self, request: &CarveRequest) -> GenerationResult<MutationOutcome> {
        self.modifier.carve(request)
    }

    /// Collapses an exit `player` can see.
    ///
    /// # Errors
    ///
    /// See [`EdgeModifier::collapse`].
    pub fn collapse(&self, player: &str, request: &CollapseRequest) -> GenerationResult<MutationOutcome> {
        self.modifier.collapse(request, &self.revealed_for(player))
    }

    /// Passages `player` has revealed so far.
    #[must_use]
    pub fn revealed_for(&self, player: &str) -> RevealedEdges {
        self.revealed.lock().get(player).cloned().unwrap_or_default()
    }

    /// Starts the background autosave task. Must run inside a tokio runtime.
    pub fn start_autosave(&self) {
        let mut slot = self.autosave.lock();
        if slot.is_none() {
            *slot = Some(spawn_autosave(
                self.generator.persistence().clone(),
                &self.config.autosave,
                Some(self.bus.sender()),
            ));
        }
    }

    /// Stops autosave (with its final save), or saves directly if it never ran.
    ///
    /// # Errors
    ///
    /// Storage failures of the direct save.
    pub async fn shutdown(&self) -> GenerationResult<()> {
        let handle = self.autosave.lock().take();
        match handle {
            Some(handle) => handle.shutdown().await,
            None => {
                self.generator.persistence().save_world_state()?;
            }
        }
        info!("world shut down");
        Ok(())
    }

    /// The generator.
    #[must_use]
    pub const fn generator(&self) -> &WorldGenerator {
        &self.generator
    }

    /// The exit resolver.
    #[must_use]
    pub const fn resolver(&self) -> &ExitResolver {
        &self.resolver
    }

    /// Deaths and respawns.
    #[must_use]
    pub const fn respawn(&self) -> &RespawnManager {
        &self.respawn
    }

    /// The persistence layer.
    #[must_use]
    pub fn persistence(&self) -> &Arc<WorldPersistence> {
        self.generator.persistence()
    }

    /// A consumer of world events.
    #[must_use]
    pub fn events(&self) -> EventReceiver {
        self.bus.receiver()
    }
}
