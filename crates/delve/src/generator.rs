//! # World Generator
//!
//! Drives chunk creation top-down and fills spaces on demand.
//!
//! ## Lifecycle
//!
//! ```text
//! initialize_world ──> World ──> Region ──> Zone ──> Subzone (graph + stubs)
//!                                                       │
//!        move onto a node ──> fill_space_content <──────┘
//!        move onto a Frontier ──> expand_frontier ──> sibling Subzone
//!                                      │
//!                                      └── every N Subzones: breakout Region
//! ```
//!
//! ## Concurrency
//!
//! - Child indices are reserved up front, so concurrent generation under
//!   one parent never reuses an identity; a parent's reservation entry is
//!   dropped once nothing is in flight under it
//! - Every commit that touches an existing row runs under the world writer
//!   lock; text-service calls happen before the lock is taken
//! - A per-node async gate makes each fill and each frontier expansion run
//!   at most once; late callers wait and then see the finished result. A
//!   gate leaves the map only when no other caller holds or awaits it
//! - Filled content is staged in the cache and written by the next save

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use delve_core::constants::{FLAG_BREAKOUT_OPENED, FLAG_FRONTIER_EXPANDED};
use delve_core::seed::purpose;
use delve_core::{
    BiomeTheme, ChunkId, ChunkLevel, ChunkNode, Edge, EdgeKind, GenerationSeed, GraphNode, NodeId,
    NodeType, RegionTier, SpaceContent, WorldSeed,
};
use delve_persistence::{SeedRepository, WorldPersistence};
use delve_procedural::directions::{label_pair, label_single};
use delve_procedural::{TopologyGenerator, TopologyParams, TopologyValidator, ValidationProfile};
use parking_lot::{Mutex, RwLock};
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tokio::sync::OwnedMutexGuard;
use tracing::{debug, info, warn};

use crate::config::GenerationConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::events::{emit, EventSender, WorldEvent};
use crate::lore::LoreEngine;
use crate::populator::{ContentPopulator, PopulationRequest};
use crate::text::{generate_or_fallback, PromptContext, TextGenerator};

/// The single world writer. Held only around load, check and commit.
pub type WriteLock = Arc<Mutex<()>>;

type Gate = Arc<tokio::sync::Mutex<()>>;
type Gates = Mutex<HashMap<NodeId, Gate>>;

/// Label used for one-way breakout edges.
const BREAKOUT_LABEL: &str = "fissure";

/// What `expand_frontier` created.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct FrontierExpansion {
    /// The new sibling Subzone.
    pub subzone: ChunkId,
    /// Its hub, now linked to the Frontier node.
    pub hub: NodeId,
    /// Region opened by a breakout, if one happened.
    pub breakout: Option<ChunkId>,
}

#[derive(Clone, Copy, Debug)]
struct ChildSpec {
    level: ChunkLevel,
    depth: u32,
    theme: Option<BiomeTheme>,
}

struct Generated {
    chunk: ChunkNode,
    nodes: Vec<GraphNode>,
}

/// Exclusive hold on one node's gate.
struct NodeGate<'a> {
    gates: &'a Gates,
    node: NodeId,
    gate: Gate,
    guard: Option<OwnedMutexGuard<()>>,
}

impl Drop for NodeGate<'_> {
    fn drop(&mut self) {
        let mut gates = self.gates.lock();
        self.guard.take();
        // The map and this hold are the only owners left.
        let idle = Arc::strong_count(&self.gate) == 2;
        if idle && gates.get(&self.node).is_some_and(|gate| Arc::ptr_eq(gate, &self.gate)) {
            gates.remove(&self.node);
        }
    }
}

#[derive(Debug, Default)]
struct Reservation {
    next: usize,
    pending: usize,
}

/// A child index held until the child is committed or abandoned.
struct ReservedIndex<'a> {
    reserved: &'a Mutex<HashMap<ChunkId, Reservation>>,
    parent: ChunkId,
    index: usize,
}

impl Drop for ReservedIndex<'_> {
    fn drop(&mut self) {
        let mut reserved = self.reserved.lock();
        if let Some(entry) = reserved.get_mut(&self.parent) {
            entry.pending = entry.pending.saturating_sub(1);
            if entry.pending == 0 {
                reserved.remove(&self.parent);
            }
        }
    }
}

impl Generated {
    fn entry(&self) -> GenerationResult<&GraphNode> {
        self.nodes
            .iter()
            .find(|node| node.node_type == NodeType::Hub)
            .or_else(|| self.nodes.first())
            .ok_or_else(|| GenerationError::UnknownChunk(self.chunk.id.clone()))
    }
}

/// Top-down chunk generation and lazy space fill.
pub struct WorldGenerator {
    config: GenerationConfig,
    topology: TopologyGenerator,
    persistence: Arc<WorldPersistence>,
    lore: LoreEngine,
    text: Arc<dyn TextGenerator>,
    populator: Arc<dyn ContentPopulator>,
    writer: WriteLock,
    reserved: Mutex<HashMap<ChunkId, Reservation>>,
    gates: Gates,
    world_seed: RwLock<Option<WorldSeed>>,
    events: Option<EventSender>,
}

impl std::fmt::Debug for WorldGenerator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WorldGenerator")
            .field("config", &self.config)
            .field("persistence", &self.persistence)
            .finish_non_exhaustive()
    }
}

impl WorldGenerator {
    /// Creates a generator over `persistence`.
    ///
    /// # Errors
    ///
    /// `Config` for an empty retry budget or breakout range, `Topology` if
    /// the generation settings cannot produce graphs.
    pub fn new(
        config: &GenerationConfig,
        persistence: Arc<WorldPersistence>,
        text: Arc<dyn TextGenerator>,
        populator: Arc<dyn ContentPopulator>,
    ) -> GenerationResult<Self> {
        config.check()?;
        Ok(Self {
            config: config.clone(),
            topology: TopologyGenerator::new(config.topology())?,
            persistence,
            lore: LoreEngine::new(text.clone()),
            text,
            populator,
            writer: Arc::new(Mutex::new(())),
            reserved: Mutex::new(HashMap::new()),
            gates: Mutex::new(HashMap::new()),
            world_seed: RwLock::new(None),
            events: None,
        })
    }

    /// Publishes generation events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// The world writer lock shared with mutation and respawn.
    #[must_use]
    pub fn writer(&self) -> WriteLock {
        self.writer.clone()
    }

    /// The persistence layer.
    #[must_use]
    pub fn persistence(&self) -> &Arc<WorldPersistence> {
        &self.persistence
    }

    /// The content populator.
    #[must_use]
    pub fn populator(&self) -> &Arc<dyn ContentPopulator> {
        &self.populator
    }

    /// The stored world seed.
    ///
    /// # Errors
    ///
    /// `WorldNotInitialized` before `initialize_world`.
    pub fn world_seed(&self) -> GenerationResult<WorldSeed> {
        if let Some(seed) = self.world_seed.read().as_ref() {
            return Ok(seed.clone());
        }
        let seed = self
            .persistence
            .store()
            .find_seed()?
            .ok_or(GenerationError::WorldNotInitialized)?;
        *self.world_seed.write() = Some(seed.clone());
        Ok(seed)
    }

    /// Subzones between breakouts for this world, in the configured range.
    ///
    /// # Errors
    ///
    /// `WorldNotInitialized` before `initialize_world`.
    pub fn breakout_interval(&self) -> GenerationResult<u32> {
        let world = self.world_seed()?;
        Ok(self.interval_for(&world))
    }

    fn interval_for(&self, world: &WorldSeed) -> u32 {
        let min = self.config.breakout_interval_min;
        let span = u64::from(self.config.breakout_interval_max.saturating_sub(min)) + 1;
        let roll = GenerationSeed::from_identity(&world.seed, "breakout").value() % span;
        min + roll as u32
    }

    // =========================================================================
    // WORLD
    // =========================================================================

    /// Creates the world: seed record, World root, first Region, Zone and
    /// Subzone. The Subzone hub becomes the starting space.
    ///
    /// A world that already has a seed is returned unchanged.
    ///
    /// # Errors
    ///
    /// Storage failures and `RetriesExhausted` if the first Subzone cannot
    /// be generated.
    pub async fn initialize_world(&self, seed: &str, global_lore: &str) -> GenerationResult<WorldSeed> {
        if let Some(existing) = self.persistence.store().find_seed()? {
            info!(seed = %existing.seed, "world already initialized");
            *self.world_seed.write() = Some(existing.clone());
            return Ok(existing);
        }

        let pick = GenerationSeed::from_identity(seed, ChunkId::ROOT).value();
        let theme = BiomeTheme::ALL[(pick % BiomeTheme::ALL.len() as u64) as usize];
        let root = ChunkNode::root(global_lore, theme);
        self.persistence.persist_chunk(&root)?;
        emit(
            self.events.as_ref(),
            WorldEvent::ChunkGenerated {
                chunk: root.id.clone(),
                level: ChunkLevel::World,
            },
        );

        let mut parent = root.id.clone();
        let mut generated = None;
        for level in [ChunkLevel::Region, ChunkLevel::Zone, ChunkLevel::Subzone] {
            let child = self
                .create_child(
                    seed,
                    &parent,
                    ChildSpec {
                        level,
                        depth: 0,
                        theme: None,
                    },
                )
                .await?;
            parent = child.chunk.id.clone();
            generated = Some(child);
        }
        let subzone = generated.ok_or_else(|| GenerationError::UnknownChunk(parent.clone()))?;
        let start = subzone.entry()?.id.clone();

        let record = WorldSeed {
            seed: seed.to_string(),
            global_lore: global_lore.to_string(),
            starting_space: start,
        };
        let store = self.persistence.store();
        let record = if store.save_seed(&record)? {
            record
        } else {
            store.find_seed()?.ok_or(GenerationError::WorldNotInitialized)?
        };
        info!(seed = %record.seed, %theme, start = %record.starting_space, "world initialized");
        *self.world_seed.write() = Some(record.clone());
        Ok(record)
    }

    // =========================================================================
    // CHUNKS
    // =========================================================================

    /// Creates and persists a new child of `parent` at `level`.
    ///
    /// Only the level directly below the parent is accepted, and Spaces are
    /// created exclusively by their Subzone. A Subzone is generated together
    /// with its validated graph and one empty stub per node.
    ///
    /// # Errors
    ///
    /// `UnknownChunk`, `InvalidLevel`, `WorldNotInitialized`,
    /// `RetriesExhausted` or storage failures.
    pub async fn generate_chunk(&self, parent: &ChunkId, level: ChunkLevel) -> GenerationResult<ChunkNode> {
        let world = self.world_seed()?;
        let depth = self
            .persistence
            .chunk(parent)?
            .ok_or_else(|| GenerationError::UnknownChunk(parent.clone()))?
            .depth;
        let spec = ChildSpec {
            level,
            depth,
            theme: None,
        };
        Ok(self.create_child(&world.seed, parent, spec).await?.chunk)
    }

    async fn create_child(
        &self,
        world_seed: &str,
        parent_id: &ChunkId,
        spec: ChildSpec,
    ) -> GenerationResult<Generated> {
        let parent = self
            .persistence
            .chunk(parent_id)?
            .ok_or_else(|| GenerationError::UnknownChunk(parent_id.clone()))?;
        if spec.level == ChunkLevel::Space || parent.level.child() != Some(spec.level) {
            return Err(GenerationError::InvalidLevel {
                parent: parent.level,
                requested: spec.level,
            });
        }

        let reservation = self.reserve_index(&parent.id, spec.level)?;
        let index = reservation.index;
        let id = parent.id.child(spec.level, index);
        let seed = GenerationSeed::from_identity(world_seed, id.as_str());
        let mut chunk = roll_attributes(&parent, id, spec, index, seed);
        chunk.lore = self
            .lore
            .inherit(&parent, spec.level, chunk.theme, seed.derive(purpose::LORE))
            .await;

        let nodes = if spec.level == ChunkLevel::Subzone {
            let (nodes, attempts) = self.generate_topology(&chunk, seed)?;
            chunk.size_estimate = nodes.len() as u32;
            chunk.children = nodes.iter().map(|node| node.id.chunk_id()).collect();
            emit(
                self.events.as_ref(),
                WorldEvent::SubzoneGenerated {
                    subzone: chunk.id.clone(),
                    nodes: nodes.len(),
                    attempts,
                },
            );
            nodes
        } else {
            Vec::new()
        };

        self.commit_child(&mut chunk, &nodes)?;
        info!(
            chunk = %chunk.id,
            level = %chunk.level,
            theme = %chunk.theme,
            difficulty = chunk.difficulty,
            depth = chunk.depth,
            nodes = nodes.len(),
            "generated chunk"
        );
        emit(
            self.events.as_ref(),
            WorldEvent::ChunkGenerated {
                chunk: chunk.id.clone(),
                level: chunk.level,
            },
        );
        Ok(Generated { chunk, nodes })
    }

    /// Next free child index under `parent`. The parent is re-read under
    /// the reservation lock so a commit that just released its entry is
    /// already counted.
    fn reserve_index(&self, parent: &ChunkId, level: ChunkLevel) -> GenerationResult<ReservedIndex<'_>> {
        let mut reserved = self.reserved.lock();
        let committed = self
            .persistence
            .chunk(parent)?
            .map_or(0, |chunk| chunk.children.len());
        let entry = reserved.entry(parent.clone()).or_default();
        let mut index = entry.next.max(committed);
        // An abandoned reservation can leave a gap below a committed index.
        while self.persistence.chunk(&parent.child(level, index))?.is_some() {
            index += 1;
        }
        entry.next = index + 1;
        entry.pending += 1;
        Ok(ReservedIndex {
            reserved: &self.reserved,
            parent: parent.clone(),
            index,
        })
    }

    /// Topology attempts until one passes the generation profile.
    fn generate_topology(
        &self,
        chunk: &ChunkNode,
        seed: GenerationSeed,
    ) -> GenerationResult<(Vec<GraphNode>, u32)> {
        let attempts = self.config.max_validation_retries;
        let mut reasons = Vec::new();
        for attempt in 0..attempts {
            let params =
                TopologyParams::for_chunk(chunk, seed.derive(purpose::TOPOLOGY + u64::from(attempt)));
            let nodes = self.topology.generate(&params)?;
            match TopologyValidator::validate(&nodes).outcome(ValidationProfile::Generation) {
                Ok(()) => return Ok((nodes, attempt + 1)),
                Err(failed) => {
                    warn!(
                        chunk = %chunk.id,
                        attempt = attempt + 1,
                        reasons = %failed.join("; "),
                        "topology rejected, retrying"
                    );
                    reasons = failed;
                }
            }
        }
        Err(GenerationError::RetriesExhausted {
            chunk: chunk.id.clone(),
            attempts,
            reasons,
        })
    }

    /// Persists a new chunk, its Space chunks, graph and stubs, and records
    /// it on the parent and the previous sibling.
    fn commit_child(&self, chunk: &mut ChunkNode, nodes: &[GraphNode]) -> GenerationResult<()> {
        let parent_id = chunk
            .parent
            .clone()
            .ok_or_else(|| GenerationError::UnknownChunk(chunk.id.clone()))?;

        let _writer = self.writer.lock();
        let mut parent = self
            .persistence
            .chunk(&parent_id)?
            .ok_or(GenerationError::UnknownChunk(parent_id))?;

        let mut chunks = Vec::with_capacity(nodes.len() + 3);
        if let Some(previous) = parent.children.last() {
            if let Some(mut sibling) = self.persistence.chunk(previous)? {
                chunk.adjacency.insert("previous".to_string(), sibling.id.clone());
                sibling.adjacency.insert("next".to_string(), chunk.id.clone());
                chunks.push(sibling);
            }
        }
        if !parent.children.contains(&chunk.id) {
            parent.children.push(chunk.id.clone());
        }
        chunks.insert(0, chunk.clone());
        chunks.push(parent);
        chunks.extend(nodes.iter().map(|node| space_chunk(chunk, node)));

        let stubs: Vec<SpaceContent> = nodes.iter().map(SpaceContent::stub).collect();
        self.persistence.persist_batch(&chunks, nodes, &stubs)?;
        Ok(())
    }

    // =========================================================================
    // LAZY FILL
    // =========================================================================

    async fn hold_gate(&self, node: &NodeId) -> NodeGate<'_> {
        let gate = self
            .gates
            .lock()
            .entry(node.clone())
            .or_insert_with(|| Arc::new(tokio::sync::Mutex::new(())))
            .clone();
        let guard = gate.clone().lock_owned().await;
        NodeGate {
            gates: &self.gates,
            node: node.clone(),
            gate,
            guard: Some(guard),
        }
    }

    /// Fills a stub on first visit. Already-filled spaces are returned as is.
    ///
    /// The description comes from the text service (template on failure);
    /// traps, resources and creatures from the populator. Exits, state
    /// flags and dropped items are kept. The result is staged; the next
    /// `save_world_state` writes it.
    ///
    /// # Errors
    ///
    /// `UnknownNode`, `UnknownChunk`, `WorldNotInitialized` or storage
    /// failures.
    pub async fn fill_space_content(&self, node_id: &NodeId) -> GenerationResult<SpaceContent> {
        let content = self.content(node_id)?;
        if !content.is_stub() {
            debug!(space = %node_id, "already filled");
            return Ok(content);
        }

        let _fill = self.hold_gate(node_id).await;
        let content = self.content(node_id)?;
        if !content.is_stub() {
            debug!(space = %node_id, "filled while waiting");
            return Ok(content);
        }

        let world = self.world_seed()?;
        let node = self.node(node_id)?;
        let subzone = self
            .persistence
            .chunk(&node.chunk_id)?
            .ok_or_else(|| GenerationError::UnknownChunk(node.chunk_id.clone()))?;
        let mut neighbours = Vec::new();
        for edge in node.edges.iter().filter(|edge| !edge.hidden) {
            if let Some(neighbour) = self.persistence.node(&edge.target)? {
                neighbours.push(neighbour.node_type);
            }
        }

        let seed = world.for_chunk(&node_id.chunk_id()).derive(purpose::CONTENT);
        debug!(space = %node_id, node_type = %node.node_type, "filling space");
        let context = PromptContext::space(
            node.node_type,
            neighbours,
            &subzone.lore,
            subzone.theme,
            seed.value(),
        );
        let description = generate_or_fallback(self.text.as_ref(), &context).await;
        let population = self.populator.populate(&PopulationRequest {
            space: node_id,
            node_type: node.node_type,
            theme: subzone.theme,
            difficulty: subzone.difficulty,
            mob_density: subzone.mob_density,
            seed,
            round: 0,
        });

        let filled = {
            let _writer = self.writer.lock();
            let mut content = self.content(node_id)?;
            let current = self.node(node_id)?;
            content.description = description;
            content.brightness = population.brightness;
            content.terrain = population.terrain;
            content.traps = population.traps;
            content.resources = population.resources;
            content.entities = population.entities;
            content.sync_exits(&current);
            self.persistence.stage_content(content.clone());
            content
        };

        info!(space = %node_id, entities = filled.entities.len(), "filled space");
        emit(
            self.events.as_ref(),
            WorldEvent::SpaceFilled {
                space: node_id.clone(),
            },
        );
        Ok(filled)
    }

    fn node(&self, id: &NodeId) -> GenerationResult<GraphNode> {
        self.persistence
            .node(id)?
            .ok_or_else(|| GenerationError::UnknownNode(id.clone()))
    }

    fn content(&self, id: &NodeId) -> GenerationResult<SpaceContent> {
        self.persistence
            .content(id)?
            .ok_or_else(|| GenerationError::UnknownNode(id.clone()))
    }

    // =========================================================================
    // FRONTIER
    // =========================================================================

    /// Links a Frontier node to the hub of a new sibling Subzone.
    ///
    /// Returns `None` for non-Frontier nodes and for Frontiers that were
    /// already expanded. When the new Subzone's depth is a multiple of the
    /// breakout interval, a breakout Region is opened as well.
    ///
    /// # Errors
    ///
    /// `UnknownNode`, `UnknownChunk`, `RetriesExhausted` or storage failures.
    pub async fn expand_frontier(&self, node_id: &NodeId) -> GenerationResult<Option<FrontierExpansion>> {
        let node = self.node(node_id)?;
        if node.node_type != NodeType::Frontier {
            return Ok(None);
        }

        let _expand = self.hold_gate(node_id).await;
        if self.content(node_id)?.flag(FLAG_FRONTIER_EXPANDED) {
            return Ok(None);
        }

        let world = self.world_seed()?;
        let subzone = self
            .persistence
            .chunk(&node.chunk_id)?
            .ok_or_else(|| GenerationError::UnknownChunk(node.chunk_id.clone()))?;
        let zone = subzone
            .parent
            .clone()
            .ok_or_else(|| GenerationError::UnknownChunk(subzone.id.clone()))?;
        let depth = subzone.depth + 1;

        let sibling = self
            .create_child(
                &world.seed,
                &zone,
                ChildSpec {
                    level: ChunkLevel::Subzone,
                    depth,
                    theme: None,
                },
            )
            .await?;
        let hub = sibling.entry()?.id.clone();
        if !self.link_paired(node_id, &hub)? {
            warn!(from = %node_id, subzone = %sibling.chunk.id, "frontier linked elsewhere, sibling left unlinked");
            return Ok(None);
        }
        info!(from = %node_id, subzone = %sibling.chunk.id, depth, "frontier expanded");
        emit(
            self.events.as_ref(),
            WorldEvent::FrontierExpanded {
                from: node_id.clone(),
                subzone: sibling.chunk.id.clone(),
            },
        );

        let breakout = if depth % self.interval_for(&world) == 0 {
            Some(self.open_breakout(&world, &node, &subzone).await?)
        } else {
            None
        };

        Ok(Some(FrontierExpansion {
            subzone: sibling.chunk.id,
            hub,
            breakout,
        }))
    }

    /// Creates a Region of contrasting theme and drops one-way edges into
    /// its first hub from this Frontier and, sometimes, a second one.
    async fn open_breakout(
        &self,
        world: &WorldSeed,
        frontier: &GraphNode,
        subzone: &ChunkNode,
    ) -> GenerationResult<ChunkId> {
        let theme = subzone.theme.contrasting();
        let depth = subzone.depth + 1;
        let mut parent = ChunkId::root();
        let mut region = None;
        let mut generated = None;
        for level in [ChunkLevel::Region, ChunkLevel::Zone, ChunkLevel::Subzone] {
            let spec = ChildSpec {
                level,
                depth,
                theme: (level == ChunkLevel::Region).then_some(theme),
            };
            let child = self.create_child(&world.seed, &parent, spec).await?;
            parent = child.chunk.id.clone();
            if level == ChunkLevel::Region {
                region = Some(child.chunk.id.clone());
            }
            generated = Some(child);
        }
        let region = region.ok_or_else(|| GenerationError::UnknownChunk(parent.clone()))?;
        let landing = generated.ok_or_else(|| GenerationError::UnknownChunk(parent.clone()))?;
        let hub = landing.entry()?.id.clone();

        let mut sources = vec![frontier.id.clone()];
        let roll = world.for_chunk(&frontier.id.chunk_id()).derive(purpose::ATTRIBUTES);
        if ChaCha8Rng::seed_from_u64(roll.value()).gen_bool(0.5) {
            let second = self
                .persistence
                .subzone_nodes(&subzone.id)?
                .into_iter()
                .find(|node| node.node_type == NodeType::Frontier && node.id != frontier.id);
            if let Some(second) = second {
                sources.push(second.id);
            }
        }
        for source in &sources {
            self.link_one_way(source, &hub)?;
        }

        info!(from = %frontier.id, region = %region, %theme, sources = sources.len(), "breakout opened");
        emit(
            self.events.as_ref(),
            WorldEvent::BreakoutOpened {
                from: frontier.id.clone(),
                region: region.clone(),
                theme,
            },
        );
        Ok(region)
    }

    /// Joins a Frontier to a new hub. Returns false, writing nothing, if the
    /// Frontier was already expanded.
    fn link_paired(&self, from: &NodeId, to: &NodeId) -> GenerationResult<bool> {
        let _writer = self.writer.lock();
        let mut a_content = self.content(from)?;
        if a_content.flag(FLAG_FRONTIER_EXPANDED) {
            return Ok(false);
        }
        let mut a = self.node(from)?;
        let mut b = self.node(to)?;
        let mut b_content = self.content(to)?;
        if !a.connects_to(to) {
            let (forward, back) = label_pair(
                None,
                None,
                |label| a.has_direction(label),
                |label| b.has_direction(label),
            );
            a.edges
                .push(Edge::passage(to.clone(), forward).with_kind(EdgeKind::Frontier));
            b.edges
                .push(Edge::passage(from.clone(), back).with_kind(EdgeKind::Frontier));
        }
        a_content.sync_exits(&a);
        a_content.set_flag(FLAG_FRONTIER_EXPANDED, true);
        b_content.sync_exits(&b);
        self.persistence
            .persist_batch(&[], &[a, b], &[a_content, b_content])?;
        Ok(true)
    }

    fn link_one_way(&self, from: &NodeId, to: &NodeId) -> GenerationResult<()> {
        let _writer = self.writer.lock();
        let mut node = self.node(from)?;
        let mut content = self.content(from)?;
        if !node.connects_to(to) {
            let label = label_single(BREAKOUT_LABEL, |label| node.has_direction(label));
            node.edges
                .push(Edge::passage(to.clone(), label).with_kind(EdgeKind::Breakout));
        }
        content.sync_exits(&node);
        content.set_flag(FLAG_BREAKOUT_OPENED, true);
        self.persistence.persist_batch(&[], &[node], &[content])?;
        Ok(())
    }
}

// =============================================================================
// ATTRIBUTES
// =============================================================================

/// Seeded difficulty, density, size and theme of a new child.
fn roll_attributes(
    parent: &ChunkNode,
    id: ChunkId,
    spec: ChildSpec,
    index: usize,
    seed: GenerationSeed,
) -> ChunkNode {
    let mut rng = ChaCha8Rng::seed_from_u64(seed.derive(purpose::ATTRIBUTES).value());
    let tier = (spec.level == ChunkLevel::Region).then(|| RegionTier::for_index(index));
    let bonus = match tier {
        Some(tier) => i32::from(tier.difficulty_bonus()),
        None => rng.gen_range(0..=2),
    };
    let difficulty = ChunkNode::clamp_difficulty(i32::from(parent.difficulty) + bonus);
    let climb = f32::from(difficulty.saturating_sub(parent.difficulty));
    let mob_density =
        (parent.mob_density + rng.gen_range(-0.1..=0.1) + 0.02 * climb).clamp(0.0, 1.0);
    let size_estimate = match spec.level {
        ChunkLevel::Region | ChunkLevel::Zone => rng.gen_range(2..=4),
        ChunkLevel::Subzone => 12 + 3 * u32::from(difficulty) + rng.gen_range(0..=12),
        ChunkLevel::World | ChunkLevel::Space => 1,
    };
    let theme = spec
        .theme
        .unwrap_or_else(|| LoreEngine::derive_theme(parent, spec.level, seed.derive(purpose::LORE)));

    ChunkNode {
        id,
        level: spec.level,
        parent: Some(parent.id.clone()),
        children: Vec::new(),
        lore: String::new(),
        theme,
        size_estimate,
        mob_density,
        difficulty,
        tier,
        depth: spec.depth,
        adjacency: BTreeMap::new(),
    }
}

/// The Space chunk backing a graph node.
fn space_chunk(subzone: &ChunkNode, node: &GraphNode) -> ChunkNode {
    ChunkNode {
        id: node.id.chunk_id(),
        level: ChunkLevel::Space,
        parent: Some(subzone.id.clone()),
        children: Vec::new(),
        lore: subzone.lore.clone(),
        theme: subzone.theme,
        size_estimate: 1,
        mob_density: subzone.mob_density,
        difficulty: subzone.difficulty,
        tier: None,
        depth: subzone.depth,
        adjacency: BTreeMap::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::ConfigError;
    use crate::populator::ThemedPopulator;
    use crate::text::{TemplateTextGenerator, TextGenError};
    use async_trait::async_trait;
    use delve_persistence::{ChunkRepository, MemoryStore};
    use std::time::Duration;

    /// Template text after a delay, so fills and expansions overlap.
    struct Slow;

    #[async_trait]
    impl TextGenerator for Slow {
        async fn generate(&self, context: &PromptContext) -> Result<String, TextGenError> {
            tokio::time::sleep(Duration::from_millis(50)).await;
            TemplateTextGenerator.generate(context).await
        }
    }

    fn generator_with(text: Arc<dyn TextGenerator>) -> WorldGenerator {
        let persistence = Arc::new(WorldPersistence::new(Arc::new(MemoryStore::new())));
        WorldGenerator::new(
            &GenerationConfig::default(),
            persistence,
            text,
            Arc::new(ThemedPopulator),
        )
        .unwrap()
    }

    fn generator() -> WorldGenerator {
        generator_with(Arc::new(TemplateTextGenerator))
    }

    #[test]
    fn test_region_tiers_raise_difficulty() {
        let root = ChunkNode::root("lore", BiomeTheme::Crypt);
        let seed = GenerationSeed::new(5);
        let spec = ChildSpec {
            level: ChunkLevel::Region,
            depth: 0,
            theme: None,
        };
        let upper = roll_attributes(&root, root.id.child(ChunkLevel::Region, 0), spec, 0, seed);
        let mid = roll_attributes(&root, root.id.child(ChunkLevel::Region, 1), spec, 1, seed);
        let lower = roll_attributes(&root, root.id.child(ChunkLevel::Region, 2), spec, 2, seed);
        assert_eq!(upper.tier, Some(RegionTier::Upper));
        assert!(upper.difficulty > root.difficulty);
        assert!(mid.difficulty > upper.difficulty);
        assert!(lower.difficulty > mid.difficulty);
    }

    #[test]
    fn test_difficulty_is_clamped() {
        let mut parent = ChunkNode::root("lore", BiomeTheme::Magma);
        parent.difficulty = 18;
        let spec = ChildSpec {
            level: ChunkLevel::Region,
            depth: 0,
            theme: Some(BiomeTheme::Glacier),
        };
        let child = roll_attributes(&parent, parent.id.child(ChunkLevel::Region, 2), spec, 2, GenerationSeed::new(1));
        assert_eq!(child.difficulty, 20);
        assert_eq!(child.theme, BiomeTheme::Glacier);
        assert!((0.0..=1.0).contains(&child.mob_density));
    }

    #[tokio::test]
    async fn test_initialize_world_builds_first_subzone() {
        let generator = generator();
        let seed = generator.initialize_world("unit-seed", "Stone remembers.").await.unwrap();
        let start = generator.persistence().node(&seed.starting_space).unwrap().unwrap();
        assert_eq!(start.node_type, NodeType::Hub);

        let subzone = generator.persistence().chunk(&start.chunk_id).unwrap().unwrap();
        assert_eq!(subzone.level, ChunkLevel::Subzone);
        assert_eq!(subzone.children.len(), subzone.size_estimate as usize);
        let stub = generator.persistence().content(&start.id).unwrap().unwrap();
        assert!(stub.is_stub());
        assert_eq!(stub.exits.len(), start.edges.len());

        let again = generator.initialize_world("other-seed", "ignored").await.unwrap();
        assert_eq!(again, seed);
    }

    #[tokio::test]
    async fn test_generate_chunk_rejects_wrong_level() {
        let generator = generator();
        generator.initialize_world("unit-seed", "lore").await.unwrap();
        let result = generator
            .generate_chunk(&ChunkId::root(), ChunkLevel::Subzone)
            .await;
        assert!(matches!(result, Err(GenerationError::InvalidLevel { .. })));

        let result = generator
            .generate_chunk(&ChunkId::new("world/r9"), ChunkLevel::Zone)
            .await;
        assert!(matches!(result, Err(GenerationError::UnknownChunk(_))));
    }

    #[tokio::test]
    async fn test_uninitialized_world() {
        let generator = generator();
        let result = generator
            .generate_chunk(&ChunkId::root(), ChunkLevel::Region)
            .await;
        assert!(matches!(result, Err(GenerationError::WorldNotInitialized)));
    }

    #[tokio::test]
    async fn test_siblings_are_adjacent() {
        let generator = generator();
        generator.initialize_world("unit-seed", "lore").await.unwrap();
        let second = generator
            .generate_chunk(&ChunkId::root(), ChunkLevel::Region)
            .await
            .unwrap();
        assert_eq!(
            second.adjacency.get("previous"),
            Some(&ChunkId::new("world/r0"))
        );
        let first = generator
            .persistence()
            .store()
            .find_chunk(&ChunkId::new("world/r0"))
            .unwrap()
            .unwrap();
        assert_eq!(first.adjacency.get("next"), Some(&second.id));
    }

    #[test]
    fn test_new_rejects_empty_breakout_range() {
        let config = GenerationConfig {
            breakout_interval_min: 0,
            ..GenerationConfig::default()
        };
        let result = WorldGenerator::new(
            &config,
            Arc::new(WorldPersistence::new(Arc::new(MemoryStore::new()))),
            Arc::new(TemplateTextGenerator),
            Arc::new(ThemedPopulator),
        );
        assert!(matches!(
            result,
            Err(GenerationError::Config(ConfigError::Invalid(_)))
        ));
    }

    #[tokio::test]
    async fn test_concurrent_children_get_distinct_ids() {
        let generator = generator_with(Arc::new(Slow));
        generator.initialize_world("unit-seed", "lore").await.unwrap();
        let root = ChunkId::root();
        let (a, b) = tokio::join!(
            generator.generate_chunk(&root, ChunkLevel::Region),
            generator.generate_chunk(&root, ChunkLevel::Region)
        );
        let (a, b) = (a.unwrap(), b.unwrap());
        assert_ne!(a.id, b.id);

        let root = generator.persistence().chunk(&root).unwrap().unwrap();
        assert_eq!(root.children.len(), 3);
        assert!(root.children.contains(&a.id) && root.children.contains(&b.id));
        assert!(generator.reserved.lock().is_empty());
    }

    #[tokio::test(start_paused = true)]
    async fn test_frontier_expands_once_while_fill_in_flight() {
        let generator = generator_with(Arc::new(Slow));
        let seed = generator.initialize_world("unit-seed", "lore").await.unwrap();
        let start = generator.persistence().node(&seed.starting_space).unwrap().unwrap();
        let frontier = generator
            .persistence()
            .subzone_nodes(&start.chunk_id)
            .unwrap()
            .into_iter()
            .find(|node| node.node_type == NodeType::Frontier)
            .unwrap()
            .id;

        let (filled, first, late) = tokio::join!(
            generator.fill_space_content(&frontier),
            generator.expand_frontier(&frontier),
            async {
                tokio::time::sleep(Duration::from_millis(70)).await;
                generator.expand_frontier(&frontier).await
            }
        );
        assert!(!filled.unwrap().is_stub());
        let expansions: Vec<FrontierExpansion> =
            [first.unwrap(), late.unwrap()].into_iter().flatten().collect();
        assert_eq!(expansions.len(), 1);

        let node = generator.persistence().node(&frontier).unwrap().unwrap();
        let links = node
            .edges
            .iter()
            .filter(|edge| edge.kind == EdgeKind::Frontier)
            .count();
        assert_eq!(links, 1);
        let zone = generator.persistence().chunk(&expansions[0].subzone).unwrap().unwrap();
        let zone = generator.persistence().chunk(zone.parent.as_ref().unwrap()).unwrap().unwrap();
        assert_eq!(zone.children.len(), 2);
        assert!(generator.gates.lock().is_empty());
    }
}
