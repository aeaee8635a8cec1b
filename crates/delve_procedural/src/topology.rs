//! # Topology Generator
//!
//! Synthesizes the navigation graph of one Subzone.
//!
//! ## Stages
//!
//! 1. Layout: the theme picks Grid, BSP or FloodFill; the strategy places
//!    nodes and proposes candidate pairs.
//! 2. Backbone: Kruskal over the candidates yields a spanning tree.
//! 3. Dead ends: about a fifth of the tree's leaves are reserved and never
//!    receive loop edges.
//! 4. Loops: extra edges between nodes that are close but not adjacent, at
//!    least 20% of the tree's edge count and enough to reach the target
//!    average degree.
//! 5. Types: hub(s) by closeness centrality, boss farthest from the hub,
//!    frontiers on the boundary, the rest by degree.
//! 6. Hidden edges: 15-25% of all edges, never splitting the visible graph.
//! 7. Overlay: treasure rooms (preferring hidden neighbours) and quest hooks.
//!
//! Every random decision draws from one `ChaCha8Rng` seeded from the
//! chunk's `GenerationSeed`, in a fixed order.

use std::collections::BTreeSet;

use delve_core::constants::{MAX_PERCEPTION_DC, MIN_PERCEPTION_DC, PERCEPTION_SKILL};
use delve_core::{
    BiomeTheme, ChunkId, ChunkNode, Edge, GenerationSeed, GraphNode, NodeId, NodeType,
    TraversalCondition,
};
use rand::seq::SliceRandom;
use rand::Rng;
use rand::SeedableRng;
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::directions::DirectionAllocator;
use crate::error::{TopologyError, TopologyResult};
use crate::layout::{LayoutKind, LayoutPlan};
use crate::mst::kruskal;
use crate::traversal::bfs;

// =============================================================================
// CONFIGURATION
// =============================================================================

/// Tuning knobs for topology generation.
#[derive(Clone, Debug, PartialEq)]
pub struct TopologyConfig {
    /// Smallest node count a Subzone may have.
    pub min_nodes: u32,
    /// Largest node count a Subzone may have.
    pub max_nodes: u32,
    /// Average out-degree the loop stage aims for.
    pub target_average_degree: f64,
    /// Minimum loop edges as a fraction of spanning-tree edges.
    pub loop_fraction: f64,
    /// Fraction of nodes reserved as dead ends.
    pub dead_end_fraction: f64,
    /// Lower bound of the hidden-edge fraction.
    pub hidden_fraction_min: f64,
    /// Upper bound of the hidden-edge fraction.
    pub hidden_fraction_max: f64,
    /// No loop edge is added to a node already at this degree.
    pub max_degree: usize,
}

impl Default for TopologyConfig {
    fn default() -> Self {
        Self {
            min_nodes: 8,
            max_nodes: 120,
            target_average_degree: 3.2,
            loop_fraction: 0.2,
            dead_end_fraction: 0.2,
            hidden_fraction_min: 0.15,
            hidden_fraction_max: 0.25,
            max_degree: 6,
        }
    }
}

impl TopologyConfig {
    /// Checks that the configuration can produce graphs at all.
    ///
    /// # Errors
    ///
    /// Returns an error for unusable node bounds or hidden-edge fractions.
    pub fn check(&self) -> TopologyResult<()> {
        if self.min_nodes < 3 || self.min_nodes > self.max_nodes {
            return Err(TopologyError::InvalidNodeBounds {
                min: self.min_nodes,
                max: self.max_nodes,
            });
        }
        let (min, max) = (self.hidden_fraction_min, self.hidden_fraction_max);
        if !(0.0..=1.0).contains(&min) || !(0.0..=1.0).contains(&max) || min > max {
            return Err(TopologyError::InvalidHiddenFraction { min, max });
        }
        Ok(())
    }
}

// =============================================================================
// PARAMETERS
// =============================================================================

/// Inputs for one Subzone graph.
#[derive(Clone, Debug)]
pub struct TopologyParams {
    /// The Subzone being generated.
    pub chunk_id: ChunkId,
    /// Biome theme; selects the layout strategy.
    pub theme: BiomeTheme,
    /// Requested node count before clamping.
    pub size_estimate: u32,
    /// Chunk difficulty; scales hidden-edge perception checks.
    pub difficulty: u8,
    /// Subzones traversed along the lineage.
    pub depth: u32,
    /// Deterministic seed for this attempt.
    pub seed: GenerationSeed,
}

impl TopologyParams {
    /// Parameters for a Subzone chunk.
    #[must_use]
    pub fn for_chunk(chunk: &ChunkNode, seed: GenerationSeed) -> Self {
        Self {
            chunk_id: chunk.id.clone(),
            theme: chunk.theme,
            size_estimate: chunk.size_estimate,
            difficulty: chunk.difficulty,
            depth: chunk.depth,
            seed,
        }
    }
}

// =============================================================================
// SKELETON
// =============================================================================

/// Undirected working graph over node indices.
#[derive(Clone, Debug)]
struct Skeleton {
    adjacency: Vec<BTreeSet<usize>>,
    /// Edges in insertion order, `a < b`.
    edges: Vec<(usize, usize)>,
}

impl Skeleton {
    fn new(node_count: usize) -> Self {
        Self {
            adjacency: vec![BTreeSet::new(); node_count],
            edges: Vec::new(),
        }
    }

    fn len(&self) -> usize {
        self.adjacency.len()
    }

    fn connect(&mut self, a: usize, b: usize) -> bool {
        if a == b || self.adjacency[a].contains(&b) {
            return false;
        }
        self.adjacency[a].insert(b);
        self.adjacency[b].insert(a);
        self.edges.push((a.min(b), a.max(b)));
        true
    }

    fn degree(&self, node: usize) -> usize {
        self.adjacency[node].len()
    }

    fn neighbor_lists(&self) -> Vec<Vec<usize>> {
        self.adjacency
            .iter()
            .map(|set| set.iter().copied().collect())
            .collect()
    }

    fn all_pairs_hops(&self) -> Vec<Vec<Option<usize>>> {
        let lists = self.neighbor_lists();
        (0..self.len()).map(|start| bfs(&lists, start)).collect()
    }
}

/// Node roles before the overlay stage.
struct Roles {
    types: Vec<NodeType>,
}

// =============================================================================
// GENERATOR
// =============================================================================

/// Deterministic Subzone graph generator.
#[derive(Clone, Debug, Default)]
pub struct TopologyGenerator {
    config: TopologyConfig,
}

impl TopologyGenerator {
    /// Creates a generator after checking `config`.
    ///
    /// # Errors
    ///
    /// Returns an error if the configuration is unusable.
    pub fn new(config: TopologyConfig) -> TopologyResult<Self> {
        config.check()?;
        Ok(Self { config })
    }

    /// The active configuration.
    #[must_use]
    pub const fn config(&self) -> &TopologyConfig {
        &self.config
    }

    /// Generates the full node list for one Subzone.
    ///
    /// The same parameters always produce the same graph. The result is not
    /// validated here; pass it through `TopologyValidator`.
    ///
    /// # Errors
    ///
    /// Returns an error if the layout cannot place enough nodes.
    pub fn generate(&self, params: &TopologyParams) -> TopologyResult<Vec<GraphNode>> {
        let mut rng = ChaCha8Rng::seed_from_u64(params.seed.value());
        let requested = params
            .size_estimate
            .clamp(self.config.min_nodes, self.config.max_nodes) as usize;

        let kind = LayoutKind::for_theme(params.theme);
        let plan = kind.plan(requested, params.theme, &mut rng);
        let node_count = plan.node_count;
        if node_count < 3 {
            return Err(TopologyError::LayoutTooSmall(node_count));
        }

        let candidates = plan.weighted_candidates(&mut rng);
        let mut skeleton = Skeleton::new(node_count);
        for edge in kruskal(node_count, &candidates) {
            skeleton.connect(edge.a, edge.b);
        }
        let tree_edges = skeleton.edges.len();

        let reserved = self.reserve_dead_ends(&skeleton, &mut rng);
        let loops = self.inject_loops(&mut skeleton, &plan, &reserved, &mut rng);
        let mut roles = Self::assign_roles(&skeleton, &plan, &reserved, &mut rng);
        let hidden = self.mark_hidden(&skeleton, params, &mut rng);
        Self::overlay(&skeleton, &hidden, &mut roles, &mut rng);

        let nodes = Self::build_nodes(params, &plan, &skeleton, &hidden, &roles);

        debug!(
            chunk = %params.chunk_id,
            layout = ?kind,
            nodes = node_count,
            tree_edges,
            loops,
            hidden = hidden.iter().flatten().count(),
            "generated subzone topology"
        );
        Ok(nodes)
    }

    /// Picks spanning-tree leaves that must stay dead ends.
    fn reserve_dead_ends(&self, skeleton: &Skeleton, rng: &mut ChaCha8Rng) -> Vec<bool> {
        let n = skeleton.len();
        let mut leaves: Vec<usize> = (0..n).filter(|&i| skeleton.degree(i) == 1).collect();
        leaves.shuffle(rng);

        // Keep enough open nodes for hubs, boss and frontiers.
        let wanted = (self.config.dead_end_fraction * n as f64).round() as usize;
        let limit = wanted.min(n.saturating_sub(5));

        let mut reserved = vec![false; n];
        for leaf in leaves.into_iter().take(limit) {
            reserved[leaf] = true;
        }
        reserved
    }

    /// Adds loop edges; returns how many were added.
    fn inject_loops(
        &self,
        skeleton: &mut Skeleton,
        plan: &LayoutPlan,
        reserved: &[bool],
        rng: &mut ChaCha8Rng,
    ) -> usize {
        let n = skeleton.len();
        let tree_edges = skeleton.edges.len();
        let target_edges = (self.config.target_average_degree * n as f64 / 2.0).ceil() as usize;
        let minimum_loops = (self.config.loop_fraction * tree_edges as f64).ceil() as usize;
        let budget = minimum_loops.max(target_edges.saturating_sub(tree_edges));

        let hops = skeleton.all_pairs_hops();
        let mut scored: Vec<(f64, usize, usize)> = Vec::new();
        for a in 0..n {
            if reserved[a] {
                continue;
            }
            for b in (a + 1)..n {
                if reserved[b] || skeleton.adjacency[a].contains(&b) {
                    continue;
                }
                let hop = hops[a][b].unwrap_or(n) as f64;
                let base = match (plan.position(a), plan.position(b)) {
                    (Some(pa), Some(pb)) => pa.distance(pb) + 0.5 * hop,
                    _ => hop,
                };
                scored.push((base + rng.gen::<f64>() * 0.5, a, b));
            }
        }
        scored.sort_by(|x, y| x.0.total_cmp(&y.0));

        let mut added = 0;
        for (_, a, b) in scored {
            if added == budget {
                break;
            }
            if skeleton.degree(a) >= self.config.max_degree
                || skeleton.degree(b) >= self.config.max_degree
            {
                continue;
            }
            if skeleton.connect(a, b) {
                added += 1;
            }
        }
        added
    }

    /// Assigns hub, boss, frontier and degree-based types.
    fn assign_roles(
        skeleton: &Skeleton,
        plan: &LayoutPlan,
        reserved: &[bool],
        rng: &mut ChaCha8Rng,
    ) -> Roles {
        let n = skeleton.len();
        let hops = skeleton.all_pairs_hops();
        let closeness: Vec<usize> = hops
            .iter()
            .map(|row| row.iter().map(|d| d.unwrap_or(n)).sum())
            .collect();

        let mut types: Vec<Option<NodeType>> = vec![None; n];
        let open: Vec<usize> = (0..n).filter(|&i| !reserved[i]).collect();

        let hub = open
            .iter()
            .copied()
            .min_by_key(|&i| (closeness[i], i))
            .unwrap_or(0);
        types[hub] = Some(NodeType::Hub);

        if n >= 40 {
            let second = open
                .iter()
                .copied()
                .filter(|&i| hops[hub][i].is_some_and(|d| d >= 3))
                .min_by_key(|&i| (closeness[i], i));
            if let Some(second) = second {
                types[second] = Some(NodeType::Hub);
            }
        }

        let boss = (0..n)
            .filter(|&i| types[i].is_none())
            .max_by_key(|&i| (hops[hub][i].unwrap_or(0), std::cmp::Reverse(i)));
        if let Some(boss) = boss {
            types[boss] = Some(NodeType::Boss);
        }

        let frontier_count = 2 + n / 40;
        let centroid = plan.positions.as_ref().map(|positions| {
            let len = positions.len().max(1) as f64;
            let sx: f64 = positions.iter().map(|p| f64::from(p.x)).sum();
            let sy: f64 = positions.iter().map(|p| f64::from(p.y)).sum();
            (sx / len, sy / len)
        });
        let mut boundary: Vec<(f64, usize)> = open
            .iter()
            .copied()
            .filter(|&i| types[i].is_none())
            .map(|i| {
                let score = match (centroid, plan.position(i)) {
                    (Some((cx, cy)), Some(p)) => {
                        (f64::from(p.x) - cx).hypot(f64::from(p.y) - cy)
                    }
                    _ => hops[hub][i].unwrap_or(0) as f64,
                };
                (score + rng.gen::<f64>() * 0.01, i)
            })
            .collect();
        boundary.sort_by(|x, y| y.0.total_cmp(&x.0));
        for (_, i) in boundary.into_iter().take(frontier_count) {
            types[i] = Some(NodeType::Frontier);
        }

        let types = types
            .into_iter()
            .enumerate()
            .map(|(i, ty)| {
                ty.unwrap_or(match skeleton.degree(i) {
                    0 | 1 => NodeType::DeadEnd,
                    2 => NodeType::Linear,
                    _ => NodeType::Branching,
                })
            })
            .collect();
        Roles { types }
    }

    /// Chooses hidden edges; returns the perception difficulty per edge.
    fn mark_hidden(
        &self,
        skeleton: &Skeleton,
        params: &TopologyParams,
        rng: &mut ChaCha8Rng,
    ) -> Vec<Option<u8>> {
        let m = skeleton.edges.len();
        let (low, high) = (self.config.hidden_fraction_min, self.config.hidden_fraction_max);
        let fraction = rng.gen_range(low..=high);
        let floor = (low * m as f64).ceil() as usize;
        let ceiling = (high * m as f64).floor() as usize;
        let goal = ((fraction * m as f64).round() as usize).max(floor).min(ceiling);

        let mut order: Vec<usize> = (0..m).collect();
        order.shuffle(rng);

        let mut visible = skeleton.adjacency.clone();
        let mut hidden = vec![None; m];
        let mut count = 0;
        for index in order {
            if count == goal {
                break;
            }
            let (a, b) = skeleton.edges[index];
            visible[a].remove(&b);
            visible[b].remove(&a);
            let lists: Vec<Vec<usize>> = visible
                .iter()
                .map(|set| set.iter().copied().collect())
                .collect();
            if bfs(&lists, 0).iter().all(Option::is_some) {
                hidden[index] = Some(perception_dc(params, rng));
                count += 1;
            } else {
                visible[a].insert(b);
                visible[b].insert(a);
            }
        }
        hidden
    }

    /// Promotes some Linear/Branching nodes to treasure rooms and quest hooks.
    fn overlay(
        skeleton: &Skeleton,
        hidden: &[Option<u8>],
        roles: &mut Roles,
        rng: &mut ChaCha8Rng,
    ) {
        let n = skeleton.len();
        let mut hidden_incidence = vec![0_usize; n];
        for (index, &(a, b)) in skeleton.edges.iter().enumerate() {
            if hidden[index].is_some() {
                hidden_incidence[a] += 1;
                hidden_incidence[b] += 1;
            }
        }

        let promotable = |ty: NodeType| match ty {
            NodeType::Linear | NodeType::Branching => true,
            NodeType::Hub
            | NodeType::DeadEnd
            | NodeType::TreasureRoom
            | NodeType::Boss
            | NodeType::Frontier
            | NodeType::Questable => false,
        };

        let mut treasure: Vec<(usize, f64, usize)> = (0..n)
            .filter(|&i| promotable(roles.types[i]))
            .map(|i| (hidden_incidence[i], rng.gen::<f64>(), i))
            .collect();
        treasure.sort_by(|x, y| y.0.cmp(&x.0).then(x.1.total_cmp(&y.1)));
        for (_, _, i) in treasure.into_iter().take((n / 12).max(1)) {
            roles.types[i] = NodeType::TreasureRoom;
        }

        let mut quests: Vec<usize> = (0..n).filter(|&i| promotable(roles.types[i])).collect();
        quests.shuffle(rng);
        for i in quests.into_iter().take((n / 15).max(1)) {
            roles.types[i] = NodeType::Questable;
        }
    }

    /// Materializes labelled, paired edges on graph nodes.
    fn build_nodes(
        params: &TopologyParams,
        plan: &LayoutPlan,
        skeleton: &Skeleton,
        hidden: &[Option<u8>],
        roles: &Roles,
    ) -> Vec<GraphNode> {
        let n = skeleton.len();
        let ids: Vec<NodeId> = (0..n)
            .map(|i| NodeId::in_subzone(&params.chunk_id, i))
            .collect();
        let mut nodes: Vec<GraphNode> = (0..n)
            .map(|i| {
                let mut node = GraphNode::new(ids[i].clone(), params.chunk_id.clone(), plan.position(i));
                node.node_type = roles.types[i];
                node
            })
            .collect();

        let mut labels = DirectionAllocator::new(n);
        for (index, &(a, b)) in skeleton.edges.iter().enumerate() {
            let (forward, back) = labels.allocate_pair(a, b, plan.position(a), plan.position(b));
            let make = |target: &NodeId, direction: String| {
                let mut edge = Edge::passage(target.clone(), direction);
                if let Some(dc) = hidden[index] {
                    edge.hidden = true;
                    edge.conditions.push(TraversalCondition::SkillCheck {
                        skill: PERCEPTION_SKILL.to_string(),
                        difficulty: dc,
                    });
                }
                edge
            };
            nodes[a].edges.push(make(&ids[b], forward));
            nodes[b].edges.push(make(&ids[a], back));
        }
        nodes
    }
}

/// Perception difficulty for a hidden edge: harder in harder, deeper chunks.
fn perception_dc(params: &TopologyParams, rng: &mut ChaCha8Rng) -> u8 {
    let depth_bonus = i32::try_from(params.depth / 2).unwrap_or(i32::MAX).min(4);
    let raw = i32::from(MIN_PERCEPTION_DC)
        + i32::from(params.difficulty)
        + depth_bonus
        + rng.gen_range(-2..=2);
    let clamped = raw.clamp(i32::from(MIN_PERCEPTION_DC), i32::from(MAX_PERCEPTION_DC));
    u8::try_from(clamped).unwrap_or(MAX_PERCEPTION_DC)
}
