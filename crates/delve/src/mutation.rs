//! # Dynamic Edge Modification
//!
//! Carve and collapse, the only ways a generated graph changes shape.
//!
//! Each runs as load -> edit a copy -> validate -> commit under the world
//! writer lock. A failed check leaves storage untouched and comes back as
//! `MutationOutcome::Rejected`, which is an ordinary outcome, not an error.

use std::fmt;
use std::sync::Arc;

use delve_core::{Edge, GraphNode, NodeId, SpaceContent};
use delve_persistence::WorldPersistence;
use delve_procedural::{
    carve_edge, carve_targets, collapse_edge, MutationError, TopologyValidator, ValidationProfile,
};
use tracing::info;

use crate::config::MutationConfig;
use crate::error::{GenerationError, GenerationResult};
use crate::events::{emit, EventSender, WorldEvent};
use crate::exits::RevealedEdges;
use crate::generator::WriteLock;

/// A request to dig a new passage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CarveRequest {
    /// Space the player digs from.
    pub from: NodeId,
    /// Requested destination; the nearest candidate if `None`.
    pub to: Option<NodeId>,
    /// The player's relevant skill.
    pub skill: u8,
    /// Resources the player can spend.
    pub resources: u32,
}

/// A request to bring down a passage.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct CollapseRequest {
    /// Space the player stands in.
    pub from: NodeId,
    /// Exit to collapse.
    pub direction: String,
    /// Single-use item consumed by the collapse, if the player has one.
    pub item: Option<String>,
}

/// Why a mutation was refused.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationRejection {
    /// Skill below the carve threshold.
    InsufficientSkill {
        /// Needed.
        required: u8,
        /// Offered.
        actual: u8,
    },
    /// Not enough resources for a carve.
    InsufficientResources {
        /// Needed.
        required: u32,
        /// Offered.
        available: u32,
    },
    /// No unconnected space within reach.
    NoCarvableNeighbor,
    /// A collapse needs an item.
    MissingItem,
    /// The space has no such exit.
    EdgeNotFound(String),
    /// The edited graph failed validation.
    WouldBreakTopology(Vec<String>),
}

impl fmt::Display for MutationRejection {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::InsufficientSkill { required, actual } => {
                write!(f, "skill {actual} is below the required {required}")
            }
            Self::InsufficientResources {
                required,
                available,
            } => write!(f, "needs {required} resources, has {available}"),
            Self::NoCarvableNeighbor => f.write_str("nothing within reach to carve toward"),
            Self::MissingItem => f.write_str("a collapse needs an item"),
            Self::EdgeNotFound(direction) => write!(f, "no exit '{direction}' here"),
            Self::WouldBreakTopology(reasons) => write!(f, "would break the map: {}", reasons.join("; ")),
        }
    }
}

/// What a mutation did.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum MutationOutcome {
    /// Committed.
    Applied {
        /// Origin space.
        from: NodeId,
        /// Other endpoint.
        to: NodeId,
        /// Label at the origin.
        direction: String,
    },
    /// Refused; storage unchanged.
    Rejected(MutationRejection),
}

impl MutationOutcome {
    /// True if the mutation was committed.
    #[must_use]
    pub const fn is_applied(&self) -> bool {
        matches!(self, Self::Applied { .. })
    }
}

/// Applies carve and collapse requests under the world writer.
pub struct EdgeModifier {
    config: MutationConfig,
    persistence: Arc<WorldPersistence>,
    writer: WriteLock,
    events: Option<EventSender>,
}

impl fmt::Debug for EdgeModifier {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EdgeModifier")
            .field("config", &self.config)
            .finish_non_exhaustive()
    }
}

impl EdgeModifier {
    /// Creates a modifier sharing `writer` with the rest of the world.
    #[must_use]
    pub fn new(config: &MutationConfig, persistence: Arc<WorldPersistence>, writer: WriteLock) -> Self {
        Self {
            config: config.clone(),
            persistence,
            writer,
            events: None,
        }
    }

    /// Publishes mutation events to `sender`.
    #[must_use]
    pub fn with_events(mut self, sender: EventSender) -> Self {
        self.events = Some(sender);
        self
    }

    /// Carves a passage from `request.from`.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or storage failures. Refusals are `Ok(Rejected)`.
    pub fn carve(&self, request: &CarveRequest) -> GenerationResult<MutationOutcome> {
        if request.skill < self.config.carve_min_skill {
            return Ok(self.reject(
                &request.from,
                MutationRejection::InsufficientSkill {
                    required: self.config.carve_min_skill,
                    actual: request.skill,
                },
            ));
        }
        if request.resources < self.config.carve_resource_cost {
            return Ok(self.reject(
                &request.from,
                MutationRejection::InsufficientResources {
                    required: self.config.carve_resource_cost,
                    available: request.resources,
                },
            ));
        }

        let _writer = self.writer.lock();
        let nodes = self.subzone_of(&request.from)?;
        let targets = carve_targets(&nodes, &request.from, self.config.carve_reach)
            .map_err(|_| GenerationError::UnknownNode(request.from.clone()))?;
        let target = match &request.to {
            Some(to) if targets.contains(to) => to.clone(),
            Some(_) => return Ok(self.reject(&request.from, MutationRejection::NoCarvableNeighbor)),
            None => match targets.first() {
                Some(first) => first.clone(),
                None => return Ok(self.reject(&request.from, MutationRejection::NoCarvableNeighbor)),
            },
        };

        let mut edited = nodes;
        let (forward, _) = match carve_edge(&mut edited, &request.from, &target) {
            Ok(labels) => labels,
            Err(_) => return Ok(self.reject(&request.from, MutationRejection::NoCarvableNeighbor)),
        };
        if let Err(reasons) = TopologyValidator::validate(&edited).outcome(ValidationProfile::Mutation) {
            return Ok(self.reject(&request.from, MutationRejection::WouldBreakTopology(reasons)));
        }

        self.commit(&edited, &[&request.from, &target])?;
        info!(from = %request.from, to = %target, direction = %forward, "carved passage");
        emit(
            self.events.as_ref(),
            WorldEvent::EdgeCarved {
                from: request.from.clone(),
                to: target.clone(),
            },
        );
        Ok(MutationOutcome::Applied {
            from: request.from.clone(),
            to: target,
            direction: forward,
        })
    }

    /// Collapses the exit `request.direction` at `request.from`.
    ///
    /// Hidden passages can be named only once they are in `revealed`. Both
    /// directions of the passage are removed. Passages that lead into
    /// another Subzone have their far end removed there too.
    ///
    /// # Errors
    ///
    /// `UnknownNode` or storage failures. Refusals are `Ok(Rejected)`.
    pub fn collapse(
        &self,
        request: &CollapseRequest,
        revealed: &RevealedEdges,
    ) -> GenerationResult<MutationOutcome> {
        if request.item.is_none() {
            return Ok(self.reject(&request.from, MutationRejection::MissingItem));
        }

        let _writer = self.writer.lock();
        let mut edited = self.subzone_of(&request.from)?;
        let visible = |node: &GraphNode, edge: &Edge| {
            !edge.hidden || revealed.contains(&node.edge_id(edge))
        };
        let removed = match collapse_edge(&mut edited, &request.from, &request.direction, visible) {
            Ok(removed) => removed,
            Err(MutationError::NoSuchExit { direction, .. }) => {
                return Ok(self.reject(&request.from, MutationRejection::EdgeNotFound(direction)));
            }
            Err(_) => return Err(GenerationError::UnknownNode(request.from.clone())),
        };
        if let Err(reasons) = TopologyValidator::validate(&edited).outcome(ValidationProfile::Mutation) {
            return Ok(self.reject(&request.from, MutationRejection::WouldBreakTopology(reasons)));
        }

        if !edited.iter().any(|node| node.id == removed.target) {
            if let Some(mut far) = self.persistence.node(&removed.target)? {
                far.edges.retain(|edge| edge.target != request.from);
                edited.push(far);
            }
        }
        self.commit(&edited, &[&request.from, &removed.target])?;
        info!(from = %request.from, direction = %removed.direction, "collapsed passage");
        emit(
            self.events.as_ref(),
            WorldEvent::EdgeCollapsed {
                from: request.from.clone(),
                direction: removed.direction.clone(),
            },
        );
        Ok(MutationOutcome::Applied {
            from: request.from.clone(),
            to: removed.target,
            direction: removed.direction,
        })
    }

    fn subzone_of(&self, node: &NodeId) -> GenerationResult<Vec<GraphNode>> {
        let origin = self
            .persistence
            .node(node)?
            .ok_or_else(|| GenerationError::UnknownNode(node.clone()))?;
        Ok(self.persistence.subzone_nodes(&origin.chunk_id)?)
    }

    /// Writes the touched nodes and re-syncs their exits.
    fn commit(&self, edited: &[GraphNode], touched: &[&NodeId]) -> GenerationResult<()> {
        let nodes: Vec<GraphNode> = edited
            .iter()
            .filter(|node| touched.contains(&&node.id))
            .cloned()
            .collect();
        let mut contents = Vec::with_capacity(nodes.len());
        for node in &nodes {
            let mut content = self
                .persistence
                .content(&node.id)?
                .unwrap_or_else(|| SpaceContent::stub(node));
            content.sync_exits(node);
            contents.push(content);
        }
        self.persistence.persist_batch(&[], &nodes, &contents)?;
        Ok(())
    }

    fn reject(&self, space: &NodeId, rejection: MutationRejection) -> MutationOutcome {
        info!(space = %space, reason = %rejection, "mutation rejected");
        emit(
            self.events.as_ref(),
            WorldEvent::MutationRejected {
                space: space.clone(),
                reason: rejection.to_string(),
            },
        );
        MutationOutcome::Rejected(rejection)
    }
}
