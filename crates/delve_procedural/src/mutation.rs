//! # Graph Mutations
//!
//! The two sanctioned topology edits, applied to an in-memory node list.
//! Both keep edges paired. Neither validates; callers run the validator on
//! the edited copy and commit only if it passes.

use delve_core::{Edge, EdgeKind, GraphNode, NodeId};
use thiserror::Error;

use crate::directions::label_pair;
use crate::traversal::NodeIndex;

/// Why an edit could not be applied to the node list.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MutationError {
    /// The node is not part of the list.
    #[error("node {0} is not in this subzone")]
    UnknownNode(NodeId),

    /// No exit with that label at the node.
    #[error("node {node} has no exit '{direction}'")]
    NoSuchExit {
        /// Node inspected.
        node: NodeId,
        /// Requested label.
        direction: String,
    },

    /// The two nodes are already joined.
    #[error("{0} and {1} are already connected")]
    AlreadyConnected(NodeId, NodeId),

    /// The nodes belong to different Subzones.
    #[error("cannot carve from {from} to {to}: different subzones")]
    NotCarvable {
        /// Origin node.
        from: NodeId,
        /// Requested target.
        to: NodeId,
    },

    /// A node cannot be joined to itself.
    #[error("cannot connect {0} to itself")]
    SelfLoop(NodeId),
}

fn find(nodes: &[GraphNode], id: &NodeId) -> Result<usize, MutationError> {
    nodes
        .iter()
        .position(|node| &node.id == id)
        .ok_or_else(|| MutationError::UnknownNode(id.clone()))
}

/// Unconnected nodes a carve from `from` could reach, nearest first.
///
/// Spatial graphs use lattice reach (Chebyshev distance up to `reach`).
/// Non-spatial graphs offer the nodes exactly two hops away.
///
/// # Errors
///
/// Returns `UnknownNode` if `from` is not in the list.
pub fn carve_targets(
    nodes: &[GraphNode],
    from: &NodeId,
    reach: i32,
) -> Result<Vec<NodeId>, MutationError> {
    let origin = find(nodes, from)?;
    let source = &nodes[origin];

    let mut targets: Vec<(i32, NodeId)> = match source.position {
        Some(at) => nodes
            .iter()
            .filter(|node| node.id != source.id && !source.connects_to(&node.id))
            .filter_map(|node| {
                let distance = at.chebyshev(node.position?);
                (distance <= reach).then(|| (distance, node.id.clone()))
            })
            .collect(),
        None => {
            let index = NodeIndex::new(nodes);
            index
                .distances_from(origin)
                .into_iter()
                .enumerate()
                .filter(|(_, distance)| *distance == Some(2))
                .map(|(i, _)| (2, nodes[i].id.clone()))
                .collect()
        }
    };
    targets.sort();
    Ok(targets.into_iter().map(|(_, id)| id).collect())
}

/// Adds a paired `Carved` edge between `from` and `to`.
///
/// Returns the labels as seen from `from` and from `to`.
///
/// # Errors
///
/// Fails for unknown nodes, self-loops, existing connections and targets in
/// another Subzone.
pub fn carve_edge(
    nodes: &mut [GraphNode],
    from: &NodeId,
    to: &NodeId,
) -> Result<(String, String), MutationError> {
    if from == to {
        return Err(MutationError::SelfLoop(from.clone()));
    }
    let a = find(nodes, from)?;
    let b = find(nodes, to)?;
    if nodes[a].chunk_id != nodes[b].chunk_id {
        return Err(MutationError::NotCarvable {
            from: from.clone(),
            to: to.clone(),
        });
    }
    if nodes[a].connects_to(to) || nodes[b].connects_to(from) {
        return Err(MutationError::AlreadyConnected(from.clone(), to.clone()));
    }

    let (forward, back) = label_pair(
        nodes[a].position,
        nodes[b].position,
        |label| nodes[a].has_direction(label),
        |label| nodes[b].has_direction(label),
    );
    nodes[a]
        .edges
        .push(Edge::passage(to.clone(), forward.clone()).with_kind(EdgeKind::Carved));
    nodes[b]
        .edges
        .push(Edge::passage(from.clone(), back.clone()).with_kind(EdgeKind::Carved));
    Ok((forward, back))
}

/// Removes the exit labelled `direction` at `from` and its reverse edge.
///
/// Only exits for which `visible` holds can be named. The reverse edge is
/// removed only if its node is in the list. Returns the removed forward edge.
///
/// # Errors
///
/// Fails for unknown nodes and for missing or invisible exits.
pub fn collapse_edge(
    nodes: &mut [GraphNode],
    from: &NodeId,
    direction: &str,
    visible: impl Fn(&GraphNode, &Edge) -> bool,
) -> Result<Edge, MutationError> {
    let a = find(nodes, from)?;
    let origin = &nodes[a];
    let position = origin
        .edges
        .iter()
        .position(|edge| edge.direction.eq_ignore_ascii_case(direction) && visible(origin, edge))
        .ok_or_else(|| MutationError::NoSuchExit {
            node: from.clone(),
            direction: direction.to_string(),
        })?;
    let removed = nodes[a].edges.remove(position);

    if let Ok(b) = find(nodes, &removed.target) {
        nodes[b].edges.retain(|edge| &edge.target != from);
    }
    Ok(removed)
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{ChunkId, Position};

    fn square() -> Vec<GraphNode> {
        let chunk = ChunkId::new("world/r0/z0/s0");
        let coords = [(0, 0), (1, 0), (1, 1), (0, 1)];
        let mut nodes: Vec<GraphNode> = coords
            .iter()
            .enumerate()
            .map(|(i, &(x, y))| {
                GraphNode::new(
                    NodeId::in_subzone(&chunk, i),
                    chunk.clone(),
                    Some(Position::new(x, y)),
                )
            })
            .collect();
        for (a, b) in [(0, 1), (1, 2), (2, 3)] {
            let (ida, idb) = (nodes[a].id.clone(), nodes[b].id.clone());
            carve_edge(&mut nodes, &ida, &idb).unwrap();
        }
        nodes
    }

    #[test]
    fn test_carve_adds_paired_edge() {
        let mut nodes = square();
        let (a, d) = (nodes[0].id.clone(), nodes[3].id.clone());
        let (forward, back) = carve_edge(&mut nodes, &a, &d).unwrap();
        assert_eq!((forward.as_str(), back.as_str()), ("south", "north"));
        assert_eq!(nodes[0].edge_to(&d).unwrap().kind, EdgeKind::Carved);
        assert!(nodes[3].connects_to(&a));
    }

    #[test]
    fn test_carve_rejects_existing_and_self() {
        let mut nodes = square();
        let (a, b) = (nodes[0].id.clone(), nodes[1].id.clone());
        assert_eq!(
            carve_edge(&mut nodes, &a, &b),
            Err(MutationError::AlreadyConnected(a.clone(), b))
        );
        assert_eq!(
            carve_edge(&mut nodes, &a, &a),
            Err(MutationError::SelfLoop(a.clone()))
        );
    }

    #[test]
    fn test_carve_targets_within_reach() {
        let nodes = square();
        let targets = carve_targets(&nodes, &nodes[0].id, 1).unwrap();
        // (1,1) and (0,1) are in reach; (1,0) is already connected.
        assert_eq!(targets, vec![nodes[2].id.clone(), nodes[3].id.clone()]);
    }

    #[test]
    fn test_carve_targets_non_spatial_two_hops() {
        let mut nodes = square();
        for node in &mut nodes {
            node.position = None;
        }
        let targets = carve_targets(&nodes, &nodes[0].id, 1).unwrap();
        assert_eq!(targets, vec![nodes[2].id.clone()]);
    }

    #[test]
    fn test_collapse_removes_both_directions() {
        let mut nodes = square();
        let (a, b) = (nodes[0].id.clone(), nodes[1].id.clone());
        let label = nodes[0].edge_to(&b).unwrap().direction.clone();
        let removed = collapse_edge(&mut nodes, &a, &label.to_uppercase(), |_, _| true).unwrap();
        assert_eq!(removed.target, b);
        assert!(!nodes[0].connects_to(&b));
        assert!(!nodes[1].connects_to(&a));
    }

    #[test]
    fn test_collapse_unknown_exit() {
        let mut nodes = square();
        let a = nodes[0].id.clone();
        assert!(matches!(
            collapse_edge(&mut nodes, &a, "sideways", |_, _| true),
            Err(MutationError::NoSuchExit { .. })
        ));
    }

    #[test]
    fn test_collapse_skips_invisible_exit() {
        let mut nodes = square();
        let (a, b) = (nodes[0].id.clone(), nodes[1].id.clone());
        let label = nodes[0].edge_to(&b).unwrap().direction.clone();
        let hidden = |_: &GraphNode, edge: &Edge| edge.target != b;
        assert!(matches!(
            collapse_edge(&mut nodes, &a, &label, hidden),
            Err(MutationError::NoSuchExit { .. })
        ));
        assert!(nodes[0].connects_to(&b));
    }
}
