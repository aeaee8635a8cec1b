//! # Graph Traversal
//!
//! Index-based views over a node list. Only edges whose target lies inside
//! the list are followed; links into other Subzones are ignored.

use std::collections::{HashMap, VecDeque};

use delve_core::{GraphNode, NodeId};

/// Index-based adjacency over a slice of graph nodes.
#[derive(Clone, Debug)]
pub struct NodeIndex {
    ids: HashMap<NodeId, usize>,
    /// Directed internal adjacency.
    outgoing: Vec<Vec<usize>>,
    /// Reverse of `outgoing`.
    incoming: Vec<Vec<usize>>,
    /// Internal out-degree per node.
    out_degree: Vec<usize>,
}

impl NodeIndex {
    /// Builds the index for `nodes`.
    #[must_use]
    pub fn new(nodes: &[GraphNode]) -> Self {
        let ids: HashMap<NodeId, usize> = nodes
            .iter()
            .enumerate()
            .map(|(i, node)| (node.id.clone(), i))
            .collect();
        let mut outgoing = vec![Vec::new(); nodes.len()];
        let mut incoming = vec![Vec::new(); nodes.len()];
        for (i, node) in nodes.iter().enumerate() {
            for edge in &node.edges {
                if let Some(&j) = ids.get(&edge.target) {
                    outgoing[i].push(j);
                    incoming[j].push(i);
                }
            }
        }
        let out_degree = outgoing.iter().map(Vec::len).collect();
        Self {
            ids,
            outgoing,
            incoming,
            out_degree,
        }
    }

    /// Number of indexed nodes.
    #[must_use]
    pub fn len(&self) -> usize {
        self.outgoing.len()
    }

    /// True if no nodes are indexed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.outgoing.is_empty()
    }

    /// Index of `id`, if present.
    #[must_use]
    pub fn index_of(&self, id: &NodeId) -> Option<usize> {
        self.ids.get(id).copied()
    }

    /// Internal out-degree of node `index`.
    #[must_use]
    pub fn out_degree(&self, index: usize) -> usize {
        self.out_degree[index]
    }

    /// Sum of internal out-degrees.
    #[must_use]
    pub fn total_out_degree(&self) -> usize {
        self.out_degree.iter().sum()
    }

    /// Breadth-first hop distances from `start` along outgoing edges.
    #[must_use]
    pub fn distances_from(&self, start: usize) -> Vec<Option<usize>> {
        bfs(&self.outgoing, start)
    }

    /// Number of nodes reachable from `start` (including itself).
    #[must_use]
    pub fn reachable_from(&self, start: usize) -> usize {
        bfs(&self.outgoing, start).iter().flatten().count()
    }

    /// Number of nodes that can reach `start` (including itself).
    #[must_use]
    pub fn reaching(&self, start: usize) -> usize {
        bfs(&self.incoming, start).iter().flatten().count()
    }

    /// Undirected neighbour lists (each connection listed once per end).
    #[must_use]
    pub fn undirected(&self) -> Vec<Vec<usize>> {
        let mut adjacency: Vec<Vec<usize>> = vec![Vec::new(); self.len()];
        for (i, targets) in self.outgoing.iter().enumerate() {
            for &j in targets {
                if !adjacency[i].contains(&j) {
                    adjacency[i].push(j);
                }
                if !adjacency[j].contains(&i) {
                    adjacency[j].push(i);
                }
            }
        }
        adjacency
    }
}

/// Breadth-first hop distances over an adjacency list.
#[must_use]
pub fn bfs(adjacency: &[Vec<usize>], start: usize) -> Vec<Option<usize>> {
    let mut distance = vec![None; adjacency.len()];
    if start >= adjacency.len() {
        return distance;
    }
    distance[start] = Some(0);
    let mut queue = VecDeque::from([start]);
    while let Some(current) = queue.pop_front() {
        let next_distance = distance[current].map_or(0, |d| d + 1);
        for &next in &adjacency[current] {
            if distance[next].is_none() {
                distance[next] = Some(next_distance);
                queue.push_back(next);
            }
        }
    }
    distance
}

/// True if the undirected graph contains a cycle.
///
/// Iterative depth-first search; a visited neighbour other than the tree
/// parent is a back-edge. Paired edges count once, so `A <-> B` alone is
/// not a cycle.
#[must_use]
pub fn has_undirected_cycle(adjacency: &[Vec<usize>]) -> bool {
    let mut visited = vec![false; adjacency.len()];
    for root in 0..adjacency.len() {
        if visited[root] {
            continue;
        }
        visited[root] = true;
        let mut stack: Vec<(usize, Option<usize>)> = vec![(root, None)];
        while let Some((node, parent)) = stack.pop() {
            for &next in &adjacency[node] {
                if Some(next) == parent {
                    continue;
                }
                if visited[next] {
                    return true;
                }
                visited[next] = true;
                stack.push((next, Some(node)));
            }
        }
    }
    false
}

#[cfg(test)]
mod tests {
    use super::*;

    fn path(n: usize) -> Vec<Vec<usize>> {
        (0..n)
            .map(|i| {
                let mut v = Vec::new();
                if i > 0 {
                    v.push(i - 1);
                }
                if i + 1 < n {
                    v.push(i + 1);
                }
                v
            })
            .collect()
    }

    #[test]
    fn test_bfs_on_path() {
        let distances = bfs(&path(4), 0);
        assert_eq!(distances, vec![Some(0), Some(1), Some(2), Some(3)]);
    }

    #[test]
    fn test_tree_has_no_cycle() {
        assert!(!has_undirected_cycle(&path(6)));
    }

    #[test]
    fn test_triangle_has_cycle() {
        let triangle = vec![vec![1, 2], vec![0, 2], vec![0, 1]];
        assert!(has_undirected_cycle(&triangle));
    }

    #[test]
    fn test_square_has_cycle() {
        let square = vec![vec![1, 3], vec![0, 2], vec![1, 3], vec![2, 0]];
        assert!(has_undirected_cycle(&square));
    }
}
