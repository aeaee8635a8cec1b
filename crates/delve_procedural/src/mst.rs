//! # Minimum Spanning Tree
//!
//! Kruskal's algorithm over a disjoint-set forest.
//!
//! ## Complexity
//!
//! - Sort: O(E log E)
//! - Union-find: near O(1) amortized per operation (path halving + rank)
//!
//! If the candidate graph is connected the result has exactly `n - 1`
//! edges and reaches every node. A disconnected candidate graph yields a
//! spanning forest; the validator reports the gap.

use std::cmp::Ordering;

/// Disjoint-set forest with path halving and union by rank.
#[derive(Clone, Debug)]
pub struct UnionFind {
    parent: Vec<usize>,
    rank: Vec<u8>,
    sets: usize,
}

impl UnionFind {
    /// Creates `n` singleton sets.
    #[must_use]
    pub fn new(n: usize) -> Self {
        Self {
            parent: (0..n).collect(),
            rank: vec![0; n],
            sets: n,
        }
    }

    /// Representative of the set containing `x`.
    pub fn find(&mut self, mut x: usize) -> usize {
        while self.parent[x] != x {
            self.parent[x] = self.parent[self.parent[x]];
            x = self.parent[x];
        }
        x
    }

    /// Merges the sets of `a` and `b`. Returns false if already merged.
    pub fn union(&mut self, a: usize, b: usize) -> bool {
        let root_a = self.find(a);
        let root_b = self.find(b);
        if root_a == root_b {
            return false;
        }
        match self.rank[root_a].cmp(&self.rank[root_b]) {
            Ordering::Less => self.parent[root_a] = root_b,
            Ordering::Greater => self.parent[root_b] = root_a,
            Ordering::Equal => {
                self.parent[root_b] = root_a;
                self.rank[root_a] = self.rank[root_a].saturating_add(1);
            }
        }
        self.sets -= 1;
        true
    }

    /// Number of disjoint sets remaining.
    #[must_use]
    pub const fn set_count(&self) -> usize {
        self.sets
    }
}

/// A candidate connection with its cost.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct WeightedEdge {
    /// First endpoint (node index).
    pub a: usize,
    /// Second endpoint (node index).
    pub b: usize,
    /// Cost: distance for spatial layouts, random weight otherwise.
    pub weight: f64,
}

/// Computes a minimum spanning tree (or forest) over `candidates`.
///
/// Ties keep the incoming order, so callers control tie-breaking by
/// shuffling `candidates` with their seeded generator first.
#[must_use]
pub fn kruskal(node_count: usize, candidates: &[WeightedEdge]) -> Vec<WeightedEdge> {
    let mut sorted = candidates.to_vec();
    sorted.sort_by(|x, y| x.weight.total_cmp(&y.weight));

    let mut sets = UnionFind::new(node_count);
    let mut tree = Vec::with_capacity(node_count.saturating_sub(1));

    for edge in sorted {
        if edge.a == edge.b || edge.a >= node_count || edge.b >= node_count {
            continue;
        }
        if sets.union(edge.a, edge.b) {
            tree.push(edge);
            if tree.len() + 1 == node_count {
                break;
            }
        }
    }

    tree
}

#[cfg(test)]
mod tests {
    use super::*;

    fn edge(a: usize, b: usize, weight: f64) -> WeightedEdge {
        WeightedEdge { a, b, weight }
    }

    #[test]
    fn test_union_find_merges() {
        let mut sets = UnionFind::new(4);
        assert!(sets.union(0, 1));
        assert!(sets.union(2, 3));
        assert!(!sets.union(1, 0));
        assert_eq!(sets.set_count(), 2);
        assert!(sets.union(1, 3));
        assert_eq!(sets.find(0), sets.find(2));
        assert_eq!(sets.set_count(), 1);
    }

    #[test]
    fn test_kruskal_picks_cheapest_tree() {
        // Square with one diagonal; the heavy edges must be skipped.
        let candidates = [
            edge(0, 1, 1.0),
            edge(1, 2, 1.0),
            edge(2, 3, 1.0),
            edge(3, 0, 5.0),
            edge(0, 2, 9.0),
        ];
        let tree = kruskal(4, &candidates);
        assert_eq!(tree.len(), 3);
        let total: f64 = tree.iter().map(|e| e.weight).sum();
        assert!((total - 3.0).abs() < f64::EPSILON);
    }

    #[test]
    fn test_kruskal_disconnected_yields_forest() {
        let candidates = [edge(0, 1, 1.0), edge(2, 3, 1.0)];
        let tree = kruskal(4, &candidates);
        assert_eq!(tree.len(), 2);
    }

    #[test]
    fn test_kruskal_ignores_self_loops() {
        let candidates = [edge(0, 0, 0.0), edge(0, 1, 2.0)];
        assert_eq!(kruskal(2, &candidates), vec![edge(0, 1, 2.0)]);
    }
}
