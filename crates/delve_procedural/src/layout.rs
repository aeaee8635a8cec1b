//! # Layout Strategies
//!
//! A layout places candidate nodes and proposes which pairs may be joined.
//! The spanning tree and loop edges are later chosen from these proposals.
//!
//! | Strategy   | Shape                      | Themes                         |
//! |------------|----------------------------|--------------------------------|
//! | Grid       | regular lattice            | fortresses, sewers, mines      |
//! | BSP        | recursive room partition   | crypts, temples, libraries     |
//! | FloodFill  | organic blob growth        | caves and other natural forms  |
//!
//! Every strategy's candidate adjacency is connected by construction.

use std::collections::{HashMap, HashSet};

use delve_core::{BiomeTheme, Position};
use rand::seq::SliceRandom;
use rand::Rng;

use crate::mst::WeightedEdge;

/// Layout algorithm used for a Subzone.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum LayoutKind {
    /// Regular lattice; good for man-made structures.
    Grid,
    /// Binary space partitioning; good for rooms and buildings.
    Bsp,
    /// Organic growth; good for caves.
    FloodFill,
}

impl LayoutKind {
    /// Chooses the layout for a biome theme.
    #[must_use]
    pub const fn for_theme(theme: BiomeTheme) -> Self {
        match theme {
            BiomeTheme::Fortress | BiomeTheme::Sewers | BiomeTheme::Mines => Self::Grid,
            BiomeTheme::Crypt
            | BiomeTheme::Catacombs
            | BiomeTheme::Temple
            | BiomeTheme::Library => Self::Bsp,
            BiomeTheme::Caverns
            | BiomeTheme::FungalGrotto
            | BiomeTheme::FloodedDepths
            | BiomeTheme::Magma
            | BiomeTheme::Glacier
            | BiomeTheme::VoidRift => Self::FloodFill,
        }
    }

    /// True if the theme's geometry is meaningless and positions are dropped.
    #[must_use]
    pub const fn is_non_spatial(theme: BiomeTheme) -> bool {
        matches!(theme, BiomeTheme::VoidRift)
    }

    /// Runs the strategy for roughly `node_count` nodes.
    pub fn plan<R: Rng + ?Sized>(
        self,
        node_count: usize,
        theme: BiomeTheme,
        rng: &mut R,
    ) -> LayoutPlan {
        let (positions, adjacency) = match self {
            Self::Grid => grid(node_count),
            Self::Bsp => bsp(node_count, rng),
            Self::FloodFill => flood_fill(node_count, rng),
        };
        let node_count = positions.len();
        let positions = if Self::is_non_spatial(theme) {
            None
        } else {
            Some(positions)
        };
        LayoutPlan {
            kind: self,
            node_count,
            positions,
            adjacency,
        }
    }
}

/// Output of a layout strategy.
#[derive(Clone, Debug)]
pub struct LayoutPlan {
    /// Strategy that produced the plan.
    pub kind: LayoutKind,
    /// Number of nodes actually placed.
    pub node_count: usize,
    /// Node positions; `None` for non-spatial layouts.
    pub positions: Option<Vec<Position>>,
    /// Candidate adjacency as index pairs (`a < b`).
    pub adjacency: Vec<(usize, usize)>,
}

impl LayoutPlan {
    /// Position of node `index`, if the layout is spatial.
    #[must_use]
    pub fn position(&self, index: usize) -> Option<Position> {
        self.positions.as_ref().and_then(|p| p.get(index).copied())
    }

    /// Costs every candidate pair and shuffles equal-cost ties.
    ///
    /// Spatial layouts cost by Euclidean distance; non-spatial layouts draw a
    /// random weight per pair.
    pub fn weighted_candidates<R: Rng + ?Sized>(&self, rng: &mut R) -> Vec<WeightedEdge> {
        let mut pairs = self.adjacency.clone();
        pairs.shuffle(rng);
        pairs
            .into_iter()
            .map(|(a, b)| {
                let weight = match (self.position(a), self.position(b)) {
                    (Some(pa), Some(pb)) => pa.distance(pb),
                    _ => rng.gen::<f64>(),
                };
                WeightedEdge { a, b, weight }
            })
            .collect()
    }
}

/// Offsets of the eight lattice neighbours.
const NEIGHBORS_8: [(i32, i32); 8] = [
    (-1, -1),
    (0, -1),
    (1, -1),
    (-1, 0),
    (1, 0),
    (-1, 1),
    (0, 1),
    (1, 1),
];

/// Offsets of the four orthogonal neighbours.
const NEIGHBORS_4: [(i32, i32); 4] = [(0, -1), (-1, 0), (1, 0), (0, 1)];

/// Proposes every pair of cells that touch on the 8-neighbourhood.
fn lattice_adjacency(cells: &[Position]) -> Vec<(usize, usize)> {
    let lookup: HashMap<Position, usize> =
        cells.iter().enumerate().map(|(i, p)| (*p, i)).collect();
    let mut pairs = Vec::new();
    for (i, cell) in cells.iter().enumerate() {
        for (dx, dy) in NEIGHBORS_8 {
            let neighbor = Position::new(cell.x + dx, cell.y + dy);
            if let Some(&j) = lookup.get(&neighbor) {
                if i < j {
                    pairs.push((i, j));
                }
            }
        }
    }
    pairs
}

/// Fills a near-square lattice row by row.
fn grid(node_count: usize) -> (Vec<Position>, Vec<(usize, usize)>) {
    let width = (node_count as f64).sqrt().ceil().max(1.0) as usize;
    let cells: Vec<Position> = (0..node_count)
        .map(|i| Position::new((i % width) as i32, (i / width) as i32))
        .collect();
    let adjacency = lattice_adjacency(&cells);
    (cells, adjacency)
}

/// Axis-aligned leaf of the partition.
#[derive(Clone, Copy, Debug)]
struct Rect {
    x: i32,
    y: i32,
    w: i32,
    h: i32,
}

impl Rect {
    const fn area(self) -> i32 {
        self.w * self.h
    }

    const fn center(self) -> Position {
        Position::new(self.x + self.w / 2, self.y + self.h / 2)
    }

    /// True if the two rectangles share a border segment of positive length.
    fn touches(self, other: Self) -> bool {
        let overlap_x = (self.x + self.w).min(other.x + other.w) - self.x.max(other.x);
        let overlap_y = (self.y + self.h).min(other.y + other.h) - self.y.max(other.y);
        let vertical_border = self.x + self.w == other.x || other.x + other.w == self.x;
        let horizontal_border = self.y + self.h == other.y || other.y + other.h == self.y;
        (vertical_border && overlap_y > 0) || (horizontal_border && overlap_x > 0)
    }
}

/// Splits the largest room until `node_count` rooms exist.
fn bsp<R: Rng + ?Sized>(node_count: usize, rng: &mut R) -> (Vec<Position>, Vec<(usize, usize)>) {
    let side = 4 * ((node_count as f64).sqrt().ceil() as i32) + 4;
    let mut leaves = vec![Rect { x: 0, y: 0, w: side, h: side }];

    while leaves.len() < node_count {
        let Some((index, _)) = leaves
            .iter()
            .enumerate()
            .max_by_key(|(i, rect)| (rect.area(), std::cmp::Reverse(*i)))
        else {
            break;
        };
        let rect = leaves[index];
        let split_vertical = rect.w >= rect.h;
        let length = if split_vertical { rect.w } else { rect.h };
        if length < 2 {
            break;
        }
        let ratio = rng.gen_range(0.35..0.65);
        let cut = ((f64::from(length) * ratio).round() as i32).clamp(1, length - 1);
        let (first, second) = if split_vertical {
            (
                Rect { w: cut, ..rect },
                Rect { x: rect.x + cut, w: rect.w - cut, ..rect },
            )
        } else {
            (
                Rect { h: cut, ..rect },
                Rect { y: rect.y + cut, h: rect.h - cut, ..rect },
            )
        };
        leaves[index] = first;
        leaves.push(second);
    }

    let mut adjacency = Vec::new();
    for i in 0..leaves.len() {
        for j in (i + 1)..leaves.len() {
            if leaves[i].touches(leaves[j]) {
                adjacency.push((i, j));
            }
        }
    }
    let positions = leaves.iter().map(|rect| rect.center()).collect();
    (positions, adjacency)
}

/// Grows an organic blob one random boundary cell at a time.
fn flood_fill<R: Rng + ?Sized>(
    node_count: usize,
    rng: &mut R,
) -> (Vec<Position>, Vec<(usize, usize)>) {
    let origin = Position::new(0, 0);
    let mut cells = vec![origin];
    let mut grown: HashSet<Position> = HashSet::from([origin]);
    let mut boundary: Vec<Position> = NEIGHBORS_4
        .iter()
        .map(|(dx, dy)| Position::new(dx + origin.x, dy + origin.y))
        .collect();

    while cells.len() < node_count && !boundary.is_empty() {
        let pick = rng.gen_range(0..boundary.len());
        let cell = boundary.swap_remove(pick);
        if !grown.insert(cell) {
            continue;
        }
        cells.push(cell);
        for (dx, dy) in NEIGHBORS_4 {
            let next = Position::new(cell.x + dx, cell.y + dy);
            if !grown.contains(&next) {
                boundary.push(next);
            }
        }
    }

    let adjacency = lattice_adjacency(&cells);
    (cells, adjacency)
}
