//! # Direction Labels
//!
//! Every edge carries the label a player types to follow it. Labels are
//! unique per node. Spatial layouts use compass directions; when a compass
//! label is taken (or the layout has no geometry) a vocabulary of vertical
//! and structural passages takes over.

use std::collections::HashSet;

use delve_core::Position;

/// Compass labels, counter-clockwise from east.
const COMPASS: [&str; 8] = [
    "east",
    "northeast",
    "north",
    "northwest",
    "west",
    "southwest",
    "south",
    "southeast",
];

/// Labels used when compass directions are exhausted or meaningless.
/// Each entry is (label at the origin, label at the destination).
const FALLBACK_PAIRS: [(&str, &str); 10] = [
    ("up", "down"),
    ("climb", "descend"),
    ("stairs up", "stairs down"),
    ("tunnel", "tunnel"),
    ("crawlway", "crawlway"),
    ("archway", "archway"),
    ("passage", "passage"),
    ("shaft", "shaft"),
    ("fissure", "fissure"),
    ("gallery", "gallery"),
];

/// Compass label pointing from `from` toward `to`.
#[must_use]
pub fn compass(from: Position, to: Position) -> Option<&'static str> {
    let dx = f64::from(to.x - from.x);
    // Screen-style lattice: north is negative y.
    let dy = f64::from(from.y - to.y);
    if dx == 0.0 && dy == 0.0 {
        return None;
    }
    let angle = dy.atan2(dx).to_degrees().rem_euclid(360.0);
    let sector = ((angle + 22.5) / 45.0).floor() as usize % 8;
    Some(COMPASS[sector])
}

/// The label for the reverse direction of `label`, if it has one.
#[must_use]
pub fn opposite(label: &str) -> Option<&'static str> {
    if let Some(index) = COMPASS.iter().position(|c| *c == label) {
        return Some(COMPASS[(index + 4) % 8]);
    }
    FALLBACK_PAIRS.iter().find_map(|(a, b)| {
        if *a == label {
            Some(*b)
        } else if *b == label {
            Some(*a)
        } else {
            None
        }
    })
}

/// Chooses labels for a new paired connection `a <-> b`.
///
/// `a_taken` / `b_taken` report whether a label is already used on each end.
/// The compass pair derived from the positions wins when both ends have it
/// free; otherwise the first free fallback pair, then numbered passages.
pub fn label_pair(
    a_pos: Option<Position>,
    b_pos: Option<Position>,
    a_taken: impl Fn(&str) -> bool,
    b_taken: impl Fn(&str) -> bool,
) -> (String, String) {
    if let (Some(pa), Some(pb)) = (a_pos, b_pos) {
        if let Some(forward) = compass(pa, pb) {
            if let Some(back) = opposite(forward) {
                if !a_taken(forward) && !b_taken(back) {
                    return (forward.to_string(), back.to_string());
                }
            }
        }
    }

    for (first, second) in FALLBACK_PAIRS {
        if !a_taken(first) && !b_taken(second) {
            return (first.to_string(), second.to_string());
        }
        if !a_taken(second) && !b_taken(first) {
            return (second.to_string(), first.to_string());
        }
    }

    let mut n = 2;
    loop {
        let label = format!("passage {n}");
        if !a_taken(&label) && !b_taken(&label) {
            return (label.clone(), label);
        }
        n += 1;
    }
}

/// Chooses a single free label at one node (for one-way edges).
pub fn label_single(preferred: &str, taken: impl Fn(&str) -> bool) -> String {
    if !taken(preferred) {
        return preferred.to_string();
    }
    let mut n = 2;
    loop {
        let label = format!("{preferred} {n}");
        if !taken(&label) {
            return label;
        }
        n += 1;
    }
}

/// Tracks used labels per node index during generation.
#[derive(Clone, Debug)]
pub struct DirectionAllocator {
    used: Vec<HashSet<String>>,
}

impl DirectionAllocator {
    /// Creates an allocator for `node_count` nodes with no labels used.
    #[must_use]
    pub fn new(node_count: usize) -> Self {
        Self {
            used: vec![HashSet::new(); node_count],
        }
    }

    /// Allocates and records labels for the connection `a <-> b`.
    pub fn allocate_pair(
        &mut self,
        a: usize,
        b: usize,
        a_pos: Option<Position>,
        b_pos: Option<Position>,
    ) -> (String, String) {
        let (forward, back) = {
            let used_a = &self.used[a];
            let used_b = &self.used[b];
            label_pair(
                a_pos,
                b_pos,
                |label| used_a.contains(label),
                |label| used_b.contains(label),
            )
        };
        self.used[a].insert(forward.clone());
        self.used[b].insert(back.clone());
        (forward, back)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_compass_sectors() {
        let origin = Position::new(0, 0);
        assert_eq!(compass(origin, Position::new(0, -1)), Some("north"));
        assert_eq!(compass(origin, Position::new(1, 0)), Some("east"));
        assert_eq!(compass(origin, Position::new(-1, 1)), Some("southwest"));
        assert_eq!(compass(origin, Position::new(3, -3)), Some("northeast"));
        assert_eq!(compass(origin, origin), None);
    }

    #[test]
    fn test_opposites() {
        assert_eq!(opposite("north"), Some("south"));
        assert_eq!(opposite("southeast"), Some("northwest"));
        assert_eq!(opposite("climb"), Some("descend"));
        assert_eq!(opposite("tunnel"), Some("tunnel"));
        assert_eq!(opposite("sideways"), None);
    }

    #[test]
    fn test_allocator_keeps_labels_unique() {
        let mut alloc = DirectionAllocator::new(3);
        let a = Some(Position::new(0, 0));
        let b = Some(Position::new(0, -1));
        let c = Some(Position::new(0, -2));

        let (ab, ba) = alloc.allocate_pair(0, 1, a, b);
        assert_eq!((ab.as_str(), ba.as_str()), ("north", "south"));

        // Node 0 already uses "north"; the far node also lies north.
        let (ac, ca) = alloc.allocate_pair(0, 2, a, c);
        assert_ne!(ac, "north");
        assert_eq!(opposite(&ac).map(str::to_string), Some(ca));
    }

    #[test]
    fn test_non_spatial_uses_vocabulary() {
        let mut alloc = DirectionAllocator::new(2);
        let (forward, back) = alloc.allocate_pair(0, 1, None, None);
        assert_eq!((forward.as_str(), back.as_str()), ("up", "down"));
    }

    #[test]
    fn test_label_single_numbers_collisions() {
        let taken: HashSet<&str> = ["onward", "onward 2"].into_iter().collect();
        assert_eq!(label_single("onward", |l| taken.contains(l)), "onward 3");
    }
}
