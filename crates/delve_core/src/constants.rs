//! # Generation Constants
//!
//! Fixed rules of the world model. Tunable knobs live in the runtime
//! configuration instead; these values are invariants other crates rely on.

// =============================================================================
// DIFFICULTY
// =============================================================================

/// Lowest difficulty a chunk can have.
pub const MIN_DIFFICULTY: u8 = 1;

/// Highest difficulty a chunk can have.
pub const MAX_DIFFICULTY: u8 = 20;

// =============================================================================
// TOPOLOGY
// =============================================================================

/// Minimum number of Frontier nodes in every Subzone graph.
pub const MIN_FRONTIER_NODES: usize = 2;

/// Minimum average out-degree of a freshly generated Subzone graph.
pub const MIN_AVERAGE_OUT_DEGREE: f64 = 3.0;

/// Lowest perception difficulty attached to a hidden edge.
pub const MIN_PERCEPTION_DC: u8 = 10;

/// Highest perception difficulty attached to a hidden edge.
pub const MAX_PERCEPTION_DC: u8 = 30;

/// Skill name used by hidden-edge traversal conditions.
pub const PERCEPTION_SKILL: &str = "perception";

// =============================================================================
// CONTENT FLAGS
// =============================================================================

/// Space state flag set once a Frontier node has been linked onward.
pub const FLAG_FRONTIER_EXPANDED: &str = "frontier_expanded";

/// Space state flag set once a Frontier node has opened a breakout.
pub const FLAG_BREAKOUT_OPENED: &str = "breakout_opened";
