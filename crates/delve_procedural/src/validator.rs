//! # Topology Validator
//!
//! Structural health checks over a Subzone node list. Pure: no I/O, no
//! panics on malformed input. A failing graph is an expected outcome and is
//! reported, not raised.
//!
//! | Check        | Passes when                                        |
//! |--------------|----------------------------------------------------|
//! | Connectivity | every node reaches and is reached by every other   |
//! | Cyclicity    | an undirected depth-first search finds a back-edge |
//! | Branching    | average internal out-degree >= 3.0                 |
//! | Frontier     | at least two Frontier nodes                        |
//!
//! Only edges whose target lies inside the list count; cross-Subzone links
//! and breakouts are ignored.

use std::fmt;

use delve_core::constants::{MIN_AVERAGE_OUT_DEGREE, MIN_FRONTIER_NODES};
use delve_core::{GraphNode, NodeType};

use crate::traversal::{has_undirected_cycle, NodeIndex};

/// One structural check.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationCheck {
    /// Every node reachable from every other.
    Connectivity,
    /// At least one cycle exists.
    Cyclicity,
    /// Average out-degree meets the minimum.
    Branching,
    /// Enough Frontier nodes exist.
    FrontierSufficiency,
}

impl ValidationCheck {
    /// Short name used in logs.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Connectivity => "connectivity",
            Self::Cyclicity => "cyclicity",
            Self::Branching => "branching",
            Self::FrontierSufficiency => "frontier_sufficiency",
        }
    }
}

/// Which checks must pass for a graph to be accepted.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash)]
pub enum ValidationProfile {
    /// Freshly generated graphs: all checks.
    Generation,
    /// Graphs after carve/collapse: connectivity and frontiers only.
    Mutation,
}

impl ValidationProfile {
    /// True if `check` must pass under this profile.
    #[must_use]
    pub const fn requires(self, check: ValidationCheck) -> bool {
        match self {
            Self::Generation => true,
            Self::Mutation => matches!(
                check,
                ValidationCheck::Connectivity | ValidationCheck::FrontierSufficiency
            ),
        }
    }
}

/// A failed check with a human-readable reason.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationFailure {
    /// The check that failed.
    pub check: ValidationCheck,
    /// Why it failed.
    pub reason: String,
}

impl fmt::Display for ValidationFailure {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.check.as_str(), self.reason)
    }
}

/// Measured values and failures of one validation run.
#[derive(Clone, Debug, PartialEq)]
pub struct ValidationReport {
    /// Nodes in the validated list.
    pub node_count: usize,
    /// Nodes mutually reachable with the first node.
    pub reachable: usize,
    /// Whether a back-edge was found.
    pub has_cycle: bool,
    /// Average internal out-degree.
    pub average_out_degree: f64,
    /// Number of Frontier nodes.
    pub frontier_count: usize,
    /// Failed checks, in check order.
    pub failures: Vec<ValidationFailure>,
}

impl ValidationReport {
    /// True if every check passed.
    #[must_use]
    pub fn passed(&self) -> bool {
        self.failures.is_empty()
    }

    /// True if every check required by `profile` passed.
    #[must_use]
    pub fn passes(&self, profile: ValidationProfile) -> bool {
        self.failures.iter().all(|f| !profile.requires(f.check))
    }

    /// Failure reasons of every check.
    #[must_use]
    pub fn reasons(&self) -> Vec<String> {
        self.failures.iter().map(ToString::to_string).collect()
    }

    /// Success marker or the reasons that matter under `profile`.
    ///
    /// # Errors
    ///
    /// Returns the failure reasons of the checks `profile` requires.
    pub fn outcome(&self, profile: ValidationProfile) -> Result<(), Vec<String>> {
        let reasons: Vec<String> = self
            .failures
            .iter()
            .filter(|f| profile.requires(f.check))
            .map(ToString::to_string)
            .collect();
        if reasons.is_empty() {
            Ok(())
        } else {
            Err(reasons)
        }
    }
}

/// Runs the structural checks.
#[derive(Clone, Copy, Debug, Default)]
pub struct TopologyValidator;

impl TopologyValidator {
    /// Validates a Subzone node list.
    #[must_use]
    pub fn validate(nodes: &[GraphNode]) -> ValidationReport {
        let index = NodeIndex::new(nodes);
        let node_count = index.len();
        let mut failures = Vec::new();

        // Connectivity
        let reachable = if index.is_empty() {
            0
        } else {
            index.reachable_from(0).min(index.reaching(0))
        };
        if node_count == 0 {
            failures.push(ValidationFailure {
                check: ValidationCheck::Connectivity,
                reason: "graph has no nodes".to_string(),
            });
        } else if reachable < node_count {
            failures.push(ValidationFailure {
                check: ValidationCheck::Connectivity,
                reason: format!("only {reachable} of {node_count} nodes are mutually reachable"),
            });
        }

        // Cyclicity
        let has_cycle = has_undirected_cycle(&index.undirected());
        if !has_cycle {
            failures.push(ValidationFailure {
                check: ValidationCheck::Cyclicity,
                reason: "no cycle found".to_string(),
            });
        }

        // Branching
        let average_out_degree = if node_count == 0 {
            0.0
        } else {
            index.total_out_degree() as f64 / node_count as f64
        };
        if average_out_degree < MIN_AVERAGE_OUT_DEGREE {
            failures.push(ValidationFailure {
                check: ValidationCheck::Branching,
                reason: format!(
                    "average out-degree {average_out_degree:.2} is below {MIN_AVERAGE_OUT_DEGREE:.1}"
                ),
            });
        }

        // Frontier sufficiency
        let frontier_count = nodes
            .iter()
            .filter(|node| node.node_type == NodeType::Frontier)
            .count();
        if frontier_count < MIN_FRONTIER_NODES {
            failures.push(ValidationFailure {
                check: ValidationCheck::FrontierSufficiency,
                reason: format!(
                    "{frontier_count} frontier nodes, at least {MIN_FRONTIER_NODES} required"
                ),
            });
        }

        ValidationReport {
            node_count,
            reachable,
            has_cycle,
            average_out_degree,
            frontier_count,
            failures,
        }
    }
}
