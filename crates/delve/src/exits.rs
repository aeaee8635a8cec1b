//! # Exit Resolution
//!
//! Maps what a player typed onto one of a space's visible exits.
//!
//! ## Stages
//!
//! 1. **Exact**: case-insensitive label match, plus compass abbreviations
//! 2. **Fuzzy**: smallest edit distance within the configured limit, then
//!    unique prefixes
//! 3. **Free text**: the text service picks one of the offered labels or
//!    answers `none`; anything else, an error, or a timeout is `NotFound`
//!
//! Hidden edges take part only once the player has revealed them.

use std::collections::HashSet;
use std::sync::Arc;
use std::time::Duration;

use delve_core::{BiomeTheme, Edge, EdgeId, GraphNode};
use tracing::{debug, warn};

use crate::config::ExitConfig;
use crate::text::{PromptContext, TextGenerator, NO_MATCH};

const ALIASES: [(&str, &str); 10] = [
    ("n", "north"),
    ("s", "south"),
    ("e", "east"),
    ("w", "west"),
    ("ne", "northeast"),
    ("nw", "northwest"),
    ("se", "southeast"),
    ("sw", "southwest"),
    ("u", "up"),
    ("d", "down"),
];

/// Passages a player has revealed.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct RevealedEdges {
    edges: HashSet<EdgeId>,
}

impl RevealedEdges {
    /// An empty set.
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Records a passage. Returns true if it was not yet revealed.
    pub fn reveal(&mut self, edge: EdgeId) -> bool {
        self.edges.insert(edge)
    }

    /// True if the passage has been revealed.
    #[must_use]
    pub fn contains(&self, edge: &EdgeId) -> bool {
        self.edges.contains(edge)
    }

    /// Number of revealed passages.
    #[must_use]
    pub fn len(&self) -> usize {
        self.edges.len()
    }

    /// True if nothing has been revealed.
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.edges.is_empty()
    }
}

/// Outcome of resolving one direction.
#[derive(Clone, Debug, PartialEq)]
pub enum ExitResolution {
    /// Exactly one exit matched.
    Found(Edge),
    /// Nothing matched.
    NotFound,
    /// Several exits matched equally well.
    Ambiguous(Vec<String>),
}

/// Staged exit matcher.
#[derive(Clone)]
pub struct ExitResolver {
    text: Arc<dyn TextGenerator>,
    timeout: Duration,
    max_fuzzy_distance: usize,
}

impl std::fmt::Debug for ExitResolver {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ExitResolver")
            .field("timeout", &self.timeout)
            .field("max_fuzzy_distance", &self.max_fuzzy_distance)
            .finish_non_exhaustive()
    }
}

impl ExitResolver {
    /// Creates a resolver using `text` for the free-text stage.
    #[must_use]
    pub fn new(config: &ExitConfig, text: Arc<dyn TextGenerator>) -> Self {
        Self {
            text,
            timeout: config.free_text_timeout(),
            max_fuzzy_distance: config.max_fuzzy_distance,
        }
    }

    /// Exits of `node` the player can see.
    #[must_use]
    pub fn visible_edges<'a>(node: &'a GraphNode, revealed: &RevealedEdges) -> Vec<&'a Edge> {
        node.edges
            .iter()
            .filter(|edge| !edge.hidden || revealed.contains(&node.edge_id(edge)))
            .collect()
    }

    /// Runs the exact and fuzzy stages. `None` means neither matched.
    #[must_use]
    pub fn resolve_local(
        &self,
        node: &GraphNode,
        direction: &str,
        revealed: &RevealedEdges,
    ) -> Option<ExitResolution> {
        let visible = Self::visible_edges(node, revealed);
        let wanted = normalize(direction);
        if wanted.is_empty() || visible.is_empty() {
            return Some(ExitResolution::NotFound);
        }

        let expanded = ALIASES
            .iter()
            .find(|(short, _)| *short == wanted)
            .map_or(wanted.as_str(), |(_, long)| *long);
        if let Some(edge) = visible
            .iter()
            .find(|edge| normalize(&edge.direction) == expanded)
        {
            return Some(ExitResolution::Found((*edge).clone()));
        }

        let distances: Vec<(usize, &Edge)> = visible
            .iter()
            .map(|edge| (edit_distance(&wanted, &normalize(&edge.direction)), *edge))
            .collect();
        let limit = self.max_fuzzy_distance.min(wanted.chars().count().saturating_sub(1));
        if let Some(best) = distances.iter().map(|(d, _)| *d).min().filter(|d| *d <= limit) {
            let matched: Vec<&Edge> = distances
                .iter()
                .filter(|(d, _)| *d == best)
                .map(|(_, edge)| *edge)
                .collect();
            return Some(pick(matched));
        }

        if wanted.chars().count() >= 2 {
            let matched: Vec<&Edge> = visible
                .iter()
                .copied()
                .filter(|edge| normalize(&edge.direction).starts_with(&wanted))
                .collect();
            if !matched.is_empty() {
                return Some(pick(matched));
            }
        }
        None
    }

    /// Resolves `direction` at `node` through all three stages.
    pub async fn resolve(
        &self,
        node: &GraphNode,
        direction: &str,
        revealed: &RevealedEdges,
        theme: BiomeTheme,
    ) -> ExitResolution {
        if let Some(resolution) = self.resolve_local(node, direction, revealed) {
            debug!(node = %node.id, direction, ?resolution, "resolved locally");
            return resolution;
        }

        let visible = Self::visible_edges(node, revealed);
        let options: Vec<String> = visible.iter().map(|edge| edge.direction.clone()).collect();
        let context = PromptContext::exit(direction, options, theme);
        let answer = match tokio::time::timeout(self.timeout, self.text.generate(&context)).await {
            Ok(Ok(answer)) => answer,
            Ok(Err(e)) => {
                warn!(error = %e, "free-text exit parse failed");
                return ExitResolution::NotFound;
            }
            Err(_) => {
                warn!(timeout_ms = self.timeout.as_millis() as u64, "free-text exit parse timed out");
                return ExitResolution::NotFound;
            }
        };

        let answer = normalize(&answer);
        if answer == NO_MATCH {
            return ExitResolution::NotFound;
        }
        match visible
            .iter()
            .find(|edge| normalize(&edge.direction) == answer)
        {
            Some(edge) => ExitResolution::Found((*edge).clone()),
            None => {
                warn!(%answer, "free-text exit parse answered outside the offered labels");
                ExitResolution::NotFound
            }
        }
    }
}

fn pick(matched: Vec<&Edge>) -> ExitResolution {
    match matched.as_slice() {
        [] => ExitResolution::NotFound,
        [only] => ExitResolution::Found((*only).clone()),
        many => ExitResolution::Ambiguous(many.iter().map(|edge| edge.direction.clone()).collect()),
    }
}

/// Lowercase, trimmed, single-spaced, without a leading "go".
fn normalize(raw: &str) -> String {
    let words: Vec<String> = raw.split_whitespace().map(str::to_lowercase).collect();
    let words = match words.as_slice() {
        [first, rest @ ..] if first == "go" && !rest.is_empty() => rest,
        all => all,
    };
    words.join(" ")
}

/// Optimal string alignment distance: insertions, deletions, substitutions
/// and adjacent transpositions each cost one.
#[must_use]
pub fn edit_distance(a: &str, b: &str) -> usize {
    let a: Vec<char> = a.chars().collect();
    let b: Vec<char> = b.chars().collect();
    let width = b.len() + 1;
    let mut table = vec![0usize; (a.len() + 1) * width];
    for i in 0..=a.len() {
        table[i * width] = i;
    }
    for j in 0..=b.len() {
        table[j] = j;
    }
    for i in 1..=a.len() {
        for j in 1..=b.len() {
            let cost = usize::from(a[i - 1] != b[j - 1]);
            let mut best = (table[(i - 1) * width + j] + 1)
                .min(table[i * width + j - 1] + 1)
                .min(table[(i - 1) * width + j - 1] + cost);
            if i > 1 && j > 1 && a[i - 1] == b[j - 2] && a[i - 2] == b[j - 1] {
                best = best.min(table[(i - 2) * width + j - 2] + 1);
            }
            table[i * width + j] = best;
        }
    }
    table[a.len() * width + b.len()]
}
