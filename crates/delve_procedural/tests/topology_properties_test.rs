//! # Topology Property Tests
//!
//! Seed sweeps over every biome theme: every generated Subzone graph must
//! be connected, contain a cycle, carry at least two frontiers and exactly
//! one boss, and keep its hidden-edge share inside the configured band.

use delve_core::{BiomeTheme, ChunkId, GenerationSeed, GraphNode, NodeType};
use delve_procedural::{
    LayoutKind, TopologyGenerator, TopologyParams, TopologyValidator, ValidationProfile,
};

const SEEDS_PER_THEME: u64 = 12;

fn params(theme: BiomeTheme, size: u32, seed: u64) -> TopologyParams {
    TopologyParams {
        chunk_id: ChunkId::new(format!("world/r0/z0/s{seed}")),
        theme,
        size_estimate: size,
        difficulty: 8,
        depth: 2,
        seed: GenerationSeed::from_identity("test-seed", &format!("{theme}/{seed}")),
    }
}

fn sweep() -> impl Iterator<Item = (BiomeTheme, u64, Vec<GraphNode>)> {
    let generator = TopologyGenerator::default();
    BiomeTheme::ALL.into_iter().flat_map(move |theme| {
        let generator = generator.clone();
        (0..SEEDS_PER_THEME).map(move |seed| {
            let size = 8 + (seed as u32 * 7) % 60;
            let nodes = generator
                .generate(&params(theme, size, seed))
                .expect("default config generates");
            (theme, seed, nodes)
        })
    })
}

#[test]
fn test_every_graph_passes_generation_checks() {
    for (theme, seed, nodes) in sweep() {
        let report = TopologyValidator::validate(&nodes);
        assert!(
            report.passes(ValidationProfile::Generation),
            "{theme} seed {seed}: {:?}",
            report.reasons()
        );
        assert_eq!(report.reachable, nodes.len());
        assert!(report.has_cycle);
    }
}

#[test]
fn test_every_graph_has_one_boss_and_two_frontiers() {
    for (theme, seed, nodes) in sweep() {
        let bosses = nodes.iter().filter(|n| n.node_type == NodeType::Boss).count();
        let frontiers = nodes
            .iter()
            .filter(|n| n.node_type == NodeType::Frontier)
            .count();
        let hubs = nodes.iter().filter(|n| n.node_type == NodeType::Hub).count();
        assert_eq!(bosses, 1, "{theme} seed {seed}");
        assert!(frontiers >= 2, "{theme} seed {seed}");
        assert!((1..=2).contains(&hubs), "{theme} seed {seed}");
    }
}

#[test]
fn test_hidden_fraction_across_runs() {
    let mut hidden = 0_usize;
    let mut total = 0_usize;
    for (_, _, nodes) in sweep() {
        for edge in nodes.iter().flat_map(|n| n.edges.iter()) {
            total += 1;
            if edge.hidden {
                hidden += 1;
            }
        }
    }
    let fraction = hidden as f64 / total as f64;
    assert!(
        (0.15..=0.25).contains(&fraction),
        "hidden fraction {fraction:.3}"
    );
}

#[test]
fn test_hidden_edges_never_split_visible_graph() {
    for (theme, seed, nodes) in sweep() {
        let mut visible = nodes.clone();
        for node in &mut visible {
            node.edges.retain(|e| !e.hidden);
        }
        let report = TopologyValidator::validate(&visible);
        assert_eq!(report.reachable, nodes.len(), "{theme} seed {seed}");
    }
}

#[test]
fn test_same_identity_same_graph() {
    let generator = TopologyGenerator::default();
    for theme in BiomeTheme::ALL {
        let p = params(theme, 40, 7);
        assert_eq!(generator.generate(&p).unwrap(), generator.generate(&p).unwrap());
    }
}

#[test]
fn test_non_spatial_theme_has_no_positions() {
    assert!(LayoutKind::is_non_spatial(BiomeTheme::VoidRift));
    let nodes = TopologyGenerator::default()
        .generate(&params(BiomeTheme::VoidRift, 30, 1))
        .unwrap();
    assert!(nodes.iter().all(|n| n.position.is_none()));
}
