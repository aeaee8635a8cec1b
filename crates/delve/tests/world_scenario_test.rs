//! End-to-end world scenarios over the in-memory store.

use std::sync::Arc;
use std::time::Duration;

use delve::{
    CollapseRequest, GenerationError, MoveOutcome, MutationOutcome, MutationRejection,
    TemplateTextGenerator, ThemedPopulator, World, WorldConfig, WorldEvent,
};
use delve_core::{ChunkId, ChunkLevel, EdgeKind, GraphNode, NodeId, NodeType, RegionTier};
use delve_persistence::{MemoryStore, SpaceContentRepository, WorldStore};
use delve_procedural::{collapse_edge, TopologyValidator, ValidationProfile};

const SEED: &str = "test-seed";
const LORE: &str = "The mountain swallowed a kingdom and kept its halls.";

async fn world() -> (World, NodeId) {
    let store: Arc<dyn WorldStore> = Arc::new(MemoryStore::new());
    let world = World::open(
        WorldConfig::production(),
        store,
        Arc::new(TemplateTextGenerator),
        Arc::new(ThemedPopulator),
    )
    .unwrap();
    let seed = world.initialize(SEED, LORE).await.unwrap();
    (world, seed.starting_space)
}

fn subzone_of(world: &World, node: &NodeId) -> Vec<GraphNode> {
    let persistence = world.persistence();
    let origin = persistence.node(node).unwrap().unwrap();
    persistence.subzone_nodes(&origin.chunk_id).unwrap()
}

/// First visible internal exit whose collapse does (`keeps == true`) or
/// does not keep the subzone valid.
fn find_collapse(nodes: &[GraphNode], keeps: bool) -> Option<(NodeId, String)> {
    for node in nodes {
        for edge in &node.edges {
            if edge.hidden || !nodes.iter().any(|other| other.id == edge.target) {
                continue;
            }
            let mut edited = nodes.to_vec();
            collapse_edge(&mut edited, &node.id, &edge.direction, |_, _| true).unwrap();
            let valid = TopologyValidator::validate(&edited).passes(ValidationProfile::Mutation);
            if valid == keeps {
                return Some((node.id.clone(), edge.direction.clone()));
            }
        }
    }
    None
}

#[tokio::test]
async fn test_initialize_builds_full_lineage() {
    let (world, start) = world().await;
    let persistence = world.persistence();

    let start_node = persistence.node(&start).unwrap().unwrap();
    assert_eq!(start_node.node_type, NodeType::Hub);

    let subzone = persistence.chunk(&start_node.chunk_id).unwrap().unwrap();
    assert_eq!(subzone.level, ChunkLevel::Subzone);
    assert_eq!(subzone.children.len(), subzone_of(&world, &start).len());
    assert!(TopologyValidator::validate(&subzone_of(&world, &start)).passed());

    let zone = persistence.chunk(subzone.parent.as_ref().unwrap()).unwrap().unwrap();
    let region = persistence.chunk(zone.parent.as_ref().unwrap()).unwrap().unwrap();
    assert_eq!(region.level, ChunkLevel::Region);
    assert_eq!(region.parent, Some(ChunkId::root()));

    let stub = persistence.content(&start).unwrap().unwrap();
    assert!(stub.is_stub());
    assert_eq!(stub.exits.len(), start_node.edges.len());
}

#[tokio::test]
async fn test_initialize_is_idempotent_and_deterministic() {
    let (first, start) = world().await;
    let again = first.initialize("another-seed", LORE).await.unwrap();
    assert_eq!(again.seed, SEED);
    assert_eq!(again.starting_space, start);

    let (second, second_start) = world().await;
    assert_eq!(second_start, start);
    assert_eq!(subzone_of(&first, &start), subzone_of(&second, &second_start));
}

#[tokio::test]
async fn test_region_tiers_get_harder() {
    let (world, _) = world().await;
    let root = ChunkId::root();
    let upper = world.persistence().chunk(&root.child(ChunkLevel::Region, 0)).unwrap().unwrap();
    let mid = world.generate_chunk(&root, ChunkLevel::Region).await.unwrap();
    let lower = world.generate_chunk(&root, ChunkLevel::Region).await.unwrap();

    assert_eq!(upper.tier, Some(RegionTier::Upper));
    assert_eq!(mid.tier, Some(RegionTier::Mid));
    assert_eq!(lower.tier, Some(RegionTier::Lower));
    assert!(upper.difficulty < mid.difficulty);
    assert!(mid.difficulty < lower.difficulty);

    assert_eq!(mid.adjacency.get("previous"), Some(&upper.id));
    let root_chunk = world.persistence().chunk(&root).unwrap().unwrap();
    assert_eq!(root_chunk.children, vec![upper.id, mid.id, lower.id]);
}

#[tokio::test]
async fn test_wrong_level_rejected() {
    let (world, _) = world().await;
    let err = world
        .generate_chunk(&ChunkId::root(), ChunkLevel::Zone)
        .await
        .unwrap_err();
    assert!(matches!(err, GenerationError::InvalidLevel { .. }));
}

#[tokio::test]
async fn test_fill_runs_once() {
    let (world, start) = world().await;
    let (a, b) = tokio::join!(world.enter(&start), world.enter(&start));
    let (a, b) = (a.unwrap(), b.unwrap());
    assert!(!a.is_stub());
    assert_eq!(a, b);

    let again = world.enter(&start).await.unwrap();
    assert_eq!(again, a);
    let fills = world
        .events()
        .drain()
        .into_iter()
        .filter(|event| matches!(event, WorldEvent::SpaceFilled { space } if *space == start))
        .count();
    assert_eq!(fills, 1);
}

#[tokio::test]
async fn test_move_fills_destination() {
    let (world, start) = world().await;
    let hub = world.persistence().node(&start).unwrap().unwrap();
    let exit = hub.edges.iter().find(|edge| !edge.hidden).unwrap();

    let outcome = world
        .move_player("p1", &start, &exit.direction.to_uppercase())
        .await
        .unwrap();
    match outcome {
        MoveOutcome::Moved { to, content, .. } => {
            assert_eq!(to, exit.target);
            assert!(!content.is_stub());
        }
        other => panic!("expected a move, got {other:?}"),
    }

    let nowhere = world.move_player("p1", &start, "xyzzy").await.unwrap();
    assert_eq!(nowhere, MoveOutcome::NoExit);
}

#[tokio::test]
async fn test_moving_onto_frontier_expands_once() {
    let (world, start) = world().await;
    let nodes = subzone_of(&world, &start);
    let frontier = nodes
        .iter()
        .find(|node| node.node_type == NodeType::Frontier)
        .unwrap();
    let approach = frontier.edges.iter().find(|edge| !edge.hidden).unwrap();
    let neighbour = world.persistence().node(&approach.target).unwrap().unwrap();
    let inbound = neighbour.edge_to(&frontier.id).unwrap().direction.clone();

    let first = world
        .move_player("p1", &neighbour.id, &inbound)
        .await
        .unwrap();
    let MoveOutcome::Moved { expansion: Some(expansion), .. } = first else {
        panic!("expected a frontier expansion, got {first:?}");
    };
    let linked = world.persistence().node(&frontier.id).unwrap().unwrap();
    let link = linked.edge_to(&expansion.hub).unwrap();
    assert_eq!(link.kind, EdgeKind::Frontier);
    let hub = world.persistence().node(&expansion.hub).unwrap().unwrap();
    assert!(hub.connects_to(&frontier.id));
    let sibling = world.persistence().chunk(&expansion.subzone).unwrap().unwrap();
    assert_eq!(sibling.depth, 1);

    let second = world
        .move_player("p1", &neighbour.id, &inbound)
        .await
        .unwrap();
    assert!(matches!(second, MoveOutcome::Moved { expansion: None, .. }));
}

#[tokio::test]
async fn test_search_reveals_both_directions() {
    let (world, start) = world().await;
    let nodes = subzone_of(&world, &start);
    let (node, edge) = nodes
        .iter()
        .find_map(|node| node.edges.iter().find(|e| e.hidden).map(|e| (node, e)))
        .unwrap();

    assert!(world.search(&node.id, "p1", 0).unwrap().is_empty());
    let found = world.search(&node.id, "p1", 30).unwrap();
    assert!(found.contains(&edge.direction));
    assert!(world.search(&node.id, "p1", 30).unwrap().is_empty());

    let revealed = world.revealed_for("p1");
    let far = world.persistence().node(&edge.target).unwrap().unwrap();
    let back = far.edge_to(&node.id).unwrap();
    let resolved = world
        .resolver()
        .resolve_local(&far, &back.direction, &revealed);
    assert!(matches!(resolved, Some(delve::ExitResolution::Found(e)) if e.target == node.id));

    assert!(world.revealed_for("p2").is_empty());
}

#[tokio::test]
async fn test_collapse_accepted_and_rejected() {
    let (world, start) = world().await;
    let nodes = subzone_of(&world, &start);

    let (bridge_from, bridge_dir) = find_collapse(&nodes, false).unwrap();
    let rejected = world
        .collapse(
            "p1",
            &CollapseRequest {
                from: bridge_from.clone(),
                direction: bridge_dir,
                item: Some("blasting powder".to_string()),
            },
        )
        .unwrap();
    assert!(matches!(
        rejected,
        MutationOutcome::Rejected(MutationRejection::WouldBreakTopology(_))
    ));
    assert_eq!(subzone_of(&world, &start), nodes);

    let (from, direction) = find_collapse(&nodes, true).unwrap();
    let applied = world
        .collapse(
            "p1",
            &CollapseRequest {
                from: from.clone(),
                direction: direction.clone(),
                item: Some("blasting powder".to_string()),
            },
        )
        .unwrap();
    let MutationOutcome::Applied { to, .. } = applied else {
        panic!("expected the collapse to apply, got {applied:?}");
    };
    let after = subzone_of(&world, &start);
    let origin = after.iter().find(|node| node.id == from).unwrap();
    let target = after.iter().find(|node| node.id == to).unwrap();
    assert!(!origin.has_direction(&direction));
    assert!(!target.connects_to(&from));
    assert!(TopologyValidator::validate(&after).passes(ValidationProfile::Mutation));
}

#[tokio::test]
async fn test_respawn_preserves_player_changes() {
    let (world, start) = world().await;
    let space = subzone_of(&world, &start)
        .into_iter()
        .find(|node| node.node_type != NodeType::Hub)
        .unwrap()
        .id;
    let mut content = world.enter(&space).await.unwrap();
    assert!(!content.entities.is_empty());

    content = world
        .update_space(&space, |content| {
            content.set_flag("chest_opened", true);
            content.items_dropped.push("item_001".to_string());
        })
        .unwrap();

    for entity in content.entities.clone() {
        world.respawn().record_death(&space, &entity.id, 0).unwrap();
    }
    assert!(world.persistence().content(&space).unwrap().unwrap().entities.is_empty());

    let report = world.respawn().respawn_world().unwrap();
    assert_eq!(report.spaces, 1);

    let after = world.persistence().content(&space).unwrap().unwrap();
    assert!(!after.entities.is_empty());
    assert!(after.flag("chest_opened"));
    assert_eq!(after.items_dropped, vec!["item_001".to_string()]);
    assert_eq!(after.description, content.description);
}

#[tokio::test(start_paused = true)]
async fn test_autosave_writes_moves_and_player_changes() {
    let store = Arc::new(MemoryStore::new());
    let mut config = WorldConfig::production();
    config.autosave.move_threshold = 1;
    let world = World::open(
        config,
        store.clone(),
        Arc::new(TemplateTextGenerator),
        Arc::new(ThemedPopulator),
    )
    .unwrap();
    let start = world.initialize(SEED, LORE).await.unwrap().starting_space;
    let events = world.events();
    world.start_autosave();

    let hub = world.persistence().node(&start).unwrap().unwrap();
    let exit = hub.edges.iter().find(|edge| !edge.hidden).unwrap();
    let outcome = world
        .move_player("p1", &start, &exit.direction)
        .await
        .unwrap();
    let MoveOutcome::Moved { to, content, .. } = outcome else {
        panic!("expected a move, got {outcome:?}");
    };
    assert!(store.find_content(&to).unwrap().unwrap().is_stub());

    tokio::time::sleep(Duration::from_millis(10)).await;
    assert_eq!(world.persistence().dirty_count(), 0);
    assert_eq!(store.find_content(&to).unwrap(), Some(content));
    assert!(events
        .drain()
        .iter()
        .any(|event| matches!(event, WorldEvent::WorldSaved { contents } if *contents >= 1)));

    let changed = world
        .update_space(&to, |content| content.set_flag("lever_pulled", true))
        .unwrap();
    assert_eq!(world.persistence().dirty_count(), 1);
    world.shutdown().await.unwrap();
    assert_eq!(world.persistence().dirty_count(), 0);
    assert_eq!(store.find_content(&to).unwrap(), Some(changed));
}

#[tokio::test]
async fn test_cache_released_behind_the_player() {
    let (world, start) = world().await;
    let hub = world.persistence().node(&start).unwrap().unwrap();
    let exit = hub.edges.iter().find(|edge| !edge.hidden).unwrap();
    world
        .move_player("p1", &start, &exit.direction)
        .await
        .unwrap();
    let settled = world.persistence().cached_count();

    let region = world
        .generate_chunk(&ChunkId::root(), ChunkLevel::Region)
        .await
        .unwrap();
    assert!(world.persistence().cached_count() > settled);

    let there = world.persistence().node(&exit.target).unwrap().unwrap();
    let back = there.edge_to(&start).unwrap().direction.clone();
    world.move_player("p1", &there.id, &back).await.unwrap();
    assert_eq!(world.persistence().cached_count(), settled);
    assert_eq!(world.persistence().chunk(&region.id).unwrap(), Some(region));
}
