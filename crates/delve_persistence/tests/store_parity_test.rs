//! # Store Parity Tests
//!
//! The in-memory and SQLite stores must behave identically for every
//! repository contract the world generator relies on.

use std::sync::Arc;

use delve_core::{
    BiomeTheme, ChunkLevel, ChunkNode, Edge, Entity, GraphNode, NodeId, SpaceContent,
};
use delve_persistence::{
    ChunkRepository, CorpseRecord, CorpseRepository, GraphNodeRepository, MemoryStore,
    PersistenceError, RespawnRecord, RespawnRepository, SpaceContentRepository, SqliteStore,
    WorldPersistence, WorldStore,
};

fn stores() -> Vec<(&'static str, Arc<dyn WorldStore>)> {
    let memory: Arc<dyn WorldStore> = Arc::new(MemoryStore::new());
    let sqlite: Arc<dyn WorldStore> =
        Arc::new(SqliteStore::open_in_memory().expect("in-memory sqlite"));
    vec![("memory", memory), ("sqlite", sqlite)]
}

struct Fixture {
    chunks: Vec<ChunkNode>,
    nodes: Vec<GraphNode>,
    contents: Vec<SpaceContent>,
}

fn fixture() -> Fixture {
    let root = ChunkNode::root("The world remembers.", BiomeTheme::Catacombs);
    let region = ChunkNode {
        id: root.id.child(ChunkLevel::Region, 0),
        level: ChunkLevel::Region,
        parent: Some(root.id.clone()),
        ..root.clone()
    };
    let subzone = ChunkNode {
        id: region.id.child(ChunkLevel::Subzone, 0),
        level: ChunkLevel::Subzone,
        parent: Some(region.id.clone()),
        ..root.clone()
    };
    let mut chunks = vec![root, region, subzone.clone()];
    let mut nodes = Vec::new();
    for i in 0..2 {
        let id = NodeId::in_subzone(&subzone.id, i);
        chunks.push(ChunkNode {
            id: id.chunk_id(),
            level: ChunkLevel::Space,
            parent: Some(subzone.id.clone()),
            ..subzone.clone()
        });
        nodes.push(GraphNode::new(id, subzone.id.clone(), None));
    }
    let (a, b) = (nodes[0].id.clone(), nodes[1].id.clone());
    nodes[0].edges.push(Edge::passage(b, "down"));
    nodes[1].edges.push(Edge::passage(a, "up"));
    let contents = nodes.iter().map(SpaceContent::stub).collect();
    Fixture {
        chunks,
        nodes,
        contents,
    }
}

#[test]
fn test_graph_node_requires_subzone() {
    for (name, store) in stores() {
        let fx = fixture();
        let result = store.save_node(&fx.nodes[0]);
        assert!(
            matches!(result, Err(PersistenceError::MissingParent { .. })),
            "{name}: {result:?}"
        );
    }
}

#[test]
fn test_update_requires_existing_row() {
    for (name, store) in stores() {
        let fx = fixture();
        store.save_batch(&fx.chunks[..3], &[], &[]).unwrap();
        let result = store.update_content(&fx.contents[0]);
        assert!(matches!(result, Err(PersistenceError::NotFound(_))), "{name}");
    }
}

#[test]
fn test_batch_round_trip() {
    for (name, store) in stores() {
        let fx = fixture();
        store.save_batch(&fx.chunks, &fx.nodes, &fx.contents).unwrap();
        let subzone = fx.chunks[2].id.clone();
        assert_eq!(store.nodes_in_chunk(&subzone).unwrap(), fx.nodes, "{name}");
        assert_eq!(
            store.find_content(&fx.nodes[1].id).unwrap().as_ref(),
            Some(&fx.contents[1]),
            "{name}"
        );
    }
}

#[test]
fn test_corpses_and_respawns() {
    for (name, store) in stores() {
        let fx = fixture();
        store.save_batch(&fx.chunks, &fx.nodes, &fx.contents).unwrap();
        let space = fx.nodes[0].id.clone();
        for (i, died_at) in [(1, 50_u64), (2, 10)] {
            store
                .save_corpse(&CorpseRecord {
                    space_id: space.clone(),
                    entity: Entity {
                        id: format!("ghoul-{i}"),
                        kind: "ghoul".to_string(),
                        level: 3,
                        hostile: true,
                    },
                    died_at,
                })
                .unwrap();
        }
        let corpses = store.find_corpses(&space).unwrap();
        assert_eq!(corpses.len(), 2, "{name}");
        assert_eq!(corpses[0].died_at, 10, "{name}");

        store
            .save_respawn(&RespawnRecord {
                space_id: space.clone(),
                due_at: 650,
                removed: 2,
            })
            .unwrap();
        assert!(store.due_respawns(600).unwrap().is_empty(), "{name}");
        assert_eq!(store.due_respawns(650).unwrap().len(), 1, "{name}");
        assert_eq!(store.delete_corpses(&space).unwrap(), 2, "{name}");
    }
}

#[test]
fn test_reset_world_clears_everything() {
    for (name, store) in stores() {
        let fx = fixture();
        store.save_batch(&fx.chunks, &fx.nodes, &fx.contents).unwrap();
        store.reset_world().unwrap();
        assert_eq!(store.find_chunk(&fx.chunks[0].id).unwrap(), None, "{name}");
        assert!(store.find_node(&fx.nodes[0].id).unwrap().is_none(), "{name}");
    }
}

#[test]
fn test_world_persistence_over_sqlite() {
    let store: Arc<dyn WorldStore> = Arc::new(SqliteStore::open_in_memory().unwrap());
    let persistence = WorldPersistence::new(store.clone());
    let fx = fixture();
    persistence
        .persist_batch(&fx.chunks, &fx.nodes, &fx.contents)
        .unwrap();

    let mut content = fx.contents[0].clone();
    content.items_dropped.push("item_001".to_string());
    persistence.stage_content(content.clone());
    persistence.save_world_state().unwrap();
    assert_eq!(store.find_content(&content.space_id).unwrap(), Some(content));
}
