//! # SQLite Store
//!
//! Relational `WorldStore`. Scalar attributes get their own columns; lists
//! and maps (children, adjacency, edges, exits, entity lists, flags) are
//! stored as JSON text.
//!
//! ## Tables
//!
//! ```text
//! chunks ◄──┬── graph_nodes   (chunk_id)
//!   ▲       ├── space_content (space_id)
//!   │       ├── corpses       (space_id)
//!   └parent └── respawns      (space_id)
//! world_seed                  (singleton row)
//! ```
//!
//! Foreign keys are enforced and cascade on delete, so removing a chunk
//! removes everything beneath it.

use std::path::Path;

use delve_core::{
    ChunkId, ChunkLevel, ChunkNode, GraphNode, NodeId, NodeType, SpaceContent, WorldSeed,
};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, Transaction};
use tracing::debug;

use crate::error::{PersistenceError, PersistenceResult};
use crate::repository::{
    ChunkRepository, CorpseRecord, CorpseRepository, GraphNodeRepository, RespawnRecord,
    RespawnRepository, SeedRepository, SpaceContentRepository, WorldStore,
};

/// Current schema version.
const SCHEMA_VERSION: i64 = 1;

/// SQLite-backed `WorldStore`. One connection, serialized by a mutex.
#[derive(Debug)]
pub struct SqliteStore {
    conn: Mutex<Connection>,
}

impl SqliteStore {
    /// Opens (or creates) a database file and applies the schema.
    ///
    /// # Errors
    ///
    /// Fails if the file cannot be opened or migrated.
    pub fn open(path: impl AsRef<Path>) -> PersistenceResult<Self> {
        let conn = Connection::open(path)?;
        Self::with_connection(conn)
    }

    /// Opens a private in-memory database.
    ///
    /// # Errors
    ///
    /// Fails if the schema cannot be applied.
    pub fn open_in_memory() -> PersistenceResult<Self> {
        let conn = Connection::open_in_memory()?;
        Self::with_connection(conn)
    }

    fn with_connection(conn: Connection) -> PersistenceResult<Self> {
        configure(&conn)?;
        migrate(&conn)?;
        Ok(Self {
            conn: Mutex::new(conn),
        })
    }
}

fn configure(conn: &Connection) -> PersistenceResult<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "foreign_keys", "ON")?;
    Ok(())
}

fn migrate(conn: &Connection) -> PersistenceResult<()> {
    conn.execute_batch(
        "
        CREATE TABLE IF NOT EXISTS schema_migrations (
            version INTEGER PRIMARY KEY,
            name TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS chunks (
            id TEXT PRIMARY KEY,
            level TEXT NOT NULL,
            parent_id TEXT REFERENCES chunks(id) ON DELETE CASCADE,
            children_json TEXT NOT NULL,
            lore TEXT NOT NULL,
            theme TEXT NOT NULL,
            size_estimate INTEGER NOT NULL,
            mob_density REAL NOT NULL,
            difficulty INTEGER NOT NULL,
            tier_json TEXT NOT NULL,
            depth INTEGER NOT NULL,
            adjacency_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS graph_nodes (
            id TEXT PRIMARY KEY,
            chunk_id TEXT NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
            position_json TEXT NOT NULL,
            node_type TEXT NOT NULL,
            edges_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS space_content (
            space_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
            description TEXT NOT NULL,
            exits_json TEXT NOT NULL,
            brightness_json TEXT NOT NULL,
            terrain_json TEXT NOT NULL,
            traps_json TEXT NOT NULL,
            resources_json TEXT NOT NULL,
            entities_json TEXT NOT NULL,
            items_json TEXT NOT NULL,
            flags_json TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS world_seed (
            singleton INTEGER PRIMARY KEY CHECK (singleton = 1),
            seed TEXT NOT NULL,
            global_lore TEXT NOT NULL,
            starting_space TEXT NOT NULL
        );

        CREATE TABLE IF NOT EXISTS corpses (
            id INTEGER PRIMARY KEY AUTOINCREMENT,
            space_id TEXT NOT NULL REFERENCES chunks(id) ON DELETE CASCADE,
            entity_json TEXT NOT NULL,
            died_at INTEGER NOT NULL
        );

        CREATE TABLE IF NOT EXISTS respawns (
            space_id TEXT PRIMARY KEY REFERENCES chunks(id) ON DELETE CASCADE,
            due_at INTEGER NOT NULL,
            removed INTEGER NOT NULL
        );

        CREATE INDEX IF NOT EXISTS idx_chunks_parent ON chunks(parent_id);
        CREATE INDEX IF NOT EXISTS idx_graph_nodes_chunk ON graph_nodes(chunk_id);
        CREATE INDEX IF NOT EXISTS idx_corpses_space ON corpses(space_id);
        CREATE INDEX IF NOT EXISTS idx_respawns_due ON respawns(due_at);
        ",
    )?;
    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations(version, name) VALUES (?1, 'initial_v1')",
        params![SCHEMA_VERSION],
    )?;
    Ok(())
}

// =============================================================================
// ROW CODECS
// =============================================================================

fn to_i64(value: u64) -> i64 {
    i64::try_from(value).unwrap_or(i64::MAX)
}

fn to_u64(value: i64) -> u64 {
    u64::try_from(value).unwrap_or(0)
}

fn chunk_exists(conn: &Connection, id: &str) -> PersistenceResult<bool> {
    let found: Option<i64> = conn
        .query_row("SELECT 1 FROM chunks WHERE id = ?1", params![id], |row| {
            row.get(0)
        })
        .optional()?;
    Ok(found.is_some())
}

fn require_chunk(conn: &Connection, child: &str, parent: &str) -> PersistenceResult<()> {
    if chunk_exists(conn, parent)? {
        Ok(())
    } else {
        Err(PersistenceError::MissingParent {
            child: child.to_string(),
            parent: parent.to_string(),
        })
    }
}

fn upsert_chunk(conn: &Connection, chunk: &ChunkNode) -> PersistenceResult<()> {
    if let Some(parent) = &chunk.parent {
        require_chunk(conn, chunk.id.as_str(), parent.as_str())?;
    }
    conn.execute(
        "INSERT INTO chunks (
            id, level, parent_id, children_json, lore, theme, size_estimate,
            mob_density, difficulty, tier_json, depth, adjacency_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11, ?12)
         ON CONFLICT(id) DO UPDATE SET
            level = excluded.level,
            parent_id = excluded.parent_id,
            children_json = excluded.children_json,
            lore = excluded.lore,
            theme = excluded.theme,
            size_estimate = excluded.size_estimate,
            mob_density = excluded.mob_density,
            difficulty = excluded.difficulty,
            tier_json = excluded.tier_json,
            depth = excluded.depth,
            adjacency_json = excluded.adjacency_json",
        params![
            chunk.id.as_str(),
            chunk.level.as_str(),
            chunk.parent.as_ref().map(ChunkId::as_str),
            serde_json::to_string(&chunk.children)?,
            chunk.lore,
            chunk.theme.as_str(),
            i64::from(chunk.size_estimate),
            f64::from(chunk.mob_density),
            i64::from(chunk.difficulty),
            serde_json::to_string(&chunk.tier)?,
            i64::from(chunk.depth),
            serde_json::to_string(&chunk.adjacency)?,
        ],
    )?;
    Ok(())
}

/// Raw chunk columns, decoded outside the row callback.
struct ChunkRow {
    id: String,
    level: String,
    parent: Option<String>,
    children: String,
    lore: String,
    theme: String,
    size_estimate: i64,
    mob_density: f64,
    difficulty: i64,
    tier: String,
    depth: i64,
    adjacency: String,
}

impl ChunkRow {
    fn read(row: &Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            id: row.get(0)?,
            level: row.get(1)?,
            parent: row.get(2)?,
            children: row.get(3)?,
            lore: row.get(4)?,
            theme: row.get(5)?,
            size_estimate: row.get(6)?,
            mob_density: row.get(7)?,
            difficulty: row.get(8)?,
            tier: row.get(9)?,
            depth: row.get(10)?,
            adjacency: row.get(11)?,
        })
    }

    fn decode(self) -> PersistenceResult<ChunkNode> {
        Ok(ChunkNode {
            id: ChunkId::new(self.id),
            level: self.level.parse::<ChunkLevel>()?,
            parent: self.parent.map(ChunkId::new),
            children: serde_json::from_str(&self.children)?,
            lore: self.lore,
            theme: self.theme.parse()?,
            size_estimate: u32::try_from(self.size_estimate).unwrap_or(0),
            mob_density: self.mob_density as f32,
            difficulty: u8::try_from(self.difficulty).unwrap_or(u8::MAX),
            tier: serde_json::from_str(&self.tier)?,
            depth: u32::try_from(self.depth).unwrap_or(0),
            adjacency: serde_json::from_str(&self.adjacency)?,
        })
    }
}

const CHUNK_COLUMNS: &str = "id, level, parent_id, children_json, lore, theme, size_estimate, \
                             mob_density, difficulty, tier_json, depth, adjacency_json";

fn upsert_node(conn: &Connection, node: &GraphNode) -> PersistenceResult<()> {
    require_chunk(conn, node.id.as_str(), node.chunk_id.as_str())?;
    conn.execute(
        "INSERT INTO graph_nodes (id, chunk_id, position_json, node_type, edges_json)
         VALUES (?1, ?2, ?3, ?4, ?5)
         ON CONFLICT(id) DO UPDATE SET
            chunk_id = excluded.chunk_id,
            position_json = excluded.position_json,
            node_type = excluded.node_type,
            edges_json = excluded.edges_json",
        params![
            node.id.as_str(),
            node.chunk_id.as_str(),
            serde_json::to_string(&node.position)?,
            node.node_type.as_str(),
            serde_json::to_string(&node.edges)?,
        ],
    )?;
    Ok(())
}

fn read_node(row: &Row<'_>) -> rusqlite::Result<(String, String, String, String, String)> {
    Ok((row.get(0)?, row.get(1)?, row.get(2)?, row.get(3)?, row.get(4)?))
}

fn decode_node(raw: (String, String, String, String, String)) -> PersistenceResult<GraphNode> {
    let (id, chunk_id, position, node_type, edges) = raw;
    Ok(GraphNode {
        id: NodeId::new(id),
        chunk_id: ChunkId::new(chunk_id),
        position: serde_json::from_str(&position)?,
        node_type: node_type.parse::<NodeType>()?,
        edges: serde_json::from_str(&edges)?,
    })
}

fn upsert_content(conn: &Connection, content: &SpaceContent) -> PersistenceResult<()> {
    require_chunk(conn, content.space_id.as_str(), content.space_id.as_str())?;
    conn.execute(
        "INSERT INTO space_content (
            space_id, description, exits_json, brightness_json, terrain_json,
            traps_json, resources_json, entities_json, items_json, flags_json
         ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10)
         ON CONFLICT(space_id) DO UPDATE SET
            description = excluded.description,
            exits_json = excluded.exits_json,
            brightness_json = excluded.brightness_json,
            terrain_json = excluded.terrain_json,
            traps_json = excluded.traps_json,
            resources_json = excluded.resources_json,
            entities_json = excluded.entities_json,
            items_json = excluded.items_json,
            flags_json = excluded.flags_json",
        params![
            content.space_id.as_str(),
            content.description,
            serde_json::to_string(&content.exits)?,
            serde_json::to_string(&content.brightness)?,
            serde_json::to_string(&content.terrain)?,
            serde_json::to_string(&content.traps)?,
            serde_json::to_string(&content.resources)?,
            serde_json::to_string(&content.entities)?,
            serde_json::to_string(&content.items_dropped)?,
            serde_json::to_string(&content.state_flags)?,
        ],
    )?;
    Ok(())
}

fn read_content(row: &Row<'_>) -> rusqlite::Result<Vec<String>> {
    (0..10).map(|i| row.get::<_, String>(i)).collect()
}

fn decode_content(raw: Vec<String>) -> PersistenceResult<SpaceContent> {
    let mut fields = raw.into_iter();
    let mut next = || fields.next().unwrap_or_default();
    let space_id = NodeId::new(next());
    let description = next();
    Ok(SpaceContent {
        space_id,
        description,
        exits: serde_json::from_str(&next())?,
        brightness: serde_json::from_str(&next())?,
        terrain: serde_json::from_str(&next())?,
        traps: serde_json::from_str(&next())?,
        resources: serde_json::from_str(&next())?,
        entities: serde_json::from_str(&next())?,
        items_dropped: serde_json::from_str(&next())?,
        state_flags: serde_json::from_str(&next())?,
    })
}

const CONTENT_COLUMNS: &str = "space_id, description, exits_json, brightness_json, terrain_json, \
                               traps_json, resources_json, entities_json, items_json, flags_json";

fn wipe(tx: &Transaction<'_>) -> PersistenceResult<()> {
    tx.execute_batch(
        "
        DELETE FROM respawns;
        DELETE FROM corpses;
        DELETE FROM space_content;
        DELETE FROM graph_nodes;
        DELETE FROM chunks;
        DELETE FROM world_seed;
        ",
    )?;
    Ok(())
}

// =============================================================================
// REPOSITORIES
// =============================================================================

impl ChunkRepository for SqliteStore {
    fn save_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()> {
        upsert_chunk(&self.conn.lock(), chunk)
    }

    fn find_chunk(&self, id: &ChunkId) -> PersistenceResult<Option<ChunkNode>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {CHUNK_COLUMNS} FROM chunks WHERE id = ?1"),
                params![id.as_str()],
                ChunkRow::read,
            )
            .optional()?;
        raw.map(ChunkRow::decode).transpose()
    }

    fn update_chunk(&self, chunk: &ChunkNode) -> PersistenceResult<()> {
        let conn = self.conn.lock();
        if !chunk_exists(&conn, chunk.id.as_str())? {
            return Err(PersistenceError::NotFound(chunk.id.to_string()));
        }
        upsert_chunk(&conn, chunk)
    }

    fn delete_chunk(&self, id: &ChunkId) -> PersistenceResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM chunks WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }
}

impl GraphNodeRepository for SqliteStore {
    fn save_node(&self, node: &GraphNode) -> PersistenceResult<()> {
        upsert_node(&self.conn.lock(), node)
    }

    fn find_node(&self, id: &NodeId) -> PersistenceResult<Option<GraphNode>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                "SELECT id, chunk_id, position_json, node_type, edges_json
                 FROM graph_nodes WHERE id = ?1",
                params![id.as_str()],
                read_node,
            )
            .optional()?;
        raw.map(decode_node).transpose()
    }

    fn update_node(&self, node: &GraphNode) -> PersistenceResult<()> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM graph_nodes WHERE id = ?1",
                params![node.id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(PersistenceError::NotFound(node.id.to_string()));
        }
        upsert_node(&conn, node)
    }

    fn delete_node(&self, id: &NodeId) -> PersistenceResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM graph_nodes WHERE id = ?1", params![id.as_str()])?;
        Ok(removed > 0)
    }

    fn nodes_in_chunk(&self, chunk: &ChunkId) -> PersistenceResult<Vec<GraphNode>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, chunk_id, position_json, node_type, edges_json
             FROM graph_nodes WHERE chunk_id = ?1
             ORDER BY rowid ASC",
        )?;
        let rows = stmt.query_map(params![chunk.as_str()], read_node)?;

        let mut nodes = Vec::new();
        for row in rows {
            nodes.push(decode_node(row?)?);
        }
        Ok(nodes)
    }
}

impl SpaceContentRepository for SqliteStore {
    fn save_content(&self, content: &SpaceContent) -> PersistenceResult<()> {
        upsert_content(&self.conn.lock(), content)
    }

    fn find_content(&self, space: &NodeId) -> PersistenceResult<Option<SpaceContent>> {
        let conn = self.conn.lock();
        let raw = conn
            .query_row(
                &format!("SELECT {CONTENT_COLUMNS} FROM space_content WHERE space_id = ?1"),
                params![space.as_str()],
                read_content,
            )
            .optional()?;
        raw.map(decode_content).transpose()
    }

    fn update_content(&self, content: &SpaceContent) -> PersistenceResult<()> {
        let conn = self.conn.lock();
        let exists: Option<i64> = conn
            .query_row(
                "SELECT 1 FROM space_content WHERE space_id = ?1",
                params![content.space_id.as_str()],
                |row| row.get(0),
            )
            .optional()?;
        if exists.is_none() {
            return Err(PersistenceError::NotFound(content.space_id.to_string()));
        }
        upsert_content(&conn, content)
    }

    fn delete_content(&self, space: &NodeId) -> PersistenceResult<bool> {
        let removed = self.conn.lock().execute(
            "DELETE FROM space_content WHERE space_id = ?1",
            params![space.as_str()],
        )?;
        Ok(removed > 0)
    }
}

impl SeedRepository for SqliteStore {
    fn save_seed(&self, seed: &WorldSeed) -> PersistenceResult<bool> {
        let inserted = self.conn.lock().execute(
            "INSERT OR IGNORE INTO world_seed (singleton, seed, global_lore, starting_space)
             VALUES (1, ?1, ?2, ?3)",
            params![seed.seed, seed.global_lore, seed.starting_space.as_str()],
        )?;
        Ok(inserted > 0)
    }

    fn find_seed(&self) -> PersistenceResult<Option<WorldSeed>> {
        let conn = self.conn.lock();
        let seed = conn
            .query_row(
                "SELECT seed, global_lore, starting_space FROM world_seed WHERE singleton = 1",
                [],
                |row| {
                    Ok(WorldSeed {
                        seed: row.get(0)?,
                        global_lore: row.get(1)?,
                        starting_space: NodeId::new(row.get::<_, String>(2)?),
                    })
                },
            )
            .optional()?;
        Ok(seed)
    }

    fn update_seed(&self, seed: &WorldSeed) -> PersistenceResult<()> {
        let updated = self.conn.lock().execute(
            "UPDATE world_seed SET seed = ?1, global_lore = ?2, starting_space = ?3
             WHERE singleton = 1",
            params![seed.seed, seed.global_lore, seed.starting_space.as_str()],
        )?;
        if updated == 0 {
            return Err(PersistenceError::NotFound("world seed".to_string()));
        }
        Ok(())
    }

    fn delete_seed(&self) -> PersistenceResult<bool> {
        let removed = self.conn.lock().execute("DELETE FROM world_seed", [])?;
        Ok(removed > 0)
    }
}

impl CorpseRepository for SqliteStore {
    fn save_corpse(&self, corpse: &CorpseRecord) -> PersistenceResult<()> {
        let conn = self.conn.lock();
        require_chunk(&conn, "corpse", corpse.space_id.as_str())?;
        conn.execute(
            "INSERT INTO corpses (space_id, entity_json, died_at) VALUES (?1, ?2, ?3)",
            params![
                corpse.space_id.as_str(),
                serde_json::to_string(&corpse.entity)?,
                to_i64(corpse.died_at),
            ],
        )?;
        Ok(())
    }

    fn find_corpses(&self, space: &NodeId) -> PersistenceResult<Vec<CorpseRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT entity_json, died_at FROM corpses
             WHERE space_id = ?1 ORDER BY died_at ASC, id ASC",
        )?;
        let rows = stmt.query_map(params![space.as_str()], |row| {
            Ok((row.get::<_, String>(0)?, row.get::<_, i64>(1)?))
        })?;

        let mut corpses = Vec::new();
        for row in rows {
            let (entity, died_at) = row?;
            corpses.push(CorpseRecord {
                space_id: space.clone(),
                entity: serde_json::from_str(&entity)?,
                died_at: to_u64(died_at),
            });
        }
        Ok(corpses)
    }

    fn delete_corpses(&self, space: &NodeId) -> PersistenceResult<usize> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM corpses WHERE space_id = ?1", params![space.as_str()])?;
        Ok(removed)
    }
}

impl RespawnRepository for SqliteStore {
    fn save_respawn(&self, record: &RespawnRecord) -> PersistenceResult<()> {
        let conn = self.conn.lock();
        require_chunk(&conn, "respawn", record.space_id.as_str())?;
        conn.execute(
            "INSERT INTO respawns (space_id, due_at, removed) VALUES (?1, ?2, ?3)
             ON CONFLICT(space_id) DO UPDATE SET
                due_at = excluded.due_at,
                removed = excluded.removed",
            params![
                record.space_id.as_str(),
                to_i64(record.due_at),
                i64::from(record.removed),
            ],
        )?;
        Ok(())
    }

    fn find_respawn(&self, space: &NodeId) -> PersistenceResult<Option<RespawnRecord>> {
        let conn = self.conn.lock();
        let record = conn
            .query_row(
                "SELECT due_at, removed FROM respawns WHERE space_id = ?1",
                params![space.as_str()],
                |row| Ok((row.get::<_, i64>(0)?, row.get::<_, i64>(1)?)),
            )
            .optional()?
            .map(|(due_at, removed)| RespawnRecord {
                space_id: space.clone(),
                due_at: to_u64(due_at),
                removed: u32::try_from(removed).unwrap_or(0),
            });
        Ok(record)
    }

    fn due_respawns(&self, now: u64) -> PersistenceResult<Vec<RespawnRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT space_id, due_at, removed FROM respawns
             WHERE due_at <= ?1 ORDER BY due_at ASC, space_id ASC",
        )?;
        let rows = stmt.query_map(params![to_i64(now)], |row| {
            Ok(RespawnRecord {
                space_id: NodeId::new(row.get::<_, String>(0)?),
                due_at: to_u64(row.get(1)?),
                removed: u32::try_from(row.get::<_, i64>(2)?).unwrap_or(0),
            })
        })?;

        let mut due = Vec::new();
        for row in rows {
            due.push(row?);
        }
        Ok(due)
    }

    fn delete_respawn(&self, space: &NodeId) -> PersistenceResult<bool> {
        let removed = self
            .conn
            .lock()
            .execute("DELETE FROM respawns WHERE space_id = ?1", params![space.as_str()])?;
        Ok(removed > 0)
    }
}

impl WorldStore for SqliteStore {
    fn save_batch(
        &self,
        chunks: &[ChunkNode],
        nodes: &[GraphNode],
        contents: &[SpaceContent],
    ) -> PersistenceResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        for chunk in chunks {
            upsert_chunk(&tx, chunk)?;
        }
        for node in nodes {
            upsert_node(&tx, node)?;
        }
        for content in contents {
            upsert_content(&tx, content)?;
        }
        tx.commit()?;
        debug!(
            chunks = chunks.len(),
            nodes = nodes.len(),
            contents = contents.len(),
            "saved batch"
        );
        Ok(())
    }

    fn reset_world(&self) -> PersistenceResult<()> {
        let mut conn = self.conn.lock();
        let tx = conn.transaction()?;
        wipe(&tx)?;
        tx.commit()?;
        debug!("world reset");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use delve_core::{BiomeTheme, Edge, Entity, Position};

    fn lineage() -> (ChunkNode, ChunkNode, ChunkNode) {
        let root = ChunkNode::root("An old world", BiomeTheme::Crypt);
        let subzone = ChunkNode {
            id: root.id.child(ChunkLevel::Subzone, 0),
            level: ChunkLevel::Subzone,
            parent: Some(root.id.clone()),
            ..root.clone()
        };
        let space = ChunkNode {
            id: subzone.id.child(ChunkLevel::Space, 0),
            level: ChunkLevel::Space,
            parent: Some(subzone.id.clone()),
            ..root.clone()
        };
        (root, subzone, space)
    }

    #[test]
    fn test_chunk_round_trip_and_orphans() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (root, subzone, _) = lineage();
        assert!(matches!(
            store.save_chunk(&subzone),
            Err(PersistenceError::MissingParent { .. })
        ));
        store.save_chunk(&root).unwrap();
        store.save_chunk(&subzone).unwrap();
        assert_eq!(store.find_chunk(&subzone.id).unwrap(), Some(subzone));
    }

    #[test]
    fn test_nodes_keep_save_order() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (root, subzone, space) = lineage();
        let mut nodes: Vec<GraphNode> = [3, 1, 2]
            .iter()
            .map(|&i| GraphNode::new(NodeId::in_subzone(&subzone.id, i), subzone.id.clone(), None))
            .collect();
        nodes[0].position = Some(Position::new(2, -1));
        nodes[0].node_type = NodeType::Boss;
        let target = nodes[1].id.clone();
        nodes[0].edges.push(Edge::passage(target, "north"));
        store.save_batch(&[root, subzone.clone(), space], &nodes, &[]).unwrap();

        let loaded = store.nodes_in_chunk(&subzone.id).unwrap();
        assert_eq!(loaded, nodes);
    }

    #[test]
    fn test_failed_batch_rolls_back() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (root, subzone, space) = lineage();
        let result = store.save_batch(&[root.clone(), space, subzone], &[], &[]);
        assert!(result.is_err());
        assert_eq!(store.find_chunk(&root.id).unwrap(), None);
    }

    #[test]
    fn test_content_and_cascade() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (root, subzone, space) = lineage();
        let space_id = NodeId::from(&space.id);
        let mut content = SpaceContent {
            space_id: space_id.clone(),
            description: "A dripping vault.".to_string(),
            ..SpaceContent::default()
        };
        content.set_flag("chest_opened", true);
        content.items_dropped.push("item_001".to_string());
        content.entities.push(Entity {
            id: "rat-1".to_string(),
            kind: "rat".to_string(),
            level: 1,
            hostile: true,
        });
        store.save_batch(&[root.clone(), subzone, space], &[], &[content.clone()]).unwrap();
        assert_eq!(store.find_content(&space_id).unwrap(), Some(content));

        assert!(store.delete_chunk(&root.id).unwrap());
        assert_eq!(store.find_content(&space_id).unwrap(), None);
    }

    #[test]
    fn test_seed_singleton() {
        let store = SqliteStore::open_in_memory().unwrap();
        let seed = WorldSeed {
            seed: "test-seed".to_string(),
            global_lore: "lore".to_string(),
            starting_space: NodeId::new("world/r0/z0/s0/n0"),
        };
        assert!(store.save_seed(&seed).unwrap());
        assert!(!store.save_seed(&seed).unwrap());
        assert_eq!(store.find_seed().unwrap(), Some(seed));
        store.reset_world().unwrap();
        assert_eq!(store.find_seed().unwrap(), None);
    }

    #[test]
    fn test_due_respawns() {
        let store = SqliteStore::open_in_memory().unwrap();
        let (root, subzone, space) = lineage();
        store.save_batch(&[root, subzone, space.clone()], &[], &[]).unwrap();
        let record = RespawnRecord {
            space_id: NodeId::from(&space.id),
            due_at: 100,
            removed: 2,
        };
        store.save_respawn(&record).unwrap();
        assert!(store.due_respawns(99).unwrap().is_empty());
        assert_eq!(store.due_respawns(100).unwrap(), vec![record.clone()]);
        assert!(store.delete_respawn(&record.space_id).unwrap());
    }
}
