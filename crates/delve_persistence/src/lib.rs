//! # DELVE Persistence
//!
//! Durable storage for the generated world.
//!
//! ## Components
//!
//! - `repository`: per-entity repository traits and the `WorldStore` bundle
//! - `MemoryStore`: in-process store with the same referential rules
//! - `SqliteStore`: relational store, four world tables plus corpses and
//!   respawn records
//! - `WorldPersistence`: loaded-state cache, batched save, prefetch
//!
//! ## Guarantees
//!
//! 1. **Explicit outcomes**: every call returns `PersistenceResult`
//! 2. **Referential integrity**: no row is written before its parent chunk
//! 3. **Idempotent writes**: saves are upserts, last write wins per row

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod error;
pub mod memory;
pub mod repository;
pub mod sqlite;
pub mod world;

pub use error::{PersistenceError, PersistenceResult};
pub use memory::MemoryStore;
pub use repository::{
    ChunkRepository, CorpseRecord, CorpseRepository, GraphNodeRepository, RespawnRecord,
    RespawnRepository, SeedRepository, SpaceContentRepository, WorldStore,
};
pub use sqlite::SqliteStore;
pub use world::{SaveSummary, WorldPersistence};
