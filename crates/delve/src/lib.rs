//! # DELVE World Engine
//!
//! Generates, navigates and maintains a persisted dungeon world.
//!
//! ## Architecture
//!
//! ```text
//!                          ┌──────────────────────────┐
//!   move / search ───────> │          World           │ ───> EventBus
//!   carve / collapse       └──────────────────────────┘
//!                            │        │        │      │
//!              ┌─────────────┘        │        │      └────────────┐
//!              ▼                      ▼        ▼                   ▼
//!       WorldGenerator          ExitResolver  EdgeModifier   RespawnManager
//!   (chunks, lazy fill,       (exact, fuzzy,  (carve,        (deaths,
//!    frontier, breakout)        free text)     collapse)       repopulate)
//!              │                                 │                 │
//!              └──────────── WriteLock ──────────┴─────────────────┘
//!                                │
//!                                ▼
//!                  WorldPersistence ──> WorldStore <── autosave task
//! ```
//!
//! ## Collaborators
//!
//! Text generation ([`TextGenerator`]) and content population
//! ([`ContentPopulator`]) are traits. The bundled
//! [`TemplateTextGenerator`] and [`ThemedPopulator`] work offline.
//!
//! ## Example
//!
//! ```rust,ignore
//! use delve::{World, WorldConfig, TemplateTextGenerator, ThemedPopulator};
//!
//! let world = World::open(WorldConfig::production(), store, Arc::new(TemplateTextGenerator), Arc::new(ThemedPopulator))?;
//! let seed = world.initialize("seed", "An old darkness stirs.").await?;
//! let outcome = world.move_player("p1", &seed.starting_space, "north").await?;
//! ```

#![deny(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

pub mod autosave;
pub mod config;
pub mod error;
pub mod events;
pub mod exits;
pub mod generator;
pub mod lore;
pub mod mutation;
pub mod populator;
pub mod respawn;
pub mod text;
pub mod world;

pub use autosave::{spawn_autosave, AutosaveHandle};
pub use config::{
    AutosaveConfig, ConfigError, ExitConfig, GenerationConfig, MutationConfig, RespawnConfig,
    WorldConfig,
};
pub use error::{GenerationError, GenerationResult};
pub use events::{EventBus, EventReceiver, EventSender, WorldEvent};
pub use exits::{ExitResolution, ExitResolver, RevealedEdges};
pub use generator::{FrontierExpansion, WorldGenerator, WriteLock};
pub use lore::LoreEngine;
pub use mutation::{CarveRequest, CollapseRequest, EdgeModifier, MutationOutcome, MutationRejection};
pub use populator::{ContentPopulator, Population, PopulationRequest, ThemedPopulator};
pub use respawn::{RespawnManager, RespawnReport};
pub use text::{PromptContext, PromptKind, TemplateTextGenerator, TextGenError, TextGenerator};
pub use world::{MoveOutcome, World};
