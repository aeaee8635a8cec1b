//! # Content Population
//!
//! Picks traps, resources and creatures for a space from its structural
//! type, theme and difficulty. From the engine's point of view this is a
//! pure function: the same request always yields the same population.

use delve_core::constants::{MAX_DIFFICULTY, MIN_DIFFICULTY};
use delve_core::{
    BiomeTheme, Brightness, Entity, GenerationSeed, NodeId, NodeType, Resource, Terrain, Trap,
};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;

/// Inputs for one population roll.
#[derive(Clone, Debug)]
pub struct PopulationRequest<'a> {
    /// The space being populated.
    pub space: &'a NodeId,
    /// Its structural type.
    pub node_type: NodeType,
    /// Theme of the owning Subzone.
    pub theme: BiomeTheme,
    /// Difficulty of the owning Subzone.
    pub difficulty: u8,
    /// Mob density of the owning Subzone.
    pub mob_density: f32,
    /// Deterministic seed for this roll.
    pub seed: GenerationSeed,
    /// Population round; 0 for the first fill, then one per respawn.
    pub round: u64,
}

/// What a space contains after population.
#[derive(Clone, Debug, Default, PartialEq)]
pub struct Population {
    /// Ambient light.
    pub brightness: Brightness,
    /// Terrain class.
    pub terrain: Terrain,
    /// Placed traps.
    pub traps: Vec<Trap>,
    /// Gatherable resources.
    pub resources: Vec<Resource>,
    /// Creatures present.
    pub entities: Vec<Entity>,
}

/// External content collaborator.
pub trait ContentPopulator: Send + Sync {
    /// Rolls the content of one space.
    fn populate(&self, request: &PopulationRequest<'_>) -> Population;
}

/// Theme tables for creatures, resources and traps.
///
/// Every space except a Hub receives at least one creature.
#[derive(Clone, Copy, Debug, Default)]
pub struct ThemedPopulator;

impl ContentPopulator for ThemedPopulator {
    fn populate(&self, request: &PopulationRequest<'_>) -> Population {
        let mut rng = ChaCha8Rng::seed_from_u64(request.seed.value() ^ request.round);
        let theme = request.theme;

        let brightness = match request.node_type {
            NodeType::Hub => Brightness::Lit,
            NodeType::Boss => Brightness::Pitch,
            NodeType::Linear
            | NodeType::Branching
            | NodeType::DeadEnd
            | NodeType::TreasureRoom
            | NodeType::Frontier
            | NodeType::Questable => *[
                Brightness::Pitch,
                Brightness::Dim,
                Brightness::Dim,
                Brightness::Lit,
            ]
                .choose(&mut rng)
                .unwrap_or(&Brightness::Dim),
        };

        let entities = roll_entities(request, &mut rng);
        let traps = roll_traps(request, &mut rng);

        let resource_count = match request.node_type {
            NodeType::TreasureRoom => 3,
            NodeType::DeadEnd => 2,
            NodeType::Hub
            | NodeType::Linear
            | NodeType::Branching
            | NodeType::Boss
            | NodeType::Frontier
            | NodeType::Questable => usize::from(rng.gen_bool(0.4)),
        };
        let mut found = Vec::with_capacity(resource_count);
        for _ in 0..resource_count {
            let Some(name) = resources(theme).choose(&mut rng) else { break };
            found.push(Resource {
                name: (*name).to_string(),
                quantity: rng.gen_range(1..=3) + u32::from(request.difficulty / 5),
            });
        }

        Population {
            brightness,
            terrain: terrain(theme),
            traps,
            resources: found,
            entities,
        }
    }
}

fn roll_entities(request: &PopulationRequest<'_>, rng: &mut ChaCha8Rng) -> Vec<Entity> {
    let level = |bonus: i32, rng: &mut ChaCha8Rng| {
        let raw = i32::from(request.difficulty) + bonus + rng.gen_range(-1..=1);
        raw.clamp(i32::from(MIN_DIFFICULTY), i32::from(MAX_DIFFICULTY)) as u8
    };
    let id = |i: usize| format!("{}#{}.{i}", request.space, request.round);
    let density = f64::from(request.mob_density.clamp(0.0, 1.0));
    let kinds = creatures(request.theme);

    let mut entities = Vec::new();
    match request.node_type {
        NodeType::Hub => return entities,
        NodeType::Boss => {
            entities.push(Entity {
                id: id(0),
                kind: boss(request.theme).to_string(),
                level: level(3, rng),
                hostile: true,
            });
        }
        NodeType::Questable => {
            entities.push(Entity {
                id: id(0),
                kind: "wandering scholar".to_string(),
                level: level(0, rng),
                hostile: false,
            });
        }
        NodeType::Linear
        | NodeType::Branching
        | NodeType::DeadEnd
        | NodeType::TreasureRoom
        | NodeType::Frontier => {}
    }

    let extra = 1 + (density * 3.0).floor() as usize;
    let count = rng.gen_range(1..=extra);
    for _ in 0..count {
        let Some(kind) = kinds.choose(rng) else { break };
        let i = entities.len();
        entities.push(Entity {
            id: id(i),
            kind: (*kind).to_string(),
            level: level(0, rng),
            hostile: true,
        });
    }
    entities
}

fn roll_traps(request: &PopulationRequest<'_>, rng: &mut ChaCha8Rng) -> Vec<Trap> {
    let chance = match request.node_type {
        NodeType::Hub => return Vec::new(),
        NodeType::TreasureRoom => 0.8,
        NodeType::DeadEnd => 0.5,
        NodeType::Boss | NodeType::Frontier => 0.3,
        NodeType::Linear | NodeType::Branching | NodeType::Questable => {
            0.1 + f64::from(request.difficulty) / 100.0
        }
    };
    if !rng.gen_bool(chance) {
        return Vec::new();
    }
    traps(request.theme)
        .choose(rng)
        .map(|name| Trap {
            name: (*name).to_string(),
            difficulty: request.difficulty.saturating_add(rng.gen_range(5..=10)),
            armed: true,
        })
        .into_iter()
        .collect()
}

// =============================================================================
// THEME TABLES
// =============================================================================

const fn terrain(theme: BiomeTheme) -> Terrain {
    match theme {
        BiomeTheme::Crypt | BiomeTheme::Temple | BiomeTheme::Library | BiomeTheme::Fortress => {
            Terrain::Stone
        }
        BiomeTheme::Catacombs | BiomeTheme::Mines | BiomeTheme::Caverns => Terrain::Rubble,
        BiomeTheme::Sewers | BiomeTheme::FloodedDepths => Terrain::Water,
        BiomeTheme::FungalGrotto => Terrain::Fungal,
        BiomeTheme::Magma => Terrain::Ash,
        BiomeTheme::Glacier => Terrain::Ice,
        BiomeTheme::VoidRift => Terrain::Void,
    }
}

const fn creatures(theme: BiomeTheme) -> &'static [&'static str] {
    match theme {
        BiomeTheme::Crypt => &["skeleton", "ghoul", "grave wisp"],
        BiomeTheme::Catacombs => &["skeleton", "bone rat", "crypt spider"],
        BiomeTheme::Temple => &["fallen acolyte", "stone guardian", "zealot"],
        BiomeTheme::Library => &["animated tome", "ink wraith", "archivist shade"],
        BiomeTheme::Fortress => &["deserter", "war hound", "iron sentry"],
        BiomeTheme::Sewers => &["giant rat", "sludge crawler", "cutpurse"],
        BiomeTheme::Mines => &["kobold", "tunnel worm", "lost miner"],
        BiomeTheme::Caverns => &["cave bat", "giant spider", "troglodyte"],
        BiomeTheme::FungalGrotto => &["myconid", "spore drifter", "shrieker"],
        BiomeTheme::FloodedDepths => &["drowned one", "eel swarm", "bog hag"],
        BiomeTheme::Magma => &["fire beetle", "magma imp", "salamander"],
        BiomeTheme::Glacier => &["frost wolf", "ice mephit", "yeti"],
        BiomeTheme::VoidRift => &["void stalker", "gibbering mouth", "rift moth"],
    }
}

const fn boss(theme: BiomeTheme) -> &'static str {
    match theme {
        BiomeTheme::Crypt => "lich",
        BiomeTheme::Catacombs => "bone colossus",
        BiomeTheme::Temple => "fallen high priest",
        BiomeTheme::Library => "forbidden librarian",
        BiomeTheme::Fortress => "warlord",
        BiomeTheme::Sewers => "rat king",
        BiomeTheme::Mines => "deep foreman",
        BiomeTheme::Caverns => "cave troll",
        BiomeTheme::FungalGrotto => "spore queen",
        BiomeTheme::FloodedDepths => "abyssal eel",
        BiomeTheme::Magma => "fire giant",
        BiomeTheme::Glacier => "frost wyrm",
        BiomeTheme::VoidRift => "void herald",
    }
}

const fn resources(theme: BiomeTheme) -> &'static [&'static str] {
    match theme {
        BiomeTheme::Crypt | BiomeTheme::Catacombs => &["bone dust", "grave moss", "old coin"],
        BiomeTheme::Temple => &["incense", "silver icon", "holy water"],
        BiomeTheme::Library => &["blank scroll", "ink", "loose page"],
        BiomeTheme::Fortress => &["iron scrap", "arrowhead", "rations"],
        BiomeTheme::Sewers => &["rusted key", "tallow", "rope"],
        BiomeTheme::Mines => &["iron ore", "coal", "copper vein"],
        BiomeTheme::Caverns => &["quartz", "cave pearl", "guano"],
        BiomeTheme::FungalGrotto => &["glowcap", "spore sac", "lichen"],
        BiomeTheme::FloodedDepths => &["river pearl", "kelp", "driftwood"],
        BiomeTheme::Magma => &["obsidian", "sulfur", "ember stone"],
        BiomeTheme::Glacier => &["frost crystal", "clear ice", "mammoth ivory"],
        BiomeTheme::VoidRift => &["void shard", "null dust", "star glass"],
    }
}

const fn traps(theme: BiomeTheme) -> &'static [&'static str] {
    if theme.is_natural() {
        &["loose rockfall", "sinkhole", "tripwire snare"]
    } else {
        &["pressure plate", "dart slit", "swinging blade"]
    }
}
