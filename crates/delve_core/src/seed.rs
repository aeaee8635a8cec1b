//! # Seeds
//!
//! `WorldSeed` is the persisted singleton describing one world.
//! `GenerationSeed` is the 64-bit value every generator draws from.
//!
//! ## Determinism Guarantee
//!
//! Generation seeds are derived with SipHash-1-3 under fixed keys, so the
//! same (world seed, chunk identity) pair yields the same value on any
//! platform, in any process, forever. `std`'s `DefaultHasher` makes no such
//! promise and must not be used here.

use std::hash::Hasher;

use serde::{Deserialize, Serialize};
use siphasher::sip::SipHasher13;

use crate::ids::{ChunkId, NodeId};

/// Fixed SipHash keys. Changing them changes every generated world.
const SEED_KEYS: (u64, u64) = (0x6465_6c76_655f_7365, 0x6564_5f6b_6579_7321);

/// The singleton world record. Created once at world initialization.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct WorldSeed {
    /// Random seed string chosen at creation.
    pub seed: String,
    /// World-wide lore every chunk ultimately inherits from.
    pub global_lore: String,
    /// Where new players start.
    pub starting_space: NodeId,
}

impl WorldSeed {
    /// Generation seed for a chunk of this world.
    #[must_use]
    pub fn for_chunk(&self, chunk: &ChunkId) -> GenerationSeed {
        GenerationSeed::from_identity(&self.seed, chunk.as_str())
    }
}

/// Deterministic seed for one generation task.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct GenerationSeed(u64);

impl GenerationSeed {
    /// Creates a seed from a raw value.
    #[inline]
    #[must_use]
    pub const fn new(seed: u64) -> Self {
        Self(seed)
    }

    /// Derives the seed for `identity` inside the world seeded by `world_seed`.
    #[must_use]
    pub fn from_identity(world_seed: &str, identity: &str) -> Self {
        let mut hasher = SipHasher13::new_with_keys(SEED_KEYS.0, SEED_KEYS.1);
        hasher.write(world_seed.as_bytes());
        hasher.write_u8(0xff);
        hasher.write(identity.as_bytes());
        Self(hasher.finish())
    }

    /// Returns the raw seed value.
    #[inline]
    #[must_use]
    pub const fn value(self) -> u64 {
        self.0
    }

    /// Derives a sub-seed for a specific purpose (lore, content, retries).
    #[inline]
    #[must_use]
    pub const fn derive(self, purpose: u64) -> Self {
        let mut hash = self.0;
        hash ^= purpose;
        hash = hash.wrapping_mul(0x517c_c1b7_2722_0a95);
        hash ^= hash >> 32;
        Self(hash)
    }
}

/// Purpose tags for `GenerationSeed::derive`.
pub mod purpose {
    /// Topology attempt `n` uses `TOPOLOGY + n`.
    pub const TOPOLOGY: u64 = 0x1000;
    /// Lore variation.
    pub const LORE: u64 = 0x2000;
    /// Chunk attributes (difficulty, density, size).
    pub const ATTRIBUTES: u64 = 0x3000;
    /// Space content population.
    pub const CONTENT: u64 = 0x4000;
    /// Repopulation after deaths.
    pub const RESPAWN: u64 = 0x5000;
}
