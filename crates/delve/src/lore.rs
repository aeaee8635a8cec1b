//! # Lore Inheritance
//!
//! Children inherit their parent's lore and theme with controlled drift.
//! Theme drift is seeded and stays within the parent's related themes; the
//! lore text itself comes from the text service, or from the template when
//! the service fails.

use std::sync::Arc;

use delve_core::{BiomeTheme, ChunkLevel, ChunkNode, GenerationSeed};
use rand::seq::SliceRandom;
use rand::{Rng, SeedableRng};
use rand_chacha::ChaCha8Rng;
use tracing::debug;

use crate::text::{generate_or_fallback, PromptContext, TextGenerator};

/// Derives child lore and theme from a parent chunk.
#[derive(Clone)]
pub struct LoreEngine {
    text: Arc<dyn TextGenerator>,
}

impl std::fmt::Debug for LoreEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoreEngine").finish_non_exhaustive()
    }
}

impl LoreEngine {
    /// Creates an engine over a text service.
    #[must_use]
    pub fn new(text: Arc<dyn TextGenerator>) -> Self {
        Self { text }
    }

    /// Chance that a child at `level` drifts away from its parent's theme.
    #[must_use]
    pub const fn drift_chance(level: ChunkLevel) -> f64 {
        match level {
            ChunkLevel::World | ChunkLevel::Space => 0.0,
            ChunkLevel::Region => 0.35,
            ChunkLevel::Zone => 0.2,
            ChunkLevel::Subzone => 0.1,
        }
    }

    /// Theme of a new child at `level` under `parent`.
    #[must_use]
    pub fn derive_theme(parent: &ChunkNode, level: ChunkLevel, seed: GenerationSeed) -> BiomeTheme {
        let mut rng = ChaCha8Rng::seed_from_u64(seed.value());
        if rng.gen_bool(Self::drift_chance(level)) {
            parent
                .theme
                .related()
                .choose(&mut rng)
                .copied()
                .unwrap_or(parent.theme)
        } else {
            parent.theme
        }
    }

    /// Lore text for a new child of `parent`.
    pub async fn inherit(
        &self,
        parent: &ChunkNode,
        level: ChunkLevel,
        theme: BiomeTheme,
        seed: GenerationSeed,
    ) -> String {
        let context = PromptContext::lore(&parent.lore, parent.theme, level, theme, seed.value());
        let lore = generate_or_fallback(self.text.as_ref(), &context).await;
        debug!(parent = %parent.id, %level, %theme, "inherited lore");
        lore
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::text::TemplateTextGenerator;

    #[test]
    fn test_drift_stays_related() {
        let parent = ChunkNode::root("Stone remembers.", BiomeTheme::Caverns);
        let mut drifted = 0;
        for value in 0..200 {
            let theme = LoreEngine::derive_theme(&parent, ChunkLevel::Region, GenerationSeed::new(value));
            if theme != parent.theme {
                drifted += 1;
                assert!(BiomeTheme::Caverns.related().contains(&theme));
            }
        }
        assert!(drifted > 20 && drifted < 120, "drifted {drifted} of 200");
    }

    #[test]
    fn test_drift_is_deterministic() {
        let parent = ChunkNode::root("Stone remembers.", BiomeTheme::Temple);
        let seed = GenerationSeed::new(1234);
        assert_eq!(
            LoreEngine::derive_theme(&parent, ChunkLevel::Zone, seed),
            LoreEngine::derive_theme(&parent, ChunkLevel::Zone, seed)
        );
    }

    #[tokio::test]
    async fn test_inherit_keeps_parent_opening() {
        let engine = LoreEngine::new(Arc::new(TemplateTextGenerator));
        let parent = ChunkNode::root("The old kings sleep below. None wake.", BiomeTheme::Crypt);
        let lore = engine
            .inherit(&parent, ChunkLevel::Region, BiomeTheme::Crypt, GenerationSeed::new(3))
            .await;
        assert!(lore.starts_with("The old kings sleep below."));
        assert!(!lore.contains("None wake."));
    }
}
