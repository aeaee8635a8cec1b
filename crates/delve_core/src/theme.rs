//! # Biome Themes
//!
//! The theme tag a chunk hands down to its children. Themes drive layout
//! choice, content tables and the contrast rule for breakout Regions.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::error::{ModelError, ModelResult};

/// Biome theme of a chunk.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub enum BiomeTheme {
    /// Burial vaults.
    Crypt,
    /// Stacked ossuary tunnels.
    Catacombs,
    /// Sunken places of worship.
    Temple,
    /// Collapsed archives.
    Library,
    /// Garrisoned halls.
    Fortress,
    /// Drainage works.
    Sewers,
    /// Abandoned mine shafts.
    Mines,
    /// Natural caves.
    Caverns,
    /// Glowing fungus hollows.
    FungalGrotto,
    /// Drowned passages.
    FloodedDepths,
    /// Volcanic vents.
    Magma,
    /// Ice-bound tunnels.
    Glacier,
    /// Unmoored space where distance means nothing.
    VoidRift,
}

impl BiomeTheme {
    /// Every theme, in declaration order.
    pub const ALL: [Self; 13] = [
        Self::Crypt,
        Self::Catacombs,
        Self::Temple,
        Self::Library,
        Self::Fortress,
        Self::Sewers,
        Self::Mines,
        Self::Caverns,
        Self::FungalGrotto,
        Self::FloodedDepths,
        Self::Magma,
        Self::Glacier,
        Self::VoidRift,
    ];

    /// Persisted tag.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Crypt => "crypt",
            Self::Catacombs => "catacombs",
            Self::Temple => "temple",
            Self::Library => "library",
            Self::Fortress => "fortress",
            Self::Sewers => "sewers",
            Self::Mines => "mines",
            Self::Caverns => "caverns",
            Self::FungalGrotto => "fungal_grotto",
            Self::FloodedDepths => "flooded_depths",
            Self::Magma => "magma",
            Self::Glacier => "glacier",
            Self::VoidRift => "void_rift",
        }
    }

    /// Themes a child may drift into when its lore is varied.
    #[must_use]
    pub const fn related(self) -> &'static [Self] {
        match self {
            Self::Crypt => &[Self::Catacombs, Self::Temple],
            Self::Catacombs => &[Self::Crypt, Self::Caverns],
            Self::Temple => &[Self::Crypt, Self::Library],
            Self::Library => &[Self::Temple, Self::Fortress],
            Self::Fortress => &[Self::Library, Self::Sewers],
            Self::Sewers => &[Self::Fortress, Self::FloodedDepths],
            Self::Mines => &[Self::Caverns, Self::Magma],
            Self::Caverns => &[Self::Mines, Self::FungalGrotto, Self::Glacier],
            Self::FungalGrotto => &[Self::Caverns, Self::FloodedDepths],
            Self::FloodedDepths => &[Self::Sewers, Self::FungalGrotto],
            Self::Magma => &[Self::Mines, Self::Caverns],
            Self::Glacier => &[Self::Caverns, Self::VoidRift],
            Self::VoidRift => &[Self::Glacier, Self::Temple],
        }
    }

    /// The theme a breakout Region takes when leaving this one.
    #[must_use]
    pub const fn contrasting(self) -> Self {
        match self {
            Self::Crypt => Self::FungalGrotto,
            Self::Catacombs => Self::Magma,
            Self::Temple => Self::Mines,
            Self::Library => Self::FloodedDepths,
            Self::Fortress => Self::Caverns,
            Self::Sewers => Self::Glacier,
            Self::Mines => Self::Temple,
            Self::Caverns => Self::Fortress,
            Self::FungalGrotto => Self::Crypt,
            Self::FloodedDepths => Self::Magma,
            Self::Magma => Self::Glacier,
            Self::Glacier => Self::Magma,
            Self::VoidRift => Self::Library,
        }
    }

    /// True for natural formations (no masonry).
    #[must_use]
    pub const fn is_natural(self) -> bool {
        match self {
            Self::Mines
            | Self::Caverns
            | Self::FungalGrotto
            | Self::FloodedDepths
            | Self::Magma
            | Self::Glacier
            | Self::VoidRift => true,
            Self::Crypt
            | Self::Catacombs
            | Self::Temple
            | Self::Library
            | Self::Fortress
            | Self::Sewers => false,
        }
    }
}

impl fmt::Display for BiomeTheme {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for BiomeTheme {
    type Err = ModelError;

    fn from_str(s: &str) -> ModelResult<Self> {
        Self::ALL
            .iter()
            .copied()
            .find(|theme| theme.as_str() == s)
            .ok_or_else(|| ModelError::UnknownTheme(s.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_contrast_never_returns_self() {
        for theme in BiomeTheme::ALL {
            assert_ne!(theme.contrasting(), theme, "{theme} contrasts with itself");
        }
    }

    #[test]
    fn test_contrast_crosses_natural_boundary_for_masonry() {
        for theme in BiomeTheme::ALL.iter().filter(|t| !t.is_natural()) {
            assert!(theme.contrasting().is_natural(), "{theme}");
        }
    }

    #[test]
    fn test_tag_parse() {
        for theme in BiomeTheme::ALL {
            assert_eq!(theme.as_str().parse::<BiomeTheme>(), Ok(theme));
        }
        assert_eq!(
            "meadow".parse::<BiomeTheme>(),
            Err(ModelError::UnknownTheme("meadow".to_string()))
        );
    }
}
