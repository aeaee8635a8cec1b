//! # World Configuration
//!
//! Runtime knobs for generation, exits, respawn, autosave and mutations.
//! Loaded from TOML; every section and field falls back to its default.
//!
//! ```toml
//! [generation]
//! max_validation_retries = 5
//!
//! [autosave]
//! interval_secs = 60
//! ```

use std::path::Path;
use std::time::Duration;

use delve_procedural::TopologyConfig;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Errors raised while loading a configuration.
#[derive(Error, Debug)]
pub enum ConfigError {
    /// The file could not be read.
    #[error("cannot read config: {0}")]
    Io(#[from] std::io::Error),

    /// The file is not valid TOML for this schema.
    #[error("cannot parse config: {0}")]
    Parse(#[from] toml::de::Error),

    /// Values parse but cannot work together.
    #[error("invalid config: {0}")]
    Invalid(String),
}

/// Topology generation and world expansion.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct GenerationConfig {
    /// Topology attempts per Subzone before generation fails.
    pub max_validation_retries: u32,
    /// Smallest Subzone node count.
    pub min_nodes: u32,
    /// Largest Subzone node count.
    pub max_nodes: u32,
    /// Average out-degree the loop stage aims for.
    pub target_average_degree: f64,
    /// Lower bound of the hidden-edge fraction.
    pub hidden_fraction_min: f64,
    /// Upper bound of the hidden-edge fraction.
    pub hidden_fraction_max: f64,
    /// Fewest Subzones between breakouts.
    pub breakout_interval_min: u32,
    /// Most Subzones between breakouts.
    pub breakout_interval_max: u32,
}

impl Default for GenerationConfig {
    fn default() -> Self {
        Self {
            max_validation_retries: 5,
            min_nodes: 8,
            max_nodes: 120,
            target_average_degree: 3.2,
            hidden_fraction_min: 0.15,
            hidden_fraction_max: 0.25,
            breakout_interval_min: 3,
            breakout_interval_max: 5,
        }
    }
}

impl GenerationConfig {
    /// Topology generator settings derived from this section.
    #[must_use]
    pub fn topology(&self) -> TopologyConfig {
        TopologyConfig {
            min_nodes: self.min_nodes,
            max_nodes: self.max_nodes,
            target_average_degree: self.target_average_degree,
            hidden_fraction_min: self.hidden_fraction_min,
            hidden_fraction_max: self.hidden_fraction_max,
            ..TopologyConfig::default()
        }
    }

    /// Rejects retry budgets, breakout ranges and topology bounds that
    /// cannot work.
    ///
    /// # Errors
    ///
    /// `ConfigError::Invalid` naming the offending setting.
    pub fn check(&self) -> Result<(), ConfigError> {
        if self.max_validation_retries == 0 {
            return Err(ConfigError::Invalid(
                "generation.max_validation_retries must be at least 1".to_string(),
            ));
        }
        if self.breakout_interval_min == 0 || self.breakout_interval_min > self.breakout_interval_max {
            return Err(ConfigError::Invalid(format!(
                "breakout interval {}..={} is empty",
                self.breakout_interval_min, self.breakout_interval_max
            )));
        }
        self.topology()
            .check()
            .map_err(|e| ConfigError::Invalid(e.to_string()))
    }
}

/// Exit resolution.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitConfig {
    /// Budget for the free-text parse stage.
    pub free_text_timeout_ms: u64,
    /// Largest edit distance the fuzzy stage accepts.
    pub max_fuzzy_distance: usize,
}

impl Default for ExitConfig {
    fn default() -> Self {
        Self {
            free_text_timeout_ms: 1500,
            max_fuzzy_distance: 2,
        }
    }
}

impl ExitConfig {
    /// Free-text budget as a duration.
    #[must_use]
    pub const fn free_text_timeout(&self) -> Duration {
        Duration::from_millis(self.free_text_timeout_ms)
    }
}

/// Mob respawn.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RespawnConfig {
    /// Seconds between a death and its space repopulating.
    pub respawn_after_secs: u64,
}

impl Default for RespawnConfig {
    fn default() -> Self {
        Self {
            respawn_after_secs: 600,
        }
    }
}

/// Background saving.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct AutosaveConfig {
    /// Seconds between timed saves.
    pub interval_secs: u64,
    /// Player moves that trigger an early save (0 disables).
    pub move_threshold: u32,
}

impl Default for AutosaveConfig {
    fn default() -> Self {
        Self {
            interval_secs: 120,
            move_threshold: 25,
        }
    }
}

impl AutosaveConfig {
    /// Timed-save period.
    #[must_use]
    pub const fn interval(&self) -> Duration {
        Duration::from_secs(self.interval_secs)
    }
}

/// Carve and collapse costs.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct MutationConfig {
    /// Skill needed to carve a passage.
    pub carve_min_skill: u8,
    /// Resources consumed by a carve.
    pub carve_resource_cost: u32,
    /// Lattice reach of a carve on spatial layouts.
    pub carve_reach: i32,
}

impl Default for MutationConfig {
    fn default() -> Self {
        Self {
            carve_min_skill: 12,
            carve_resource_cost: 3,
            carve_reach: 2,
        }
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// Topology generation and expansion.
    pub generation: GenerationConfig,
    /// Exit resolution.
    pub exits: ExitConfig,
    /// Mob respawn.
    pub respawn: RespawnConfig,
    /// Background saving.
    pub autosave: AutosaveConfig,
    /// Carve and collapse.
    pub mutation: MutationConfig,
}

impl WorldConfig {
    /// Settings for a long-running server: more retries, tighter saves.
    #[must_use]
    pub fn production() -> Self {
        Self {
            generation: GenerationConfig {
                max_validation_retries: 8,
                ..GenerationConfig::default()
            },
            exits: ExitConfig {
                free_text_timeout_ms: 2500,
                ..ExitConfig::default()
            },
            respawn: RespawnConfig {
                respawn_after_secs: 900,
            },
            autosave: AutosaveConfig {
                interval_secs: 60,
                move_threshold: 15,
            },
            mutation: MutationConfig::default(),
        }
    }

    /// Parses and checks a TOML document.
    ///
    /// # Errors
    ///
    /// `Parse` for malformed TOML, `Invalid` for inconsistent values.
    pub fn from_toml_str(source: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(source)?;
        config.check()?;
        Ok(config)
    }

    /// Reads, parses and checks a TOML file.
    ///
    /// # Errors
    ///
    /// `Io` if the file cannot be read; otherwise as `from_toml_str`.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let source = std::fs::read_to_string(path)?;
        Self::from_toml_str(&source)
    }

    /// Rejects combinations the engine cannot run with.
    ///
    /// # Errors
    ///
    /// `Invalid` naming the first offending value.
    pub fn check(&self) -> Result<(), ConfigError> {
        self.generation.check()?;
        if self.autosave.interval_secs == 0 {
            return Err(ConfigError::Invalid(
                "autosave.interval_secs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = WorldConfig::default();
        assert_eq!(config.generation.max_validation_retries, 5);
        assert_eq!(config.exits.free_text_timeout(), Duration::from_millis(1500));
        assert_eq!(config.respawn.respawn_after_secs, 600);
        assert_eq!(config.autosave.move_threshold, 25);
        assert_eq!(config.mutation.carve_min_skill, 12);
        assert!(config.check().is_ok());
        assert!(WorldConfig::production().check().is_ok());
    }

    #[test]
    fn test_partial_toml_keeps_defaults() {
        let config = WorldConfig::from_toml_str(
            "[generation]\nmax_validation_retries = 3\n\n[autosave]\ninterval_secs = 30\n",
        )
        .unwrap();
        assert_eq!(config.generation.max_validation_retries, 3);
        assert_eq!(config.generation.max_nodes, 120);
        assert_eq!(config.autosave.interval_secs, 30);
        assert_eq!(config.autosave.move_threshold, 25);
    }

    #[test]
    fn test_invalid_values_rejected() {
        let err = WorldConfig::from_toml_str("[generation]\nbreakout_interval_min = 6\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));

        let err = WorldConfig::from_toml_str("[generation]\nmin_nodes = 2\n");
        assert!(matches!(err, Err(ConfigError::Invalid(_))));

        let err = WorldConfig::from_toml_str("[generation\n");
        assert!(matches!(err, Err(ConfigError::Parse(_))));
    }

    #[test]
    fn test_topology_mapping() {
        let mut config = GenerationConfig::default();
        config.max_nodes = 40;
        let topology = config.topology();
        assert_eq!(topology.max_nodes, 40);
        assert_eq!(topology.max_degree, TopologyConfig::default().max_degree);
    }
}
