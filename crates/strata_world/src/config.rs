//! # World Configuration
//!
//! Everything a host sets once per world: naming, chunk geometry, streaming
//! radii, budgets and the generation snapshot.
//!
//! ```toml
//! name = "overworld"
//! view_distance = 4
//! unload_padding = 2
//!
//! [chunk]
//! width = 64
//! height = 32
//!
//! [generation]
//! seed = 1337
//! ```

use std::path::Path;
use std::time::Duration;

use serde::{Deserialize, Serialize};
use strata_procedural::{ChunkDims, ConfigError, ConfigResult, WorldParams};

/// Per-world settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct WorldConfig {
    /// World name; the ledger is stored under `strata/ledger/<name>`.
    pub name: String,
    /// Chunk footprint and height.
    pub chunk: ChunkDims,
    /// Load ring radius in chunks (Chebyshev).
    pub view_distance: u32,
    /// Extra chunks kept loaded beyond the load ring. Must be positive.
    pub unload_padding: u32,
    /// Scheduler budget when the host reports no idle time (ms).
    pub fallback_budget_ms: u64,
    /// Delay between the last edit and the ledger write (ms).
    pub save_debounce_ms: u64,
    /// Generation parameters.
    pub generation: WorldParams,
}

impl Default for WorldConfig {
    fn default() -> Self {
        Self {
            name: "world".into(),
            chunk: ChunkDims::default(),
            view_distance: 4,
            unload_padding: 2,
            fallback_budget_ms: 8,
            save_debounce_ms: 500,
            generation: WorldParams::default(),
        }
    }
}

impl WorldConfig {
    /// Small world for tests and tools: 16x32 chunks, radius 1.
    #[must_use]
    pub fn headless(name: &str, seed: u64) -> Self {
        Self {
            name: name.into(),
            chunk: ChunkDims::new(16, 32),
            view_distance: 1,
            unload_padding: 1,
            generation: WorldParams::with_seed(seed),
            ..Self::default()
        }
    }

    /// Parses and validates a config from TOML text.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Parse`] for malformed TOML and
    /// [`ConfigError::Invalid`] when validation fails.
    pub fn from_toml_str(text: &str) -> ConfigResult<Self> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    /// Reads, parses and validates a config file.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Io`] if the file cannot be read, otherwise as
    /// [`Self::from_toml_str`].
    pub fn from_toml_path(path: &Path) -> ConfigResult<Self> {
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Checks streaming and geometry constraints, then the generation snapshot.
    ///
    /// # Errors
    ///
    /// Returns [`ConfigError::Invalid`] naming the first violated constraint.
    pub fn validate(&self) -> ConfigResult<()> {
        if self.name.is_empty() {
            return Err(ConfigError::Invalid("world name must not be empty".into()));
        }
        if self.chunk.width == 0 || self.chunk.height == 0 {
            return Err(ConfigError::Invalid(format!(
                "chunk dimensions must be positive, got {}x{}",
                self.chunk.width, self.chunk.height
            )));
        }
        if self.unload_padding == 0 {
            return Err(ConfigError::Invalid(
                "unload_padding must be positive or streaming thrashes at ring edges".into(),
            ));
        }
        self.generation.validate()
    }

    /// Scheduler budget when no idle time is reported.
    #[inline]
    #[must_use]
    pub const fn fallback_budget(&self) -> Duration {
        Duration::from_millis(self.fallback_budget_ms)
    }

    /// Ledger save debounce.
    #[inline]
    #[must_use]
    pub const fn save_debounce(&self) -> Duration {
        Duration::from_millis(self.save_debounce_ms)
    }

    /// Radius of the keep ring.
    #[inline]
    #[must_use]
    pub const fn keep_distance(&self) -> u32 {
        self.view_distance + self.unload_padding
    }

    /// Store key of this world's ledger.
    #[must_use]
    pub fn ledger_key(&self) -> String {
        format!("strata/ledger/{}", self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_validate() {
        WorldConfig::default().validate().unwrap();
        WorldConfig::headless("t", 1).validate().unwrap();
    }

    #[test]
    fn test_toml_overrides() {
        let config = WorldConfig::from_toml_str(
            r#"
            name = "overworld"
            view_distance = 6

            [chunk]
            width = 32
            height = 48

            [generation]
            seed = 99

            [generation.terrain]
            magnitude = 10.0
            "#,
        )
        .unwrap();
        assert_eq!(config.name, "overworld");
        assert_eq!(config.view_distance, 6);
        assert_eq!(config.unload_padding, 2);
        assert_eq!(config.chunk, ChunkDims::new(32, 48));
        assert_eq!(config.generation.seed.value(), 99);
        assert_eq!(config.generation.terrain.magnitude, 10.0);
        assert_eq!(config.keep_distance(), 8);
        assert_eq!(config.ledger_key(), "strata/ledger/overworld");
    }

    #[test]
    fn test_rejects_zero_padding() {
        let err = WorldConfig::from_toml_str("unload_padding = 0\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }

    #[test]
    fn test_rejects_zero_chunk() {
        let err = WorldConfig::from_toml_str("[chunk]\nwidth = 0\nheight = 32\n").unwrap_err();
        assert!(matches!(err, ConfigError::Invalid(_)));
    }
}
