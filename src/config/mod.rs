//! Engine configuration
//!
//! The engine reads a small JSON config: tick rate, an optional tick limit,
//! the default log filter and an optional external block catalog.
//!
//! # Config Location
//!
//! The default config lives in the platform config directory:
//! - **Linux**: `~/.config/block-logic/engine.json`
//! - **macOS**: `~/Library/Application Support/block-logic/engine.json`
//! - **Windows**: `%APPDATA%\block-logic\engine.json`
//!
//! Missing fields fall back to their defaults, so an empty object is a valid
//! config.
//!
//! # Example
//!
//! ```ignore
//! use block_logic::config::EngineConfig;
//!
//! let config = EngineConfig::load_or_default(EngineConfig::default_path()?);
//! let catalog = config.load_catalog()?;
//! ```

use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};

use crate::catalog::{Catalog, CatalogBuilder};
use crate::error::{CircuitError, Result};

/// Application identifier for config directories
pub const APP_ID: &str = "block-logic";

/// Config filename
pub const CONFIG_FILE: &str = "engine.json";

/// Default simulation rate in Hz
pub const DEFAULT_TICK_RATE_HZ: u32 = 60;

/// Default log filter when `RUST_LOG` is not set
pub const DEFAULT_LOG_FILTER: &str = "info,block_logic=debug";

/// Get the engine config directory path
pub fn config_dir() -> Option<PathBuf> {
    dirs_next::config_dir().map(|p| p.join(APP_ID))
}

/// Get the path to the default config file
pub fn default_config_path() -> Option<PathBuf> {
    config_dir().map(|p| p.join(CONFIG_FILE))
}

/// Runtime settings for a simulation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    /// Ticks per second for [`crate::Simulation::run`]. 0 runs unthrottled.
    pub tick_rate_hz: u32,

    /// Stop after this many ticks. `None` runs until stopped.
    pub max_ticks: Option<u64>,

    /// `EnvFilter` directive used when `RUST_LOG` is unset
    pub log_filter: String,

    /// Extra TOML catalog loaded on top of the builtin one
    pub catalog_path: Option<PathBuf>,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            tick_rate_hz: DEFAULT_TICK_RATE_HZ,
            max_ticks: None,
            log_filter: DEFAULT_LOG_FILTER.to_string(),
            catalog_path: None,
        }
    }
}

impl EngineConfig {
    /// The default config path, or an error if the platform has none.
    pub fn default_path() -> Result<PathBuf> {
        default_config_path().ok_or_else(|| {
            CircuitError::Config("Could not determine config directory".to_string())
        })
    }

    /// Load a config file from disk
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path).map_err(|e| {
            CircuitError::Config(format!("Failed to read config file {:?}: {}", path, e))
        })?;

        serde_json::from_str(&content).map_err(|e| {
            CircuitError::Config(format!("Failed to parse config file {:?}: {}", path, e))
        })
    }

    /// Load a config file, returning defaults if any error occurs
    pub fn load_or_default(path: impl AsRef<Path>) -> Self {
        let path = path.as_ref();
        match Self::load(path) {
            Ok(config) => config,
            Err(e) => {
                if path.exists() {
                    tracing::warn!("{}, using defaults", e);
                }
                Self::default()
            }
        }
    }

    /// Save config file to disk as JSON
    pub fn save(&self, path: impl AsRef<Path>) -> Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| {
                CircuitError::Config(format!("Failed to create config directory: {}", e))
            })?;
        }

        let content = serde_json::to_string_pretty(self)
            .map_err(|e| CircuitError::Config(format!("Failed to serialize config: {}", e)))?;

        std::fs::write(path, content).map_err(|e| {
            CircuitError::Config(format!("Failed to write config file {:?}: {}", path, e))
        })
    }

    /// The builtin catalog, extended by `catalog_path` if set.
    pub fn load_catalog(&self) -> Result<Catalog> {
        let mut builder = CatalogBuilder::new()
            .load_toml_str(crate::catalog::BUILTIN_CATALOG)?
            .with_behaviors(crate::blocks::builtin_behaviors());
        if let Some(path) = &self.catalog_path {
            tracing::info!("Loading extra catalog from {:?}", path);
            builder = builder.load_toml_file(path)?;
        }
        builder.build()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let config = EngineConfig::default();
        assert_eq!(config.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
        assert_eq!(config.max_ticks, None);
        assert!(config.catalog_path.is_none());
    }

    #[test]
    fn test_partial_json_uses_defaults() {
        let config: EngineConfig = serde_json::from_str(r#"{ "max_ticks": 10 }"#).unwrap();
        assert_eq!(config.max_ticks, Some(10));
        assert_eq!(config.tick_rate_hz, DEFAULT_TICK_RATE_HZ);
        assert_eq!(config.log_filter, DEFAULT_LOG_FILTER);
    }

    #[test]
    fn test_save_and_load() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);
        let config = EngineConfig {
            tick_rate_hz: 20,
            max_ticks: Some(100),
            log_filter: "warn".to_string(),
            catalog_path: Some(PathBuf::from("extra.toml")),
        };

        config.save(&path).unwrap();
        assert_eq!(EngineConfig::load(&path).unwrap(), config);
    }

    #[test]
    fn test_load_or_default_on_missing_file() {
        let dir = tempfile::tempdir().unwrap();
        let config = EngineConfig::load_or_default(dir.path().join("missing.json"));
        assert_eq!(config, EngineConfig::default());
    }

    #[test]
    fn test_load_rejects_bad_json() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        std::fs::write(&path, "{ not json").unwrap();
        assert!(matches!(
            EngineConfig::load(&path),
            Err(CircuitError::Config(_))
        ));
    }

    #[test]
    fn test_load_catalog_with_extra_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("extra.toml");
        std::fs::write(
            &path,
            r#"
            [[blocks]]
            id = "lamp"
            [[blocks.inputs]]
            name = "on"
            types = ["bool"]
            "#,
        )
        .unwrap();

        let config = EngineConfig {
            catalog_path: Some(path),
            ..Default::default()
        };
        let catalog = config.load_catalog().unwrap();
        assert!(catalog.definition("lamp").is_some());
        assert!(catalog.definition("and").is_some());
    }
}
