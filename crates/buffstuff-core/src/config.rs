//! Buff manager configuration.
//!
//! Configuration can be loaded from and saved to a TOML file.

use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::Path;
use tracing::{info, warn};

/// Buff manager configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BuffConfig {
    /// Simulated milliseconds between sweeps
    pub tick_interval_ms: u64,
    /// Namespace for the save-game key
    pub mod_id: String,
}

impl Default for BuffConfig {
    fn default() -> Self {
        Self {
            tick_interval_ms: 250,
            mod_id: "buffstuff".to_string(),
        }
    }
}

impl BuffConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Buff config not found at {}, using defaults", path.display());
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read buff config: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut config) => {
                        config.validate();
                        info!("Loaded buff config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse buff config: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open buff config: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved buff config to {}", path.display());
        Ok(())
    }

    /// Clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.tick_interval_ms = self.tick_interval_ms.clamp(10, 60_000);
        if self.mod_id.trim().is_empty() {
            self.mod_id = Self::default().mod_id;
        }
    }

    /// Save-game key under which the snapshot is stored.
    #[must_use]
    pub fn save_key(&self) -> String {
        format!("{}:BuffStuff", self.mod_id)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_default_config() {
        let config = BuffConfig::default();
        assert_eq!(config.tick_interval_ms, 250);
        assert_eq!(config.save_key(), "buffstuff:BuffStuff");
    }

    #[test]
    fn test_config_validation() {
        let mut config = BuffConfig {
            tick_interval_ms: 0,
            mod_id: "  ".to_string(),
        };
        config.validate();
        assert_eq!(config.tick_interval_ms, 10);
        assert_eq!(config.mod_id, "buffstuff");
    }

    #[test]
    fn test_config_save_load() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("nested").join("buffs.toml");

        let config = BuffConfig {
            tick_interval_ms: 500,
            mod_id: "survival".to_string(),
        };
        config.save_to(&config_path).expect("Failed to save config");

        let loaded = BuffConfig::load_from(&config_path);
        assert_eq!(loaded, config);
        assert_eq!(loaded.save_key(), "survival:BuffStuff");
    }

    #[test]
    fn test_config_load_missing_file() {
        let config = BuffConfig::load_from("/nonexistent/path/buffs.toml");
        assert_eq!(config, BuffConfig::default());
    }

    #[test]
    fn test_config_partial_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("buffs.toml");
        fs::write(&config_path, "tick_interval_ms = 100\n").expect("write");

        let loaded = BuffConfig::load_from(&config_path);
        assert_eq!(loaded.tick_interval_ms, 100);
        assert_eq!(loaded.mod_id, "buffstuff");
    }

    #[test]
    fn test_config_malformed_file_uses_defaults() {
        let temp_dir = TempDir::new().expect("Failed to create temp dir");
        let config_path = temp_dir.path().join("buffs.toml");
        fs::write(&config_path, "tick_interval_ms = \"fast\"").expect("write");

        assert_eq!(BuffConfig::load_from(&config_path), BuffConfig::default());
    }
}
