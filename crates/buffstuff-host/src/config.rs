//! Host configuration.
//!
//! Provides the buff manager settings, the save directory and the scripted
//! session parameters. Configuration can be loaded from and saved to a file.

use buffstuff_core::BuffConfig;
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, Read, Write};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

/// Configuration file name.
pub const CONFIG_FILE: &str = "buffstuff.toml";

/// Scripted session parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SessionConfig {
    /// Player identities that connect at startup
    pub players: Vec<String>,
    /// Simulation frames per session phase
    pub frames_per_phase: u32,
    /// Real seconds per frame
    pub frame_dt: f32,
    /// Real seconds per game minute
    pub real_seconds_per_game_minute: f32,
    /// Calendar day the world starts at
    pub start_day: f64,
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            players: vec!["alice".to_string(), "bob".to_string()],
            frames_per_phase: 240,
            frame_dt: 0.25,
            // 0.25 s frame = 25 game minutes
            real_seconds_per_game_minute: 0.01,
            start_day: 1.0,
        }
    }
}

/// Host configuration parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct HostConfig {
    /// Directory holding the world save
    pub save_dir: PathBuf,
    /// Buff manager settings
    pub buffs: BuffConfig,
    /// Scripted session
    pub session: SessionConfig,
}

impl Default for HostConfig {
    fn default() -> Self {
        Self {
            save_dir: PathBuf::from("saves"),
            buffs: BuffConfig::default(),
            session: SessionConfig::default(),
        }
    }
}

impl HostConfig {
    /// Load configuration from a specific path.
    /// Returns default config if file doesn't exist or is invalid.
    pub fn load_from<P: AsRef<Path>>(path: P) -> Self {
        let path = path.as_ref();

        if !path.exists() {
            info!("Config file not found, using defaults");
            return Self::default();
        }

        match fs::File::open(path) {
            Ok(mut file) => {
                let mut contents = String::new();
                if let Err(e) = file.read_to_string(&mut contents) {
                    warn!("Failed to read config file: {e}");
                    return Self::default();
                }

                match toml::from_str::<Self>(&contents) {
                    Ok(mut config) => {
                        config.validate();
                        info!("Loaded config from {}", path.display());
                        config
                    },
                    Err(e) => {
                        warn!("Failed to parse config file: {e}");
                        Self::default()
                    },
                }
            },
            Err(e) => {
                warn!("Failed to open config file: {e}");
                Self::default()
            },
        }
    }

    /// Save configuration to a specific path.
    pub fn save_to<P: AsRef<Path>>(&self, path: P) -> io::Result<()> {
        let path = path.as_ref();

        // Create parent directories if needed
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let contents = toml::to_string_pretty(self)
            .map_err(|e| io::Error::new(io::ErrorKind::InvalidData, e))?;

        let mut file = fs::File::create(path)?;
        file.write_all(contents.as_bytes())?;

        info!("Saved config to {}", path.display());
        Ok(())
    }

    /// Validate and clamp configuration values to sensible ranges.
    pub fn validate(&mut self) {
        self.buffs.validate();

        let session = &mut self.session;
        session.frames_per_phase = session.frames_per_phase.clamp(1, 100_000);
        session.frame_dt = session.frame_dt.clamp(0.001, 10.0);
        session.real_seconds_per_game_minute = session.real_seconds_per_game_minute.clamp(0.0001, 60.0);
        session.start_day = session.start_day.max(0.0);
        session.players.retain(|uid| !uid.trim().is_empty());
    }
}
