//! # BuffStuff Host
//!
//! Reference server host for the buff manager. Loads `buffstuff.toml` (or the
//! path given as the first argument), runs a scripted session against an
//! on-disk world save and prints a JSON summary.

#![warn(missing_docs)]
#![warn(clippy::all)]
#![deny(clippy::unwrap_used)]

mod config;
mod plugins;
mod session;

use std::path::PathBuf;

use anyhow::Result;
use tracing::{info, warn};
use tracing_subscriber::{fmt, prelude::*, EnvFilter};

use crate::config::{HostConfig, CONFIG_FILE};

/// Main entry point.
fn main() -> Result<()> {
    // Initialize tracing
    tracing_subscriber::registry()
        .with(fmt::layer())
        .with(EnvFilter::from_default_env().add_directive("buffstuff=info".parse()?))
        .init();

    info!("BuffStuff host starting...");
    info!("Version: {}", env!("CARGO_PKG_VERSION"));

    let config_path = std::env::args()
        .nth(1)
        .map_or_else(|| PathBuf::from(CONFIG_FILE), PathBuf::from);
    let config = HostConfig::load_from(&config_path);
    if !config_path.exists() {
        if let Err(e) = config.save_to(&config_path) {
            warn!("Could not write default config: {e}");
        }
    }

    let summary = session::run(&config)?;
    println!("{}", serde_json::to_string_pretty(&summary)?);

    info!("BuffStuff host shutdown complete");
    Ok(())
}
