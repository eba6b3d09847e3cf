//! Configuration loading: TOML file plus command-line overrides.

use crate::error::{NavError, Result};
use pathfinder_core::PathfinderConfig;
use std::path::Path;

/// Load the core config from a TOML file, or defaults when no file is
/// given.
pub fn load_config(path: Option<&Path>) -> Result<PathfinderConfig> {
    match path {
        Some(path) => {
            let content = std::fs::read_to_string(path).map_err(|e| {
                NavError::Config(format!("failed to read config {:?}: {}", path, e))
            })?;
            let config: PathfinderConfig = toml::from_str(&content)?;
            tracing::info!("loaded configuration from {:?}", path);
            Ok(config)
        }
        None => Ok(PathfinderConfig::default()),
    }
}

/// Command-line values layered over the file config.
#[derive(Debug, Default)]
pub struct Overrides {
    pub port: Option<u16>,
    pub cell_size: Option<f32>,
    pub grid_size: Option<usize>,
    pub max_distance: Option<f32>,
    pub walkable_ids: Option<String>,
}

pub fn apply_overrides(config: &mut PathfinderConfig, overrides: &Overrides) -> Result<()> {
    if let Some(port) = overrides.port {
        config.stream.tcp_port = port;
    }
    if let Some(cell_size) = overrides.cell_size {
        config.grid.cell_size = cell_size;
    }
    if let Some(grid_size) = overrides.grid_size {
        config.grid.grid_size = grid_size;
    }
    if let Some(max_distance) = overrides.max_distance {
        config.grid.max_distance = max_distance;
    }
    if let Some(csv) = &overrides.walkable_ids {
        config.scene.walkable_ids = parse_walkable_ids(csv)?;
    }
    Ok(())
}

/// Parse a comma-separated list of 8-bit class IDs.
pub fn parse_walkable_ids(csv: &str) -> Result<Vec<u8>> {
    csv.split(',')
        .map(str::trim)
        .filter(|part| !part.is_empty())
        .map(|part| {
            part.parse::<u8>()
                .map_err(|_| NavError::Config(format!("invalid walkable class id '{}'", part)))
        })
        .collect()
}
