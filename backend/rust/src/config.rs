// config.rs - Engine and run configuration (JSON file and defaults)
use crate::error_handling::{ExplorerError, Result};
use serde::{Deserialize, Serialize};
use std::path::Path;

/// Maze geometry and seed.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub width: i32,
    pub height: i32,
    pub seed: u64,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            width: 31,
            height: 31,
            seed: 42,
        }
    }
}

/// Engine settings plus the caller-side bound on exploration length.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RunConfig {
    pub engine: EngineConfig,
    pub max_steps: u64,
}

impl Default for RunConfig {
    fn default() -> Self {
        Self {
            engine: EngineConfig::default(),
            max_steps: 500,
        }
    }
}

impl RunConfig {
    pub fn from_json_str(json: &str) -> Result<Self> {
        serde_json::from_str(json)
            .map_err(|e| ExplorerError::corrupt(format!("invalid run configuration: {e}")))
    }

    pub fn from_json_file(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| ExplorerError::from_read(e, path))?;
        Self::from_json_str(&text)
    }
}
