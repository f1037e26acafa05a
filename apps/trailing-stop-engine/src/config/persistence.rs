//! State persistence configuration.

use serde::{Deserialize, Serialize};

/// Which state store backs the engine.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PersistenceBackend {
    /// Process memory; lost on restart.
    InMemory,
    /// One JSON document per position under `state_dir`.
    #[default]
    JsonFile,
}

/// State persistence configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Store backend.
    #[serde(default)]
    pub backend: PersistenceBackend,
    /// Directory for the JSON file store.
    #[serde(default = "default_state_dir")]
    pub state_dir: String,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            backend: PersistenceBackend::default(),
            state_dir: default_state_dir(),
        }
    }
}

fn default_state_dir() -> String {
    "./data/trailing-stops".to_string()
}
