//! Price feed configuration.

use serde::{Deserialize, Serialize};

/// Price feed configuration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PriceFeedConfig {
    /// JSON snapshot file mapping position ids to prices.
    #[serde(default = "default_snapshot_path")]
    pub snapshot_path: String,
}

impl Default for PriceFeedConfig {
    fn default() -> Self {
        Self {
            snapshot_path: default_snapshot_path(),
        }
    }
}

fn default_snapshot_path() -> String {
    "./data/prices.json".to_string()
}
