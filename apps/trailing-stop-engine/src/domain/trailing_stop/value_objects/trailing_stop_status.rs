//! Trailing Stop Status Value Object

use serde::{Deserialize, Serialize};

/// Lifecycle status of a position's trailing stop.
///
/// `Inactive -> Active -> Triggered`, each transition happening at most once.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TrailingStopStatus {
    /// Waiting for the activation threshold.
    #[default]
    Inactive,
    /// Tracking the peak and ratcheting the stop.
    Active,
    /// Stop breached; terminal.
    Triggered,
}

impl TrailingStopStatus {
    /// Statuses the monitoring loop evaluates each tick.
    pub const MONITORED: [Self; 2] = [Self::Inactive, Self::Active];

    /// Whether no further transition is possible.
    #[must_use]
    pub const fn is_terminal(self) -> bool {
        matches!(self, Self::Triggered)
    }

    /// Lowercase label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Inactive => "inactive",
            Self::Active => "active",
            Self::Triggered => "triggered",
        }
    }
}

impl std::fmt::Display for TrailingStopStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
