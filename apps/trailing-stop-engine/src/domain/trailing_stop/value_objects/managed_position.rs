//! Managed Position Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PositionSide;
use crate::domain::shared::PositionId;
use crate::domain::trailing_stop::errors::ConfigurationError;

/// Lifecycle status of a position, as reported by the position subsystem.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PositionStatus {
    /// Position is open.
    #[default]
    Open,
    /// Position is closed.
    Closed,
}

/// Read-only snapshot of the position data the engine needs.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ManagedPosition {
    /// Position identifier.
    pub id: PositionId,
    /// Long or short.
    pub side: PositionSide,
    /// Average entry price.
    pub entry_price: Decimal,
    /// Position size.
    pub quantity: Decimal,
    /// Open or closed.
    #[serde(default)]
    pub status: PositionStatus,
}

impl ManagedPosition {
    /// Create an open position snapshot.
    #[must_use]
    pub fn new(
        id: impl Into<PositionId>,
        side: PositionSide,
        entry_price: Decimal,
        quantity: Decimal,
    ) -> Self {
        Self {
            id: id.into(),
            side,
            entry_price,
            quantity,
            status: PositionStatus::Open,
        }
    }

    /// Create an open long position snapshot.
    #[must_use]
    pub fn long(id: impl Into<PositionId>, entry_price: Decimal, quantity: Decimal) -> Self {
        Self::new(id, PositionSide::Long, entry_price, quantity)
    }

    /// Create an open short position snapshot.
    #[must_use]
    pub fn short(id: impl Into<PositionId>, entry_price: Decimal, quantity: Decimal) -> Self {
        Self::new(id, PositionSide::Short, entry_price, quantity)
    }

    /// Check the position can be handed to the engine.
    ///
    /// # Errors
    ///
    /// Rejects non-positive entry prices and quantities, and closed positions.
    pub fn validate(&self) -> Result<(), ConfigurationError> {
        if self.entry_price <= Decimal::ZERO {
            return Err(ConfigurationError::NonPositiveEntryPrice {
                position_id: self.id.to_string(),
                value: self.entry_price,
            });
        }
        if self.quantity <= Decimal::ZERO {
            return Err(ConfigurationError::NonPositiveQuantity {
                position_id: self.id.to_string(),
                value: self.quantity,
            });
        }
        if self.status == PositionStatus::Closed {
            return Err(ConfigurationError::PositionClosed {
                position_id: self.id.to_string(),
            });
        }
        Ok(())
    }
}
