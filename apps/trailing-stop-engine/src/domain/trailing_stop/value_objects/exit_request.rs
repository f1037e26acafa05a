//! Exit Request Value Object

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use super::PositionSide;
use crate::domain::shared::{PositionId, Timestamp};

/// Why an exit was requested.
///
/// Other exit engines tag their requests with their own reason so a
/// downstream arbiter can rank simultaneous candidates.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
#[non_exhaustive]
pub enum ExitReason {
    /// Progressive trailing stop was breached.
    TrailingStop,
}

impl ExitReason {
    /// Snake-case label.
    #[must_use]
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::TrailingStop => "trailing_stop",
        }
    }
}

impl std::fmt::Display for ExitReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Signal asking the execution subsystem to close a position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ExitRequest {
    /// Position to close.
    pub position_id: PositionId,
    /// Trigger reason.
    pub reason: ExitReason,
    /// Side of the position being closed.
    pub side: PositionSide,
    /// Quantity to close.
    pub quantity: Decimal,
    /// Observed price that breached the stop.
    pub trigger_price: Decimal,
    /// Stop price in force at the breach.
    pub stop_price: Decimal,
    /// Time of the breaching observation.
    pub requested_at: Timestamp,
}

#[cfg(test)]
mod tests {
    use super::*;
    use rust_decimal_macros::dec;

    #[test]
    fn reason_label() {
        assert_eq!(ExitReason::TrailingStop.as_str(), "trailing_stop");
        assert_eq!(
            serde_json::to_string(&ExitReason::TrailingStop).unwrap(),
            "\"trailing_stop\""
        );
    }

    #[test]
    fn exit_request_serializes_prices_as_strings() {
        let request = ExitRequest {
            position_id: PositionId::new("pos-1"),
            reason: ExitReason::TrailingStop,
            side: PositionSide::Long,
            quantity: dec!(100),
            trigger_price: dec!(0.88),
            stop_price: dec!(0.882),
            requested_at: Timestamp::parse("2026-01-19T12:00:00Z").unwrap(),
        };
        let json = serde_json::to_value(&request).unwrap();
        assert_eq!(json["reason"], "trailing_stop");
        assert_eq!(json["trigger_price"], "0.88");
        assert_eq!(json["stop_price"], "0.882");
    }
}
