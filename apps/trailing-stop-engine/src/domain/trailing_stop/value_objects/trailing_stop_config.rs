//! Trailing Stop Configuration Value Object

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::domain::trailing_stop::errors::ConfigurationError;

/// How accumulated gain is converted into tightening steps.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TighteningMode {
    /// Fractional increments: the distance shrinks smoothly with gain.
    #[default]
    Continuous,
    /// Whole increments only: the distance shrinks at each increment boundary.
    Stepped,
}

/// Validated, immutable trailing-stop parameters.
///
/// Captured per position at registration and never re-read from a live
/// source afterwards. The only ways to obtain one are [`TrailingStopConfig::new`],
/// [`TrailingStopConfig::default`] and deserialization, all of which enforce
/// the invariants below:
///
/// - `0 < floor_distance <= initial_distance < 1`
/// - `price_increment > 0`
/// - `activation_threshold >= 0`
/// - `tightening_rate >= 0`
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(try_from = "TrailingStopConfigSpec")]
pub struct TrailingStopConfig {
    activation_threshold: Decimal,
    initial_distance: Decimal,
    tightening_rate: Decimal,
    floor_distance: Decimal,
    price_increment: Decimal,
    tightening_mode: TighteningMode,
}

/// Unvalidated wire form of [`TrailingStopConfig`].
#[derive(Debug, Clone, Copy, Deserialize)]
struct TrailingStopConfigSpec {
    activation_threshold: Decimal,
    initial_distance: Decimal,
    tightening_rate: Decimal,
    floor_distance: Decimal,
    #[serde(default = "default_price_increment")]
    price_increment: Decimal,
    #[serde(default)]
    tightening_mode: TighteningMode,
}

impl TryFrom<TrailingStopConfigSpec> for TrailingStopConfig {
    type Error = ConfigurationError;

    fn try_from(spec: TrailingStopConfigSpec) -> Result<Self, Self::Error> {
        Self::new(
            spec.activation_threshold,
            spec.initial_distance,
            spec.tightening_rate,
            spec.floor_distance,
            spec.price_increment,
        )
        .map(|config| config.with_tightening_mode(spec.tightening_mode))
    }
}

const fn default_price_increment() -> Decimal {
    dec!(0.10)
}

impl Default for TrailingStopConfig {
    /// 10% activation, 5% initial distance, 1% tightening per 0.10 of gain,
    /// 2% floor.
    fn default() -> Self {
        Self {
            activation_threshold: dec!(0.10),
            initial_distance: dec!(0.05),
            tightening_rate: dec!(0.01),
            floor_distance: dec!(0.02),
            price_increment: default_price_increment(),
            tightening_mode: TighteningMode::Continuous,
        }
    }
}

impl TrailingStopConfig {
    /// Create a validated configuration with continuous tightening.
    ///
    /// # Errors
    ///
    /// Returns a [`ConfigurationError`] naming the first violated invariant.
    pub fn new(
        activation_threshold: Decimal,
        initial_distance: Decimal,
        tightening_rate: Decimal,
        floor_distance: Decimal,
        price_increment: Decimal,
    ) -> Result<Self, ConfigurationError> {
        if activation_threshold < Decimal::ZERO {
            return Err(ConfigurationError::NegativeActivationThreshold {
                value: activation_threshold,
            });
        }
        check_distance("initial_distance", initial_distance)?;
        check_distance("floor_distance", floor_distance)?;
        if floor_distance > initial_distance {
            return Err(ConfigurationError::FloorExceedsInitial {
                floor: floor_distance,
                initial: initial_distance,
            });
        }
        if tightening_rate < Decimal::ZERO {
            return Err(ConfigurationError::NegativeTighteningRate {
                value: tightening_rate,
            });
        }
        if price_increment <= Decimal::ZERO {
            return Err(ConfigurationError::NonPositivePriceIncrement {
                value: price_increment,
            });
        }

        Ok(Self {
            activation_threshold,
            initial_distance,
            tightening_rate,
            floor_distance,
            price_increment,
            tightening_mode: TighteningMode::Continuous,
        })
    }

    /// Switch the tightening mode.
    #[must_use]
    pub const fn with_tightening_mode(mut self, mode: TighteningMode) -> Self {
        self.tightening_mode = mode;
        self
    }

    /// Minimum fractional gain before the stop starts trailing.
    #[must_use]
    pub const fn activation_threshold(&self) -> Decimal {
        self.activation_threshold
    }

    /// Distance used at activation, before any tightening.
    #[must_use]
    pub const fn initial_distance(&self) -> Decimal {
        self.initial_distance
    }

    /// Distance removed per price increment of gain.
    #[must_use]
    pub const fn tightening_rate(&self) -> Decimal {
        self.tightening_rate
    }

    /// Narrowest distance tightening may reach.
    #[must_use]
    pub const fn floor_distance(&self) -> Decimal {
        self.floor_distance
    }

    /// Gain unit that tightening is stepped by.
    #[must_use]
    pub const fn price_increment(&self) -> Decimal {
        self.price_increment
    }

    /// Continuous or stepped tightening.
    #[must_use]
    pub const fn tightening_mode(&self) -> TighteningMode {
        self.tightening_mode
    }

    /// Whether `distance` lies within `[floor_distance, initial_distance]`.
    #[must_use]
    pub fn distance_in_bounds(&self, distance: Decimal) -> bool {
        distance >= self.floor_distance && distance <= self.initial_distance
    }
}

fn check_distance(field: &'static str, value: Decimal) -> Result<(), ConfigurationError> {
    if value <= Decimal::ZERO || value >= Decimal::ONE {
        return Err(ConfigurationError::DistanceOutOfRange { field, value });
    }
    Ok(())
}
