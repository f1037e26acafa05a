//! Trailing Stop Domain Services

mod activation_gate;
mod tightening_calculator;

pub use activation_gate::ActivationGate;
pub use tightening_calculator::{StopLevel, TighteningCalculator};
