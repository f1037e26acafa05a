//! Domain Layer
//!
//! Business rules with no infrastructure dependencies:
//!
//! - **Aggregates**: consistency boundaries with invariants
//! - **Value Objects**: immutable domain types with equality by value
//! - **Domain Services**: stateless calculations
//! - **Repository Traits**: persistence abstractions (implemented in adapters)
//!
//! # Bounded Contexts
//!
//! - [`trailing_stop`]: progressive trailing-stop exit policy

pub mod shared;
pub mod trailing_stop;
