//! Shared Domain Types

pub mod value_objects;

pub use value_objects::{PositionId, Timestamp};
