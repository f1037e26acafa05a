//! Infrastructure Layer
//!
//! Adapters implementing the ports defined in the domain and application
//! layers:
//!
//! - `persistence/`: `PositionStateStore` (in-memory, JSON files)
//! - `price_feed/`: `PriceFeedPort` (static, JSON snapshot)
//! - `exit_sink/`: `ExitSinkPort` (tokio channel, log)

pub mod exit_sink;
pub mod persistence;
pub mod price_feed;
