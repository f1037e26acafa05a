//! Application Ports (Driven)
//!
//! Interfaces the application uses to reach external systems. The state store
//! port lives with the domain in [`crate::domain::trailing_stop::repository`].

mod exit_sink_port;
mod price_feed_port;

pub use exit_sink_port::{ExitSinkError, ExitSinkPort, NoOpExitSink};
pub use price_feed_port::{PriceFeedError, PriceFeedPort};
