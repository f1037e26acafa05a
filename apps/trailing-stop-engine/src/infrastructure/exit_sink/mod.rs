//! Exit Sink Adapters
//!
//! Implementations of `ExitSinkPort`.

pub mod channel;
pub mod logging;

pub use channel::ChannelExitSink;
pub use logging::LoggingExitSink;
