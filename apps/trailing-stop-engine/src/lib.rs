// Allow unwrap/expect in tests - tests should panic on unexpected errors
// Allow test-specific patterns and pedantic lints in test code
#![cfg_attr(
    test,
    allow(
        clippy::unwrap_used,
        clippy::expect_used,
        clippy::significant_drop_tightening,
        clippy::too_many_lines,
        clippy::match_same_arms,
        clippy::needless_pass_by_value,
        clippy::items_after_statements
    )
)]

//! Trailing Stop Engine - Rust Core Library
//!
//! Progressive trailing-stop exit engine. A dormant stop activates once a
//! position has gained enough, follows the best price seen while narrowing
//! its distance as the gain grows, and requests an exit exactly once when
//! the price breaches it.
//!
//! # Architecture (Clean Architecture + DDD + Hexagonal)
//!
//! ## Layers (inside → outside)
//!
//! - **Domain**: Core business logic
//!   - `trailing_stop`: state aggregate, activation gate, tightening
//!     calculator, versioned state store port
//!
//! - **Application**: Use cases and orchestration
//!   - `ports`: `PriceFeedPort`, `ExitSinkPort`
//!   - `use_cases`: `RegisterPosition`, `MonitorTrailingStops`, `ClosePosition`
//!   - `services`: `MonitoringScheduler`
//!
//! - **Infrastructure**: Adapters (implementations)
//!   - `persistence`: state stores (in-memory, JSON files)
//!   - `price_feed`: static and JSON snapshot feeds
//!   - `exit_sink`: channel and logging sinks
//!
//! Cross-cutting: `config` (YAML loading), `observability` (logging, metrics).

#![forbid(unsafe_code)]
#![warn(missing_docs)]
#![warn(clippy::pedantic)]

// =============================================================================
// Clean Architecture Layers
// =============================================================================

/// Domain layer - Core business logic with no external dependencies.
pub mod domain;

/// Application layer - Use cases and port definitions.
pub mod application;

/// Infrastructure layer - Adapters and external integrations.
pub mod infrastructure;

// =============================================================================
// Cross-cutting
// =============================================================================

/// Configuration loading and validation.
pub mod config;

/// Logging and metrics.
pub mod observability;

// =============================================================================
// Re-exports
// =============================================================================

// Domain re-exports
pub use domain::shared::{PositionId, Timestamp};
pub use domain::trailing_stop::{
    ActivationGate, ExitReason, ExitRequest, ManagedPosition, PositionSide, PositionStateStore,
    PriceObservation, TighteningCalculator, TighteningMode, TrailingStopConfig,
    TrailingStopError, TrailingStopState, TrailingStopStatus, Transition,
};

// Application re-exports
pub use application::ports::{ExitSinkPort, PriceFeedPort};
pub use application::services::MonitoringScheduler;
pub use application::use_cases::{
    ClosePositionUseCase, MonitorSettings, MonitorTrailingStopsUseCase, RegisterPositionUseCase,
    TickReport,
};

// Infrastructure re-exports
pub use infrastructure::exit_sink::{ChannelExitSink, LoggingExitSink};
pub use infrastructure::persistence::{InMemoryStateStore, JsonFileStateStore};
pub use infrastructure::price_feed::{JsonFilePriceFeed, StaticPriceFeed};
