//! Monitoring Scheduler Service
//!
//! Drives [`MonitorTrailingStopsUseCase::tick`] on a fixed interval until
//! cancelled. Each tick is awaited before the next one starts; ticks missed
//! while a slow cycle runs are skipped rather than bunched up.
//!
//! Cancellation is only observed between ticks. A tick that has started runs
//! to completion, so a trigger it has written is always followed by its exit
//! hand-off.

use std::sync::Arc;
use std::time::Duration;

use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;
use tokio_util::sync::CancellationToken;

use crate::application::ports::{ExitSinkPort, PriceFeedPort};
use crate::application::use_cases::MonitorTrailingStopsUseCase;
use crate::domain::trailing_stop::PositionStateStore;

/// Periodic driver for the trailing-stop monitor.
pub struct MonitoringScheduler<S, P, E>
where
    S: PositionStateStore,
    P: PriceFeedPort,
    E: ExitSinkPort,
{
    monitor: Arc<MonitorTrailingStopsUseCase<S, P, E>>,
    interval: Duration,
    shutdown: CancellationToken,
}

impl<S, P, E> MonitoringScheduler<S, P, E>
where
    S: PositionStateStore + 'static,
    P: PriceFeedPort + 'static,
    E: ExitSinkPort + 'static,
{
    /// Create a scheduler. `interval` must be non-zero.
    #[must_use]
    pub const fn new(
        monitor: Arc<MonitorTrailingStopsUseCase<S, P, E>>,
        interval: Duration,
        shutdown: CancellationToken,
    ) -> Self {
        Self {
            monitor,
            interval,
            shutdown,
        }
    }

    /// Run until the shutdown token is cancelled. Returns the number of
    /// completed ticks.
    pub async fn run(self) -> u64 {
        let mut interval = tokio::time::interval(self.interval);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        let mut ticks = 0_u64;

        tracing::info!(
            interval_ms = self.interval.as_millis(),
            max_concurrency = self.monitor.settings().max_concurrency,
            "Trailing stop monitor started"
        );

        loop {
            tokio::select! {
                biased;
                () = self.shutdown.cancelled() => break,
                _ = interval.tick() => {}
            }

            let result = self.monitor.tick().await;
            ticks += 1;
            if let Err(e) = result {
                tracing::warn!(error = %e, "Trailing stop tick failed");
            }
        }

        tracing::info!(ticks, "Trailing stop monitor stopped");
        ticks
    }

    /// Run on a background task.
    pub fn spawn(self) -> JoinHandle<u64> {
        tokio::spawn(self.run())
    }
}
