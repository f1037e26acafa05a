//! Monitor Trailing Stops Use Case
//!
//! One monitoring cycle: list every position whose trailing stop is still
//! live, observe one price per position, fold it into the stored state and
//! persist the result with a versioned write. Positions are processed
//! concurrently up to `max_concurrency`, and a failure on one position never
//! affects another.
//!
//! An exit request is first emitted only by the caller whose write moved the
//! state to `triggered`, so overlapping cycles produce one exit per breach.
//! The trigger record remembers whether the sink accepted it. Undelivered
//! exits are retried at the start of later cycles once `exit_retry_after` has
//! passed since the previous attempt; each retry is claimed with a versioned
//! write first, so racing monitors never deliver the same attempt twice.

use std::sync::Arc;
use std::time::{Duration, Instant};

use futures::StreamExt;
use rust_decimal::Decimal;
use thiserror::Error;

use crate::application::ports::{ExitSinkPort, PriceFeedError, PriceFeedPort};
use crate::domain::shared::{PositionId, Timestamp};
use crate::domain::trailing_stop::{
    ExitRequest, PositionStateStore, PriceObservation, StoreError, TrailingStopError,
    TrailingStopStatus, Transition, VersionedState, WriteOutcome,
};
use crate::observability;

/// Tuning for one monitoring cycle.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MonitorSettings {
    /// Positions processed concurrently.
    pub max_concurrency: usize,
    /// Re-read and recompute attempts after a version conflict.
    pub max_conflict_retries: u32,
    /// Upper bound on one price fetch.
    pub price_timeout: Duration,
    /// Upper bound on one store operation.
    pub store_timeout: Duration,
    /// Upper bound on one exit hand-off.
    pub exit_timeout: Duration,
    /// Minimum delay between delivery attempts of an undelivered exit.
    pub exit_retry_after: Duration,
}

impl Default for MonitorSettings {
    fn default() -> Self {
        Self {
            max_concurrency: 16,
            max_conflict_retries: 3,
            price_timeout: Duration::from_secs(2),
            store_timeout: Duration::from_secs(2),
            exit_timeout: Duration::from_secs(2),
            exit_retry_after: Duration::from_secs(10),
        }
    }
}

/// Transient failures. The position is skipped for this cycle.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum MonitorError {
    /// Price could not be fetched.
    #[error("price feed error: {0}")]
    PriceFeed(#[from] PriceFeedError),

    /// State store failed.
    #[error("state store error: {0}")]
    Store(#[from] StoreError),

    /// An operation did not finish in time.
    #[error("{operation} timed out after {timeout:?}")]
    Timeout {
        /// Operation that timed out.
        operation: &'static str,
        /// Configured limit.
        timeout: Duration,
    },

    /// Feed returned a zero or negative price.
    #[error("invalid price observation: {price}")]
    InvalidPrice {
        /// Offending price.
        price: Decimal,
    },
}

impl MonitorError {
    /// Label used in metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::PriceFeed(_) => "price_feed",
            Self::Store(_) => "store",
            Self::Timeout { .. } => "timeout",
            Self::InvalidPrice { .. } => "invalid_price",
        }
    }
}

/// What happened to one position during a cycle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PositionOutcome {
    /// No state change.
    Unchanged,
    /// Stop activated.
    Activated,
    /// Stop tightened.
    Tightened,
    /// Stop triggered and this cycle owns the exit.
    Triggered {
        /// Whether the exit sink accepted the request.
        exit_delivered: bool,
    },
    /// A previously undelivered exit was attempted again.
    ExitRedelivered {
        /// Whether the exit sink accepted the request this time.
        exit_delivered: bool,
    },
    /// Transient failure; retried next cycle.
    Skipped(MonitorError),
    /// Version conflicts exhausted the retry budget.
    Deferred,
    /// Computation broke an invariant; state left untouched.
    InvariantViolation,
    /// State disappeared between listing and reading (position closed).
    Removed,
}

/// Per-cycle counts.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct TickReport {
    /// Positions examined.
    pub evaluated: usize,
    /// Activations.
    pub activated: usize,
    /// Tightenings.
    pub tightened: usize,
    /// Positions with no change.
    pub unchanged: usize,
    /// Triggers written by this cycle.
    pub triggered: usize,
    /// Earlier exits the sink accepted on a retry.
    pub exits_redelivered: usize,
    /// Exit requests the sink rejected or did not accept in time.
    pub exit_failures: usize,
    /// Transient skips.
    pub skipped: usize,
    /// Conflict-exhausted deferrals.
    pub deferred: usize,
    /// Invariant violations.
    pub invariant_violations: usize,
    /// Records removed mid-cycle.
    pub removed: usize,
}

impl TickReport {
    /// Fold one outcome into the counts. Redelivery attempts are not
    /// counted as evaluations.
    pub fn record(&mut self, outcome: &PositionOutcome) {
        if let PositionOutcome::ExitRedelivered { exit_delivered } = outcome {
            if *exit_delivered {
                self.exits_redelivered += 1;
            } else {
                self.exit_failures += 1;
            }
            return;
        }

        self.evaluated += 1;
        match outcome {
            PositionOutcome::Unchanged => self.unchanged += 1,
            PositionOutcome::Activated => self.activated += 1,
            PositionOutcome::Tightened => self.tightened += 1,
            PositionOutcome::Triggered { exit_delivered } => {
                self.triggered += 1;
                if !exit_delivered {
                    self.exit_failures += 1;
                }
            }
            PositionOutcome::Skipped(_) => self.skipped += 1,
            PositionOutcome::Deferred => self.deferred += 1,
            PositionOutcome::InvariantViolation => self.invariant_violations += 1,
            PositionOutcome::Removed => self.removed += 1,
            PositionOutcome::ExitRedelivered { .. } => {}
        }
    }

    /// Whether anything other than "unchanged" happened.
    #[must_use]
    pub const fn has_activity(&self) -> bool {
        self.evaluated != self.unchanged || self.exits_redelivered != 0 || self.exit_failures != 0
    }
}

/// Use case running one trailing-stop monitoring cycle.
pub struct MonitorTrailingStopsUseCase<S, P, E>
where
    S: PositionStateStore,
    P: PriceFeedPort,
    E: ExitSinkPort,
{
    store: Arc<S>,
    price_feed: Arc<P>,
    exit_sink: Arc<E>,
    settings: MonitorSettings,
}

impl<S, P, E> MonitorTrailingStopsUseCase<S, P, E>
where
    S: PositionStateStore,
    P: PriceFeedPort,
    E: ExitSinkPort,
{
    /// Create with default settings.
    pub fn new(store: Arc<S>, price_feed: Arc<P>, exit_sink: Arc<E>) -> Self {
        Self::with_settings(store, price_feed, exit_sink, MonitorSettings::default())
    }

    /// Create with custom settings.
    pub fn with_settings(
        store: Arc<S>,
        price_feed: Arc<P>,
        exit_sink: Arc<E>,
        settings: MonitorSettings,
    ) -> Self {
        Self {
            store,
            price_feed,
            exit_sink,
            settings: MonitorSettings {
                max_concurrency: settings.max_concurrency.max(1),
                ..settings
            },
        }
    }

    /// Settings in effect.
    #[must_use]
    pub const fn settings(&self) -> &MonitorSettings {
        &self.settings
    }

    /// Run one monitoring cycle: retry due undelivered exits, then evaluate
    /// every monitored position.
    ///
    /// # Errors
    ///
    /// Returns error only if the set of managed positions cannot be listed.
    /// Per-position failures are reported in the [`TickReport`].
    pub async fn tick(&self) -> Result<TickReport, MonitorError> {
        let started = Instant::now();
        let mut report = TickReport::default();

        match self
            .with_store_timeout("list_pending_exits", self.store.list_pending_exits())
            .await
        {
            Ok(pending) => {
                let redelivered: Vec<Option<PositionOutcome>> = futures::stream::iter(pending)
                    .map(|id| self.redeliver_exit(id))
                    .buffer_unordered(self.settings.max_concurrency)
                    .collect()
                    .await;
                for outcome in redelivered.iter().flatten() {
                    report.record(outcome);
                }
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not list pending exits");
                observability::record_monitor_error(e.kind());
            }
        }

        let ids = self
            .with_store_timeout(
                "list_managed_positions",
                self.store
                    .list_managed_positions(&TrailingStopStatus::MONITORED),
            )
            .await
            .inspect_err(|e| observability::record_monitor_error(e.kind()))?;

        let outcomes: Vec<PositionOutcome> = futures::stream::iter(ids)
            .map(|id| self.process_position(id))
            .buffer_unordered(self.settings.max_concurrency)
            .collect()
            .await;

        for outcome in &outcomes {
            report.record(outcome);
        }

        let elapsed = started.elapsed();
        observability::record_tick_duration(elapsed.as_secs_f64());

        if report.has_activity() {
            tracing::info!(
                evaluated = report.evaluated,
                activated = report.activated,
                tightened = report.tightened,
                triggered = report.triggered,
                exits_redelivered = report.exits_redelivered,
                exit_failures = report.exit_failures,
                skipped = report.skipped,
                deferred = report.deferred,
                invariant_violations = report.invariant_violations,
                elapsed_ms = elapsed.as_millis(),
                "Trailing stop tick"
            );
        } else {
            tracing::debug!(
                evaluated = report.evaluated,
                elapsed_ms = elapsed.as_millis(),
                "Trailing stop tick"
            );
        }

        Ok(report)
    }

    /// Observe one price for one position and persist the outcome.
    pub async fn process_position(&self, id: PositionId) -> PositionOutcome {
        let price = match self.fetch_price(&id).await {
            Ok(price) => price,
            Err(e) => return self.skip(&id, e),
        };
        let observation = PriceObservation::now(price);

        for attempt in 0..=self.settings.max_conflict_retries {
            let record = match self
                .with_store_timeout("read", self.store.read(&id))
                .await
            {
                Ok(Some(record)) => record,
                Ok(None) => {
                    tracing::debug!(position_id = %id, "State removed mid-cycle");
                    return PositionOutcome::Removed;
                }
                Err(e) => return self.skip(&id, e),
            };

            let transition = match record.state.observe(observation) {
                Ok(transition) => transition,
                Err(TrailingStopError::InvalidObservation { price, .. }) => {
                    return self.skip(&id, MonitorError::InvalidPrice { price });
                }
                Err(e) => {
                    tracing::error!(
                        position_id = %id,
                        version = record.version,
                        price = %price,
                        error = %e,
                        state = ?record.state,
                        "Trailing stop invariant violated"
                    );
                    observability::record_monitor_error("invariant_violation");
                    return PositionOutcome::InvariantViolation;
                }
            };

            match self.apply(&id, &record, transition).await {
                Ok(Some(outcome)) => return outcome,
                Ok(None) => {
                    tracing::debug!(
                        position_id = %id,
                        attempt,
                        "Version conflict, re-reading state"
                    );
                    observability::record_conflict();
                }
                Err(e) => return self.skip(&id, e),
            }
        }

        tracing::warn!(
            position_id = %id,
            retries = self.settings.max_conflict_retries,
            "Conflict retries exhausted, deferring to next tick"
        );
        PositionOutcome::Deferred
    }

    /// Persist a transition. `Ok(None)` means the write lost a version race.
    async fn apply(
        &self,
        id: &PositionId,
        record: &VersionedState,
        transition: Transition,
    ) -> Result<Option<PositionOutcome>, MonitorError> {
        let kind = transition.kind();
        let outcome = match &transition {
            Transition::Unchanged => return Ok(Some(PositionOutcome::Unchanged)),
            Transition::Activated(_) => PositionOutcome::Activated,
            Transition::Tightened(_) => PositionOutcome::Tightened,
            Transition::Triggered(_) => PositionOutcome::Triggered {
                exit_delivered: false,
            },
        };
        let Some(next) = transition.into_next_state() else {
            return Ok(Some(PositionOutcome::Unchanged));
        };
        let exit_request = next.exit_request();
        let stop_price = next.current_stop_price();

        let written = self
            .with_store_timeout(
                "write_if_version",
                self.store.write_if_version(id, record.version, next),
            )
            .await?;
        let WriteOutcome::Written { version } = written else {
            return Ok(None);
        };

        observability::record_transition(kind);
        tracing::info!(
            position_id = %id,
            transition = kind,
            version,
            stop_price = ?stop_price,
            "Trailing stop updated"
        );

        let Some(request) = exit_request else {
            return Ok(Some(outcome));
        };
        let exit_delivered = self.deliver_exit(id, request).await;
        if exit_delivered {
            self.mark_exit_delivered(id).await;
        }
        Ok(Some(PositionOutcome::Triggered { exit_delivered }))
    }

    /// Retry an undelivered exit if its retry delay has passed.
    ///
    /// The attempt is claimed by a versioned write before the hand-off, so
    /// only one monitor makes it. Returns `None` when nothing was attempted:
    /// the exit is not due, already delivered, claimed by another monitor,
    /// or the store failed.
    pub async fn redeliver_exit(&self, id: PositionId) -> Option<PositionOutcome> {
        for _ in 0..=self.settings.max_conflict_retries {
            let record = match self.with_store_timeout("read", self.store.read(&id)).await {
                Ok(Some(record)) => record,
                Ok(None) => return None,
                Err(e) => {
                    self.redelivery_failed(&id, &e);
                    return None;
                }
            };

            let now = Timestamp::now();
            if !record.state.exit_due(now, self.settings.exit_retry_after) {
                return None;
            }
            let (Some(claimed), Some(request)) = (
                record.state.with_exit_attempt(now),
                record.state.exit_request(),
            ) else {
                return None;
            };
            let attempt = claimed.trigger().map_or(0, |trigger| trigger.exit_attempts);

            match self
                .with_store_timeout(
                    "write_if_version",
                    self.store.write_if_version(&id, record.version, claimed),
                )
                .await
            {
                Ok(WriteOutcome::Written { .. }) => {
                    tracing::info!(position_id = %id, attempt, "Retrying exit request");
                    let exit_delivered = self.deliver_exit(&id, request).await;
                    if exit_delivered {
                        self.mark_exit_delivered(&id).await;
                    }
                    return Some(PositionOutcome::ExitRedelivered { exit_delivered });
                }
                Ok(WriteOutcome::Conflict { .. }) => observability::record_conflict(),
                Err(e) => {
                    self.redelivery_failed(&id, &e);
                    return None;
                }
            }
        }
        None
    }

    /// Hand one exit request to the sink within `exit_timeout`.
    async fn deliver_exit(&self, id: &PositionId, request: ExitRequest) -> bool {
        let timeout = self.settings.exit_timeout;
        let sent = tokio::time::timeout(timeout, self.exit_sink.request_exit(request)).await;
        let delivered = match sent {
            Ok(Ok(())) => true,
            Ok(Err(e)) => {
                tracing::error!(
                    position_id = %id,
                    error = %e,
                    "Exit request delivery failed, will retry"
                );
                false
            }
            Err(_) => {
                tracing::error!(
                    position_id = %id,
                    timeout_ms = timeout.as_millis(),
                    "Exit request delivery timed out, will retry"
                );
                false
            }
        };
        observability::record_exit_request(delivered);
        delivered
    }

    /// Record that the sink accepted the exit. If this cannot be persisted
    /// the exit is delivered again after `exit_retry_after`.
    async fn mark_exit_delivered(&self, id: &PositionId) {
        for _ in 0..=self.settings.max_conflict_retries {
            let record = match self.with_store_timeout("read", self.store.read(id)).await {
                Ok(Some(record)) => record,
                Ok(None) => return,
                Err(e) => {
                    self.redelivery_failed(id, &e);
                    return;
                }
            };
            let Some(delivered) = record.state.with_exit_delivered() else {
                return;
            };
            match self
                .with_store_timeout(
                    "write_if_version",
                    self.store.write_if_version(id, record.version, delivered),
                )
                .await
            {
                Ok(WriteOutcome::Written { .. }) => return,
                Ok(WriteOutcome::Conflict { .. }) => observability::record_conflict(),
                Err(e) => {
                    self.redelivery_failed(id, &e);
                    return;
                }
            }
        }
        tracing::warn!(position_id = %id, "Could not record exit delivery, it may be repeated");
    }

    fn redelivery_failed(&self, id: &PositionId, error: &MonitorError) {
        tracing::warn!(position_id = %id, error = %error, "Exit bookkeeping failed");
        observability::record_monitor_error(error.kind());
    }

    async fn fetch_price(&self, id: &PositionId) -> Result<Decimal, MonitorError> {
        let timeout = self.settings.price_timeout;
        match tokio::time::timeout(timeout, self.price_feed.get_current_price(id)).await {
            Ok(result) => result.map_err(MonitorError::from),
            Err(_) => Err(MonitorError::Timeout {
                operation: "get_current_price",
                timeout,
            }),
        }
    }

    async fn with_store_timeout<T>(
        &self,
        operation: &'static str,
        future: impl Future<Output = Result<T, StoreError>>,
    ) -> Result<T, MonitorError> {
        let timeout = self.settings.store_timeout;
        match tokio::time::timeout(timeout, future).await {
            Ok(result) => result.map_err(MonitorError::from),
            Err(_) => Err(MonitorError::Timeout { operation, timeout }),
        }
    }

    fn skip(&self, id: &PositionId, error: MonitorError) -> PositionOutcome {
        tracing::warn!(position_id = %id, error = %error, "Skipping position this tick");
        observability::record_monitor_error(error.kind());
        PositionOutcome::Skipped(error)
    }
}
