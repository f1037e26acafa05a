//! Trailing Stop State Aggregate
//!
//! One instance per managed position. Every observation is folded in through
//! [`TrailingStopState::observe`], which never mutates `self` and instead
//! returns the [`Transition`] to persist. This keeps the read-then-conditional-write
//! discipline in the monitoring loop trivial: a conflicting write just drops
//! the computed transition and re-reads.

use std::time::Duration;

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::domain::shared::{PositionId, Timestamp};
use crate::domain::trailing_stop::errors::TrailingStopError;
use crate::domain::trailing_stop::services::{ActivationGate, StopLevel, TighteningCalculator};
use crate::domain::trailing_stop::value_objects::{
    ExitReason, ExitRequest, ManagedPosition, PriceObservation, TrailingStopConfig,
    TrailingStopStatus,
};

/// Tracking data, present once the stop has activated.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct ActiveStop {
    /// When the activation gate fired.
    pub activated_at: Timestamp,
    /// Price that fired the activation gate.
    pub activation_price: Decimal,
    /// Best price observed since activation.
    pub peak_price: Decimal,
    /// When `peak_price` was observed.
    pub peak_observed_at: Timestamp,
    /// Current fractional distance from the peak.
    pub current_distance: Decimal,
    /// Current stop price, derived from `peak_price` and `current_distance`.
    pub current_stop_price: Decimal,
}

/// Record of the breach that ended the trailing stop.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct TriggerRecord {
    /// Time of the breaching observation.
    pub triggered_at: Timestamp,
    /// Observed price that breached the stop.
    pub trigger_price: Decimal,
    /// Stop price in force at the breach.
    pub stop_price: Decimal,
    /// Whether the exit sink has accepted the exit request.
    pub exit_delivered: bool,
    /// Delivery attempts started so far, the first one at trigger time.
    pub exit_attempts: u32,
    /// Start of the latest delivery attempt.
    pub last_exit_attempt_at: Timestamp,
}

/// Outcome of folding one observation into a state.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Transition {
    /// Nothing to persist.
    Unchanged,
    /// `Inactive -> Active`.
    Activated(TrailingStopState),
    /// Peak improved and the stop moved.
    Tightened(TrailingStopState),
    /// `Active -> Triggered`. The caller emits the exit request after the
    /// state is durably written.
    Triggered(TrailingStopState),
}

impl Transition {
    /// State to persist, if any.
    #[must_use]
    pub const fn next_state(&self) -> Option<&TrailingStopState> {
        match self {
            Self::Unchanged => None,
            Self::Activated(state) | Self::Tightened(state) | Self::Triggered(state) => {
                Some(state)
            }
        }
    }

    /// Consume the transition, returning the state to persist.
    #[must_use]
    pub fn into_next_state(self) -> Option<TrailingStopState> {
        match self {
            Self::Unchanged => None,
            Self::Activated(state) | Self::Tightened(state) | Self::Triggered(state) => {
                Some(state)
            }
        }
    }

    /// Label used in logs and metrics.
    #[must_use]
    pub const fn kind(&self) -> &'static str {
        match self {
            Self::Unchanged => "unchanged",
            Self::Activated(_) => "activated",
            Self::Tightened(_) => "tightened",
            Self::Triggered(_) => "triggered",
        }
    }
}

/// Persisted trailing-stop record for one position.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TrailingStopState {
    position: ManagedPosition,
    config_snapshot: TrailingStopConfig,
    status: TrailingStopStatus,
    active: Option<ActiveStop>,
    trigger: Option<TriggerRecord>,
}

impl TrailingStopState {
    /// Create a dormant state for a freshly registered position.
    ///
    /// # Errors
    ///
    /// Returns a configuration error if the position snapshot is invalid.
    pub fn new(
        position: ManagedPosition,
        config: TrailingStopConfig,
    ) -> Result<Self, TrailingStopError> {
        position.validate()?;
        Ok(Self {
            position,
            config_snapshot: config,
            status: TrailingStopStatus::Inactive,
            active: None,
            trigger: None,
        })
    }

    /// Position identifier.
    #[must_use]
    pub const fn position_id(&self) -> &PositionId {
        &self.position.id
    }

    /// Position snapshot captured at registration.
    #[must_use]
    pub const fn position(&self) -> &ManagedPosition {
        &self.position
    }

    /// Configuration captured at registration.
    #[must_use]
    pub const fn config_snapshot(&self) -> &TrailingStopConfig {
        &self.config_snapshot
    }

    /// Lifecycle status.
    #[must_use]
    pub const fn status(&self) -> TrailingStopStatus {
        self.status
    }

    /// Tracking data, once active.
    #[must_use]
    pub const fn active(&self) -> Option<&ActiveStop> {
        self.active.as_ref()
    }

    /// Breach record, once triggered.
    #[must_use]
    pub const fn trigger(&self) -> Option<&TriggerRecord> {
        self.trigger.as_ref()
    }

    /// Current stop price, once active.
    #[must_use]
    pub fn current_stop_price(&self) -> Option<Decimal> {
        self.active.map(|active| active.current_stop_price)
    }

    /// Current trailing distance, once active.
    #[must_use]
    pub fn current_distance(&self) -> Option<Decimal> {
        self.active.map(|active| active.current_distance)
    }

    /// Peak price, once active.
    #[must_use]
    pub fn peak_price(&self) -> Option<Decimal> {
        self.active.map(|active| active.peak_price)
    }

    /// Exit request for a triggered state.
    #[must_use]
    pub fn exit_request(&self) -> Option<ExitRequest> {
        self.trigger.map(|trigger| ExitRequest {
            position_id: self.position.id.clone(),
            reason: ExitReason::TrailingStop,
            side: self.position.side,
            quantity: self.position.quantity,
            trigger_price: trigger.trigger_price,
            stop_price: trigger.stop_price,
            requested_at: trigger.triggered_at,
        })
    }

    /// Whether the state is triggered but the sink has not yet accepted
    /// its exit request.
    #[must_use]
    pub fn exit_pending(&self) -> bool {
        self.trigger.is_some_and(|trigger| !trigger.exit_delivered)
    }

    /// Whether a pending exit may be attempted again at `now`: the latest
    /// attempt started at least `retry_after` ago.
    #[must_use]
    pub fn exit_due(&self, now: Timestamp, retry_after: Duration) -> bool {
        self.trigger.is_some_and(|trigger| {
            !trigger.exit_delivered && now.elapsed_since(trigger.last_exit_attempt_at) >= retry_after
        })
    }

    /// State recording a new delivery attempt started at `now`. `None` unless
    /// an exit is pending.
    #[must_use]
    pub fn with_exit_attempt(&self, now: Timestamp) -> Option<Self> {
        let trigger = self.trigger.filter(|trigger| !trigger.exit_delivered)?;
        Some(Self {
            trigger: Some(TriggerRecord {
                exit_attempts: trigger.exit_attempts.saturating_add(1),
                last_exit_attempt_at: now,
                ..trigger
            }),
            ..self.clone()
        })
    }

    /// State recording that the sink accepted the exit request. `None`
    /// unless an exit is pending.
    #[must_use]
    pub fn with_exit_delivered(&self) -> Option<Self> {
        let trigger = self.trigger.filter(|trigger| !trigger.exit_delivered)?;
        Some(Self {
            trigger: Some(TriggerRecord {
                exit_delivered: true,
                ..trigger
            }),
            ..self.clone()
        })
    }

    /// Fold one price observation into the state.
    ///
    /// # Errors
    ///
    /// - `InvalidObservation` for a non-positive price.
    /// - `InvariantViolation` when the calculator produces a level that
    ///   breaks the distance bounds or either ratchet.
    pub fn observe(&self, observation: PriceObservation) -> Result<Transition, TrailingStopError> {
        if self.status.is_terminal() {
            return Ok(Transition::Unchanged);
        }
        if observation.price <= Decimal::ZERO {
            return Err(TrailingStopError::InvalidObservation {
                position_id: self.position.id.to_string(),
                price: observation.price,
            });
        }

        match self.active {
            None => self.observe_inactive(observation),
            Some(active) => self.observe_active(active, observation),
        }
    }

    fn observe_inactive(
        &self,
        observation: PriceObservation,
    ) -> Result<Transition, TrailingStopError> {
        let position = &self.position;
        if !ActivationGate::should_activate(
            position.entry_price,
            position.side,
            observation.price,
            &self.config_snapshot,
        ) {
            return Ok(Transition::Unchanged);
        }

        let level = self.level_for_peak(observation.price);
        self.check_bounds(level)?;

        Ok(Transition::Activated(Self {
            status: TrailingStopStatus::Active,
            active: Some(ActiveStop {
                activated_at: observation.observed_at,
                activation_price: observation.price,
                peak_price: observation.price,
                peak_observed_at: observation.observed_at,
                current_distance: level.distance,
                current_stop_price: level.stop_price,
            }),
            ..self.clone()
        }))
    }

    fn observe_active(
        &self,
        active: ActiveStop,
        observation: PriceObservation,
    ) -> Result<Transition, TrailingStopError> {
        let side = self.position.side;

        if side.is_better(observation.price, active.peak_price) {
            let level = self.level_for_peak(observation.price);
            self.check_bounds(level)?;
            self.check_ratchet(&active, level)?;

            if level.stop_price == active.current_stop_price {
                return Ok(Transition::Unchanged);
            }

            return Ok(Transition::Tightened(Self {
                active: Some(ActiveStop {
                    peak_price: observation.price,
                    peak_observed_at: observation.observed_at,
                    current_distance: level.distance,
                    current_stop_price: level.stop_price,
                    ..active
                }),
                ..self.clone()
            }));
        }

        if side.breaches(observation.price, active.current_stop_price) {
            return Ok(Transition::Triggered(Self {
                status: TrailingStopStatus::Triggered,
                trigger: Some(TriggerRecord {
                    triggered_at: observation.observed_at,
                    trigger_price: observation.price,
                    stop_price: active.current_stop_price,
                    exit_delivered: false,
                    exit_attempts: 1,
                    last_exit_attempt_at: observation.observed_at,
                }),
                ..self.clone()
            }));
        }

        Ok(Transition::Unchanged)
    }

    fn level_for_peak(&self, peak_price: Decimal) -> StopLevel {
        TighteningCalculator::compute(
            self.position.entry_price,
            peak_price,
            self.position.side,
            &self.config_snapshot,
        )
    }

    fn check_bounds(&self, level: StopLevel) -> Result<(), TrailingStopError> {
        if !self.config_snapshot.distance_in_bounds(level.distance) {
            return Err(self.violation(format!(
                "distance {} outside [{}, {}]",
                level.distance,
                self.config_snapshot.floor_distance(),
                self.config_snapshot.initial_distance()
            )));
        }
        Ok(())
    }

    fn check_ratchet(&self, active: &ActiveStop, level: StopLevel) -> Result<(), TrailingStopError> {
        if level.distance > active.current_distance {
            return Err(self.violation(format!(
                "distance grew from {} to {}",
                active.current_distance, level.distance
            )));
        }
        if self
            .position
            .side
            .is_better(active.current_stop_price, level.stop_price)
        {
            return Err(self.violation(format!(
                "stop moved against the position from {} to {}",
                active.current_stop_price, level.stop_price
            )));
        }
        Ok(())
    }

    fn violation(&self, message: String) -> TrailingStopError {
        TrailingStopError::InvariantViolation {
            position_id: self.position.id.to_string(),
            message,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::trailing_stop::value_objects::PositionStatus;
    use rust_decimal_macros::dec;

    fn at(price: Decimal) -> PriceObservation {
        PriceObservation::now(price)
    }

    fn long_state() -> TrailingStopState {
        TrailingStopState::new(
            ManagedPosition::long("pos-1", dec!(0.60), dec!(100)),
            TrailingStopConfig::default(),
        )
        .unwrap()
    }

    fn advance(state: &TrailingStopState, price: Decimal) -> TrailingStopState {
        state
            .observe(at(price))
            .unwrap()
            .into_next_state()
            .unwrap_or_else(|| state.clone())
    }

    #[test]
    fn new_state_is_inactive() {
        let state = long_state();
        assert_eq!(state.status(), TrailingStopStatus::Inactive);
        assert!(state.active().is_none());
        assert!(state.exit_request().is_none());
    }

    #[test]
    fn new_rejects_invalid_position() {
        let mut position = ManagedPosition::long("pos-1", dec!(0.60), dec!(100));
        position.status = PositionStatus::Closed;
        let err = TrailingStopState::new(position, TrailingStopConfig::default()).unwrap_err();
        assert!(matches!(err, TrailingStopError::Configuration(_)));
    }

    #[test]
    fn below_threshold_stays_inactive() {
        let transition = long_state().observe(at(dec!(0.65))).unwrap();
        assert_eq!(transition, Transition::Unchanged);
    }

    #[test]
    fn activation_sets_tracking_fields() {
        let observation = at(dec!(0.66));
        let transition = long_state().observe(observation).unwrap();
        let Transition::Activated(state) = transition else {
            panic!("expected activation, got {transition:?}");
        };

        let active = state.active().unwrap();
        assert_eq!(state.status(), TrailingStopStatus::Active);
        assert_eq!(active.activation_price, dec!(0.66));
        assert_eq!(active.activated_at, observation.observed_at);
        assert_eq!(active.peak_price, dec!(0.66));
        assert_eq!(active.current_distance, dec!(0.044));
        assert_eq!(active.current_stop_price, dec!(0.63096));
    }

    #[test]
    fn retrace_without_breach_is_unchanged() {
        let state = advance(&long_state(), dec!(0.80));
        assert_eq!(state.observe(at(dec!(0.78))).unwrap(), Transition::Unchanged);
        assert_eq!(state.observe(at(dec!(0.80))).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn peak_improvement_tightens() {
        let activated = advance(&long_state(), dec!(0.66));
        let transition = activated.observe(at(dec!(0.80))).unwrap();
        let Transition::Tightened(state) = transition else {
            panic!("expected tightening, got {transition:?}");
        };
        assert_eq!(state.peak_price(), Some(dec!(0.80)));
        assert_eq!(state.current_distance(), Some(dec!(0.03)));
        assert_eq!(state.current_stop_price(), Some(dec!(0.776)));
        assert_eq!(
            state.active().unwrap().activation_price,
            dec!(0.66),
            "activation price is immutable"
        );
    }

    #[test]
    fn breach_triggers_with_record() {
        let state = advance(&advance(&long_state(), dec!(0.66)), dec!(0.90));
        assert_eq!(state.current_stop_price(), Some(dec!(0.882)));

        let transition = state.observe(at(dec!(0.88))).unwrap();
        let Transition::Triggered(triggered) = transition else {
            panic!("expected trigger, got {transition:?}");
        };
        assert_eq!(triggered.status(), TrailingStopStatus::Triggered);

        let exit = triggered.exit_request().unwrap();
        assert_eq!(exit.reason, ExitReason::TrailingStop);
        assert_eq!(exit.trigger_price, dec!(0.88));
        assert_eq!(exit.stop_price, dec!(0.882));
        assert_eq!(exit.quantity, dec!(100));
    }

    #[test]
    fn trigger_starts_with_one_pending_attempt() {
        let triggered = advance(&advance(&long_state(), dec!(0.90)), dec!(0.88));
        let trigger = *triggered.trigger().unwrap();

        assert!(triggered.exit_pending());
        assert_eq!(trigger.exit_attempts, 1);
        assert_eq!(trigger.last_exit_attempt_at, trigger.triggered_at);
        assert!(!long_state().exit_pending());
        assert!(long_state().with_exit_attempt(Timestamp::now()).is_none());
    }

    #[test]
    fn exit_becomes_due_after_retry_delay() {
        let triggered = advance(&advance(&long_state(), dec!(0.90)), dec!(0.88));
        let attempted_at = triggered.trigger().unwrap().last_exit_attempt_at;
        let later = Timestamp::parse("2099-01-01T00:00:00Z").unwrap();

        assert!(!triggered.exit_due(attempted_at, Duration::from_secs(10)));
        assert!(triggered.exit_due(attempted_at, Duration::ZERO));
        assert!(triggered.exit_due(later, Duration::from_secs(10)));

        let retried = triggered.with_exit_attempt(later).unwrap();
        assert_eq!(retried.trigger().unwrap().exit_attempts, 2);
        assert!(!retried.exit_due(later, Duration::from_secs(10)));
        assert_eq!(retried.exit_request(), triggered.exit_request());
    }

    #[test]
    fn delivered_exit_is_settled() {
        let triggered = advance(&advance(&long_state(), dec!(0.90)), dec!(0.88));
        let delivered = triggered.with_exit_delivered().unwrap();
        let later = Timestamp::parse("2099-01-01T00:00:00Z").unwrap();

        assert_eq!(delivered.status(), TrailingStopStatus::Triggered);
        assert!(!delivered.exit_pending());
        assert!(!delivered.exit_due(later, Duration::ZERO));
        assert!(delivered.with_exit_delivered().is_none());
        assert!(delivered.with_exit_attempt(later).is_none());
        assert_eq!(delivered.observe(at(dec!(0.10))).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn touching_stop_does_not_trigger() {
        let state = advance(&long_state(), dec!(0.90));
        assert_eq!(state.observe(at(dec!(0.882))).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn triggered_is_terminal() {
        let state = advance(&advance(&long_state(), dec!(0.90)), dec!(0.50));
        assert_eq!(state.status(), TrailingStopStatus::Triggered);

        assert_eq!(state.observe(at(dec!(0.40))).unwrap(), Transition::Unchanged);
        assert_eq!(state.observe(at(dec!(2.00))).unwrap(), Transition::Unchanged);
    }

    #[test]
    fn inactive_never_triggers() {
        assert_eq!(
            long_state().observe(at(dec!(0.01))).unwrap(),
            Transition::Unchanged
        );
    }

    #[test]
    fn non_positive_price_is_rejected() {
        let state = advance(&long_state(), dec!(0.90));
        let err = state.observe(at(Decimal::ZERO)).unwrap_err();
        assert!(matches!(err, TrailingStopError::InvalidObservation { .. }));
    }

    #[test]
    fn short_position_trails_downwards() {
        let state = TrailingStopState::new(
            ManagedPosition::short("pos-s", dec!(0.60), dec!(50)),
            TrailingStopConfig::default(),
        )
        .unwrap();

        let state = advance(&state, dec!(0.54));
        assert_eq!(state.status(), TrailingStopStatus::Active);

        let state = advance(&state, dec!(0.40));
        assert_eq!(state.current_stop_price(), Some(dec!(0.412)));

        assert_eq!(state.observe(at(dec!(0.41))).unwrap(), Transition::Unchanged);
        let transition = state.observe(at(dec!(0.413))).unwrap();
        assert_eq!(transition.kind(), "triggered");
    }

    #[test]
    fn tampered_distance_is_reported_not_clamped() {
        let mut state = advance(&long_state(), dec!(0.80));
        if let Some(active) = state.active.as_mut() {
            active.current_distance = dec!(0.025);
        }

        let err = state.observe(at(dec!(0.81))).unwrap_err();
        assert!(matches!(err, TrailingStopError::InvariantViolation { .. }));
    }

    #[test]
    fn serde_roundtrip_preserves_tracking() {
        let state = advance(&long_state(), dec!(0.80));
        let json = serde_json::to_string(&state).unwrap();
        let parsed: TrailingStopState = serde_json::from_str(&json).unwrap();
        assert_eq!(parsed, state);
    }
}
