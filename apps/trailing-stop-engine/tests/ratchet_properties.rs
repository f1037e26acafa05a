//! Property tests for trailing stop invariants.
//!
//! Uses proptest to verify, over arbitrary configurations and price paths:
//! 1. Ratchet: the distance never widens and the stop never loosens
//! 2. Bounds: the distance stays within [floor, initial]
//! 3. Terminal trigger: nothing moves a triggered stop
//! 4. Idempotence: replaying an observation changes nothing
//! 5. At most one exit per position through the monitor

use std::sync::Arc;

use proptest::prelude::*;
use rust_decimal::Decimal;
use trailing_stop_engine::domain::trailing_stop::PositionStateStore;
use trailing_stop_engine::{
    ChannelExitSink, InMemoryStateStore, ManagedPosition, MonitorTrailingStopsUseCase,
    PositionId, PositionSide, PriceObservation, StaticPriceFeed, TighteningMode,
    TrailingStopConfig, TrailingStopState, TrailingStopStatus, Transition,
};

// ── Strategies (proptest) ────────────────────────────────────────────

fn arb_config() -> impl Strategy<Value = TrailingStopConfig> {
    (
        0_i64..=30,
        1_i64..=20,
        1_i64..=100,
        0_i64..=100,
        1_i64..=100,
        any::<bool>(),
    )
        .prop_map(|(threshold, initial, floor_pct, rate, increment, stepped)| {
            let initial = Decimal::new(initial, 2);
            let floor = initial * Decimal::new(floor_pct, 2);
            let config = TrailingStopConfig::new(
                Decimal::new(threshold, 2),
                initial,
                Decimal::new(rate, 3),
                floor,
                Decimal::new(increment, 2),
            )
            .unwrap();
            if stepped {
                config.with_tightening_mode(TighteningMode::Stepped)
            } else {
                config
            }
        })
}

fn arb_price() -> impl Strategy<Value = Decimal> {
    (1_i64..=20_000).prop_map(|p| Decimal::new(p, 4))
}

fn arb_entry() -> impl Strategy<Value = Decimal> {
    (100_i64..=10_000).prop_map(|p| Decimal::new(p, 4))
}

fn arb_side() -> impl Strategy<Value = PositionSide> {
    prop_oneof![Just(PositionSide::Long), Just(PositionSide::Short)]
}

fn arb_path() -> impl Strategy<Value = Vec<Decimal>> {
    prop::collection::vec(arb_price(), 1..60)
}

fn new_state(side: PositionSide, entry: Decimal, config: TrailingStopConfig) -> TrailingStopState {
    let position = match side {
        PositionSide::Long => ManagedPosition::long("prop-1", entry, Decimal::ONE),
        PositionSide::Short => ManagedPosition::short("prop-1", entry, Decimal::ONE),
    };
    TrailingStopState::new(position, config).unwrap()
}

fn step(state: &TrailingStopState, price: Decimal) -> (Transition, TrailingStopState) {
    let transition = state.observe(PriceObservation::now(price)).unwrap();
    let next = transition
        .next_state()
        .cloned()
        .unwrap_or_else(|| state.clone());
    (transition, next)
}

// ── 1 & 2. Ratchet and bounds ────────────────────────────────────────

proptest! {
    /// Once active, the distance only shrinks and the stop only moves in
    /// the position's favour, always within the configured bounds.
    #[test]
    fn stop_only_tightens(
        side in arb_side(),
        entry in arb_entry(),
        config in arb_config(),
        path in arb_path(),
    ) {
        let mut state = new_state(side, entry, config);

        for price in path {
            let (_, next) = step(&state, price);

            if let Some(distance) = next.current_distance() {
                prop_assert!(distance >= config.floor_distance());
                prop_assert!(distance <= config.initial_distance());
            }

            if let (Some(before), Some(after)) = (state.active(), next.active()) {
                prop_assert!(after.current_distance <= before.current_distance);
                match side {
                    PositionSide::Long => {
                        prop_assert!(after.current_stop_price >= before.current_stop_price);
                    }
                    PositionSide::Short => {
                        prop_assert!(after.current_stop_price <= before.current_stop_price);
                    }
                }
            }

            state = next;
        }
    }

    /// With any positive tightening rate, a large enough gain pins the
    /// distance at the floor and no further.
    #[test]
    fn huge_gain_rests_on_floor(
        entry in arb_entry(),
        config in arb_config(),
        rise in 1_000_i64..=5_000,
    ) {
        prop_assume!(config.tightening_rate() > Decimal::ZERO);
        let state = new_state(PositionSide::Long, entry, config);

        let (transition, next) = step(&state, entry + Decimal::from(rise));
        prop_assert_eq!(transition.kind(), "activated");
        prop_assert_eq!(next.current_distance(), Some(config.floor_distance()));
    }
}

// ── 3. Terminal trigger ──────────────────────────────────────────────

proptest! {
    /// After a trigger, no observation changes the state again.
    #[test]
    fn triggered_is_terminal(
        side in arb_side(),
        entry in arb_entry(),
        config in arb_config(),
        path in arb_path(),
        after in arb_path(),
    ) {
        let mut state = new_state(side, entry, config);
        for price in path {
            state = step(&state, price).1;
            if state.status() == TrailingStopStatus::Triggered {
                break;
            }
        }
        if state.status() != TrailingStopStatus::Triggered {
            return Ok(());
        }

        for price in after {
            let (transition, next) = step(&state, price);
            prop_assert_eq!(transition, Transition::Unchanged);
            prop_assert_eq!(&next, &state);
        }
    }
}

// ── 4. Idempotence ───────────────────────────────────────────────────

proptest! {
    /// Feeding the same observation twice is the same as feeding it once.
    #[test]
    fn replayed_observation_is_noop(
        side in arb_side(),
        entry in arb_entry(),
        config in arb_config(),
        path in arb_path(),
    ) {
        let mut state = new_state(side, entry, config);
        for price in path {
            let observation = PriceObservation::now(price);
            let once = state
                .observe(observation)
                .unwrap()
                .into_next_state()
                .unwrap_or_else(|| state.clone());
            let twice = once.observe(observation).unwrap();
            prop_assert_eq!(twice, Transition::Unchanged);
            state = once;
        }
    }
}

// ── 5. At most one exit ──────────────────────────────────────────────

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    /// However the price wanders, the monitor requests at most one exit,
    /// and it requests one exactly when the stored state is triggered.
    #[test]
    fn monitor_emits_at_most_one_exit(
        side in arb_side(),
        entry in arb_entry(),
        config in arb_config(),
        path in arb_path(),
    ) {
        let (exits, status) = tokio_test::block_on(async {
            let store = Arc::new(InMemoryStateStore::new());
            store.create(new_state(side, entry, config)).await.unwrap();
            let feed = Arc::new(StaticPriceFeed::new());
            let (sink, mut rx) = ChannelExitSink::new(path.len());
            let monitor = MonitorTrailingStopsUseCase::new(
                Arc::clone(&store),
                Arc::clone(&feed),
                Arc::new(sink),
            );

            for price in &path {
                feed.set_price("prop-1", *price);
                monitor.tick().await.unwrap();
            }
            drop(monitor);

            let mut exits = 0_usize;
            while rx.recv().await.is_some() {
                exits += 1;
            }
            let status = store.get(&PositionId::new("prop-1")).unwrap().state.status();
            (exits, status)
        });

        prop_assert!(exits <= 1);
        prop_assert_eq!(exits == 1, status == TrailingStopStatus::Triggered);
    }
}
