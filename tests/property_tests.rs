//! Property-based tests for the oracle math.
//!
//! These check the clamp, accumulator and sampler invariants under random inputs.

use proptest::prelude::*;
use twap_router::exchange::BookSnapshot;
use twap_router::oracle::clamp_observation;
use twap_router::sampler::sample_book;
use twap_router::*;

fn observation_strategy() -> impl Strategy<Value = u64> {
    1u64..10_000_000u64
}

fn step_strategy() -> impl Strategy<Value = (u64, u64)> {
    // (slots elapsed, sample)
    (1u64..1_000u64, 1u64..10_000_000u64)
}

proptest! {
    /// The observation never moves further than the configured step
    #[test]
    fn clamp_respects_bound(
        last in any::<u64>(),
        sample in any::<u64>(),
        max_change in any::<u64>(),
    ) {
        let next = clamp_observation(last, sample, max_change);
        prop_assert!(next.abs_diff(last) <= max_change);
        // and it always moves toward the sample
        prop_assert!(next.abs_diff(sample) <= last.abs_diff(sample));
    }

    /// Samples within the step are taken as they are
    #[test]
    fn clamp_passes_small_moves(
        last in observation_strategy(),
        delta in -10_000i64..=10_000i64,
    ) {
        let sample = last.saturating_add_signed(delta);
        prop_assert_eq!(clamp_observation(last, sample, 10_000), sample);
    }

    /// Nothing a same-slot update carries can change the oracle
    #[test]
    fn same_slot_updates_are_inert(
        seed in observation_strategy(),
        samples in prop::collection::vec(proptest::option::of(any::<u64>()), 1..20),
    ) {
        let mut oracle = TwapOracle::new(seed, 42);
        let before = oracle.clone();
        for sample in samples {
            let update = oracle.update(sample, 42, 10_000).unwrap();
            prop_assert!(!update.is_applied());
        }
        prop_assert_eq!(oracle, before);
    }

    /// The realized twap is the slot-weighted mean of the observations that held
    #[test]
    fn twap_is_weighted_mean(
        seed in observation_strategy(),
        max_change in 1u64..100_000u64,
        steps in prop::collection::vec(step_strategy(), 1..50),
    ) {
        let mut oracle = TwapOracle::new(seed, 0);
        let mut slot = 0u64;
        let mut held = seed;
        let mut weighted = 0u128;
        let mut total = 0u64;

        for (elapsed, sample) in steps {
            slot += elapsed;
            weighted += u128::from(held) * u128::from(elapsed);
            total += elapsed;
            oracle.update(Some(sample), slot, max_change).unwrap();
            held = oracle.last_observation;
        }

        prop_assert_eq!(oracle.total_elapsed_slots, total);
        prop_assert_eq!(oracle.total_observation_time_weighted_sum, weighted);
        prop_assert_eq!(oracle.realized_twap(), Some((weighted / u128::from(total)) as u64));
    }

    /// The twap stays inside the band the observations were allowed to reach
    #[test]
    fn twap_stays_in_reachable_band(
        seed in 1_000_000u64..2_000_000u64,
        max_change in 1u64..10_000u64,
        steps in prop::collection::vec(step_strategy(), 1..50),
    ) {
        let mut oracle = TwapOracle::new(seed, 0);
        let mut slot = 0u64;
        let updates = steps.len() as u64;
        for (elapsed, sample) in steps {
            slot += elapsed;
            oracle.update(Some(sample), slot, max_change).unwrap();
        }
        let twap = oracle.realized_twap().unwrap();
        let reach = max_change * updates;
        prop_assert!(twap >= seed.saturating_sub(reach));
        prop_assert!(twap <= seed + reach);
    }

    /// Extreme inputs surface as errors, never as panics
    #[test]
    fn extreme_inputs_never_panic(
        seed in any::<u64>(),
        max_change in any::<u64>(),
        steps in prop::collection::vec((any::<u64>(), proptest::option::of(any::<u64>())), 1..10),
    ) {
        let mut oracle = TwapOracle::new(seed, 0);
        for (slot, sample) in steps {
            let before = oracle.clone();
            if oracle.update(sample, slot, max_change).is_err() {
                prop_assert_eq!(&oracle, &before);
            }
        }
    }

    /// The midpoint sits between the quotes and equals the floored mean
    #[test]
    fn midpoint_is_floored_mean(bid in 1i64..i64::MAX, ask in 1i64..i64::MAX) {
        let snapshot = BookSnapshot { best_bid: Some(bid), best_ask: Some(ask) };
        let sample = sample_book(&snapshot).unwrap();
        let expected = (i128::from(bid) + i128::from(ask)) / 2;
        prop_assert_eq!(i128::from(sample.price), expected);
    }
}
