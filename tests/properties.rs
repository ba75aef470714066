//! Property tests for scanner invariants.
//!
//! Uses proptest to verify:
//! 1. Setup spacing: consecutive Setups are at least `length` bars apart
//! 2. Setup soundness: every Setup bar is preceded by a full qualifying run
//! 3. Countdown window: increments lie strictly after the last Setup
//! 4. Stepped tallies never decrease and end at the final tally

use chrono::{Days, NaiveDate};
use proptest::prelude::*;
use seqscan::prelude::*;

fn series(closes: &[f64]) -> PriceSeries {
    let start = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    PriceSeries::new(
        closes
            .iter()
            .enumerate()
            .map(|(i, &c)| Bar::new(start + Days::new(i as u64), c))
            .collect(),
    )
    .unwrap()
}

// ── Strategies ───────────────────────────────────────────────────────

/// Random walk of daily closes with a downward drift so Setups do occur.
fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    (30usize..120)
        .prop_flat_map(|len| prop::collection::vec(-3i32..2, len))
        .prop_map(|steps| {
            let mut price = 500.0;
            steps
                .into_iter()
                .map(|s| {
                    price += s as f64;
                    price
                })
                .collect()
        })
}

/// Same walk with roughly one bar in fifteen missing.
fn arb_closes_with_gaps() -> impl Strategy<Value = Vec<f64>> {
    arb_closes().prop_flat_map(|closes| {
        let len = closes.len();
        (Just(closes), prop::collection::vec(0usize..15, len)).prop_map(|(mut closes, holes)| {
            for (c, h) in closes.iter_mut().zip(holes) {
                if h == 0 {
                    *c = f64::NAN;
                }
            }
            closes
        })
    })
}

proptest! {
    #[test]
    fn setups_are_spaced_by_length(closes in arb_closes_with_gaps()) {
        let events = SetupDetector::with_defaults().scan(&series(&closes));
        for pair in events.windows(2) {
            prop_assert!(pair[1].index >= pair[0].index + 9);
        }
        if let Some(first) = events.first() {
            prop_assert!(first.index >= 12);
        }
    }

    #[test]
    fn setup_bar_closes_a_full_run(closes in arb_closes()) {
        // without gaps, the 9 bars ending at a Setup all qualify
        let events = SetupDetector::with_defaults().scan(&series(&closes));
        for e in &events {
            for i in (e.index - 8)..=e.index {
                prop_assert!(closes[i] < closes[i - 4]);
            }
        }
    }

    #[test]
    fn countdown_window_follows_last_setup(closes in arb_closes_with_gaps()) {
        let engine = EngineBuilder::new().build().unwrap();
        let s = series(&closes);
        let result = engine.analyze(&s).unwrap();

        match result.last_setup() {
            None => {
                prop_assert_eq!(result.countdown.tally, 0);
                prop_assert_eq!(result.status, Status::SetupNotCompleted);
            }
            Some(last) => {
                prop_assert_eq!(result.countdown.triggering_setup, Some(last.index));
                prop_assert_eq!(result.countdown.tally, result.countdown.increments.len());
                prop_assert!(result.countdown.increments.iter().all(|&j| j > last.index));
                for &j in &result.countdown.increments {
                    prop_assert!(closes[j] < closes[j - 2]);
                }
            }
        }
    }

    #[test]
    fn stepped_tallies_are_monotone(closes in arb_closes()) {
        let engine = EngineBuilder::new().build().unwrap();
        let result = engine.analyze(&series(&closes)).unwrap();
        let tallies = result.per_bar_tallies(closes.len());

        prop_assert!(tallies.windows(2).all(|w| w[1] == w[0] || w[1] == w[0] + 1));
        prop_assert_eq!(tallies.last().copied().unwrap_or(0), result.countdown.tally);
    }
}
