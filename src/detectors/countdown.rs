//! Countdown tally
//!
//! Counts bars after the most recent Setup whose close is strictly below the
//! close `offset` bars earlier. The tally is a running count, not a streak: it
//! never resets and is not capped at the signal target.

use std::collections::HashMap;

use crate::{
    params::{get_period, validate_periods, ParamMeta, ParameterizedDetector},
    series::PriceSeries,
    Period, Result, SetupEvent,
};

/// Countdown result for one series
#[derive(Debug, Clone, Default, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct CountdownResult {
    pub tally: usize,
    /// Index of the Setup that seeded the window, `None` if no Setup exists
    pub triggering_setup: Option<usize>,
    /// Bar indices at which the tally increased, ascending
    pub increments: Vec<usize>,
}

impl CountdownResult {
    /// Stepped tally per bar, for chart annotation and the backtester.
    ///
    /// Bars before the first increment read 0; afterwards each bar carries the
    /// latest tally forward.
    pub fn per_bar_tallies(&self, len: usize) -> Vec<usize> {
        let mut out = vec![0; len];
        let mut tally = 0;
        let mut next = self.increments.iter().peekable();
        for (i, slot) in out.iter_mut().enumerate() {
            while next.next_if(|&&idx| idx == i).is_some() {
                tally += 1;
            }
            *slot = tally;
        }
        out
    }

    /// Bar at which the tally first reached `target`.
    pub fn signal_index(&self, target: usize) -> Option<usize> {
        target
            .checked_sub(1)
            .and_then(|n| self.increments.get(n))
            .copied()
    }
}

/// 13-bar Countdown scanner
#[derive(Debug, Clone, PartialEq)]
pub struct CountdownDetector {
    /// Look-back distance for the comparison close
    pub offset: Period,
    /// Tally at which the Countdown counts as a signal
    pub target: Period,
}

impl Default for CountdownDetector {
    fn default() -> Self {
        Self {
            offset: Period::new_const(2),
            target: Period::new_const(13),
        }
    }
}

impl CountdownDetector {
    pub fn new(offset: Period, target: Period) -> Self {
        Self { offset, target }
    }

    /// Tally bars strictly after the last Setup in `setups`.
    pub fn scan(&self, series: &PriceSeries, setups: &[SetupEvent]) -> CountdownResult {
        let Some(last) = setups.last() else {
            return CountdownResult::default();
        };

        let offset = self.offset.get();
        let mut result = CountdownResult {
            tally: 0,
            triggering_setup: Some(last.index),
            increments: Vec::new(),
        };

        for j in (last.index + 1)..series.len() {
            let Some(back) = j.checked_sub(offset) else {
                continue;
            };
            let (close, prior) = match (series.usable_close(j), series.usable_close(back)) {
                (Ok(c), Ok(p)) => (c, p),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::trace!(index = j, error = %e, "countdown: skipping bar");
                    continue;
                }
            };

            if close < prior {
                result.tally += 1;
                result.increments.push(j);
            }
        }

        result
    }

    /// Offset and target must sit inside the ranges in [`CountdownDetector::param_meta`].
    pub fn validate_config(&self) -> Result<()> {
        validate_periods(COUNTDOWN_PARAMS.iter().zip([self.offset, self.target]))
    }
}

static COUNTDOWN_PARAMS: [ParamMeta; 2] = [
    ParamMeta::new("countdown_offset", 2, (1, 5, 1), "Bars back for the countdown comparison close"),
    ParamMeta::new("countdown_target", 13, (8, 21, 1), "Tally treated as a completed countdown"),
];

impl ParameterizedDetector for CountdownDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &COUNTDOWN_PARAMS
    }

    fn with_params(params: &HashMap<&str, usize>) -> Result<Self> {
        Ok(Self {
            offset: get_period(params, &COUNTDOWN_PARAMS[0])?,
            target: get_period(params, &COUNTDOWN_PARAMS[1])?,
        })
    }

    fn detector_name() -> &'static str {
        "COUNTDOWN"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{series::Bar, Direction, SequentialError};
    use chrono::NaiveDate;

    fn series(closes: &[f64]) -> PriceSeries {
        let start = NaiveDate::from_ymd_opt(2024, 1, 1).unwrap();
        PriceSeries::new(
            closes
                .iter()
                .enumerate()
                .map(|(i, &c)| Bar::new(start + chrono::Days::new(i as u64), c))
                .collect(),
        )
        .unwrap()
    }

    fn setup_at(index: usize) -> SetupEvent {
        SetupEvent {
            index,
            direction: Direction::Bearish,
        }
    }

    #[test]
    fn test_no_setup_gives_empty_result() {
        let r = CountdownDetector::with_defaults().scan(&series(&[5.0; 20]), &[]);
        assert_eq!(r, CountdownResult::default());
        assert_eq!(r.triggering_setup, None);
    }

    #[test]
    fn test_only_last_setup_seeds_window() {
        let closes: Vec<f64> = (0..30).map(|i| 100.0 - i as f64).collect();
        let r = CountdownDetector::with_defaults().scan(&series(&closes), &[setup_at(12), setup_at(21)]);
        assert_eq!(r.triggering_setup, Some(21));
        assert_eq!(r.tally, 8);
        assert_eq!(r.increments, (22..30).collect::<Vec<_>>());
    }

    #[test]
    fn test_non_qualifying_bars_do_not_reset() {
        let mut closes = vec![50.0; 10];
        closes.extend([51.0, 40.0, 52.0, 39.0]);
        let r = CountdownDetector::with_defaults().scan(&series(&closes), &[setup_at(9)]);
        // 11 < 9 (40 < 50), 13 < 11 (39 < 40)
        assert_eq!(r.increments, vec![11, 13]);
        assert_eq!(r.tally, 2);
    }

    #[test]
    fn test_unusable_close_skipped() {
        let mut closes: Vec<f64> = (0..16).map(|i| 100.0 - i as f64).collect();
        closes[12] = f64::INFINITY;
        let r = CountdownDetector::with_defaults().scan(&series(&closes), &[setup_at(10)]);
        // 12 unusable, 14 compares against 12
        assert_eq!(r.increments, vec![11, 13, 15]);
    }

    #[test]
    fn test_per_bar_tallies_step_forward() {
        let r = CountdownResult {
            tally: 3,
            triggering_setup: Some(1),
            increments: vec![2, 3, 6],
        };
        assert_eq!(r.per_bar_tallies(8), vec![0, 0, 1, 2, 2, 2, 3, 3]);
        assert_eq!(r.signal_index(2), Some(3));
        assert_eq!(r.signal_index(4), None);
        assert_eq!(r.signal_index(0), None);
    }

    #[test]
    fn test_with_params_checks_ranges() {
        let mut params = HashMap::new();
        params.insert("countdown_target", 9);
        let d = CountdownDetector::with_params(&params).unwrap();
        assert_eq!(d.target.get(), 9);
        assert_eq!(d.offset.get(), 2);
        assert!(d.validate_config().is_ok());

        params.insert("countdown_offset", 6);
        assert!(matches!(
            CountdownDetector::with_params(&params),
            Err(SequentialError::OutOfRange { field: "countdown_offset", .. })
        ));

        let low = CountdownDetector::new(Period::new_const(2), Period::new_const(5));
        assert!(low.validate_config().is_err());
    }
}
