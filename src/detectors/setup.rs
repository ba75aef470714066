//! Setup detection
//!
//! A Setup completes when `length` consecutive bars each close strictly below
//! the close `offset` bars earlier. The run counter resets on a failing bar and
//! right after each completed Setup, so one series can hold several
//! non-overlapping Setups.

use std::collections::HashMap;

use crate::{
    params::{get_period, validate_periods, ParamMeta, ParameterizedDetector},
    series::PriceSeries,
    Direction, Period, Result, SetupEvent,
};

/// Bearish 9-bar Setup scanner
#[derive(Debug, Clone, PartialEq)]
pub struct SetupDetector {
    /// Look-back distance for the comparison close
    pub offset: Period,
    /// Consecutive qualifying bars needed to complete a Setup
    pub length: Period,
}

impl Default for SetupDetector {
    fn default() -> Self {
        Self {
            offset: Period::new_const(4),
            length: Period::new_const(9),
        }
    }
}

impl SetupDetector {
    pub fn new(offset: Period, length: Period) -> Self {
        Self { offset, length }
    }

    /// Algorithmic minimum: enough bars to make one comparison.
    #[inline]
    pub fn min_bars(&self) -> usize {
        self.offset.get() + 1
    }

    /// Scan the whole series and return every completed Setup in order.
    pub fn scan(&self, series: &PriceSeries) -> Vec<SetupEvent> {
        let offset = self.offset.get();
        let length = self.length.get();
        let mut events = Vec::new();
        let mut run = 0usize;

        for i in offset..series.len() {
            let (close, prior) = match (series.usable_close(i), series.usable_close(i - offset)) {
                (Ok(c), Ok(p)) => (c, p),
                (Err(e), _) | (_, Err(e)) => {
                    tracing::trace!(index = i, error = %e, "setup: skipping bar");
                    continue;
                }
            };

            if close < prior {
                run += 1;
                if run == length {
                    tracing::trace!(index = i, "setup completed");
                    events.push(SetupEvent {
                        index: i,
                        direction: Direction::Bearish,
                    });
                    run = 0;
                }
            } else {
                run = 0;
            }
        }

        events
    }

    /// Offset and length must sit inside the ranges in [`SetupDetector::param_meta`].
    pub fn validate_config(&self) -> Result<()> {
        validate_periods(SETUP_PARAMS.iter().zip([self.offset, self.length]))
    }
}

static SETUP_PARAMS: [ParamMeta; 2] = [
    ParamMeta::new("setup_offset", 4, (1, 10, 1), "Bars back for the setup comparison close"),
    ParamMeta::new("setup_length", 9, (3, 15, 1), "Consecutive qualifying bars per setup"),
];

impl ParameterizedDetector for SetupDetector {
    fn param_meta() -> &'static [ParamMeta] {
        &SETUP_PARAMS
    }

    fn with_params(params: &HashMap<&str, usize>) -> Result<Self> {
        Ok(Self {
            offset: get_period(params, &SETUP_PARAMS[0])?,
            length: get_period(params, &SETUP_PARAMS[1])?,
        })
    }

    fn detector_name() -> &'static str {
        "SETUP"
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{series::Bar, SequentialError};
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

    fn descending(n: usize) -> Vec<f64> {
        (0..n).map(|i| 100.0 - i as f64).collect()
    }

    #[test]
    fn test_first_setup_at_offset_plus_length() {
        let events = SetupDetector::with_defaults().scan(&series(&descending(14)));
        assert_eq!(events.len(), 1);
        assert_eq!(events[0].index, 12);
        assert_eq!(events[0].direction, Direction::Bearish);
    }

    #[test]
    fn test_continuous_run_emits_every_nine_bars() {
        // 4 warm-up bars then 27 qualifying comparisons
        let events = SetupDetector::with_defaults().scan(&series(&descending(31)));
        let idx: Vec<usize> = events.iter().map(|e| e.index).collect();
        assert_eq!(idx, vec![12, 21, 30]);
    }

    #[test]
    fn test_tie_resets_run() {
        let mut closes = descending(20);
        // close[10] == close[6]
        closes[10] = closes[6];
        let events = SetupDetector::with_defaults().scan(&series(&closes));
        // run restarts at 11, so the 9th qualifying bar is 19
        assert_eq!(events.iter().map(|e| e.index).collect::<Vec<_>>(), vec![19]);
    }

    #[test]
    fn test_unusable_bar_neither_counts_nor_resets() {
        let mut closes = descending(14);
        closes[8] = f64::NAN;
        // bar 8 is skipped and bar 12 compares against the NaN too
        let events = SetupDetector::with_defaults().scan(&series(&closes));
        assert!(events.is_empty());

        let mut closes = descending(16);
        closes[8] = f64::NAN;
        let events = SetupDetector::with_defaults().scan(&series(&closes));
        // qualifying: 4..=7, 9..=11, 13, 14 -> 9th at 14
        assert_eq!(events.iter().map(|e| e.index).collect::<Vec<_>>(), vec![14]);
    }

    #[test]
    fn test_short_series_yields_nothing() {
        assert!(SetupDetector::with_defaults().scan(&series(&[3.0, 2.0, 1.0])).is_empty());
        assert!(SetupDetector::with_defaults().scan(&PriceSeries::default()).is_empty());
    }

    #[test]
    fn test_with_params() {
        let mut params = HashMap::new();
        params.insert("setup_length", 5);
        let d = SetupDetector::with_params(&params).unwrap();
        assert_eq!(d.offset.get(), 4);
        assert_eq!(d.length.get(), 5);

        params.insert("setup_offset", 0);
        assert!(SetupDetector::with_params(&params).is_err());
    }

    #[test]
    fn test_with_params_rejects_out_of_range() {
        let mut params = HashMap::new();
        params.insert("setup_offset", 50);
        assert!(matches!(
            SetupDetector::with_params(&params),
            Err(SequentialError::OutOfRange { field: "setup_offset", .. })
        ));
    }

    #[test]
    fn test_validate_config_uses_param_ranges() {
        assert!(SetupDetector::with_defaults().validate_config().is_ok());

        let long = SetupDetector::new(Period::new_const(4), Period::new_const(16));
        assert!(matches!(
            long.validate_config(),
            Err(SequentialError::OutOfRange { field: "setup_length", .. })
        ));
        let short = SetupDetector::new(Period::new_const(4), Period::new_const(3));
        assert!(short.validate_config().is_ok());
    }
}
