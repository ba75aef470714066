//! Fixed-horizon forward return from a completed Countdown.
//!
//! The entry bar is the LAST bar whose stepped tally equals the target. Since
//! the stepped tally holds its value until the next qualifying bar, this is the
//! bar just before the tally moves past the target, not the bar where the
//! target was first reached.

use crate::{series::PriceSeries, Period, Result, SequentialError};

/// Outcome of a single backtest
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct BacktestOutcome {
    pub entry_index: usize,
    pub exit_index: usize,
    pub entry_close: f64,
    pub exit_close: f64,
    /// (exit - entry) / entry * 100
    pub return_pct: f64,
}

#[derive(Debug, Clone, PartialEq)]
pub struct Backtester {
    pub horizon: Period,
    pub target: usize,
}

impl Default for Backtester {
    fn default() -> Self {
        Self {
            horizon: Period::new_const(10),
            target: crate::classify::DEFAULT_SIGNAL_TARGET,
        }
    }
}

impl Backtester {
    pub fn new(horizon: Period, target: usize) -> Self {
        Self { horizon, target }
    }

    /// Last bar whose stepped tally equals the target exactly.
    pub fn entry_index(&self, per_bar_tallies: &[usize]) -> Option<usize> {
        per_bar_tallies.iter().rposition(|&t| t == self.target)
    }

    pub fn backtest(
        &self,
        series: &PriceSeries,
        per_bar_tallies: &[usize],
    ) -> Result<BacktestOutcome> {
        let entry_index = self
            .entry_index(per_bar_tallies)
            .ok_or(SequentialError::NoSignal)?;

        let horizon = self.horizon.get();
        let available = series.len().saturating_sub(entry_index + 1);
        if available < horizon {
            return Err(SequentialError::HorizonExceeded {
                entry: entry_index,
                horizon,
                available,
            });
        }

        let exit_index = entry_index + horizon;
        let entry_close = series.usable_close(entry_index)?;
        let exit_close = series.usable_close(exit_index)?;

        Ok(BacktestOutcome {
            entry_index,
            exit_index,
            entry_close,
            exit_close,
            return_pct: (exit_close - entry_close) / entry_close * 100.0,
        })
    }
}
