//! Serializable engine configuration.
//!
//! Every field defaults to the observed screening constants, so an empty TOML
//! document is a valid config:
//!
//! ```toml
//! min_bars = 30
//! lookback = "3mo"
//!
//! [setup]
//! offset = 4
//! length = 9
//!
//! [countdown]
//! offset = 2
//! target = 13
//!
//! [backtest]
//! horizon = 10
//!
//! [retry]
//! max_attempts = 3
//! backoff_ms = 500
//! ```

use std::{path::Path, time::Duration};

use chrono::{Months, NaiveDate};
use serde::{Deserialize, Serialize};

use crate::{Period, Result, SequentialError};

/// Engine, retrieval and screening settings.
///
/// [`EngineBuilder::from_config`](crate::EngineBuilder::from_config) reads
/// `min_bars`, `setup`, `countdown` and `backtest`. The retrieval side is
/// wired separately: `retry` through
/// [`RetryingProvider::from_config`](crate::provider::RetryingProvider::from_config)
/// and `lookback` as the window passed to [`screen_parallel`](crate::screen_parallel).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct EngineConfig {
    /// Series shorter than this are reported as insufficient data
    pub min_bars: usize,
    pub lookback: Lookback,
    pub setup: SetupConfig,
    pub countdown: CountdownConfig,
    pub backtest: BacktestConfig,
    pub retry: RetryPolicy,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            min_bars: 30,
            lookback: Lookback::default(),
            setup: SetupConfig::default(),
            countdown: CountdownConfig::default(),
            backtest: BacktestConfig::default(),
            retry: RetryPolicy::default(),
        }
    }
}

impl EngineConfig {
    pub fn from_toml_str(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| SequentialError::InvalidConfig(e.to_string()))
    }

    pub fn from_path(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|e| {
            SequentialError::InvalidConfig(format!("{}: {e}", path.display()))
        })?;
        Self::from_toml_str(&text)
    }

    pub fn to_toml_string(&self) -> Result<String> {
        toml::to_string(self).map_err(|e| SequentialError::InvalidConfig(e.to_string()))
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct SetupConfig {
    pub offset: Period,
    pub length: Period,
}

impl Default for SetupConfig {
    fn default() -> Self {
        Self {
            offset: Period::new_const(4),
            length: Period::new_const(9),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct CountdownConfig {
    pub offset: Period,
    pub target: Period,
}

impl Default for CountdownConfig {
    fn default() -> Self {
        Self {
            offset: Period::new_const(2),
            target: Period::new_const(13),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct BacktestConfig {
    pub horizon: Period,
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            horizon: Period::new_const(10),
        }
    }
}

/// Bounded retry for price retrieval
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default, deny_unknown_fields)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    /// Delay before attempt n+1 is `backoff_ms * n`
    pub backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 3,
            backoff_ms: 500,
        }
    }
}

impl RetryPolicy {
    pub fn no_backoff(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            backoff_ms: 0,
        }
    }

    pub fn delay_after(&self, attempt: u32) -> Duration {
        Duration::from_millis(self.backoff_ms.saturating_mul(attempt as u64))
    }
}

/// History window requested from the price provider
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Lookback {
    #[default]
    #[serde(rename = "3mo")]
    ThreeMonths,
    #[serde(rename = "6mo")]
    SixMonths,
}

impl Lookback {
    pub fn months(self) -> u32 {
        match self {
            Lookback::ThreeMonths => 3,
            Lookback::SixMonths => 6,
        }
    }

    /// First calendar day of the window ending at `end`.
    pub fn start_date(self, end: NaiveDate) -> NaiveDate {
        end.checked_sub_months(Months::new(self.months()))
            .unwrap_or(NaiveDate::MIN)
    }
}
