//! Price retrieval capability.
//!
//! The engine never fetches data itself. Callers hand it a [`PriceSeries`]
//! obtained through a [`PriceProvider`]; network providers are expected to be
//! wrapped in a [`RetryingProvider`] so transient failures are retried a
//! bounded number of times before the symbol is given up on.

use std::collections::HashMap;

use thiserror::Error;

use crate::{
    config::{EngineConfig, Lookback, RetryPolicy},
    series::PriceSeries,
};

#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RetrievalError {
    #[error("symbol not found: {symbol}")]
    SymbolNotFound { symbol: String },

    #[error("provider unavailable: {0}")]
    Unavailable(String),

    #[error("gave up on {symbol} after {attempts} attempts: {last}")]
    Exhausted {
        symbol: String,
        attempts: u32,
        last: String,
    },
}

impl RetrievalError {
    /// Transient failures worth another attempt.
    pub fn is_retryable(&self) -> bool {
        matches!(self, RetrievalError::Unavailable(_))
    }
}

/// Source of daily close history for one symbol.
pub trait PriceProvider: Send + Sync {
    fn name(&self) -> &str;

    /// Fetch daily closes for `symbol` covering `lookback`.
    ///
    /// An empty or short series is a valid answer; the engine decides whether
    /// it is long enough.
    fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries, RetrievalError>;
}

/// Wraps a provider with bounded retries and linear backoff.
pub struct RetryingProvider<P> {
    inner: P,
    policy: RetryPolicy,
}

impl<P: PriceProvider> RetryingProvider<P> {
    pub fn new(inner: P, policy: RetryPolicy) -> Self {
        Self { inner, policy }
    }

    /// Wrap `inner` with the `[retry]` section of `config`.
    pub fn from_config(inner: P, config: &EngineConfig) -> Self {
        Self::new(inner, config.retry.clone())
    }

    pub fn inner(&self) -> &P {
        &self.inner
    }
}

impl<P: PriceProvider> PriceProvider for RetryingProvider<P> {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn fetch(&self, symbol: &str, lookback: Lookback) -> Result<PriceSeries, RetrievalError> {
        let attempts = self.policy.max_attempts.max(1);
        let mut last = None;

        for attempt in 1..=attempts {
            match self.inner.fetch(symbol, lookback) {
                Ok(series) => return Ok(series),
                Err(e) if !e.is_retryable() => return Err(e),
                Err(e) => {
                    tracing::warn!(
                        provider = self.inner.name(),
                        symbol,
                        attempt,
                        max_attempts = attempts,
                        error = %e,
                        "price fetch failed"
                    );
                    last = Some(e);
                    if attempt < attempts {
                        std::thread::sleep(self.policy.delay_after(attempt));
                    }
                }
            }
        }

        Err(RetrievalError::Exhausted {
            symbol: symbol.to_string(),
            attempts,
            last: last.map(|e| e.to_string()).unwrap_or_default(),
        })
    }
}

/// In-memory provider keyed by symbol. Ignores the lookback.
#[derive(Debug, Clone, Default)]
pub struct StaticProvider {
    series: HashMap<String, PriceSeries>,
}

impl StaticProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_series(mut self, symbol: impl Into<String>, series: PriceSeries) -> Self {
        self.series.insert(symbol.into(), series);
        self
    }

    pub fn insert(&mut self, symbol: impl Into<String>, series: PriceSeries) {
        self.series.insert(symbol.into(), series);
    }
}

impl PriceProvider for StaticProvider {
    fn name(&self) -> &str {
        "static"
    }

    fn fetch(&self, symbol: &str, _lookback: Lookback) -> Result<PriceSeries, RetrievalError> {
        self.series
            .get(symbol)
            .cloned()
            .ok_or_else(|| RetrievalError::SymbolNotFound {
                symbol: symbol.to_string(),
            })
    }
}
