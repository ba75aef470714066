//! # seqscan - sequential exhaustion scanner
//!
//! Detects a bearish 9-bar Setup followed by a 13-bar Countdown tally in a
//! series of daily closes, classifies where each symbol stands, and screens a
//! universe of symbols in parallel.
//!
//! ## Quick Start
//!
//! ```rust
//! use chrono::{Days, NaiveDate};
//! use seqscan::prelude::*;
//!
//! let start = NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
//! let bars: Vec<Bar> = (0..40)
//!     .map(|i| Bar::new(start + Days::new(i), 100.0 - i as f64))
//!     .collect();
//! let series = PriceSeries::new(bars).unwrap();
//!
//! let engine = EngineBuilder::new().build().unwrap();
//! let result = engine.analyze(&series).unwrap();
//!
//! assert_eq!(result.setups.len(), 4);
//! assert!(result.status.is_screenable());
//! ```

pub mod backtest;
pub mod classify;
pub mod config;
pub mod detectors;
pub mod params;
pub mod provider;
pub mod series;

pub mod prelude {
    pub use crate::{
        // Backtest
        backtest::{BacktestOutcome, Backtester},
        // Classification
        classify::{classify, classify_with_target, Status},
        // Config
        config::{EngineConfig, Lookback, RetryPolicy},
        // Detectors
        detectors::*,
        // Parallel
        analyze_parallel,
        screen_parallel,
        // Providers
        provider::{PriceProvider, RetrievalError, RetryingProvider, StaticProvider},
        // Data
        series::{Bar, PriceSeries},
        // Types
        AnalysisResult,
        DailyClose,
        Direction,
        EngineBuilder,
        Period,
        Result,
        ScreenEntry,
        ScreenError,
        ScreenReport,
        SequentialEngine,
        // Errors
        SequentialError,
        SetupEvent,
        SymbolAnalysis,
        UniverseMember,
    };
}

use std::cmp::Ordering;

use chrono::NaiveDate;

use backtest::{BacktestOutcome, Backtester};
use classify::{classify_with_target, Status};
use config::{EngineConfig, Lookback};
use detectors::{CountdownDetector, CountdownResult, SetupDetector};
use provider::{PriceProvider, RetrievalError};
use series::PriceSeries;

// ============================================================
// ERRORS
// ============================================================

pub type Result<T> = std::result::Result<T, SequentialError>;

/// Errors raised by the engine and its collaborators
#[derive(Debug, Clone, thiserror::Error)]
pub enum SequentialError {
    #[error("Invalid value: {0}")]
    InvalidValue(&'static str),

    #[error("{field} = {value} out of range [{min}, {max}]")]
    OutOfRange {
        field: &'static str,
        value: f64,
        min: f64,
        max: f64,
    },

    #[error("Invalid config: {0}")]
    InvalidConfig(String),

    #[error("Insufficient data: need {need} bars, got {got}")]
    InsufficientData { need: usize, got: usize },

    #[error("Unusable close at index {index}")]
    UnusableBar { index: usize },

    #[error("Bar at index {index} is earlier than its predecessor")]
    NonChronological { index: usize },

    #[error("Duplicate date {date} at index {index}")]
    DuplicateDate { index: usize, date: NaiveDate },

    #[error("No bar with a completed countdown")]
    NoSignal,

    #[error("Horizon of {horizon} bars from index {entry} exceeds series ({available} bars left)")]
    HorizonExceeded {
        entry: usize,
        horizon: usize,
        available: usize,
    },

    #[error(transparent)]
    Retrieval(#[from] RetrievalError),
}

// ============================================================
// VALIDATED TYPES
// ============================================================

/// Bar count (must be > 0)
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct Period(usize);

impl Period {
    /// Create a new Period, validating value is > 0
    pub fn new(value: usize) -> Result<Self> {
        if value == 0 {
            return Err(SequentialError::InvalidValue("Period must be > 0"));
        }
        Ok(Self(value))
    }

    #[doc(hidden)]
    pub const fn new_const(value: usize) -> Self {
        Self(value)
    }

    #[inline]
    pub fn get(self) -> usize {
        self.0
    }
}

impl serde::Serialize for Period {
    fn serialize<S: serde::Serializer>(&self, s: S) -> std::result::Result<S::Ok, S::Error> {
        self.0.serialize(s)
    }
}

impl<'de> serde::Deserialize<'de> for Period {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        let value = usize::deserialize(d)?;
        Period::new(value).map_err(serde::de::Error::custom)
    }
}

// ============================================================
// INPUT TRAIT
// ============================================================

/// Any row that carries a trading date and a close.
pub trait DailyClose {
    fn date(&self) -> NaiveDate;
    fn close(&self) -> f64;
}

impl<T: DailyClose> DailyClose for &T {
    fn date(&self) -> NaiveDate {
        (*self).date()
    }

    fn close(&self) -> f64 {
        (*self).close()
    }
}

// ============================================================
// RESULT TYPES
// ============================================================

/// Polarity of a Setup. Only the bearish side is detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, serde::Serialize, serde::Deserialize)]
pub enum Direction {
    Bearish,
}

impl Direction {
    #[inline]
    pub fn is_bearish(self) -> bool {
        matches!(self, Direction::Bearish)
    }
}

impl std::fmt::Display for Direction {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Direction::Bearish => f.write_str("Bearish"),
        }
    }
}

/// A completed Setup, recorded at the bar that finished the run
#[derive(Debug, Clone, Copy, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct SetupEvent {
    pub index: usize,
    pub direction: Direction,
}

/// Everything the engine derives from one series
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize)]
pub struct AnalysisResult {
    pub status: Status,
    pub setups: Vec<SetupEvent>,
    pub countdown: CountdownResult,
}

impl AnalysisResult {
    pub fn last_setup(&self) -> Option<&SetupEvent> {
        self.setups.last()
    }

    /// Direction of the Setup seeding the Countdown
    pub fn direction(&self) -> Option<Direction> {
        self.last_setup().map(|s| s.direction)
    }

    /// Stepped per-bar tally, see [`CountdownResult::per_bar_tallies`].
    pub fn per_bar_tallies(&self, len: usize) -> Vec<usize> {
        self.countdown.per_bar_tallies(len)
    }
}

// ============================================================
// ENGINE
// ============================================================

/// Setup, Countdown, classification and backtest behind one length gate
#[derive(Debug, Clone)]
pub struct SequentialEngine {
    setup: SetupDetector,
    countdown: CountdownDetector,
    backtester: Backtester,
    min_bars: usize,
}

impl SequentialEngine {
    #[inline]
    pub fn min_bars(&self) -> usize {
        self.min_bars
    }

    pub fn setup_detector(&self) -> &SetupDetector {
        &self.setup
    }

    pub fn countdown_detector(&self) -> &CountdownDetector {
        &self.countdown
    }

    pub fn backtester(&self) -> &Backtester {
        &self.backtester
    }

    /// Signal target the classifier compares the tally against.
    #[inline]
    pub fn signal_target(&self) -> usize {
        self.countdown.target.get()
    }

    /// Completed Setups, or `InsufficientData` for a short series.
    pub fn scan_setups(&self, series: &PriceSeries) -> Result<Vec<SetupEvent>> {
        self.check_length(series)?;
        Ok(self.setup.scan(series))
    }

    /// Countdown seeded by the last of `setups`.
    pub fn scan_countdown(&self, series: &PriceSeries, setups: &[SetupEvent]) -> CountdownResult {
        self.countdown.scan(series, setups)
    }

    pub fn classify(&self, setups: &[SetupEvent], countdown: &CountdownResult) -> Status {
        classify_with_target(setups, countdown, self.signal_target())
    }

    /// Run the full Setup -> Countdown -> Status pipeline on one series.
    pub fn analyze(&self, series: &PriceSeries) -> Result<AnalysisResult> {
        let setups = self.scan_setups(series)?;
        let countdown = self.scan_countdown(series, &setups);
        let status = self.classify(&setups, &countdown);

        Ok(AnalysisResult {
            status,
            setups,
            countdown,
        })
    }

    /// Forward return from the last bar reading the signal target.
    pub fn backtest(
        &self,
        series: &PriceSeries,
        result: &AnalysisResult,
    ) -> Result<BacktestOutcome> {
        self.backtester
            .backtest(series, &result.per_bar_tallies(series.len()))
    }

    fn check_length(&self, series: &PriceSeries) -> Result<()> {
        if series.len() < self.min_bars {
            tracing::debug!(
                got = series.len(),
                need = self.min_bars,
                "series too short for analysis"
            );
            return Err(SequentialError::InsufficientData {
                need: self.min_bars,
                got: series.len(),
            });
        }
        Ok(())
    }

    fn validate(&self) -> Result<()> {
        self.setup.validate_config()?;
        self.countdown.validate_config()?;
        if self.min_bars < self.setup.min_bars() {
            return Err(SequentialError::InvalidConfig(format!(
                "min_bars {} is below the {} bars one setup comparison needs",
                self.min_bars,
                self.setup.min_bars()
            )));
        }
        if self.backtester.target != self.signal_target() {
            return Err(SequentialError::InvalidConfig(format!(
                "backtest target {} differs from countdown target {}",
                self.backtester.target,
                self.signal_target()
            )));
        }
        Ok(())
    }
}

// ============================================================
// BUILDER
// ============================================================

/// Builder for [`SequentialEngine`]
#[derive(Debug, Clone)]
pub struct EngineBuilder {
    setup: SetupDetector,
    countdown: CountdownDetector,
    horizon: Period,
    min_bars: usize,
}

impl Default for EngineBuilder {
    fn default() -> Self {
        Self::new()
    }
}

impl EngineBuilder {
    pub fn new() -> Self {
        Self::from_config(&EngineConfig::default())
    }

    pub fn from_config(config: &EngineConfig) -> Self {
        Self {
            setup: SetupDetector::new(config.setup.offset, config.setup.length),
            countdown: CountdownDetector::new(config.countdown.offset, config.countdown.target),
            horizon: config.backtest.horizon,
            min_bars: config.min_bars,
        }
    }

    pub fn setup(mut self, detector: SetupDetector) -> Self {
        self.setup = detector;
        self
    }

    pub fn countdown(mut self, detector: CountdownDetector) -> Self {
        self.countdown = detector;
        self
    }

    /// Minimum series length accepted by `analyze`
    pub fn min_bars(mut self, n: usize) -> Self {
        self.min_bars = n;
        self
    }

    /// Bars between backtest entry and exit
    pub fn horizon(mut self, horizon: Period) -> Self {
        self.horizon = horizon;
        self
    }

    /// Build the engine
    pub fn build(self) -> Result<SequentialEngine> {
        let engine = SequentialEngine {
            backtester: Backtester::new(self.horizon, self.countdown.target.get()),
            setup: self.setup,
            countdown: self.countdown,
            min_bars: self.min_bars,
        };
        engine.validate()?;
        Ok(engine)
    }
}

// ============================================================
// PARALLEL SCREENING
// ============================================================

use rayon::prelude::*;

/// Result of analysing a single instrument
#[derive(Debug, Clone)]
pub struct SymbolAnalysis {
    pub symbol: String,
    pub analysis: AnalysisResult,
}

/// Error from a single instrument; never aborts the batch
#[derive(Debug, Clone)]
pub struct ScreenError {
    pub symbol: String,
    pub error: SequentialError,
}

/// Parallel analysis of already-fetched series
pub fn analyze_parallel<'a, I>(
    engine: &SequentialEngine,
    instruments: I,
) -> (Vec<SymbolAnalysis>, Vec<ScreenError>)
where
    I: IntoParallelIterator<Item = (&'a str, &'a PriceSeries)>,
{
    let results: Vec<_> = instruments
        .into_par_iter()
        .map(|(symbol, series)| {
            engine
                .analyze(series)
                .map(|analysis| SymbolAnalysis {
                    symbol: symbol.to_string(),
                    analysis,
                })
                .map_err(|error| ScreenError {
                    symbol: symbol.to_string(),
                    error,
                })
        })
        .collect();

    let mut successes = Vec::new();
    let mut errors = Vec::new();

    for result in results {
        match result {
            Ok(r) => successes.push(r),
            Err(e) => errors.push(e),
        }
    }

    (successes, errors)
}

/// One symbol of the universe to screen. Sector and market cap come from
/// whatever listing the caller uses.
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct UniverseMember {
    pub symbol: String,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
}

impl UniverseMember {
    pub fn new(symbol: impl Into<String>) -> Self {
        Self {
            symbol: symbol.into(),
            sector: None,
            market_cap: None,
        }
    }

    pub fn with_sector(mut self, sector: impl Into<String>) -> Self {
        self.sector = Some(sector.into());
        self
    }

    pub fn with_market_cap(mut self, cap: f64) -> Self {
        self.market_cap = Some(cap);
        self
    }
}

/// A symbol that passed the screen
#[derive(Debug, Clone, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct ScreenEntry {
    pub symbol: String,
    pub sector: Option<String>,
    pub market_cap: Option<f64>,
    pub analysis: AnalysisResult,
}

impl ScreenEntry {
    #[inline]
    pub fn status(&self) -> Status {
        self.analysis.status
    }

    #[inline]
    pub fn direction(&self) -> Option<Direction> {
        self.analysis.direction()
    }
}

/// Outcome of one screening run, held by the caller
#[derive(Debug, Clone, Default)]
pub struct ScreenReport {
    /// Screenable symbols, largest market cap first, unknown caps last
    pub entries: Vec<ScreenEntry>,
    /// Symbols whose fetch or analysis failed
    pub failures: Vec<ScreenError>,
    /// Symbols analysed without a completed Setup
    pub excluded: usize,
}

impl ScreenReport {
    pub fn in_sector<'a>(&'a self, sector: &'a str) -> impl Iterator<Item = &'a ScreenEntry> + 'a {
        self.entries
            .iter()
            .filter(move |e| e.sector.as_deref() == Some(sector))
    }

    /// Distinct sectors present in the entries, sorted
    pub fn sectors(&self) -> Vec<&str> {
        let mut sectors: Vec<&str> = self
            .entries
            .iter()
            .filter_map(|e| e.sector.as_deref())
            .collect();
        sectors.sort_unstable();
        sectors.dedup();
        sectors
    }

    pub fn signals(&self) -> impl Iterator<Item = &ScreenEntry> {
        self.entries.iter().filter(|e| e.status().is_signal())
    }

    pub fn get(&self, symbol: &str) -> Option<&ScreenEntry> {
        self.entries.iter().find(|e| e.symbol == symbol)
    }
}

enum Screened {
    Entry(ScreenEntry),
    Excluded,
    Failed(ScreenError),
}

/// Fetch, analyse and filter every member of `universe` in parallel.
pub fn screen_parallel<P: PriceProvider>(
    engine: &SequentialEngine,
    provider: &P,
    lookback: Lookback,
    universe: &[UniverseMember],
) -> ScreenReport {
    let outcomes: Vec<Screened> = universe
        .par_iter()
        .map(|member| {
            let analysis = provider
                .fetch(&member.symbol, lookback)
                .map_err(SequentialError::from)
                .and_then(|series| engine.analyze(&series));

            match analysis {
                Ok(analysis) if analysis.status.is_screenable() => Screened::Entry(ScreenEntry {
                    symbol: member.symbol.clone(),
                    sector: member.sector.clone(),
                    market_cap: member.market_cap,
                    analysis,
                }),
                Ok(_) => Screened::Excluded,
                Err(error) => {
                    tracing::debug!(symbol = %member.symbol, error = %error, "symbol skipped");
                    Screened::Failed(ScreenError {
                        symbol: member.symbol.clone(),
                        error,
                    })
                }
            }
        })
        .collect();

    let mut report = ScreenReport::default();
    for outcome in outcomes {
        match outcome {
            Screened::Entry(e) => report.entries.push(e),
            Screened::Excluded => report.excluded += 1,
            Screened::Failed(e) => report.failures.push(e),
        }
    }
    report.entries.sort_by(by_market_cap_desc);

    tracing::info!(
        provider = provider.name(),
        universe = universe.len(),
        matched = report.entries.len(),
        excluded = report.excluded,
        failed = report.failures.len(),
        "screen complete"
    );

    report
}

fn by_market_cap_desc(a: &ScreenEntry, b: &ScreenEntry) -> Ordering {
    match (a.market_cap, b.market_cap) {
        (Some(x), Some(y)) => y.total_cmp(&x),
        (Some(_), None) => Ordering::Less,
        (None, Some(_)) => Ordering::Greater,
        (None, None) => a.symbol.cmp(&b.symbol),
    }
}

// ============================================================
// TESTS
// ============================================================
