//! Daily close series
//!
//! A [`PriceSeries`] is the only input the scanners read. It is built once,
//! validated for chronological order, and never mutated afterwards.

use chrono::NaiveDate;

use crate::{DailyClose, Result, SequentialError};

/// One trading day. Only the close is used by the engine.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    /// NaN or infinite means the provider had no usable value for this day
    pub close: f64,
}

impl Bar {
    pub fn new(date: NaiveDate, close: f64) -> Self {
        Self { date, close }
    }

    #[inline]
    pub fn is_usable(&self) -> bool {
        self.close.is_finite()
    }
}

impl DailyClose for Bar {
    fn date(&self) -> NaiveDate {
        self.date
    }

    fn close(&self) -> f64 {
        self.close
    }
}

/// Strictly ascending, de-duplicated sequence of daily bars.
#[derive(Debug, Clone, Default, PartialEq, serde::Serialize)]
pub struct PriceSeries {
    bars: Vec<Bar>,
}

impl PriceSeries {
    /// Build a series, rejecting out-of-order or repeated dates.
    pub fn new(bars: Vec<Bar>) -> Result<Self> {
        for (i, pair) in bars.windows(2).enumerate() {
            let (prev, cur) = (pair[0].date, pair[1].date);
            if cur == prev {
                return Err(SequentialError::DuplicateDate {
                    index: i + 1,
                    date: cur,
                });
            }
            if cur < prev {
                return Err(SequentialError::NonChronological { index: i + 1 });
            }
        }
        Ok(Self { bars })
    }

    /// Build a series from caller-defined rows.
    pub fn from_rows<T, I>(rows: I) -> Result<Self>
    where
        T: DailyClose,
        I: IntoIterator<Item = T>,
    {
        Self::new(
            rows.into_iter()
                .map(|r| Bar::new(r.date(), r.close()))
                .collect(),
        )
    }

    /// Sort by date and keep the last row seen for any repeated date.
    ///
    /// Providers that stitch several downloads together use this instead of
    /// [`PriceSeries::new`].
    pub fn normalized(mut bars: Vec<Bar>) -> Self {
        // stable sort keeps arrival order within a date
        bars.sort_by_key(|b| b.date);
        let mut out: Vec<Bar> = Vec::with_capacity(bars.len());
        for bar in bars {
            match out.last_mut() {
                Some(last) if last.date == bar.date => *last = bar,
                _ => out.push(bar),
            }
        }
        Self { bars: out }
    }

    #[inline]
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    #[inline]
    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    #[inline]
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }

    pub fn first_date(&self) -> Option<NaiveDate> {
        self.bars.first().map(|b| b.date)
    }

    pub fn last_date(&self) -> Option<NaiveDate> {
        self.bars.last().map(|b| b.date)
    }

    /// Close at `index`, or `UnusableBar` when missing, non-finite or out of range.
    #[inline]
    pub fn usable_close(&self, index: usize) -> Result<f64> {
        match self.bars.get(index) {
            Some(bar) if bar.is_usable() => Ok(bar.close),
            _ => Err(SequentialError::UnusableBar { index }),
        }
    }
}

impl<'de> serde::Deserialize<'de> for PriceSeries {
    fn deserialize<D: serde::Deserializer<'de>>(d: D) -> std::result::Result<Self, D::Error> {
        #[derive(serde::Deserialize)]
        struct Raw {
            bars: Vec<Bar>,
        }
        let raw = Raw::deserialize(d)?;
        PriceSeries::new(raw.bars).map_err(serde::de::Error::custom)
    }
}
