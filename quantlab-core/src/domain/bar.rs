//! Bar: the fundamental market data unit.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// One day's OHLCV record.
///
/// Bars are immutable once loaded and are always handled as a slice ordered
/// ascending by date. The symbol lives with the series, not with each bar.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub date: NaiveDate,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: u64,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("bar series is empty")]
    Empty,

    #[error("bars out of order at index {index}: {date} does not follow {previous}")]
    OutOfOrder {
        index: usize,
        previous: NaiveDate,
        date: NaiveDate,
    },
}

impl Bar {
    /// Returns true if any OHLC field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Basic OHLC sanity check: high bounds the body, low bounds it from below.
    pub fn is_sane(&self) -> bool {
        if self.is_void() {
            return false;
        }
        self.high >= self.low
            && self.high >= self.open
            && self.high >= self.close
            && self.low <= self.open
            && self.low <= self.close
            && self.close > 0.0
    }
}

/// Check that a series is non-empty and strictly ascending by date.
pub fn validate_series(bars: &[Bar]) -> Result<(), BarError> {
    if bars.is_empty() {
        return Err(BarError::Empty);
    }
    for (i, pair) in bars.windows(2).enumerate() {
        if pair[1].date <= pair[0].date {
            return Err(BarError::OutOfOrder {
                index: i + 1,
                previous: pair[0].date,
                date: pair[1].date,
            });
        }
    }
    Ok(())
}
