//! Technical indicators.
//!
//! Every indicator implements [`Indicator`]: a pure function from a bar series to a
//! numeric series of the same length, with `f64::NAN` during warmup. Indicators are
//! built from an [`IndicatorRequest`] through [`build`], computed once per
//! (symbol, request) by the indicator cache, and handed to strategies through
//! [`IndicatorValues`].
//!
//! # Look-ahead contamination guard
//! No value at bar t may depend on bar t+1 or later. Every indicator must pass the
//! truncated-vs-full series test in `tests/lookahead_test.rs`.

pub mod atr;
pub mod donchian;
pub mod ema;
pub mod momentum;
pub mod roc;
pub mod roc_percentile;
pub mod rsi;
pub mod sma;

pub use atr::Atr;
pub use donchian::{Donchian, DonchianBand};
pub use ema::Ema;
pub use momentum::Momentum;
pub use roc::Roc;
pub use roc_percentile::RocPercentile;
pub use rsi::Rsi;
pub use sma::Sma;

use std::collections::HashMap;

use thiserror::Error;

use crate::domain::Bar;
use crate::fingerprint::{IndicatorRequest, SeriesKey};

/// Period used when a request carries no `period` parameter.
pub const DEFAULT_PERIOD: usize = 14;

/// Indicator names accepted by [`build`].
pub const SUPPORTED: &[&str] = &[
    "SMA",
    "EMA",
    "RSI",
    "ATR",
    "MOMENTUM",
    "ROC",
    "ROC_PERCENTILE",
    "DONCHIAN_HIGH",
    "DONCHIAN_LOW",
];

/// Trait for indicators.
pub trait Indicator: Send + Sync {
    /// Human-readable name (e.g., "sma_20", "atr_14").
    fn name(&self) -> &str;

    /// Number of leading bars without a defined value.
    fn lookback(&self) -> usize;

    /// Compute the indicator for the entire bar series.
    ///
    /// Returns a `Vec<f64>` of the same length as `bars`; warmup values are NaN.
    fn compute(&self, bars: &[Bar]) -> Vec<f64>;
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum IndicatorError {
    #[error("unknown indicator '{0}'")]
    UnknownIndicator(String),

    #[error("invalid parameter {param}={value} for {indicator}: {reason}")]
    InvalidParam {
        indicator: String,
        param: String,
        value: f64,
        reason: &'static str,
    },
}

/// Build an indicator from a request.
pub fn build(request: &IndicatorRequest) -> Result<Box<dyn Indicator>, IndicatorError> {
    let name = request.canonical_name();
    if !SUPPORTED.contains(&name.as_str()) {
        return Err(IndicatorError::UnknownIndicator(request.name.clone()));
    }
    let period = period_param(&name, request)?;
    let indicator: Box<dyn Indicator> = match name.as_str() {
        "SMA" => Box::new(Sma::new(period)),
        "EMA" => Box::new(Ema::new(period)),
        "RSI" => Box::new(Rsi::new(period)),
        "ATR" => Box::new(Atr::new(period)),
        "MOMENTUM" => Box::new(Momentum::new(period)),
        "ROC" => Box::new(Roc::new(period)),
        "ROC_PERCENTILE" => Box::new(RocPercentile::new(
            period,
            percentile_param(&name, request)?,
            integer_param(&name, request, "min_history", 1)?,
        )),
        "DONCHIAN_HIGH" => Box::new(Donchian::upper(period)),
        "DONCHIAN_LOW" => Box::new(Donchian::lower(period)),
        _ => return Err(IndicatorError::UnknownIndicator(request.name.clone())),
    };
    Ok(indicator)
}

fn period_param(indicator: &str, request: &IndicatorRequest) -> Result<usize, IndicatorError> {
    let param = if request.params.contains_key("period") || !request.params.contains_key("lookback") {
        "period"
    } else {
        "lookback"
    };
    integer_param(indicator, request, param, DEFAULT_PERIOD)
}

fn invalid_param(indicator: &str, param: &str, value: f64, reason: &'static str) -> IndicatorError {
    IndicatorError::InvalidParam {
        indicator: indicator.to_string(),
        param: param.to_string(),
        value,
        reason,
    }
}

fn percentile_param(indicator: &str, request: &IndicatorRequest) -> Result<f64, IndicatorError> {
    let Some(&value) = request.params.get("percentile") else {
        return Ok(70.0);
    };
    if !(0.0..=100.0).contains(&value) {
        return Err(invalid_param(indicator, "percentile", value, "must be in [0, 100]"));
    }
    Ok(value)
}

fn integer_param(
    indicator: &str,
    request: &IndicatorRequest,
    param: &str,
    default: usize,
) -> Result<usize, IndicatorError> {
    let Some(&value) = request.params.get(param) else {
        return Ok(default);
    };
    let invalid = |reason| invalid_param(indicator, param, value, reason);
    if !value.is_finite() {
        return Err(invalid("must be finite"));
    }
    if value < 1.0 {
        return Err(invalid("must be >= 1"));
    }
    if value.fract() != 0.0 {
        return Err(invalid("must be an integer"));
    }
    Ok(value as usize)
}

/// Container for precomputed indicator series, keyed by [`SeriesKey`].
///
/// Built once before the bar loop, then queried by bar index during the loop.
#[derive(Debug, Clone, Default)]
pub struct IndicatorValues {
    series: HashMap<SeriesKey, Vec<f64>>,
}

impl IndicatorValues {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn insert(&mut self, key: SeriesKey, values: Vec<f64>) {
        self.series.insert(key, values);
    }

    /// Value at a bar index. `None` when the series is missing or the index is out of range;
    /// warmup values come back as `Some(NaN)`.
    pub fn get(&self, key: &SeriesKey, bar_index: usize) -> Option<f64> {
        self.series.get(key).and_then(|v| v.get(bar_index).copied())
    }

    pub fn get_series(&self, key: &SeriesKey) -> Option<&[f64]> {
        self.series.get(key).map(|v| v.as_slice())
    }

    pub fn contains(&self, key: &SeriesKey) -> bool {
        self.series.contains_key(key)
    }

    pub fn keys(&self) -> impl Iterator<Item = &SeriesKey> {
        self.series.keys()
    }

    pub fn len(&self) -> usize {
        self.series.len()
    }

    pub fn is_empty(&self) -> bool {
        self.series.is_empty()
    }
}

/// Create synthetic bars from close prices for testing.
///
/// open = prev_close (or close for the first bar), high = max(open, close) + 1,
/// low = min(open, close) - 1, volume = 1000.
#[cfg(test)]
pub fn make_bars(closes: &[f64]) -> Vec<Bar> {
    let base_date = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                date: base_date + chrono::Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: open.min(close) - 1.0,
                close,
                volume: 1000,
            }
        })
        .collect()
}

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
