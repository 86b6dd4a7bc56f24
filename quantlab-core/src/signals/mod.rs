//! Strategy signal generation.
//!
//! A strategy sees the bars up to and including the current index through a
//! [`History`] and answers with a [`Decision`]. `History` is the only way in:
//! its bar slice ends at the current bar and its indicator lookups stop there
//! too, so a strategy cannot read the future even by accident.
//!
//! Strategies are a closed set ([`Strategy`]). Each variant declares the
//! indicator series it needs; the engine has them computed by the indicator
//! cache before the bar loop starts.

pub mod donchian;
pub mod momentum;
pub mod sma_cross;
pub mod trend_following;

pub use donchian::DonchianBreakout;
pub use momentum::MomentumThreshold;
pub use sma_cross::SmaCross;
pub use trend_following::TrendFollowing;

use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::Bar;
use crate::fingerprint::{IndicatorRequest, SeriesKey};
use crate::indicators::IndicatorValues;

/// What the strategy wants done at the current bar.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum Action {
    EnterLong,
    EnterShort,
    Exit,
    Hold,
}

/// An action plus the stop the strategy suggests for a new entry.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Decision {
    pub action: Action,
    pub stop_price: Option<f64>,
}

impl Decision {
    pub fn hold() -> Self {
        Self {
            action: Action::Hold,
            stop_price: None,
        }
    }

    pub fn exit() -> Self {
        Self {
            action: Action::Exit,
            stop_price: None,
        }
    }

    pub fn enter_long(stop_price: f64) -> Self {
        Self {
            action: Action::EnterLong,
            stop_price: Some(stop_price),
        }
    }

    pub fn enter_short(stop_price: f64) -> Self {
        Self {
            action: Action::EnterShort,
            stop_price: Some(stop_price),
        }
    }
}

/// Current position direction, as seen by a strategy.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Exposure {
    Flat,
    Long,
    Short,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SignalError {
    #[error("strategy dependency missing: indicator series {0} was never computed")]
    MissingIndicator(SeriesKey),

    #[error("invalid parameter {param}={value} for {strategy}: {reason}")]
    InvalidParam {
        strategy: &'static str,
        param: String,
        value: f64,
        reason: &'static str,
    },

    #[error("unknown strategy type '{0}'")]
    UnknownStrategy(String),
}

// ─── History view ───────────────────────────────────────────────────

/// Read-only view of the data visible at bar `t`.
#[derive(Debug, Clone, Copy)]
pub struct History<'a> {
    bars: &'a [Bar],
    indicators: &'a IndicatorValues,
}

impl<'a> History<'a> {
    /// View of `bars[..=t]`. Returns `None` if `t` is out of range.
    pub fn at(bars: &'a [Bar], indicators: &'a IndicatorValues, t: usize) -> Option<Self> {
        (t < bars.len()).then(|| Self {
            bars: &bars[..=t],
            indicators,
        })
    }

    /// Index of the current bar.
    pub fn index(&self) -> usize {
        self.bars.len() - 1
    }

    pub fn current(&self) -> &'a Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    /// Series for `key`, truncated to the current bar.
    pub fn series(&self, key: &SeriesKey) -> Result<&'a [f64], SignalError> {
        let series = self
            .indicators
            .get_series(key)
            .ok_or_else(|| SignalError::MissingIndicator(key.clone()))?;
        Ok(&series[..self.bars.len().min(series.len())])
    }

    /// Value of `key` `back` bars before the current one (0 = current bar).
    ///
    /// `Ok(None)` during warmup or before the first bar; `Err` if the series is missing.
    pub fn value(&self, key: &SeriesKey, back: usize) -> Result<Option<f64>, SignalError> {
        let series = self.series(key)?;
        let Some(idx) = self.index().checked_sub(back) else {
            return Ok(None);
        };
        Ok(series.get(idx).copied().filter(|v| !v.is_nan()))
    }
}

// ─── Trait ──────────────────────────────────────────────────────────

/// Trait for strategy evaluators.
pub trait SignalGenerator: Send + Sync {
    /// Human-readable name (e.g., "sma_cross").
    fn name(&self) -> &str;

    /// Indicator series this strategy reads.
    fn required_indicators(&self) -> Vec<IndicatorRequest>;

    /// Decide what to do at the current bar of `history` given the current exposure.
    fn evaluate(&self, history: &History<'_>, exposure: Exposure) -> Result<Decision, SignalError>;
}

// ─── Strategy variants ──────────────────────────────────────────────

/// Strategy selector, as it appears in run configuration.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StrategyType {
    SmaCross,
    #[serde(alias = "donchian")]
    DonchianBreakout,
    #[serde(alias = "momentum")]
    MomentumThreshold,
    TrendFollowing,
}

impl StrategyType {
    pub fn as_str(self) -> &'static str {
        match self {
            StrategyType::SmaCross => "sma_cross",
            StrategyType::DonchianBreakout => "donchian_breakout",
            StrategyType::MomentumThreshold => "momentum_threshold",
            StrategyType::TrendFollowing => "trend_following",
        }
    }
}

impl fmt::Display for StrategyType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for StrategyType {
    type Err = SignalError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sma_cross" => Ok(StrategyType::SmaCross),
            "donchian_breakout" | "donchian" => Ok(StrategyType::DonchianBreakout),
            "momentum_threshold" | "momentum" => Ok(StrategyType::MomentumThreshold),
            "trend_following" => Ok(StrategyType::TrendFollowing),
            _ => Err(SignalError::UnknownStrategy(s.to_string())),
        }
    }
}

/// The closed set of strategies the engine can run.
#[derive(Debug, Clone, PartialEq)]
pub enum Strategy {
    SmaCross(SmaCross),
    DonchianBreakout(DonchianBreakout),
    MomentumThreshold(MomentumThreshold),
    TrendFollowing(TrendFollowing),
}

impl Strategy {
    /// Build a strategy from its type and a flat parameter map.
    ///
    /// Missing keys take the variant's defaults; unknown keys are ignored.
    pub fn from_params(
        kind: StrategyType,
        params: &BTreeMap<String, f64>,
    ) -> Result<Self, SignalError> {
        let params = Params(params);
        Ok(match kind {
            StrategyType::SmaCross => Strategy::SmaCross(SmaCross::from_params(&params)?),
            StrategyType::DonchianBreakout => {
                Strategy::DonchianBreakout(DonchianBreakout::from_params(&params)?)
            }
            StrategyType::MomentumThreshold => {
                Strategy::MomentumThreshold(MomentumThreshold::from_params(&params)?)
            }
            StrategyType::TrendFollowing => {
                Strategy::TrendFollowing(TrendFollowing::from_params(&params)?)
            }
        })
    }

    pub fn kind(&self) -> StrategyType {
        match self {
            Strategy::SmaCross(_) => StrategyType::SmaCross,
            Strategy::DonchianBreakout(_) => StrategyType::DonchianBreakout,
            Strategy::MomentumThreshold(_) => StrategyType::MomentumThreshold,
            Strategy::TrendFollowing(_) => StrategyType::TrendFollowing,
        }
    }

    fn inner(&self) -> &dyn SignalGenerator {
        match self {
            Strategy::SmaCross(s) => s,
            Strategy::DonchianBreakout(s) => s,
            Strategy::MomentumThreshold(s) => s,
            Strategy::TrendFollowing(s) => s,
        }
    }
}

impl SignalGenerator for Strategy {
    fn name(&self) -> &str {
        self.inner().name()
    }

    fn required_indicators(&self) -> Vec<IndicatorRequest> {
        self.inner().required_indicators()
    }

    fn evaluate(&self, history: &History<'_>, exposure: Exposure) -> Result<Decision, SignalError> {
        self.inner().evaluate(history, exposure)
    }
}

// ─── Parameter helpers ──────────────────────────────────────────────

/// Typed access to a strategy's flat `name -> f64` parameter map.
pub(crate) struct Params<'a>(&'a BTreeMap<String, f64>);

impl Params<'_> {
    pub(crate) fn number(&self, key: &str, default: f64) -> f64 {
        self.0.get(key).copied().unwrap_or(default)
    }

    /// A positive integer window length.
    pub(crate) fn period(
        &self,
        strategy: &'static str,
        key: &str,
        default: usize,
    ) -> Result<usize, SignalError> {
        let value = self.number(key, default as f64);
        if !value.is_finite() || value < 1.0 || value.fract() != 0.0 {
            return Err(SignalError::InvalidParam {
                strategy,
                param: key.to_string(),
                value,
                reason: "must be a positive integer",
            });
        }
        Ok(value as usize)
    }

    /// A fraction strictly inside (0, 1).
    pub(crate) fn fraction(
        &self,
        strategy: &'static str,
        key: &str,
        default: f64,
    ) -> Result<f64, SignalError> {
        let value = self.number(key, default);
        if !(value > 0.0 && value < 1.0) {
            return Err(SignalError::InvalidParam {
                strategy,
                param: key.to_string(),
                value,
                reason: "must be in (0, 1)",
            });
        }
        Ok(value)
    }

    /// Boolean flag: any nonzero value is true.
    pub(crate) fn flag(&self, key: &str) -> bool {
        self.0.get(key).is_some_and(|&v| v != 0.0)
    }
}

/// Fixed-percentage stop on the protective side of `close`.
pub(crate) fn percent_stop(close: f64, stop_pct: f64, action: Action) -> Decision {
    match action {
        Action::EnterLong => Decision::enter_long(close * (1.0 - stop_pct)),
        Action::EnterShort => Decision::enter_short(close * (1.0 + stop_pct)),
        Action::Exit => Decision::exit(),
        Action::Hold => Decision::hold(),
    }
}

/// Build a bar series from closes, for strategy tests.
#[cfg(test)]
pub(crate) fn test_bars(closes: &[f64]) -> Vec<Bar> {
    let base = chrono::NaiveDate::from_ymd_opt(2024, 1, 2).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: base + chrono::Duration::days(i as i64),
            open: close,
            high: close + 1.0,
            low: close - 1.0,
            close,
            volume: 1000,
        })
        .collect()
}

/// Compute every series a strategy needs, for strategy tests.
#[cfg(test)]
pub(crate) fn test_indicators(strategy: &dyn SignalGenerator, bars: &[Bar]) -> IndicatorValues {
    let mut values = IndicatorValues::new();
    for request in strategy.required_indicators() {
        let series = crate::indicators::build(&request).unwrap().compute(bars);
        values.insert(request.key(), series);
    }
    values
}

/// Evaluate at every bar, carrying exposure forward the way a simulator would.
#[cfg(test)]
pub(crate) fn replay(strategy: &dyn SignalGenerator, bars: &[Bar]) -> Vec<Action> {
    let values = test_indicators(strategy, bars);
    let mut exposure = Exposure::Flat;
    (0..bars.len())
        .map(|t| {
            let history = History::at(bars, &values, t).unwrap();
            let action = strategy.evaluate(&history, exposure).unwrap().action;
            exposure = match action {
                Action::EnterLong => Exposure::Long,
                Action::EnterShort => Exposure::Short,
                Action::Exit => Exposure::Flat,
                Action::Hold => exposure,
            };
            action
        })
        .collect()
}
