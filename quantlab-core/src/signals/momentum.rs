//! Momentum threshold: trailing return against its own percentile.
//!
//! The trailing return is ROC(lookback). The threshold is the `percentile`-th
//! percentile of every ROC value observed up to and including the current bar
//! (an expanding window, so later returns never leak into earlier thresholds),
//! read from the precomputed ROC_PERCENTILE series.
//! State is +1 above the threshold, −1 below its negation, 0 otherwise.

use super::{
    percent_stop, Action, Decision, Exposure, History, Params, SignalError, SignalGenerator,
};
use crate::fingerprint::{IndicatorRequest, SeriesKey};

#[derive(Debug, Clone, PartialEq)]
pub struct MomentumThreshold {
    pub lookback: usize,
    pub percentile: f64,
    pub min_history: usize,
    pub stop_pct: f64,
    pub allow_short: bool,
    roc_key: SeriesKey,
    threshold_key: SeriesKey,
}

impl MomentumThreshold {
    const NAME: &'static str = "momentum_threshold";

    pub fn new(
        lookback: usize,
        percentile: f64,
        min_history: usize,
        stop_pct: f64,
        allow_short: bool,
    ) -> Self {
        Self {
            lookback,
            percentile,
            min_history,
            stop_pct,
            allow_short,
            roc_key: roc_request(lookback).key(),
            threshold_key: threshold_request(lookback, percentile, min_history).key(),
        }
    }

    pub(crate) fn from_params(p: &Params<'_>) -> Result<Self, SignalError> {
        let percentile = p.number("percentile", p.number("percentile_threshold", 70.0));
        if !(0.0..=100.0).contains(&percentile) {
            return Err(SignalError::InvalidParam {
                strategy: Self::NAME,
                param: "percentile".into(),
                value: percentile,
                reason: "must be in [0, 100]",
            });
        }
        Ok(Self::new(
            p.period(Self::NAME, "lookback", 60)?,
            percentile,
            p.period(Self::NAME, "min_history", 20)?,
            p.fraction(Self::NAME, "stop_pct", 0.05)?,
            p.flag("allow_short"),
        ))
    }
}

fn roc_request(lookback: usize) -> IndicatorRequest {
    IndicatorRequest::new("ROC").param("period", lookback as f64)
}

fn threshold_request(lookback: usize, percentile: f64, min_history: usize) -> IndicatorRequest {
    IndicatorRequest::new("ROC_PERCENTILE")
        .param("period", lookback as f64)
        .param("percentile", percentile)
        .param("min_history", min_history as f64)
}

impl SignalGenerator for MomentumThreshold {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_indicators(&self) -> Vec<IndicatorRequest> {
        vec![
            roc_request(self.lookback),
            threshold_request(self.lookback, self.percentile, self.min_history),
        ]
    }

    fn evaluate(&self, history: &History<'_>, exposure: Exposure) -> Result<Decision, SignalError> {
        let (Some(roc), Some(threshold)) = (
            history.value(&self.roc_key, 0)?,
            history.value(&self.threshold_key, 0)?,
        ) else {
            return Ok(Decision::hold());
        };

        let state = if roc > threshold {
            1
        } else if roc < -threshold {
            -1
        } else {
            0
        };

        let action = match exposure {
            Exposure::Flat if state == 1 => Action::EnterLong,
            Exposure::Flat if self.allow_short && state == -1 => Action::EnterShort,
            Exposure::Long if state != 1 => Action::Exit,
            Exposure::Short if state != -1 => Action::Exit,
            _ => Action::Hold,
        };
        Ok(percent_stop(history.current().close, self.stop_pct, action))
    }
}
