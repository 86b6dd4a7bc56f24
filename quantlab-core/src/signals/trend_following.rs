//! Trend following: trade with the trend filter, stop at an ATR multiple.
//!
//! Long while close is above SMA(`trend_period`); the entry stop sits
//! `atr_multiplier` ATRs below the close. Exit when close falls back under the
//! trend SMA. The short side mirrors this when enabled.

use super::{Decision, Exposure, History, Params, SignalError, SignalGenerator};
use crate::fingerprint::{IndicatorRequest, SeriesKey};

#[derive(Debug, Clone, PartialEq)]
pub struct TrendFollowing {
    pub trend_period: usize,
    pub atr_period: usize,
    pub atr_multiplier: f64,
    pub allow_short: bool,
    sma_key: SeriesKey,
    atr_key: SeriesKey,
}

impl TrendFollowing {
    const NAME: &'static str = "trend_following";

    pub fn new(trend_period: usize, atr_period: usize, atr_multiplier: f64, allow_short: bool) -> Self {
        Self {
            trend_period,
            atr_period,
            atr_multiplier,
            allow_short,
            sma_key: sma_request(trend_period).key(),
            atr_key: atr_request(atr_period).key(),
        }
    }

    pub(crate) fn from_params(p: &Params<'_>) -> Result<Self, SignalError> {
        let atr_multiplier = p.number("atr_multiplier", 1.0);
        if !(atr_multiplier.is_finite() && atr_multiplier > 0.0) {
            return Err(SignalError::InvalidParam {
                strategy: Self::NAME,
                param: "atr_multiplier".into(),
                value: atr_multiplier,
                reason: "must be positive",
            });
        }
        Ok(Self::new(
            p.period(Self::NAME, "trend_period", 50)?,
            p.period(Self::NAME, "atr_period", 14)?,
            atr_multiplier,
            p.flag("allow_short"),
        ))
    }
}

fn sma_request(period: usize) -> IndicatorRequest {
    IndicatorRequest::new("SMA").param("period", period as f64)
}

fn atr_request(period: usize) -> IndicatorRequest {
    IndicatorRequest::new("ATR").param("period", period as f64)
}

impl SignalGenerator for TrendFollowing {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_indicators(&self) -> Vec<IndicatorRequest> {
        vec![sma_request(self.trend_period), atr_request(self.atr_period)]
    }

    fn evaluate(&self, history: &History<'_>, exposure: Exposure) -> Result<Decision, SignalError> {
        let trend = history.value(&self.sma_key, 0)?;
        let atr = history.value(&self.atr_key, 0)?;
        let Some(trend) = trend else {
            return Ok(Decision::hold());
        };
        let close = history.current().close;

        Ok(match exposure {
            Exposure::Flat => match atr.filter(|a| *a > 0.0) {
                Some(atr) if close > trend => {
                    Decision::enter_long(close - atr * self.atr_multiplier)
                }
                Some(atr) if self.allow_short && close < trend => {
                    Decision::enter_short(close + atr * self.atr_multiplier)
                }
                _ => Decision::hold(),
            },
            Exposure::Long if close < trend => Decision::exit(),
            Exposure::Short if close > trend => Decision::exit(),
            _ => Decision::hold(),
        })
    }
}
