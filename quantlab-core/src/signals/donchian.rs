//! Donchian breakout: close beyond the previous bar's channel.
//!
//! Long entry: close > prior `lookback_high`-bar high. Short entry: close <
//! prior `lookback_low`-bar low. Each side exits on the opposite trigger, and
//! the opposite band is the entry's stop.

use super::{Decision, Exposure, History, Params, SignalError, SignalGenerator};
use crate::fingerprint::{IndicatorRequest, SeriesKey};

#[derive(Debug, Clone, PartialEq)]
pub struct DonchianBreakout {
    pub lookback_high: usize,
    pub lookback_low: usize,
    pub allow_short: bool,
    upper_key: SeriesKey,
    lower_key: SeriesKey,
}

impl DonchianBreakout {
    const NAME: &'static str = "donchian_breakout";

    pub fn new(lookback_high: usize, lookback_low: usize, allow_short: bool) -> Self {
        Self {
            lookback_high,
            lookback_low,
            allow_short,
            upper_key: upper_request(lookback_high).key(),
            lower_key: lower_request(lookback_low).key(),
        }
    }

    pub(crate) fn from_params(p: &Params<'_>) -> Result<Self, SignalError> {
        Ok(Self::new(
            p.period(Self::NAME, "lookback_high", 20)?,
            p.period(Self::NAME, "lookback_low", 10)?,
            p.flag("allow_short"),
        ))
    }
}

fn upper_request(period: usize) -> IndicatorRequest {
    IndicatorRequest::new("DONCHIAN_HIGH").param("period", period as f64)
}

fn lower_request(period: usize) -> IndicatorRequest {
    IndicatorRequest::new("DONCHIAN_LOW").param("period", period as f64)
}

impl SignalGenerator for DonchianBreakout {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_indicators(&self) -> Vec<IndicatorRequest> {
        vec![
            upper_request(self.lookback_high),
            lower_request(self.lookback_low),
        ]
    }

    fn evaluate(&self, history: &History<'_>, exposure: Exposure) -> Result<Decision, SignalError> {
        // Channel as of the previous bar: today's range is excluded.
        let upper = history.value(&self.upper_key, 1)?;
        let lower = history.value(&self.lower_key, 1)?;
        let (Some(upper), Some(lower)) = (upper, lower) else {
            return Ok(Decision::hold());
        };
        let close = history.current().close;

        Ok(match exposure {
            Exposure::Flat if close > upper => Decision::enter_long(lower),
            Exposure::Flat if self.allow_short && close < lower => Decision::enter_short(upper),
            Exposure::Long if close < lower => Decision::exit(),
            Exposure::Short if close > upper => Decision::exit(),
            _ => Decision::hold(),
        })
    }
}
