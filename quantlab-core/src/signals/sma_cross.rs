//! SMA crossover: trades transitions of sign(SMA_fast − SMA_slow).
//!
//! The crossover state is +1 when the fast SMA is above the slow one, −1 when
//! below, and 0 while either average is still warming up. Entries fire on a
//! transition into ±1; exits fire on a transition away from the held side.

use super::{
    percent_stop, Action, Decision, Exposure, History, Params, SignalError, SignalGenerator,
};
use crate::fingerprint::{IndicatorRequest, SeriesKey};

#[derive(Debug, Clone, PartialEq)]
pub struct SmaCross {
    pub fast: usize,
    pub slow: usize,
    pub stop_pct: f64,
    pub allow_short: bool,
    fast_key: SeriesKey,
    slow_key: SeriesKey,
}

impl SmaCross {
    const NAME: &'static str = "sma_cross";

    pub fn new(fast: usize, slow: usize, stop_pct: f64, allow_short: bool) -> Self {
        Self {
            fast,
            slow,
            stop_pct,
            allow_short,
            fast_key: sma_request(fast).key(),
            slow_key: sma_request(slow).key(),
        }
    }

    pub(crate) fn from_params(p: &Params<'_>) -> Result<Self, SignalError> {
        let fast = p.period(Self::NAME, "fast", 50)?;
        let slow = p.period(Self::NAME, "slow", 200)?;
        if slow <= fast {
            return Err(SignalError::InvalidParam {
                strategy: Self::NAME,
                param: "slow".into(),
                value: slow as f64,
                reason: "must be greater than fast",
            });
        }
        let stop_pct = p.fraction(Self::NAME, "stop_pct", 0.05)?;
        Ok(Self::new(fast, slow, stop_pct, p.flag("allow_short")))
    }

    /// Crossover state `back` bars before the current one.
    fn state(&self, history: &History<'_>, back: usize) -> Result<i8, SignalError> {
        let fast = history.value(&self.fast_key, back)?;
        let slow = history.value(&self.slow_key, back)?;
        Ok(match (fast, slow) {
            (Some(f), Some(s)) if f > s => 1,
            (Some(f), Some(s)) if f < s => -1,
            _ => 0,
        })
    }
}

fn sma_request(period: usize) -> IndicatorRequest {
    IndicatorRequest::new("SMA").param("period", period as f64)
}

impl SignalGenerator for SmaCross {
    fn name(&self) -> &str {
        Self::NAME
    }

    fn required_indicators(&self) -> Vec<IndicatorRequest> {
        vec![sma_request(self.fast), sma_request(self.slow)]
    }

    fn evaluate(&self, history: &History<'_>, exposure: Exposure) -> Result<Decision, SignalError> {
        let cur = self.state(history, 0)?;
        let prev = self.state(history, 1)?;
        let close = history.current().close;

        let action = match exposure {
            Exposure::Flat if cur == 1 && prev != 1 => Action::EnterLong,
            Exposure::Flat if self.allow_short && cur == -1 && prev != -1 => Action::EnterShort,
            Exposure::Long if prev == 1 && cur != 1 => Action::Exit,
            Exposure::Short if prev == -1 && cur != -1 => Action::Exit,
            _ => Action::Hold,
        };
        Ok(percent_stop(close, self.stop_pct, action))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::IndicatorValues;
    use crate::signals::{replay, test_bars, test_indicators, Action::*};

    #[test]
    fn rising_series_enters_once() {
        let closes: Vec<f64> = (100..110).map(f64::from).collect();
        let strategy = SmaCross::new(2, 3, 0.05, false);
        let actions = replay(&strategy, &test_bars(&closes));
        assert_eq!(actions[2], EnterLong);
        assert_eq!(actions.iter().filter(|a| **a != Hold).count(), 1);
    }

    #[test]
    fn entry_stop_is_percent_below_close() {
        let bars = test_bars(&[100.0, 101.0, 102.0]);
        let strategy = SmaCross::new(2, 3, 0.05, false);
        let values = test_indicators(&strategy, &bars);
        let h = History::at(&bars, &values, 2).unwrap();
        let d = strategy.evaluate(&h, Exposure::Flat).unwrap();
        assert_eq!(d.action, EnterLong);
        assert!((d.stop_price.unwrap() - 96.9).abs() < 1e-9);
    }

    #[test]
    fn cross_down_exits_long() {
        let bars = test_bars(&[10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 10.0, 9.0]);
        let actions = replay(&SmaCross::new(2, 3, 0.05, false), &bars);
        assert_eq!(actions, vec![Hold, Hold, EnterLong, Hold, Hold, Exit, Hold, Hold]);
    }

    #[test]
    fn short_side_when_enabled() {
        let bars = test_bars(&[13.0, 12.0, 11.0, 10.0, 11.0, 12.0, 13.0, 14.0]);
        let long_only = replay(&SmaCross::new(2, 3, 0.05, false), &bars);
        assert_eq!(long_only, vec![Hold, Hold, Hold, Hold, Hold, EnterLong, Hold, Hold]);

        let actions = replay(&SmaCross::new(2, 3, 0.05, true), &bars);
        assert_eq!(actions, vec![Hold, Hold, EnterShort, Hold, Hold, Exit, Hold, Hold]);
    }

    #[test]
    fn exit_bar_does_not_reverse_into_a_short() {
        let bars = test_bars(&[10.0, 11.0, 12.0, 13.0, 12.0, 11.0, 10.0, 9.0]);
        let actions = replay(&SmaCross::new(2, 3, 0.05, true), &bars);
        assert_eq!(actions, vec![Hold, Hold, EnterLong, Hold, Hold, Exit, Hold, Hold]);
    }

    #[test]
    fn missing_series_is_an_error() {
        let bars = test_bars(&[1.0, 2.0, 3.0]);
        let values = IndicatorValues::new();
        let h = History::at(&bars, &values, 2).unwrap();
        let err = SmaCross::new(2, 3, 0.05, false)
            .evaluate(&h, Exposure::Flat)
            .unwrap_err();
        assert!(matches!(err, SignalError::MissingIndicator(_)));
    }
}
