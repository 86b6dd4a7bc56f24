//! Donchian Channel: highest high / lowest low over a lookback window.
//!
//! Two series, exposed as separate indicator instances:
//! - Upper (`DONCHIAN_HIGH`): max(high[t-period+1..=t])
//! - Lower (`DONCHIAN_LOW`): min(low[t-period+1..=t])
//!
//! Both include the current bar. Breakout rules compare today's close against
//! the previous bar's value. Lookback: period - 1.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DonchianBand {
    Upper,
    Lower,
}

#[derive(Debug, Clone)]
pub struct Donchian {
    period: usize,
    band: DonchianBand,
    name: String,
}

impl Donchian {
    pub fn upper(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            band: DonchianBand::Upper,
            name: format!("donchian_upper_{period}"),
        }
    }

    pub fn lower(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            band: DonchianBand::Lower,
            name: format!("donchian_lower_{period}"),
        }
    }
}

impl Indicator for Donchian {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        if n < self.period {
            return result;
        }

        for i in (self.period - 1)..n {
            let window = &bars[i + 1 - self.period..=i];
            let value = match self.band {
                DonchianBand::Upper => window
                    .iter()
                    .map(|b| b.high)
                    .try_fold(f64::NEG_INFINITY, |acc, h| (!h.is_nan()).then_some(acc.max(h))),
                DonchianBand::Lower => window
                    .iter()
                    .map(|b| b.low)
                    .try_fold(f64::INFINITY, |acc, l| (!l.is_nan()).then_some(acc.min(l))),
            };
            result[i] = value.unwrap_or(f64::NAN);
        }
        result
    }
}
