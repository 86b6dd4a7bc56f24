//! Rate of Change (ROC): fractional trailing return.
//!
//! roc[t] = close[t] / close[t-period] - 1
//! Lookback: period.

use super::Indicator;
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct Roc {
    period: usize,
    name: String,
}

impl Roc {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            name: format!("roc_{period}"),
        }
    }
}

impl Indicator for Roc {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let n = bars.len();
        let mut result = vec![f64::NAN; n];
        for i in self.period..n {
            let prev = bars[i - self.period].close;
            if prev != 0.0 {
                result[i] = bars[i].close / prev - 1.0;
            }
        }
        result
    }
}
