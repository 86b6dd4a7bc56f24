//! Expanding ROC percentile: the `percentile`-th percentile of every ROC(period)
//! value observed up to and including bar t.
//!
//! Values are kept in a sorted buffer that grows by one insertion per bar.
//! NaN until `min_history` ROC values have been observed.

use super::{Indicator, Roc};
use crate::domain::Bar;

#[derive(Debug, Clone)]
pub struct RocPercentile {
    period: usize,
    percentile: f64,
    min_history: usize,
    name: String,
}

impl RocPercentile {
    pub fn new(period: usize, percentile: f64, min_history: usize) -> Self {
        let period = period.max(1);
        let min_history = min_history.max(1);
        Self {
            period,
            percentile,
            min_history,
            name: format!("roc_percentile_{period}_{percentile}"),
        }
    }
}

/// Percentile of an ascending slice, linear interpolation between closest ranks.
///
/// `pct` is in [0, 100]. Returns `None` for an empty slice.
pub fn sorted_percentile(sorted: &[f64], pct: f64) -> Option<f64> {
    let last = sorted.len().checked_sub(1)?;
    let rank = (pct / 100.0).clamp(0.0, 1.0) * last as f64;
    let lo = rank.floor() as usize;
    let hi = rank.ceil() as usize;
    Some(sorted[lo] + (sorted[hi] - sorted[lo]) * (rank - lo as f64))
}

/// Percentile of unsorted values.
pub fn percentile(values: &[f64], pct: f64) -> Option<f64> {
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    sorted_percentile(&sorted, pct)
}

impl Indicator for RocPercentile {
    fn name(&self) -> &str {
        &self.name
    }

    fn lookback(&self) -> usize {
        self.period + self.min_history - 1
    }

    fn compute(&self, bars: &[Bar]) -> Vec<f64> {
        let roc = Roc::new(self.period).compute(bars);
        let mut sorted: Vec<f64> = Vec::with_capacity(roc.len());
        roc.iter()
            .map(|&v| {
                if !v.is_nan() {
                    let at = sorted.partition_point(|&x| x < v);
                    sorted.insert(at, v);
                }
                if sorted.len() < self.min_history {
                    return f64::NAN;
                }
                sorted_percentile(&sorted, self.percentile).unwrap_or(f64::NAN)
            })
            .collect()
    }
}
