//! Risk sizer: turns a risk budget and a stop distance into a unit count.
//!
//! size = floor(equity × risk_fraction / (|entry − stop| + commission_per_unit))
//!
//! A zero or undefined stop distance is `InvalidStop`; a result below one unit
//! is `PositionTooSmall`. Both are normal "no order" outcomes, not failures of
//! the run. Capping by available cash is the simulator's job.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Fraction of equity put at risk per trade when none is configured.
pub const DEFAULT_RISK_FRACTION: f64 = 0.01;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum SizingError {
    #[error("invalid stop: entry {entry} and stop {stop} leave no stop distance")]
    InvalidStop { entry: f64, stop: f64 },

    #[error("position too small: raw size {raw_size:.4} is below one unit")]
    PositionTooSmall { raw_size: f64 },
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct RiskSizer {
    pub risk_fraction: f64,
}

impl Default for RiskSizer {
    fn default() -> Self {
        Self {
            risk_fraction: DEFAULT_RISK_FRACTION,
        }
    }
}

impl RiskSizer {
    pub fn new(risk_fraction: f64) -> Self {
        Self { risk_fraction }
    }

    /// Whole units to trade for the given equity, entry and stop.
    pub fn size(
        &self,
        equity: f64,
        entry_price: f64,
        stop_price: f64,
        commission_per_unit: f64,
    ) -> Result<u64, SizingError> {
        let stop_distance = (entry_price - stop_price).abs();
        if !(stop_distance.is_finite() && stop_distance > 0.0) {
            return Err(SizingError::InvalidStop {
                entry: entry_price,
                stop: stop_price,
            });
        }
        let risk_amount = equity * self.risk_fraction;
        let raw_size = risk_amount / (stop_distance + commission_per_unit);
        if raw_size.is_nan() || raw_size < 1.0 {
            return Err(SizingError::PositionTooSmall { raw_size });
        }
        Ok(raw_size.floor() as u64)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn one_point_stop_risks_one_percent() {
        let sizer = RiskSizer::default();
        assert_eq!(sizer.size(100_000.0, 100.0, 99.0, 0.0), Ok(1000));
    }

    #[test]
    fn stop_at_entry_is_invalid() {
        let sizer = RiskSizer::default();
        assert!(matches!(
            sizer.size(100_000.0, 100.0, 100.0, 0.0),
            Err(SizingError::InvalidStop { .. })
        ));
    }

    #[test]
    fn stop_above_entry_uses_distance() {
        // Short-side stop: distance is still |entry - stop|.
        let sizer = RiskSizer::default();
        assert_eq!(sizer.size(100_000.0, 100.0, 102.0, 0.0), Ok(500));
    }

    #[test]
    fn commission_widens_the_denominator() {
        let sizer = RiskSizer::default();
        // 1000 / (1 + 1) = 500
        assert_eq!(sizer.size(100_000.0, 100.0, 99.0, 1.0), Ok(500));
    }

    #[test]
    fn fractional_size_is_floored() {
        let sizer = RiskSizer::default();
        // 1000 / 3 = 333.33
        assert_eq!(sizer.size(100_000.0, 100.0, 97.0, 0.0), Ok(333));
    }

    #[test]
    fn below_one_unit_is_too_small() {
        let sizer = RiskSizer::default();
        // 10 / 50 = 0.2
        let err = sizer.size(1_000.0, 100.0, 50.0, 0.0).unwrap_err();
        assert!(matches!(err, SizingError::PositionTooSmall { .. }));
    }

    #[test]
    fn nan_stop_is_invalid() {
        let sizer = RiskSizer::default();
        assert!(matches!(
            sizer.size(100_000.0, 100.0, f64::NAN, 0.0),
            Err(SizingError::InvalidStop { .. })
        ));
    }

    #[test]
    fn custom_risk_fraction() {
        let sizer = RiskSizer::new(0.02);
        assert_eq!(sizer.size(50_000.0, 20.0, 18.0, 0.0), Ok(500));
    }
}
