//! Persisted indicator rows.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use crate::fingerprint::ParamsFingerprint;

/// One stored indicator value for (symbol, date, name, fingerprint).
///
/// `value` is `None` during warmup. Warmup rows are stored too, so a cached
/// series covers every bar date it was computed over.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct IndicatorValue {
    pub symbol: String,
    pub date: NaiveDate,
    pub name: String,
    pub fingerprint: ParamsFingerprint,
    pub value: Option<f64>,
}

/// Inclusive date range.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct DateRange {
    pub start: NaiveDate,
    pub end: NaiveDate,
}

impl DateRange {
    pub fn new(start: NaiveDate, end: NaiveDate) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, date: NaiveDate) -> bool {
        date >= self.start && date <= self.end
    }
}
