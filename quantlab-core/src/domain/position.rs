//! Daily position snapshot.

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

/// End-of-day state for one simulated bar.
///
/// `position_size` is signed (negative when short), so
/// `equity == cash + position_size * close` holds for both sides.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DailyPosition {
    pub date: NaiveDate,
    pub position_size: i64,
    pub cash: f64,
    pub equity: f64,
    pub drawdown: f64,
}
