//! Trade: one round trip (or a still-open position) in the trade log.

use std::fmt;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TradeSide {
    Long,
    Short,
}

impl TradeSide {
    /// +1 for long, -1 for short.
    pub fn sign(self) -> f64 {
        match self {
            TradeSide::Long => 1.0,
            TradeSide::Short => -1.0,
        }
    }
}

impl fmt::Display for TradeSide {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            TradeSide::Long => "LONG",
            TradeSide::Short => "SHORT",
        })
    }
}

/// A trade in the run's log.
///
/// `exit_date`, `exit_price` and `pnl` stay `None` while the position is open.
/// `commission` is the running total: entry commission, plus exit commission
/// once closed.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Trade {
    pub entry_date: NaiveDate,
    pub exit_date: Option<NaiveDate>,
    pub side: TradeSide,
    pub entry_price: f64,
    pub exit_price: Option<f64>,
    pub size: u64,
    pub commission: f64,
    pub stop_price: Option<f64>,
    pub pnl: Option<f64>,
}

impl Trade {
    pub fn open(
        entry_date: NaiveDate,
        side: TradeSide,
        entry_price: f64,
        size: u64,
        commission: f64,
        stop_price: Option<f64>,
    ) -> Self {
        Self {
            entry_date,
            exit_date: None,
            side,
            entry_price,
            exit_price: None,
            size,
            commission,
            stop_price,
            pnl: None,
        }
    }

    pub fn is_closed(&self) -> bool {
        self.exit_date.is_some()
    }

    /// Close the trade and realize pnl net of total commission.
    pub fn close(&mut self, exit_date: NaiveDate, exit_price: f64, exit_commission: f64) -> f64 {
        self.commission += exit_commission;
        let gross = (exit_price - self.entry_price) * self.size as f64 * self.side.sign();
        let pnl = gross - self.commission;
        self.exit_date = Some(exit_date);
        self.exit_price = Some(exit_price);
        self.pnl = Some(pnl);
        pnl
    }

    /// Signed position size: positive long, negative short.
    pub fn signed_size(&self) -> i64 {
        match self.side {
            TradeSide::Long => self.size as i64,
            TradeSide::Short => -(self.size as i64),
        }
    }

    pub fn is_winner(&self) -> bool {
        self.pnl.is_some_and(|p| p > 0.0)
    }
}
