//! Engine configuration, run status, cancellation, and run result types.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use serde::{Deserialize, Serialize};

use super::EngineError;
use crate::domain::{DailyPosition, Trade};
use crate::sizer::DEFAULT_RISK_FRACTION;

/// Configuration for a single simulated run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineConfig {
    pub symbol: String,
    pub initial_cash: f64,
    pub commission_per_unit: f64,
    /// Fraction of equity risked per trade.
    pub risk_fraction: f64,
}

impl EngineConfig {
    pub fn new(symbol: impl Into<String>, initial_cash: f64) -> Self {
        Self {
            symbol: symbol.into(),
            initial_cash,
            commission_per_unit: 0.0,
            risk_fraction: DEFAULT_RISK_FRACTION,
        }
    }

    pub fn with_commission(mut self, commission_per_unit: f64) -> Self {
        self.commission_per_unit = commission_per_unit;
        self
    }

    pub fn with_risk_fraction(mut self, risk_fraction: f64) -> Self {
        self.risk_fraction = risk_fraction;
        self
    }
}

/// Lifecycle of a run: `Pending → Running → {Completed | Failed}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum RunStatus {
    Pending,
    Running,
    Completed,
    Failed,
}

impl RunStatus {
    pub fn is_terminal(self) -> bool {
        matches!(self, RunStatus::Completed | RunStatus::Failed)
    }

    /// Next status after a requested transition. Terminal states absorb everything,
    /// and a run can only move forward.
    pub fn transition(self, next: RunStatus) -> RunStatus {
        match (self, next) {
            (s, _) if s.is_terminal() => s,
            (RunStatus::Pending, RunStatus::Running) => next,
            (RunStatus::Pending | RunStatus::Running, RunStatus::Completed | RunStatus::Failed) => {
                next
            }
            (s, _) => s,
        }
    }
}

/// Shared cancellation flag, checked by the simulator between bars.
#[derive(Debug, Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::SeqCst);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::SeqCst)
    }
}

/// Everything a finished run produced. Failed runs keep their partial history.
#[derive(Debug, Clone, PartialEq)]
pub struct RunResult {
    pub status: RunStatus,
    pub message: Option<String>,
    pub error: Option<EngineError>,
    pub trades: Vec<Trade>,
    pub daily_positions: Vec<DailyPosition>,
}

impl RunResult {
    /// Equity at the last snapshot, or `initial_cash` when no bar was processed.
    pub fn final_equity(&self, initial_cash: f64) -> f64 {
        self.daily_positions
            .last()
            .map(|p| p.equity)
            .unwrap_or(initial_cash)
    }

    pub fn closed_trades(&self) -> impl Iterator<Item = &Trade> {
        self.trades.iter().filter(|t| t.is_closed())
    }

    pub fn open_trade(&self) -> Option<&Trade> {
        self.trades.iter().find(|t| !t.is_closed())
    }
}
