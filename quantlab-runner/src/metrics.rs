//! Performance metrics: pure functions that reduce a run to summary statistics.
//!
//! Every metric is a pure function: daily positions and/or trade list in,
//! scalar out. Only closed trades (those with a realized pnl) count toward the
//! trade statistics.

use serde::{Deserialize, Serialize};

use quantlab_core::domain::{DailyPosition, Trade};

/// Trading days per year used to annualize the Sharpe ratio.
pub const TRADING_DAYS_PER_YEAR: f64 = 252.0;

/// Summary statistics for a single backtest run.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Metrics {
    /// final_equity / initial_cash − 1.
    pub total_return: f64,
    pub sharpe: f64,
    /// Largest drawdown fraction seen, in [0, 1].
    pub max_drawdown: f64,
    pub win_rate: f64,
    /// Mean realized pnl per closed trade.
    pub avg_trade_return: f64,
    /// Number of closed trades.
    pub trade_count: usize,
    pub final_equity: f64,
}

impl Metrics {
    /// Compute all metrics from the run's trades and daily positions.
    pub fn compute(trades: &[Trade], positions: &[DailyPosition], initial_cash: f64) -> Self {
        let equity: Vec<f64> = positions.iter().map(|p| p.equity).collect();
        let final_equity = final_equity(positions, initial_cash);
        Self {
            total_return: total_return(final_equity, initial_cash),
            sharpe: sharpe_ratio(&equity),
            max_drawdown: max_drawdown(positions),
            win_rate: win_rate(trades),
            avg_trade_return: avg_trade_return(trades),
            trade_count: closed_pnls(trades).count(),
            final_equity,
        }
    }
}

// ─── Individual metric functions ────────────────────────────────────

/// Equity of the last snapshot, or the starting cash when there is none.
pub fn final_equity(positions: &[DailyPosition], initial_cash: f64) -> f64 {
    positions.last().map_or(initial_cash, |p| p.equity)
}

pub fn total_return(final_equity: f64, initial_cash: f64) -> f64 {
    if initial_cash <= 0.0 {
        return 0.0;
    }
    final_equity / initial_cash - 1.0
}

/// Annualized Sharpe ratio from daily simple returns (risk-free rate 0).
///
/// mean / sample std × √252. Returns 0.0 with fewer than 2 returns or zero variance.
pub fn sharpe_ratio(equity_curve: &[f64]) -> f64 {
    let returns = daily_returns(equity_curve);
    if returns.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&returns);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&returns) / std * TRADING_DAYS_PER_YEAR.sqrt()
}

pub fn max_drawdown(positions: &[DailyPosition]) -> f64 {
    positions.iter().map(|p| p.drawdown).fold(0.0, f64::max)
}

/// Fraction of closed trades with positive pnl; 0 when none closed.
pub fn win_rate(trades: &[Trade]) -> f64 {
    let (wins, closed) = trades
        .iter()
        .filter(|t| t.is_closed())
        .fold((0usize, 0usize), |(w, n), t| (w + usize::from(t.is_winner()), n + 1));
    if closed == 0 {
        return 0.0;
    }
    wins as f64 / closed as f64
}

pub fn avg_trade_return(trades: &[Trade]) -> f64 {
    let pnls: Vec<f64> = closed_pnls(trades).collect();
    mean_f64(&pnls)
}

// ─── Helpers ────────────────────────────────────────────────────────

fn closed_pnls(trades: &[Trade]) -> impl Iterator<Item = f64> + '_ {
    trades.iter().filter_map(|t| t.pnl)
}

/// Daily simple returns; a non-positive prior equity yields 0.0.
pub fn daily_returns(equity_curve: &[f64]) -> Vec<f64> {
    equity_curve
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}
