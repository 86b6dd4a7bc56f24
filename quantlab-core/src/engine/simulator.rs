//! The per-bar execution loop.

use tracing::{debug, info, warn};

use super::{CancelToken, EngineConfig, EngineError, RunResult, RunStatus};
use crate::cache::IndicatorCache;
use crate::domain::bar::{validate_series, BarError};
use crate::domain::{Bar, DailyPosition, Trade, TradeSide};
use crate::indicators::IndicatorValues;
use crate::signals::{Action, Decision, Exposure, History, SignalGenerator};
use crate::sizer::RiskSizer;

/// Cash below this is treated as negative (float noise above it is tolerated).
const CASH_EPSILON: f64 = 1e-6;

/// Single-run simulator. Owns all mutable run state; consumed by `run`.
#[derive(Debug)]
pub struct ExecutionSimulator {
    config: EngineConfig,
    sizer: RiskSizer,
    status: RunStatus,
    cash: f64,
    peak_equity: f64,
    /// Index into `trades` of the open position, if any.
    open: Option<usize>,
    trades: Vec<Trade>,
    daily_positions: Vec<DailyPosition>,
}

impl ExecutionSimulator {
    pub fn new(config: EngineConfig) -> Self {
        Self {
            sizer: RiskSizer::new(config.risk_fraction),
            status: RunStatus::Pending,
            cash: config.initial_cash,
            peak_equity: config.initial_cash,
            open: None,
            trades: Vec::new(),
            daily_positions: Vec::new(),
            config,
        }
    }

    pub fn status(&self) -> RunStatus {
        self.status
    }

    /// Compute the strategy's indicator series through `cache`, then run.
    ///
    /// Failed indicator requests are not fatal here: the strategy fails with a
    /// dependency error on the first bar that needs the missing series.
    pub fn run_with_cache(
        self,
        cache: &IndicatorCache,
        bars: &[Bar],
        strategy: &dyn SignalGenerator,
        cancel: &CancelToken,
    ) -> RunResult {
        let batch = cache.ensure(&self.config.symbol, bars, &strategy.required_indicators());
        for err in &batch.errors {
            warn!(
                symbol = %self.config.symbol,
                request = %err.request,
                reason = %err.reason,
                "strategy indicator unavailable"
            );
        }
        self.run(bars, &batch.values, strategy, cancel)
    }

    /// Run the full bar loop and return the terminal result.
    pub fn run(
        mut self,
        bars: &[Bar],
        indicators: &IndicatorValues,
        strategy: &dyn SignalGenerator,
        cancel: &CancelToken,
    ) -> RunResult {
        self.status = self.status.transition(RunStatus::Running);
        info!(
            symbol = %self.config.symbol,
            strategy = strategy.name(),
            bars = bars.len(),
            initial_cash = self.config.initial_cash,
            "simulation started"
        );

        let outcome = self.run_loop(bars, indicators, strategy, cancel);
        let error = match outcome {
            Ok(()) => {
                self.status = self.status.transition(RunStatus::Completed);
                info!(
                    symbol = %self.config.symbol,
                    trades = self.trades.len(),
                    final_equity = self.daily_positions.last().map(|p| p.equity),
                    "simulation completed"
                );
                None
            }
            Err(e) => {
                self.status = self.status.transition(RunStatus::Failed);
                warn!(
                    symbol = %self.config.symbol,
                    bars_processed = self.daily_positions.len(),
                    error = %e,
                    "simulation failed"
                );
                Some(e)
            }
        };

        RunResult {
            status: self.status,
            message: error.as_ref().map(ToString::to_string),
            error,
            trades: self.trades,
            daily_positions: self.daily_positions,
        }
    }

    fn run_loop(
        &mut self,
        bars: &[Bar],
        indicators: &IndicatorValues,
        strategy: &dyn SignalGenerator,
        cancel: &CancelToken,
    ) -> Result<(), EngineError> {
        validate_series(bars).map_err(|e| match e {
            BarError::Empty => EngineError::DataUnavailable {
                symbol: self.config.symbol.clone(),
            },
            other => EngineError::execution(None, other.to_string()),
        })?;

        for t in 0..bars.len() {
            if cancel.is_cancelled() {
                return Err(EngineError::Cancelled { bar_index: t });
            }
            let history = History::at(bars, indicators, t)
                .ok_or_else(|| EngineError::execution(Some(bars[t].date), "bar index out of range"))?;
            self.step(&history, strategy)?;
        }
        Ok(())
    }

    fn step(&mut self, history: &History<'_>, strategy: &dyn SignalGenerator) -> Result<(), EngineError> {
        let bar = history.current();
        if !bar.is_sane() {
            return Err(EngineError::execution(
                Some(bar.date),
                format!(
                    "malformed bar: open {} high {} low {} close {}",
                    bar.open, bar.high, bar.low, bar.close
                ),
            ));
        }

        let decision = strategy
            .evaluate(history, self.exposure())
            .map_err(|source| EngineError::StrategyDependency {
                date: bar.date,
                source,
            })?;

        match self.open {
            None => match decision.action {
                Action::EnterLong => self.enter(bar, TradeSide::Long, decision),
                Action::EnterShort => self.enter(bar, TradeSide::Short, decision),
                Action::Exit | Action::Hold => {}
            },
            Some(idx) => {
                let stop_hit = self.stop_breached(&self.trades[idx], bar.close);
                if decision.action == Action::Exit || stop_hit {
                    self.exit(idx, bar, stop_hit);
                }
            }
        }

        if self.cash < -CASH_EPSILON {
            return Err(EngineError::execution(
                Some(bar.date),
                format!("negative cash {:.2}", self.cash),
            ));
        }
        self.snapshot(bar)
    }

    fn exposure(&self) -> Exposure {
        match self.open.map(|idx| self.trades[idx].side) {
            None => Exposure::Flat,
            Some(TradeSide::Long) => Exposure::Long,
            Some(TradeSide::Short) => Exposure::Short,
        }
    }

    fn position_size(&self) -> i64 {
        self.open.map_or(0, |idx| self.trades[idx].signed_size())
    }

    fn equity_at(&self, price: f64) -> f64 {
        self.cash + self.position_size() as f64 * price
    }

    fn stop_breached(&self, trade: &Trade, close: f64) -> bool {
        match (trade.side, trade.stop_price) {
            (TradeSide::Long, Some(stop)) => close <= stop,
            (TradeSide::Short, Some(stop)) => close >= stop,
            (_, None) => false,
        }
    }

    /// Open a position at the bar's close. Entries the sizer rejects are skipped.
    fn enter(&mut self, bar: &Bar, side: TradeSide, decision: Decision) {
        let price = bar.close;
        let commission_per_unit = self.config.commission_per_unit;
        let Some(stop) = decision.stop_price.filter(|s| match side {
            TradeSide::Long => *s < price,
            TradeSide::Short => *s > price,
        }) else {
            debug!(date = %bar.date, ?side, stop = ?decision.stop_price, "entry skipped: no protective stop");
            return;
        };

        let equity = self.equity_at(price);
        let size = match self.sizer.size(equity, price, stop, commission_per_unit) {
            Ok(size) => size,
            Err(reason) => {
                debug!(date = %bar.date, ?side, %reason, "entry skipped");
                return;
            }
        };

        // Longs are funded from cash; shorts are margined against equity.
        let funds = match side {
            TradeSide::Long => self.cash,
            TradeSide::Short => equity,
        };
        let cap = (funds / (price + commission_per_unit)).floor().max(0.0) as u64;
        let size = size.min(cap);
        if size == 0 {
            debug!(date = %bar.date, ?side, "entry skipped: insufficient funds");
            return;
        }

        let commission = size as f64 * commission_per_unit;
        let notional = size as f64 * price;
        match side {
            TradeSide::Long => self.cash -= notional + commission,
            TradeSide::Short => self.cash += notional - commission,
        }
        self.trades
            .push(Trade::open(bar.date, side, price, size, commission, Some(stop)));
        self.open = Some(self.trades.len() - 1);
        debug!(date = %bar.date, ?side, size, price, stop, cash = self.cash, "position opened");
    }

    /// Close the open position at the bar's close.
    fn exit(&mut self, idx: usize, bar: &Bar, stop_hit: bool) {
        let price = bar.close;
        let trade = &mut self.trades[idx];
        let exit_commission = trade.size as f64 * self.config.commission_per_unit;
        let notional = trade.size as f64 * price;
        match trade.side {
            TradeSide::Long => self.cash += notional - exit_commission,
            TradeSide::Short => self.cash -= notional + exit_commission,
        }
        let pnl = trade.close(bar.date, price, exit_commission);
        self.open = None;
        debug!(date = %bar.date, price, pnl, stop_hit, cash = self.cash, "position closed");
    }

    fn snapshot(&mut self, bar: &Bar) -> Result<(), EngineError> {
        let equity = self.equity_at(bar.close);
        if !equity.is_finite() {
            return Err(EngineError::execution(Some(bar.date), "equity is not finite"));
        }
        self.peak_equity = self.peak_equity.max(equity);
        let drawdown = if self.peak_equity > 0.0 {
            ((self.peak_equity - equity) / self.peak_equity).clamp(0.0, 1.0)
        } else {
            0.0
        };
        self.daily_positions.push(DailyPosition {
            date: bar.date,
            position_size: self.position_size(),
            cash: self.cash,
            equity,
            drawdown,
        });
        Ok(())
    }
}
