//! Backtest runner: wires together config, provider, indicator cache, engine, and metrics.
//!
//! Entry points:
//! - `run_backtest()`: validate, fetch bars, simulate, compute metrics.
//! - `run_batch()`: many configs in parallel over a shared cache.
//! - `compute_indicators()`: fill the cache for a bar series without simulating.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use quantlab_core::cache::{IndicatorBatch, IndicatorCache, RequestError};
use quantlab_core::domain::{Bar, DailyPosition, Trade};
use quantlab_core::engine::{CancelToken, ExecutionSimulator, RunStatus};
use quantlab_core::fingerprint::IndicatorRequest;
use quantlab_core::signals::SignalGenerator;

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::metrics::Metrics;
use crate::provider::PriceSeriesProvider;

/// Current schema version for persisted reports.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestReport {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    pub run_id: RunId,
    pub config: BacktestConfig,
    pub status: RunStatus,
    /// Set when the run FAILED.
    pub message: Option<String>,
    pub trades: Vec<Trade>,
    pub daily_positions: Vec<DailyPosition>,
    pub metrics: Metrics,
    pub bar_count: usize,
    /// Indicator requests the cache could not satisfy.
    #[serde(default)]
    pub indicator_errors: Vec<RequestError>,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestReport {
    fn failed(config: &BacktestConfig, run_id: RunId, message: String) -> Self {
        Self {
            schema_version: SCHEMA_VERSION,
            run_id,
            config: config.clone(),
            status: RunStatus::Failed,
            message: Some(message),
            trades: Vec::new(),
            daily_positions: Vec::new(),
            metrics: Metrics::compute(&[], &[], config.initial_cash),
            bar_count: 0,
            indicator_errors: Vec::new(),
        }
    }

    pub fn is_completed(&self) -> bool {
        self.status == RunStatus::Completed
    }
}

/// Run a single backtest.
///
/// An invalid config is rejected with `Err` before any data is fetched. Every
/// other failure (no data, missing indicator, cancellation, broken invariant)
/// yields an `Ok` report with status FAILED, a message, and whatever partial
/// history was produced.
pub fn run_backtest(
    config: &BacktestConfig,
    provider: &dyn PriceSeriesProvider,
    cache: &IndicatorCache,
    cancel: &CancelToken,
) -> Result<BacktestReport, ConfigError> {
    config.validate()?;
    let strategy = config.strategy()?;
    let engine_config = config.engine_config();
    let run_id = config.run_id();

    let span = info_span!("backtest", run_id = %run_id, ticker = %engine_config.symbol);
    let _guard = span.enter();
    info!(
        strategy = strategy.name(),
        start = %config.start_date,
        end = %config.end_date,
        "backtest requested"
    );

    let bars = match provider.get_bars(&engine_config.symbol, config.start_date, config.end_date) {
        Ok(bars) => bars,
        Err(e) => {
            warn!(error = %e, "price data unavailable");
            return Ok(BacktestReport::failed(config, run_id, e.to_string()));
        }
    };

    let batch = compute_indicators(
        cache,
        &engine_config.symbol,
        &bars,
        &strategy.required_indicators(),
    );
    let result =
        ExecutionSimulator::new(engine_config).run(&bars, &batch.values, &strategy, cancel);
    let metrics = Metrics::compute(&result.trades, &result.daily_positions, config.initial_cash);

    info!(
        status = ?result.status,
        trades = result.trades.len(),
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        "backtest finished"
    );

    Ok(BacktestReport {
        schema_version: SCHEMA_VERSION,
        run_id,
        config: config.clone(),
        status: result.status,
        message: result.message,
        trades: result.trades,
        daily_positions: result.daily_positions,
        metrics,
        bar_count: bars.len(),
        indicator_errors: batch.errors,
    })
}

/// Run many configs in parallel. Results come back in input order.
pub fn run_batch(
    configs: &[BacktestConfig],
    provider: &dyn PriceSeriesProvider,
    cache: &IndicatorCache,
    cancel: &CancelToken,
) -> Vec<Result<BacktestReport, ConfigError>> {
    info!(runs = configs.len(), "batch started");
    configs
        .par_iter()
        .map(|config| run_backtest(config, provider, cache, cancel))
        .collect()
}

/// Ensure `requests` are computed and cached for `symbol` over `bars`.
///
/// Failed requests are reported in the batch's `errors`; the others still succeed.
pub fn compute_indicators(
    cache: &IndicatorCache,
    symbol: &str,
    bars: &[Bar],
    requests: &[IndicatorRequest],
) -> IndicatorBatch {
    let batch = cache.ensure(symbol, bars, requests);
    info!(
        symbol,
        requests = requests.len(),
        inserted = batch.inserted,
        cache_hits = batch.cache_hits,
        failed = batch.errors.len(),
        "indicators ensured"
    );
    batch
}
