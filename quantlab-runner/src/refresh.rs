//! Indicator refresh: recompute a fixed indicator set for a list of symbols.
//!
//! This is the body of a periodic maintenance job; triggering it on a schedule
//! is left to the caller. Symbols are processed in parallel. The outcome is
//! recorded as a `JobRun`.

use std::time::Instant;

use chrono::{DateTime, NaiveDate, Utc};
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, info_span, warn};

use quantlab_core::cache::IndicatorCache;
use quantlab_core::engine::RunStatus;
use quantlab_core::fingerprint::IndicatorRequest;
use quantlab_core::indicators::DEFAULT_PERIOD;

use crate::provider::PriceSeriesProvider;

pub const DAILY_INDICATORS_JOB: &str = "daily_indicators";

/// Indicators refreshed when no explicit set is configured.
pub fn default_refresh_requests() -> Vec<IndicatorRequest> {
    ["SMA", "EMA", "ATR", "RSI", "MOMENTUM"]
        .into_iter()
        .map(|name| IndicatorRequest::new(name).param("period", DEFAULT_PERIOD as f64))
        .collect()
}

/// Record of one job execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct JobRun {
    pub job_name: String,
    pub started_at: DateTime<Utc>,
    pub finished_at: DateTime<Utc>,
    pub status: RunStatus,
    pub message: Option<String>,
    pub elapsed_ms: u64,
    pub symbols_processed: usize,
    pub rows_inserted: usize,
}

/// Ensure `requests` are cached for every symbol over `[start, end]`.
///
/// A symbol fails when its bars are unavailable or any request fails; failures
/// are listed in the message. The run is FAILED only if every symbol failed.
pub fn refresh_indicators(
    symbols: &[String],
    provider: &dyn PriceSeriesProvider,
    cache: &IndicatorCache,
    requests: &[IndicatorRequest],
    start: NaiveDate,
    end: NaiveDate,
) -> JobRun {
    let span = info_span!("job", job_name = DAILY_INDICATORS_JOB);
    let _guard = span.enter();
    let started_at = Utc::now();
    let clock = Instant::now();
    info!(symbols = symbols.len(), requests = requests.len(), "indicator refresh started");

    let outcomes: Vec<(&String, Result<usize, String>)> = symbols
        .par_iter()
        .map(|symbol| (symbol, refresh_symbol(symbol, provider, cache, requests, start, end)))
        .collect();

    let mut rows_inserted = 0;
    let mut symbols_processed = 0;
    let mut failures = Vec::new();
    for (symbol, outcome) in outcomes {
        match outcome {
            Ok(inserted) => {
                symbols_processed += 1;
                rows_inserted += inserted;
            }
            Err(reason) => {
                warn!(symbol = %symbol, %reason, "indicator refresh failed for symbol");
                failures.push(format!("{symbol}: {reason}"));
            }
        }
    }

    let status = if !symbols.is_empty() && symbols_processed == 0 {
        RunStatus::Failed
    } else {
        RunStatus::Completed
    };
    let elapsed_ms = u64::try_from(clock.elapsed().as_millis()).unwrap_or(u64::MAX);
    info!(
        ?status,
        symbols_processed,
        failed = failures.len(),
        rows_inserted,
        elapsed_ms,
        "indicator refresh finished"
    );

    JobRun {
        job_name: DAILY_INDICATORS_JOB.to_string(),
        started_at,
        finished_at: Utc::now(),
        status,
        message: (!failures.is_empty()).then(|| failures.join("; ")),
        elapsed_ms,
        symbols_processed,
        rows_inserted,
    }
}

fn refresh_symbol(
    symbol: &str,
    provider: &dyn PriceSeriesProvider,
    cache: &IndicatorCache,
    requests: &[IndicatorRequest],
    start: NaiveDate,
    end: NaiveDate,
) -> Result<usize, String> {
    let bars = provider
        .get_bars(symbol, start, end)
        .map_err(|e| e.to_string())?;
    let batch = cache.ensure(&symbol.trim().to_uppercase(), &bars, requests);
    if batch.is_ok() {
        Ok(batch.inserted)
    } else {
        Err(batch
            .errors
            .iter()
            .map(|e| format!("{}: {}", e.request, e.reason))
            .collect::<Vec<_>>()
            .join(", "))
    }
}
