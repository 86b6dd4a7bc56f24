//! Price series providers.
//!
//! The engine never fetches data itself; a `PriceSeriesProvider` hands it a
//! fully materialized, date-ordered bar series for one ticker. Two reference
//! providers live here: an in-memory map (tests, embedding) and a directory of
//! per-ticker CSV files.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use chrono::NaiveDate;
use serde::Deserialize;
use thiserror::Error;
use tracing::debug;

use quantlab_core::domain::Bar;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum ProviderError {
    #[error("data unavailable: no bars for {ticker} between {start} and {end}")]
    DataUnavailable {
        ticker: String,
        start: NaiveDate,
        end: NaiveDate,
    },
    #[error("failed to read price data from {path}: {reason}")]
    Read { path: PathBuf, reason: String },
}

/// Source of daily bars for a ticker.
pub trait PriceSeriesProvider: Send + Sync {
    /// Bars for `ticker` with `start <= date <= end`, ascending by date.
    ///
    /// Returns `DataUnavailable` rather than an empty series.
    fn get_bars(&self, ticker: &str, start: NaiveDate, end: NaiveDate)
        -> Result<Vec<Bar>, ProviderError>;
}

fn normalize_ticker(ticker: &str) -> String {
    ticker.trim().to_uppercase()
}

/// Sort, drop duplicate dates (first wins), and keep the inclusive range.
fn select_range(
    mut bars: Vec<Bar>,
    ticker: &str,
    start: NaiveDate,
    end: NaiveDate,
) -> Result<Vec<Bar>, ProviderError> {
    bars.retain(|b| b.date >= start && b.date <= end);
    bars.sort_by_key(|b| b.date);
    bars.dedup_by_key(|b| b.date);
    if bars.is_empty() {
        return Err(ProviderError::DataUnavailable {
            ticker: ticker.to_string(),
            start,
            end,
        });
    }
    Ok(bars)
}

// ─── In-memory ──────────────────────────────────────────────────────

#[derive(Debug, Clone, Default)]
pub struct MemoryProvider {
    series: HashMap<String, Vec<Bar>>,
}

impl MemoryProvider {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_bars(mut self, ticker: &str, bars: Vec<Bar>) -> Self {
        self.insert(ticker, bars);
        self
    }

    /// Replace the series stored for `ticker`.
    pub fn insert(&mut self, ticker: &str, bars: Vec<Bar>) {
        self.series.insert(normalize_ticker(ticker), bars);
    }

    pub fn tickers(&self) -> impl Iterator<Item = &str> {
        self.series.keys().map(String::as_str)
    }
}

impl PriceSeriesProvider for MemoryProvider {
    fn get_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, ProviderError> {
        let ticker = normalize_ticker(ticker);
        let bars = self.series.get(&ticker).cloned().unwrap_or_default();
        select_range(bars, &ticker, start, end)
    }
}

// ─── CSV directory ──────────────────────────────────────────────────

/// Reads `{dir}/{TICKER}.csv` with a `date,open,high,low,close,volume` header.
#[derive(Debug, Clone)]
pub struct CsvProvider {
    dir: PathBuf,
}

#[derive(Debug, Deserialize)]
struct CsvRow {
    date: NaiveDate,
    open: f64,
    high: f64,
    low: f64,
    close: f64,
    #[serde(default)]
    volume: f64,
}

impl CsvProvider {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self { dir: dir.into() }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    pub fn path_for(&self, ticker: &str) -> PathBuf {
        self.dir.join(format!("{}.csv", normalize_ticker(ticker)))
    }

    fn read_all(path: &Path) -> Result<Vec<Bar>, ProviderError> {
        let read_err = |e: csv::Error| ProviderError::Read {
            path: path.to_path_buf(),
            reason: e.to_string(),
        };
        let mut reader = csv::ReaderBuilder::new()
            .trim(csv::Trim::All)
            .from_path(path)
            .map_err(read_err)?;
        reader
            .deserialize::<CsvRow>()
            .map(|row| {
                let row = row.map_err(read_err)?;
                Ok(Bar {
                    date: row.date,
                    open: row.open,
                    high: row.high,
                    low: row.low,
                    close: row.close,
                    volume: row.volume.max(0.0) as u64,
                })
            })
            .collect()
    }
}

impl PriceSeriesProvider for CsvProvider {
    fn get_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, ProviderError> {
        let ticker = normalize_ticker(ticker);
        let path = self.path_for(&ticker);
        if !path.is_file() {
            debug!(ticker = %ticker, path = %path.display(), "no price file");
            return Err(ProviderError::DataUnavailable { ticker, start, end });
        }
        let bars = Self::read_all(&path)?;
        debug!(ticker = %ticker, rows = bars.len(), "price file loaded");
        select_range(bars, &ticker, start, end)
    }
}
