//! Indicator cache: idempotent, fingerprint-keyed indicator computation.
//!
//! `IndicatorCache::ensure` turns a list of [`IndicatorRequest`]s into full
//! per-bar series for one symbol. For each request it:
//!
//! 1. builds the indicator (bad requests become per-request errors),
//! 2. looks the series up in the store under its [`SeriesId`] (symbol, name,
//!    fingerprint and the first bar date) and reuses it when the stored rows
//!    cover every bar date,
//! 3. otherwise computes the series and writes it with a single batch upsert.
//!
//! Every indicator here is causal, so two computations from the same first bar
//! agree on every date they share. Extending a series forward only fills new
//! dates; starting from a different first bar is a different series.
//!
//! The lookup is the primary dedupe; the store's per-date uniqueness absorbs
//! concurrent writers that raced past it.

pub mod store;

pub use store::{IndicatorStore, MemoryIndicatorStore, SeriesId, StoreError};

use std::collections::HashMap;
use std::sync::Arc;

use chrono::NaiveDate;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::domain::{Bar, DateRange, IndicatorValue};
use crate::fingerprint::{IndicatorRequest, SeriesKey};
use crate::indicators::{self, IndicatorValues};

/// A request that could not be satisfied, with the reason.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RequestError {
    pub request: IndicatorRequest,
    pub reason: String,
}

/// Outcome of one `ensure` call.
#[derive(Debug, Clone, Default)]
pub struct IndicatorBatch {
    /// Rows for every successful request, request order then date order.
    pub computed: Vec<IndicatorValue>,
    /// The same data as per-bar series, keyed for strategy lookup.
    pub values: IndicatorValues,
    pub errors: Vec<RequestError>,
    /// Rows newly written to the store by this call.
    pub inserted: usize,
    /// Requests served entirely from the store.
    pub cache_hits: usize,
}

impl IndicatorBatch {
    pub fn is_ok(&self) -> bool {
        self.errors.is_empty()
    }
}

/// Shared handle over an [`IndicatorStore`]. Cheap to clone across threads.
#[derive(Clone)]
pub struct IndicatorCache {
    store: Arc<dyn IndicatorStore>,
}

impl std::fmt::Debug for IndicatorCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("IndicatorCache").finish_non_exhaustive()
    }
}

impl IndicatorCache {
    pub fn new(store: Arc<dyn IndicatorStore>) -> Self {
        Self { store }
    }

    /// Cache over a fresh [`MemoryIndicatorStore`].
    pub fn in_memory() -> Self {
        Self::new(Arc::new(MemoryIndicatorStore::new()))
    }

    pub fn store(&self) -> &Arc<dyn IndicatorStore> {
        &self.store
    }

    /// Make sure every request has a stored series covering `bars`, and return them.
    pub fn ensure(
        &self,
        symbol: &str,
        bars: &[Bar],
        requests: &[IndicatorRequest],
    ) -> IndicatorBatch {
        let mut batch = IndicatorBatch::default();
        for request in requests {
            match self.ensure_one(symbol, bars, request) {
                Ok(outcome) => {
                    batch.inserted += outcome.inserted;
                    if outcome.cache_hit {
                        batch.cache_hits += 1;
                    }
                    batch.values.insert(request.key(), outcome.series);
                    batch.computed.extend(outcome.rows);
                }
                Err(reason) => {
                    warn!(symbol, request = %request, %reason, "indicator request failed");
                    batch.errors.push(RequestError {
                        request: request.clone(),
                        reason,
                    });
                }
            }
        }
        debug!(
            symbol,
            requests = requests.len(),
            inserted = batch.inserted,
            cache_hits = batch.cache_hits,
            errors = batch.errors.len(),
            "indicator batch ensured"
        );
        batch
    }

    fn ensure_one(
        &self,
        symbol: &str,
        bars: &[Bar],
        request: &IndicatorRequest,
    ) -> Result<SeriesOutcome, String> {
        let indicator = indicators::build(request).map_err(|e| e.to_string())?;
        let SeriesKey { name, fingerprint } = request.key();

        let (Some(first), Some(last)) = (bars.first(), bars.last()) else {
            return Ok(SeriesOutcome::default());
        };
        let range = DateRange::new(first.date, last.date);
        let id = SeriesId::new(symbol, name.clone(), fingerprint.clone(), first.date);

        if self.store.exists(&id, range).map_err(|e| e.to_string())? {
            let stored = self.store.fetch(&id, range).map_err(|e| e.to_string())?;
            if let Some(outcome) = covered(bars, stored) {
                debug!(symbol, indicator = %name, "indicator cache hit");
                return Ok(outcome);
            }
        }

        let series = indicator.compute(bars);
        let rows: Vec<IndicatorValue> = bars
            .iter()
            .zip(&series)
            .map(|(bar, &v)| IndicatorValue {
                symbol: symbol.to_string(),
                date: bar.date,
                name: name.clone(),
                fingerprint: fingerprint.clone(),
                value: (!v.is_nan()).then_some(v),
            })
            .collect();
        let inserted = self.store.upsert(&id, &rows).map_err(|e| e.to_string())?;
        debug!(symbol, indicator = %name, inserted, "indicator computed");

        Ok(SeriesOutcome {
            series,
            rows,
            inserted,
            cache_hit: false,
        })
    }
}

#[derive(Debug, Default)]
struct SeriesOutcome {
    series: Vec<f64>,
    rows: Vec<IndicatorValue>,
    inserted: usize,
    cache_hit: bool,
}

/// Rebuild a bar-aligned series from stored rows, or `None` if any bar date is missing.
fn covered(bars: &[Bar], stored: Vec<IndicatorValue>) -> Option<SeriesOutcome> {
    let mut by_date: HashMap<NaiveDate, IndicatorValue> =
        stored.into_iter().map(|row| (row.date, row)).collect();
    let mut series = Vec::with_capacity(bars.len());
    let mut rows = Vec::with_capacity(bars.len());
    for bar in bars {
        let row = by_date.remove(&bar.date)?;
        series.push(row.value.unwrap_or(f64::NAN));
        rows.push(row);
    }
    Some(SeriesOutcome {
        series,
        rows,
        inserted: 0,
        cache_hit: true,
    })
}
