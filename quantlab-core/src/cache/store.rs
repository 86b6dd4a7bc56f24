//! Indicator persistence: the store trait and a concurrent in-memory implementation.
//!
//! Rows are grouped into series identified by [`SeriesId`]: symbol, indicator
//! name, parameter fingerprint, and the first bar date the series was computed
//! from. Warmup rows and recursive seeds (EMA, RSI, ATR) depend on that origin,
//! so series computed from different origins never share rows.
//!
//! Within one series a store enforces uniqueness per date. `upsert` ignores
//! dates that already exist (first writer wins) and reports how many rows were
//! actually new.

use std::collections::btree_map::Entry;
use std::collections::BTreeMap;
use std::fmt;

use chrono::NaiveDate;
use dashmap::DashMap;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::domain::{DateRange, IndicatorValue};
use crate::fingerprint::ParamsFingerprint;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum StoreError {
    #[error("indicator store unavailable: {0}")]
    Unavailable(String),
}

/// Identity of one stored series.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct SeriesId {
    pub symbol: String,
    pub name: String,
    pub fingerprint: ParamsFingerprint,
    /// Date of the first bar the series was computed from.
    pub origin: NaiveDate,
}

impl SeriesId {
    pub fn new(
        symbol: impl Into<String>,
        name: impl Into<String>,
        fingerprint: ParamsFingerprint,
        origin: NaiveDate,
    ) -> Self {
        Self {
            symbol: symbol.into(),
            name: name.into(),
            fingerprint,
            origin,
        }
    }
}

impl fmt::Display for SeriesId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let fp = self.fingerprint.as_str();
        write!(
            f,
            "{}/{}#{}@{}",
            self.symbol,
            self.name,
            &fp[..12.min(fp.len())],
            self.origin
        )
    }
}

/// Persistence collaborator for computed indicator rows.
pub trait IndicatorStore: Send + Sync {
    /// Insert the rows of `series`, skipping dates already stored for it.
    /// Returns the number of rows inserted.
    fn upsert(&self, series: &SeriesId, rows: &[IndicatorValue]) -> Result<usize, StoreError>;

    /// True if `series` has any row inside `range`.
    fn exists(&self, series: &SeriesId, range: DateRange) -> Result<bool, StoreError>;

    /// All rows of `series` inside `range`, ascending by date.
    fn fetch(&self, series: &SeriesId, range: DateRange) -> Result<Vec<IndicatorValue>, StoreError>;
}

/// In-memory store backed by a sharded concurrent map.
///
/// Rows of one series live under a single map entry. Each date is inserted
/// while holding that entry's shard lock, so two racing writers of the same
/// series cannot both insert the same date.
#[derive(Debug, Default)]
pub struct MemoryIndicatorStore {
    series: DashMap<SeriesId, BTreeMap<NaiveDate, Option<f64>>>,
}

impl MemoryIndicatorStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of stored rows across all series.
    pub fn row_count(&self) -> usize {
        self.series.iter().map(|entry| entry.value().len()).sum()
    }

    /// Number of distinct series.
    pub fn series_count(&self) -> usize {
        self.series.len()
    }
}

impl IndicatorStore for MemoryIndicatorStore {
    fn upsert(&self, series: &SeriesId, rows: &[IndicatorValue]) -> Result<usize, StoreError> {
        let mut stored = self.series.entry(series.clone()).or_default();
        let mut inserted = 0;
        for row in rows {
            if let Entry::Vacant(slot) = stored.entry(row.date) {
                slot.insert(row.value);
                inserted += 1;
            }
        }
        Ok(inserted)
    }

    fn exists(&self, series: &SeriesId, range: DateRange) -> Result<bool, StoreError> {
        Ok(self
            .series
            .get(series)
            .is_some_and(|rows| rows.range(range.start..=range.end).next().is_some()))
    }

    fn fetch(&self, series: &SeriesId, range: DateRange) -> Result<Vec<IndicatorValue>, StoreError> {
        let Some(rows) = self.series.get(series) else {
            return Ok(Vec::new());
        };
        Ok(rows
            .range(range.start..=range.end)
            .map(|(&date, &value)| IndicatorValue {
                symbol: series.symbol.clone(),
                date,
                name: series.name.clone(),
                fingerprint: series.fingerprint.clone(),
                value,
            })
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::Arc;
    use std::thread;

    fn date(day: u32) -> NaiveDate {
        NaiveDate::from_ymd_opt(2024, 1, day).unwrap()
    }

    fn sma(symbol: &str, origin: u32) -> SeriesId {
        SeriesId::new(
            symbol,
            "SMA",
            ParamsFingerprint::from_bytes(b"{\"period\":2.0}"),
            date(origin),
        )
    }

    fn row(day: u32, value: Option<f64>) -> IndicatorValue {
        let id = sma("AAPL", 1);
        IndicatorValue {
            symbol: id.symbol,
            date: date(day),
            name: id.name,
            fingerprint: id.fingerprint,
            value,
        }
    }

    #[test]
    fn upsert_ignores_duplicates() {
        let store = MemoryIndicatorStore::new();
        let id = sma("AAPL", 1);
        assert_eq!(store.upsert(&id, &[row(2, None), row(3, Some(1.0))]).unwrap(), 2);
        assert_eq!(store.upsert(&id, &[row(3, Some(99.0)), row(4, Some(2.0))]).unwrap(), 1);
        assert_eq!(store.row_count(), 3);

        // First writer wins.
        let rows = store.fetch(&id, DateRange::new(date(3), date(3))).unwrap();
        assert_eq!(rows[0].value, Some(1.0));
    }

    #[test]
    fn origins_do_not_share_rows() {
        let store = MemoryIndicatorStore::new();
        store.upsert(&sma("AAPL", 1), &[row(3, Some(1.0))]).unwrap();
        assert_eq!(store.upsert(&sma("AAPL", 3), &[row(3, None)]).unwrap(), 1);
        assert_eq!(store.series_count(), 2);

        let later = store
            .fetch(&sma("AAPL", 3), DateRange::new(date(1), date(31)))
            .unwrap();
        assert_eq!(later.len(), 1);
        assert_eq!(later[0].value, None);
        assert!(!store.exists(&sma("AAPL", 2), DateRange::new(date(1), date(31))).unwrap());
    }

    #[test]
    fn exists_respects_range() {
        let store = MemoryIndicatorStore::new();
        let id = sma("AAPL", 1);
        store.upsert(&id, &[row(5, Some(1.0))]).unwrap();
        assert!(store.exists(&id, DateRange::new(date(1), date(10))).unwrap());
        assert!(!store.exists(&id, DateRange::new(date(6), date(10))).unwrap());
        assert!(!store.exists(&sma("MSFT", 1), DateRange::new(date(1), date(10))).unwrap());
    }

    #[test]
    fn fetch_is_date_ordered() {
        let store = MemoryIndicatorStore::new();
        let id = sma("AAPL", 1);
        store
            .upsert(&id, &[row(9, Some(3.0)), row(2, None), row(5, Some(2.0))])
            .unwrap();
        let rows = store.fetch(&id, DateRange::new(date(1), date(31))).unwrap();
        let dates: Vec<_> = rows.iter().map(|r| r.date).collect();
        assert_eq!(dates, vec![date(2), date(5), date(9)]);
    }

    #[test]
    fn concurrent_duplicate_upserts_insert_once() {
        let store = Arc::new(MemoryIndicatorStore::new());
        let rows: Vec<IndicatorValue> = (1..=20).map(|d| row(d, Some(d as f64))).collect();

        let handles: Vec<_> = (0..8)
            .map(|_| {
                let store = Arc::clone(&store);
                let rows = rows.clone();
                thread::spawn(move || store.upsert(&sma("AAPL", 1), &rows).unwrap())
            })
            .collect();
        let total: usize = handles.into_iter().map(|h| h.join().unwrap()).sum();

        assert_eq!(total, 20);
        assert_eq!(store.row_count(), 20);
        assert_eq!(store.series_count(), 1);
    }
}
