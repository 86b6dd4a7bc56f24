//! Runner settings, loaded from TOML.
//!
//! ```toml
//! log_filter = "quantlab_runner=debug,info"
//! results_dir = "./results"
//! data_dir = "./data"
//! refresh_start = "2020-01-01"
//!
//! [[refresh_indicators]]
//! name = "SMA"
//! params = { period = 50 }
//! ```
//!
//! Every field is optional.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use chrono::NaiveDate;
use serde::{Deserialize, Serialize};

use quantlab_core::cache::IndicatorCache;
use quantlab_core::fingerprint::IndicatorRequest;

use crate::export::save_artifacts;
use crate::logging;
use crate::provider::CsvProvider;
use crate::refresh::{default_refresh_requests, refresh_indicators, JobRun};
use crate::runner::BacktestReport;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct Settings {
    /// `tracing` filter directive; RUST_LOG takes precedence.
    pub log_filter: String,
    /// Where `save_artifacts` writes run directories.
    pub results_dir: PathBuf,
    /// Root of the per-ticker CSV files, if prices come from disk.
    pub data_dir: Option<PathBuf>,
    pub refresh_indicators: Vec<IndicatorRequest>,
    /// First date the indicator refresh covers.
    pub refresh_start: NaiveDate,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            log_filter: "info".to_string(),
            results_dir: PathBuf::from("./results"),
            data_dir: None,
            refresh_indicators: default_refresh_requests(),
            refresh_start: NaiveDate::from_ymd_opt(2020, 1, 1).unwrap_or_default(),
        }
    }
}

impl Settings {
    pub fn from_toml_str(text: &str) -> Result<Self> {
        toml::from_str(text).context("failed to parse settings TOML")
    }

    pub fn load(path: &Path) -> Result<Self> {
        let text = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read settings file {}", path.display()))?;
        Self::from_toml_str(&text).with_context(|| format!("invalid settings in {}", path.display()))
    }

    /// Settings from `path` if it exists, defaults otherwise.
    pub fn load_or_default(path: &Path) -> Result<Self> {
        if path.exists() {
            Self::load(path)
        } else {
            Ok(Self::default())
        }
    }

    pub fn csv_provider(&self) -> Option<CsvProvider> {
        self.data_dir.as_ref().map(CsvProvider::new)
    }

    /// Install the global subscriber with `log_filter`. False if one was already set.
    pub fn init_logging(&self) -> bool {
        logging::init(&self.log_filter)
    }

    /// Write the run's artifacts under `results_dir`.
    pub fn save_report(&self, report: &BacktestReport) -> Result<PathBuf> {
        save_artifacts(&self.results_dir, report)
    }

    /// Refresh `refresh_indicators` for `symbols` from `refresh_start` through `end`,
    /// reading prices from `data_dir`.
    pub fn refresh(&self, symbols: &[String], cache: &IndicatorCache, end: NaiveDate) -> Result<JobRun> {
        let provider = self
            .csv_provider()
            .context("indicator refresh needs data_dir to be set")?;
        Ok(refresh_indicators(
            symbols,
            &provider,
            cache,
            &self.refresh_indicators,
            self.refresh_start,
            end,
        ))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn empty_file_gives_defaults() {
        let s = Settings::from_toml_str("").unwrap();
        assert_eq!(s, Settings::default());
        assert_eq!(s.log_filter, "info");
        assert_eq!(s.results_dir, PathBuf::from("./results"));
        assert_eq!(s.refresh_indicators.len(), 5);
        assert!(s.csv_provider().is_none());
    }

    #[test]
    fn overrides_are_applied() {
        let s = Settings::from_toml_str(
            r#"
            log_filter = "debug"
            data_dir = "/srv/prices"
            refresh_start = "2022-06-01"

            [[refresh_indicators]]
            name = "SMA"
            params = { period = 50 }

            [[refresh_indicators]]
            name = "DONCHIAN_HIGH"
            params = { lookback = 20 }
            "#,
        )
        .unwrap();
        assert_eq!(s.log_filter, "debug");
        assert_eq!(s.refresh_start, NaiveDate::from_ymd_opt(2022, 6, 1).unwrap());
        assert_eq!(s.refresh_indicators.len(), 2);
        assert_eq!(s.refresh_indicators[0].params["period"], 50.0);
        assert_eq!(
            s.csv_provider().unwrap().dir(),
            Path::new("/srv/prices")
        );
    }

    #[test]
    fn refresh_requires_data_dir() {
        let err = Settings::default()
            .refresh(
                &["AAPL".to_string()],
                &IndicatorCache::in_memory(),
                NaiveDate::from_ymd_opt(2024, 1, 1).unwrap(),
            )
            .unwrap_err();
        assert!(err.to_string().contains("data_dir"));
    }

    #[test]
    fn logging_uses_configured_filter_once() {
        let s = Settings::from_toml_str(r#"log_filter = "warn""#).unwrap();
        let _first = s.init_logging();
        assert!(!s.init_logging());
    }

    #[test]
    fn unknown_types_are_errors() {
        assert!(Settings::from_toml_str("results_dir = 5").is_err());
    }
}
