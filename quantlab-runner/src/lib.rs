//! quantlab runner: backtest orchestration on top of `quantlab-core`.
//!
//! This crate provides:
//! - `BacktestConfig` parsing and validation
//! - Price series providers (in-memory, CSV directory)
//! - `run_backtest` / `run_batch` / `compute_indicators` entry points
//! - Background jobs with status and cancellation
//! - Metrics, JSON/CSV export, indicator refresh, settings and logging setup

pub mod config;
pub mod export;
pub mod job;
pub mod logging;
pub mod metrics;
pub mod provider;
pub mod refresh;
pub mod runner;
pub mod settings;

pub use config::{BacktestConfig, ConfigError, RunId};
pub use job::{BacktestJob, JobError, JobHandle};
pub use metrics::Metrics;
pub use provider::{CsvProvider, MemoryProvider, PriceSeriesProvider, ProviderError};
pub use refresh::{default_refresh_requests, refresh_indicators, JobRun};
pub use runner::{compute_indicators, run_backtest, run_batch, BacktestReport, SCHEMA_VERSION};
pub use settings::Settings;

#[cfg(test)]
mod send_sync_checks {
    use super::*;

    fn assert_send<T: Send>() {}
    fn assert_sync<T: Sync>() {}

    #[test]
    fn report_types_are_send_sync() {
        assert_send::<BacktestReport>();
        assert_sync::<BacktestReport>();
        assert_send::<Metrics>();
        assert_sync::<Metrics>();
        assert_send::<JobRun>();
        assert_sync::<JobRun>();
    }

    #[test]
    fn config_types_are_send_sync() {
        assert_send::<BacktestConfig>();
        assert_sync::<BacktestConfig>();
        assert_send::<Settings>();
        assert_sync::<Settings>();
    }

    #[test]
    fn providers_are_send_sync() {
        assert_send::<MemoryProvider>();
        assert_sync::<MemoryProvider>();
        assert_send::<CsvProvider>();
        assert_sync::<CsvProvider>();
    }

    #[test]
    fn job_handle_is_send() {
        assert_send::<JobHandle>();
        assert_sync::<JobHandle>();
    }
}
