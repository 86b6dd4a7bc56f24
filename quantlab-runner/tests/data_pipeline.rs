//! CSV-backed price data and the indicator refresh job.

use std::fmt::Write as _;
use std::path::Path;
use std::sync::Arc;

use chrono::NaiveDate;
use quantlab_core::cache::{IndicatorCache, MemoryIndicatorStore};
use quantlab_core::engine::{CancelToken, RunStatus};
use quantlab_core::fingerprint::IndicatorRequest;
use quantlab_runner::refresh::DAILY_INDICATORS_JOB;
use quantlab_runner::{
    default_refresh_requests, refresh_indicators, run_backtest, BacktestConfig, CsvProvider,
    PriceSeriesProvider, ProviderError, Settings,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

/// Write `{dir}/{ticker}.csv` with `n` daily rows starting 2021-01-04, newest first.
fn write_csv(dir: &Path, ticker: &str, n: usize) {
    let mut text = String::from("date,open,high,low,close,volume\n");
    for i in (0..n).rev() {
        let d = date(2021, 1, 4) + chrono::Duration::days(i as i64);
        let close = 30.0 + (i as f64 * 0.1).sin() * 3.0 + i as f64 * 0.02;
        writeln!(
            text,
            "{d},{:.4},{:.4},{:.4},{:.4},{}",
            close - 0.1,
            close + 0.5,
            close - 0.5,
            close,
            10_000 + i
        )
        .unwrap();
    }
    std::fs::write(dir.join(format!("{ticker}.csv")), text).unwrap();
}

#[test]
fn csv_provider_reads_sorted_inclusive_range() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_csv(temp_dir.path(), "SPY", 30);
    let provider = CsvProvider::new(temp_dir.path());

    let bars = provider.get_bars("spy", date(2021, 1, 10), date(2021, 1, 20)).unwrap();
    assert_eq!(bars.len(), 11);
    assert_eq!(bars.first().unwrap().date, date(2021, 1, 10));
    assert_eq!(bars.last().unwrap().date, date(2021, 1, 20));
    assert!(bars.windows(2).all(|w| w[0].date < w[1].date));
    assert_eq!(bars[0].volume, 10_006);
}

#[test]
fn csv_provider_reports_missing_file_as_unavailable() {
    let temp_dir = tempfile::tempdir().unwrap();
    let provider = CsvProvider::new(temp_dir.path());
    let err = provider.get_bars("QQQ", date(2021, 1, 1), date(2021, 2, 1)).unwrap_err();
    assert!(matches!(err, ProviderError::DataUnavailable { .. }));
}

#[test]
fn csv_provider_rejects_malformed_rows() {
    let temp_dir = tempfile::tempdir().unwrap();
    std::fs::write(
        temp_dir.path().join("BAD.csv"),
        "date,open,high,low,close,volume\n2021-01-04,1,2,0.5,not-a-number,10\n",
    )
    .unwrap();
    let provider = CsvProvider::new(temp_dir.path());
    let err = provider.get_bars("BAD", date(2021, 1, 1), date(2021, 2, 1)).unwrap_err();
    assert!(matches!(err, ProviderError::Read { .. }));
}

#[test]
fn backtest_over_csv_data() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_csv(temp_dir.path(), "IWM", 250);
    let settings = Settings {
        data_dir: Some(temp_dir.path().to_path_buf()),
        ..Settings::default()
    };
    let provider = settings.csv_provider().unwrap();

    let config = BacktestConfig::new("IWM", date(2021, 1, 1), date(2021, 12, 31), "trend_following")
        .param("trend_period", 20.0)
        .param("atr_period", 10.0);
    let report = run_backtest(&config, &provider, &IndicatorCache::in_memory(), &CancelToken::new())
        .unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.bar_count, 250);
}

#[test]
fn settings_drive_refresh_and_artifact_location() {
    let data_dir = tempfile::tempdir().unwrap();
    let results_dir = tempfile::tempdir().unwrap();
    write_csv(data_dir.path(), "DIA", 30);
    let settings = Settings {
        data_dir: Some(data_dir.path().to_path_buf()),
        results_dir: results_dir.path().to_path_buf(),
        refresh_start: date(2021, 1, 10),
        refresh_indicators: vec![IndicatorRequest::new("SMA").param("period", 5.0)],
        ..Settings::default()
    };

    let run = settings
        .refresh(&["DIA".to_string()], &IndicatorCache::in_memory(), date(2021, 12, 31))
        .unwrap();
    assert_eq!(run.status, RunStatus::Completed);
    // Bars from 2021-01-10 onward only.
    assert_eq!(run.rows_inserted, 24);

    let provider = settings.csv_provider().unwrap();
    let config = BacktestConfig::new("DIA", date(2021, 1, 1), date(2021, 12, 31), "sma_cross")
        .param("fast", 3.0)
        .param("slow", 8.0);
    let report = run_backtest(&config, &provider, &IndicatorCache::in_memory(), &CancelToken::new())
        .unwrap();
    let run_dir = settings.save_report(&report).unwrap();
    assert!(run_dir.starts_with(results_dir.path()));
    assert!(run_dir.join("trades.csv").is_file());
}

#[test]
fn refresh_fills_cache_and_is_idempotent() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_csv(temp_dir.path(), "AAA", 60);
    write_csv(temp_dir.path(), "BBB", 40);
    let provider = CsvProvider::new(temp_dir.path());
    let store = Arc::new(MemoryIndicatorStore::new());
    let cache = IndicatorCache::new(store.clone());
    let symbols = vec!["AAA".to_string(), "BBB".to_string()];
    let requests = default_refresh_requests();

    let run = refresh_indicators(
        &symbols,
        &provider,
        &cache,
        &requests,
        date(2021, 1, 1),
        date(2021, 12, 31),
    );
    assert_eq!(run.job_name, DAILY_INDICATORS_JOB);
    assert_eq!(run.status, RunStatus::Completed);
    assert_eq!(run.message, None);
    assert_eq!(run.symbols_processed, 2);
    assert_eq!(run.rows_inserted, (60 + 40) * requests.len());
    assert!(run.finished_at >= run.started_at);
    assert_eq!(store.series_count(), 2 * requests.len());

    let again = refresh_indicators(
        &symbols,
        &provider,
        &cache,
        &requests,
        date(2021, 1, 1),
        date(2021, 12, 31),
    );
    assert_eq!(again.status, RunStatus::Completed);
    assert_eq!(again.rows_inserted, 0);
}

#[test]
fn refresh_fails_only_when_every_symbol_fails() {
    let temp_dir = tempfile::tempdir().unwrap();
    write_csv(temp_dir.path(), "AAA", 30);
    let provider = CsvProvider::new(temp_dir.path());
    let cache = IndicatorCache::in_memory();
    let requests = vec![IndicatorRequest::new("SMA").param("period", 5.0)];

    let partial = refresh_indicators(
        &["AAA".to_string(), "ZZZ".to_string()],
        &provider,
        &cache,
        &requests,
        date(2021, 1, 1),
        date(2021, 12, 31),
    );
    assert_eq!(partial.status, RunStatus::Completed);
    assert_eq!(partial.symbols_processed, 1);
    assert!(partial.message.unwrap().starts_with("ZZZ: data unavailable"));

    let failed = refresh_indicators(
        &["ZZZ".to_string()],
        &provider,
        &cache,
        &requests,
        date(2021, 1, 1),
        date(2021, 12, 31),
    );
    assert_eq!(failed.status, RunStatus::Failed);
    assert_eq!(failed.symbols_processed, 0);

    let bad_request = refresh_indicators(
        &["AAA".to_string()],
        &provider,
        &cache,
        &[IndicatorRequest::new("VWAP")],
        date(2021, 1, 1),
        date(2021, 12, 31),
    );
    assert_eq!(bad_request.status, RunStatus::Failed);
    assert!(bad_request.message.unwrap().contains("VWAP"));
}
