//! Background job lifecycle: status reporting, cancellation, join.

use std::sync::mpsc::{self, Receiver, Sender};
use std::sync::{Arc, Mutex};

use chrono::NaiveDate;
use quantlab_core::cache::IndicatorCache;
use quantlab_core::domain::Bar;
use quantlab_core::engine::RunStatus;
use quantlab_runner::{
    BacktestConfig, BacktestJob, JobError, MemoryProvider, PriceSeriesProvider, ProviderError,
};

fn date(y: i32, m: u32, d: u32) -> NaiveDate {
    NaiveDate::from_ymd_opt(y, m, d).unwrap()
}

fn make_bars(n: usize) -> Vec<Bar> {
    (0..n)
        .map(|i| {
            let close = 50.0 + (i as f64 * 0.2).sin() * 5.0;
            Bar {
                date: date(2023, 1, 1) + chrono::Duration::days(i as i64),
                open: close,
                high: close + 0.5,
                low: close - 0.5,
                close,
                volume: 100,
            }
        })
        .collect()
}

fn config() -> BacktestConfig {
    BacktestConfig::new("JOB", date(2023, 1, 1), date(2023, 12, 31), "sma_cross")
        .param("fast", 3.0)
        .param("slow", 8.0)
}

/// Blocks inside `get_bars` until the test releases it.
struct GatedProvider {
    inner: MemoryProvider,
    entered: Mutex<Sender<()>>,
    release: Mutex<Receiver<()>>,
}

impl PriceSeriesProvider for GatedProvider {
    fn get_bars(
        &self,
        ticker: &str,
        start: NaiveDate,
        end: NaiveDate,
    ) -> Result<Vec<Bar>, ProviderError> {
        self.entered.lock().unwrap().send(()).unwrap();
        self.release.lock().unwrap().recv().unwrap();
        self.inner.get_bars(ticker, start, end)
    }
}

fn gated() -> (Arc<GatedProvider>, Receiver<()>, Sender<()>) {
    let (entered_tx, entered_rx) = mpsc::channel();
    let (release_tx, release_rx) = mpsc::channel();
    let provider = GatedProvider {
        inner: MemoryProvider::new().with_bars("JOB", make_bars(100)),
        entered: Mutex::new(entered_tx),
        release: Mutex::new(release_rx),
    };
    (Arc::new(provider), entered_rx, release_tx)
}

#[test]
fn job_runs_to_completion() {
    let provider = Arc::new(MemoryProvider::new().with_bars("JOB", make_bars(100)));
    let handle = BacktestJob::new(config(), provider, IndicatorCache::in_memory())
        .spawn()
        .unwrap();
    assert_eq!(handle.run_id(), config().run_id());

    let report = handle.join().unwrap();
    assert_eq!(report.status, RunStatus::Completed);
    assert_eq!(report.daily_positions.len(), 100);
}

#[test]
fn status_moves_through_running_to_terminal() {
    let (provider, entered, release) = gated();
    let handle = BacktestJob::new(config(), provider, IndicatorCache::in_memory())
        .spawn()
        .unwrap();

    entered.recv().unwrap();
    assert_eq!(handle.status(), RunStatus::Running);
    assert!(!handle.is_finished());

    release.send(()).unwrap();
    while !handle.is_finished() {
        std::thread::yield_now();
    }
    assert_eq!(handle.status(), RunStatus::Completed);
    assert!(handle.join().unwrap().is_completed());
}

#[test]
fn cancel_turns_the_run_failed() {
    let (provider, entered, release) = gated();
    let handle = BacktestJob::new(config(), provider, IndicatorCache::in_memory())
        .spawn()
        .unwrap();

    entered.recv().unwrap();
    handle.cancel();
    release.send(()).unwrap();

    let report = handle.join().unwrap();
    assert_eq!(report.status, RunStatus::Failed);
    assert!(report.message.unwrap().contains("cancelled"));
    assert!(report.daily_positions.is_empty());
    assert!(report.trades.is_empty());
}

#[test]
fn invalid_config_never_spawns() {
    let mut bad = config();
    bad.initial_cash = -1.0;
    let provider = Arc::new(MemoryProvider::new());
    let err = BacktestJob::new(bad, provider, IndicatorCache::in_memory())
        .spawn()
        .unwrap_err();
    assert!(matches!(err, JobError::Config(_)));
}

#[test]
fn concurrent_jobs_share_one_cache() {
    let provider = Arc::new(MemoryProvider::new().with_bars("JOB", make_bars(150)));
    let cache = IndicatorCache::in_memory();

    let handles: Vec<_> = (0..4)
        .map(|_| {
            BacktestJob::new(config(), provider.clone(), cache.clone())
                .spawn()
                .unwrap()
        })
        .collect();
    let reports: Vec<_> = handles.into_iter().map(|h| h.join().unwrap()).collect();

    for report in &reports {
        assert_eq!(report, &reports[0]);
    }
}
