//! Background backtest jobs.
//!
//! `BacktestJob::spawn` validates the config up front, then runs the backtest on
//! a dedicated named thread. The returned `JobHandle` reports the run's status,
//! can request cancellation (honoured at the next bar boundary), and joins for
//! the final report.

use std::sync::{Arc, Mutex, MutexGuard};
use std::thread::{self, JoinHandle};

use thiserror::Error;
use tracing::{debug, error};

use quantlab_core::cache::IndicatorCache;
use quantlab_core::engine::{CancelToken, RunStatus};

use crate::config::{BacktestConfig, ConfigError, RunId};
use crate::provider::PriceSeriesProvider;
use crate::runner::{run_backtest, BacktestReport};

#[derive(Debug, Error)]
pub enum JobError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("failed to spawn job thread: {0}")]
    Spawn(#[from] std::io::Error),
    #[error("job thread panicked")]
    Panicked,
}

/// A backtest waiting to be started.
pub struct BacktestJob {
    config: BacktestConfig,
    provider: Arc<dyn PriceSeriesProvider>,
    cache: IndicatorCache,
}

impl BacktestJob {
    pub fn new(
        config: BacktestConfig,
        provider: Arc<dyn PriceSeriesProvider>,
        cache: IndicatorCache,
    ) -> Self {
        Self {
            config,
            provider,
            cache,
        }
    }

    /// Start the job on its own thread.
    ///
    /// An invalid config is rejected here and no thread is started.
    pub fn spawn(self) -> Result<JobHandle, JobError> {
        self.config.validate()?;

        let run_id = self.config.run_id();
        let status = Arc::new(Mutex::new(RunStatus::Pending));
        let cancel = CancelToken::new();

        let thread = {
            let status = Arc::clone(&status);
            let cancel = cancel.clone();
            thread::Builder::new()
                .name(format!("backtest-{}", self.config.ticker.trim()))
                .spawn(move || self.execute(&status, &cancel))?
        };
        debug!(run_id = %run_id, "backtest job spawned");

        Ok(JobHandle {
            run_id,
            status,
            cancel,
            thread,
        })
    }

    fn execute(
        self,
        status: &Mutex<RunStatus>,
        cancel: &CancelToken,
    ) -> Result<BacktestReport, ConfigError> {
        advance(status, RunStatus::Running);
        let outcome = run_backtest(&self.config, self.provider.as_ref(), &self.cache, cancel);
        match &outcome {
            Ok(report) => advance(status, report.status),
            Err(e) => {
                error!(error = %e, "backtest job rejected its config");
                advance(status, RunStatus::Failed);
            }
        }
        outcome
    }
}

fn lock(status: &Mutex<RunStatus>) -> MutexGuard<'_, RunStatus> {
    status.lock().unwrap_or_else(|poisoned| poisoned.into_inner())
}

fn advance(status: &Mutex<RunStatus>, next: RunStatus) {
    let mut current = lock(status);
    *current = current.transition(next);
}

/// Handle to a running backtest job.
#[derive(Debug)]
pub struct JobHandle {
    run_id: RunId,
    status: Arc<Mutex<RunStatus>>,
    cancel: CancelToken,
    thread: JoinHandle<Result<BacktestReport, ConfigError>>,
}

impl JobHandle {
    pub fn run_id(&self) -> &str {
        &self.run_id
    }

    /// Current lifecycle state: PENDING, RUNNING, COMPLETED or FAILED.
    pub fn status(&self) -> RunStatus {
        *lock(&self.status)
    }

    /// Request cancellation. The run stops before its next bar and ends FAILED.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    pub fn is_finished(&self) -> bool {
        self.thread.is_finished()
    }

    /// Wait for the job and return its report.
    pub fn join(self) -> Result<BacktestReport, JobError> {
        match self.thread.join() {
            Ok(outcome) => Ok(outcome?),
            Err(_) => {
                advance(&self.status, RunStatus::Failed);
                Err(JobError::Panicked)
            }
        }
    }
}
