//! Fatal run errors.

use chrono::NaiveDate;
use thiserror::Error;

use crate::signals::SignalError;

/// Anything that stops a run. The `Display` form becomes the FAILED message.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum EngineError {
    #[error("data unavailable: no bars for {symbol} in the requested range")]
    DataUnavailable { symbol: String },

    #[error("strategy dependency error at {date}: {source}")]
    StrategyDependency {
        date: NaiveDate,
        #[source]
        source: SignalError,
    },

    #[error("execution error{}: {reason}", at_date(.date))]
    Execution {
        date: Option<NaiveDate>,
        reason: String,
    },

    #[error("cancelled before bar {bar_index}")]
    Cancelled { bar_index: usize },
}

fn at_date(date: &Option<NaiveDate>) -> String {
    date.map(|d| format!(" at {d}")).unwrap_or_default()
}

impl EngineError {
    pub fn execution(date: Option<NaiveDate>, reason: impl Into<String>) -> Self {
        EngineError::Execution {
            date,
            reason: reason.into(),
        }
    }
}
