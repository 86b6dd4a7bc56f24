//! Backtest engine: the day-by-day execution simulator and its run state.
//!
//! One [`ExecutionSimulator`] runs one symbol through one strategy:
//!
//! 1. Check for cancellation, mark equity at the bar's close.
//! 2. Flat: ask the strategy for an entry, size it, fill at the close.
//! 3. In a position: exit on the strategy's signal or on a stop breach, fill at the close.
//! 4. Record a daily position snapshot with drawdown from the running peak.
//!
//! At most one action happens per bar. All inputs are materialized before the
//! loop starts; the loop itself does no I/O.

pub mod error;
pub mod simulator;
pub mod state;

pub use error::EngineError;
pub use simulator::ExecutionSimulator;
pub use state::{CancelToken, EngineConfig, RunResult, RunStatus};
