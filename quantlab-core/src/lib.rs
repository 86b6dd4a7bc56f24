//! QuantLab Core: the single-symbol backtest execution engine.
//!
//! - Domain types (bars, trades, daily positions, stored indicator rows)
//! - Parameter fingerprints for indicator requests
//! - Technical indicators and the idempotent, store-backed indicator cache
//! - Strategy signal generation over a no-lookahead history view
//! - Risk-based position sizing
//! - The day-by-day execution simulator

pub mod cache;
pub mod domain;
pub mod engine;
pub mod fingerprint;
pub mod indicators;
pub mod signals;
pub mod sizer;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: types shared across run threads are Send + Sync.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::Trade>();
        require_sync::<domain::Trade>();
        require_send::<domain::DailyPosition>();
        require_sync::<domain::DailyPosition>();
        require_send::<domain::IndicatorValue>();
        require_sync::<domain::IndicatorValue>();

        require_send::<indicators::IndicatorValues>();
        require_sync::<indicators::IndicatorValues>();
        require_send::<cache::IndicatorCache>();
        require_sync::<cache::IndicatorCache>();
        require_send::<cache::MemoryIndicatorStore>();
        require_sync::<cache::MemoryIndicatorStore>();

        require_send::<signals::Strategy>();
        require_sync::<signals::Strategy>();

        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunResult>();
        require_sync::<engine::RunResult>();
        require_send::<engine::CancelToken>();
        require_sync::<engine::CancelToken>();
        require_send::<engine::ExecutionSimulator>();
    }

    /// Strategies only see a `History`, never the simulator's cash or trades.
    #[test]
    fn signal_generator_sees_history_and_exposure_only() {
        fn _check_trait_object_builds(
            sig: &dyn signals::SignalGenerator,
            history: &signals::History<'_>,
        ) -> Result<signals::Decision, signals::SignalError> {
            sig.evaluate(history, signals::Exposure::Flat)
        }
    }
}
