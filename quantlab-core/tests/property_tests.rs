//! Property-based tests for the execution engine and its building blocks.

use chrono::NaiveDate;
use proptest::prelude::*;
use quantlab_core::cache::IndicatorCache;
use quantlab_core::domain::Bar;
use quantlab_core::engine::{CancelToken, EngineConfig, ExecutionSimulator, RunStatus};
use quantlab_core::signals::{SmaCross, TrendFollowing};
use quantlab_core::sizer::RiskSizer;

// ── Strategies ─────────────────────────────────────────────────────

fn arb_closes(min: usize, max: usize) -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-3.0..3.0f64, min..max).prop_map(|steps| {
        let mut price = 100.0;
        steps
            .into_iter()
            .map(|s| {
                price = (price + s).max(5.0);
                price
            })
            .collect()
    })
}

fn to_bars(closes: &[f64]) -> Vec<Bar> {
    let base = NaiveDate::from_ymd_opt(2020, 1, 1).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| Bar {
            date: base + chrono::Duration::days(i as i64),
            open: close,
            high: close * 1.01,
            low: close * 0.99,
            close,
            volume: 10_000,
        })
        .collect()
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(64))]

    // ── 1. Drawdown stays in [0, 1] and the running peak never falls ──

    #[test]
    fn drawdown_bounded_and_peak_monotone(closes in arb_closes(10, 150), commission in 0.0..0.5f64) {
        let bars = to_bars(&closes);
        let strategy = SmaCross::new(3, 8, 0.05, true);
        let result = ExecutionSimulator::new(
            EngineConfig::new("PROP", 100_000.0).with_commission(commission),
        )
        .run_with_cache(&IndicatorCache::in_memory(), &bars, &strategy, &CancelToken::new());

        prop_assert_eq!(result.status, RunStatus::Completed);
        prop_assert_eq!(result.daily_positions.len(), bars.len());

        let mut peak = 100_000.0_f64;
        for snapshot in &result.daily_positions {
            prop_assert!((0.0..=1.0).contains(&snapshot.drawdown));
            let new_peak = peak.max(snapshot.equity);
            prop_assert!(new_peak >= peak);
            peak = new_peak;
            let expected = if peak > 0.0 { (peak - snapshot.equity) / peak } else { 0.0 };
            prop_assert!((snapshot.drawdown - expected.clamp(0.0, 1.0)).abs() < 1e-9);
        }
    }

    // ── 2. At most one position open; trades never overlap ──

    #[test]
    fn trades_do_not_overlap(closes in arb_closes(30, 200)) {
        let bars = to_bars(&closes);
        let strategy = TrendFollowing::new(10, 5, 1.5, true);
        let result = ExecutionSimulator::new(EngineConfig::new("PROP", 100_000.0))
            .run_with_cache(&IndicatorCache::in_memory(), &bars, &strategy, &CancelToken::new());

        prop_assert_eq!(result.status, RunStatus::Completed);
        prop_assert!(result.trades.iter().filter(|t| !t.is_closed()).count() <= 1);
        for pair in result.trades.windows(2) {
            let prev_exit = pair[0].exit_date;
            prop_assert!(prev_exit.is_some());
            prop_assert!(prev_exit.unwrap() <= pair[1].entry_date);
        }
        for trade in &result.trades {
            prop_assert!(trade.size >= 1);
            if let Some(exit) = trade.exit_date {
                prop_assert!(exit >= trade.entry_date);
            }
        }
    }

    // ── 3. Cash never goes negative on a completed run ──

    #[test]
    fn cash_never_negative(closes in arb_closes(10, 120), commission in 0.0..2.0f64) {
        let bars = to_bars(&closes);
        let strategy = SmaCross::new(2, 5, 0.02, false);
        let result = ExecutionSimulator::new(
            EngineConfig::new("PROP", 10_000.0).with_commission(commission),
        )
        .run_with_cache(&IndicatorCache::in_memory(), &bars, &strategy, &CancelToken::new());

        if result.status == RunStatus::Completed {
            for snapshot in &result.daily_positions {
                prop_assert!(snapshot.cash >= -1e-6);
            }
        }
    }

    // ── 4. Risk sizing is floored and bounded by the risk budget ──

    #[test]
    fn sizing_respects_risk_budget(
        equity in 1_000.0..1_000_000.0f64,
        entry in 1.0..500.0f64,
        gap in 0.01..50.0f64,
        fraction in 0.001..0.1f64,
    ) {
        let sizer = RiskSizer::new(fraction);
        if let Ok(size) = sizer.size(equity, entry, entry - gap, 0.0) {
            prop_assert!(size >= 1);
            let risk = size as f64 * gap;
            prop_assert!(risk <= equity * fraction + 1e-6);
            prop_assert!((size + 1) as f64 * gap > equity * fraction - 1e-6);
        }
    }
}
