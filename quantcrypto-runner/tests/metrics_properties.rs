//! Property tests for the metrics layer over random engine runs.
//!
//! 1. Every summary value is finite
//! 2. Max drawdown is within [0, 1) for long-only runs and matches the curve
//! 3. Win rate is a fraction; trade count matches the trade log
//! 4. Zero-variance inputs give zero Sharpe and Sortino

use chrono::{Duration, TimeZone, Utc};
use proptest::prelude::*;

use quantcrypto_core::domain::{Bar, PriceSeries};
use quantcrypto_runner::{run_on_series, BacktestConfig, MetricsConfig, StrategyConfig};

fn arb_closes() -> impl Strategy<Value = Vec<f64>> {
    prop::collection::vec(-0.08..0.08_f64, 20..120).prop_map(|steps| {
        let mut price = 1_000.0;
        steps
            .into_iter()
            .map(|r| {
                price *= 1.0 + r;
                price
            })
            .collect()
    })
}

fn arb_strategy() -> impl Strategy<Value = StrategyConfig> {
    prop_oneof![
        Just(StrategyConfig::Flat),
        (0.1..1.0_f64).prop_map(|fraction| StrategyConfig::BuyAndHold { fraction }),
        (1usize..5, 6usize..15).prop_map(|(fast, slow)| StrategyConfig::EmaCrossover {
            fast,
            slow,
            fraction: 0.9,
            allow_short: false,
        }),
        (0.0..0.05_f64, 1usize..6).prop_map(|(discount, hold_bars)| StrategyConfig::LimitDip {
            discount,
            fraction: 0.9,
            hold_bars,
        }),
    ]
}

fn to_series(closes: &[f64]) -> PriceSeries {
    let start = Utc.with_ymd_and_hms(2023, 1, 1, 0, 0, 0).unwrap();
    let bars = closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + Duration::hours(i as i64),
                open,
                high: open.max(close) * 1.005,
                low: open.min(close) * 0.995,
                close,
                volume: 2.0,
            }
        })
        .collect();
    PriceSeries::new("SOLUSDT", bars).unwrap()
}

proptest! {
    #[test]
    fn metrics_are_finite_and_bounded(
        closes in arb_closes(),
        strategy in arb_strategy(),
        fee_pct in 0.0..0.002_f64,
        rf in 0.0..0.1_f64,
    ) {
        let series = to_series(&closes);
        let mut config = BacktestConfig { strategy, ..BacktestConfig::default() };
        config.engine.fee_pct = fee_pct;
        config.metrics = MetricsConfig { risk_free_rate: rf, bars_per_year: 8_760 };

        let result = run_on_series(&series, &config).unwrap();
        let m = &result.metrics;

        for (name, value) in result.metrics_map() {
            prop_assert!(value.is_finite(), "{} = {}", name, value);
        }
        prop_assert!(m.max_drawdown >= 0.0 && m.max_drawdown < 1.0);
        let curve_max = result
            .output
            .equity_curve
            .iter()
            .map(|s| s.drawdown_from_peak)
            .fold(0.0_f64, f64::max);
        prop_assert!((m.max_drawdown - curve_max).abs() < 1e-9);
        prop_assert!((0.0..=1.0).contains(&m.win_rate));
        prop_assert!((0.0..=1.0).contains(&m.exposure));
        prop_assert_eq!(m.trade_count, result.output.trades.len());
    }

    #[test]
    fn flat_runs_have_zero_risk_ratios(closes in arb_closes(), rf in 0.0..0.1_f64) {
        let series = to_series(&closes);
        let mut config = BacktestConfig { strategy: StrategyConfig::Flat, ..BacktestConfig::default() };
        config.metrics.risk_free_rate = rf;

        let result = run_on_series(&series, &config).unwrap();
        prop_assert_eq!(result.metrics.sharpe, 0.0);
        prop_assert_eq!(result.metrics.total_return, 0.0);
        prop_assert_eq!(result.metrics.win_rate, 0.0);
        prop_assert_eq!(result.metrics.exposure, 0.0);
    }
}
