//! Look-ahead contamination tests.
//!
//! Invariant: a decision at bar t may not depend on price data from bar t+1
//! or later.
//!
//! Two methods:
//! 1. An instrumented strategy records the furthest bar it could reach.
//! 2. Running on a truncated series (bars 0..k) must reproduce the first k
//!    snapshots of the full run exactly.

use chrono::{Duration, TimeZone, Utc};
use quantcrypto_core::domain::{Bar, HistoryView, OrderIntent, Position, PriceSeries};
use quantcrypto_core::engine::{run_backtest, EngineConfig};
use quantcrypto_core::strategy::{EmaCrossover, LimitDip, Strategy};

/// Generate N bars of synthetic OHLCV data with realistic variation.
fn make_test_bars(n: usize) -> Vec<Bar> {
    let start = Utc.with_ymd_and_hms(2023, 6, 1, 0, 0, 0).unwrap();
    let mut bars = Vec::with_capacity(n);
    let mut price = 100.0;

    for i in 0..n {
        // Deterministic pseudo-random walk using a simple LCG
        let seed = (i as u64).wrapping_mul(6364136223846793005).wrapping_add(1);
        let change = ((seed >> 33) % 200) as f64 * 0.05 - 5.0;
        price = (price + change).max(10.0);

        let open = price - 0.5;
        let close = price + 0.3;
        bars.push(Bar {
            timestamp: start + Duration::hours(i as i64),
            open,
            high: open.max(close) + 2.0,
            low: open.min(close) - 2.0,
            close,
            volume: 10.0 + i as f64,
        });
    }
    bars
}

/// Records what the engine lets it see at each call.
#[derive(Default)]
struct Spy {
    calls: usize,
    max_visible_index: usize,
    violations: Vec<String>,
}

impl Strategy for Spy {
    fn name(&self) -> &str {
        "spy"
    }

    fn on_bar(&mut self, history: HistoryView<'_>, _position: &Position) -> Vec<OrderIntent> {
        let expected_index = self.calls;
        self.calls += 1;

        if history.index() != expected_index {
            self.violations
                .push(format!("call {expected_index} saw index {}", history.index()));
        }
        if history.len() != expected_index + 1 {
            self.violations
                .push(format!("call {expected_index} saw {} bars", history.len()));
        }
        if history.bar(expected_index + 1).is_some() {
            self.violations
                .push(format!("call {expected_index} could reach the next bar"));
        }
        self.max_visible_index = self.max_visible_index.max(history.bars().len() - 1);

        // Trade on alternate bars so positions and fills change along the way
        if expected_index % 2 == 0 {
            vec![OrderIntent::buy_fraction(0.1)]
        } else {
            vec![OrderIntent::close()]
        }
    }
}

#[test]
fn strategy_never_sees_future_bars() {
    let bars = make_test_bars(150);
    let series = PriceSeries::new("BTCUSDT", bars).unwrap();
    let mut spy = Spy::default();
    run_backtest(&series, EngineConfig::default(), &mut spy).unwrap();

    assert_eq!(spy.calls, 150);
    assert_eq!(spy.max_visible_index, 149);
    assert!(spy.violations.is_empty(), "{:?}", spy.violations);
}

fn assert_prefix_stable(make: impl Fn() -> Box<dyn Strategy>, truncated_len: usize) {
    let bars = make_test_bars(200);
    let full = PriceSeries::new("BTCUSDT", bars.clone()).unwrap();
    let truncated = PriceSeries::new("BTCUSDT", bars[..truncated_len].to_vec()).unwrap();
    let config = EngineConfig::default().with_costs(5.0, 0.0004);

    let full_out = run_backtest(&full, config.clone(), make().as_mut()).unwrap();
    let trunc_out = run_backtest(&truncated, config, make().as_mut()).unwrap();

    assert_eq!(
        &full_out.equity_curve[..truncated_len],
        &trunc_out.equity_curve[..],
        "equity curve diverged within the shared prefix"
    );
    let shared_fills: Vec<_> = full_out
        .fills
        .iter()
        .filter(|f| f.bar_index < truncated_len)
        .cloned()
        .collect();
    assert_eq!(shared_fills, trunc_out.fills);
}

#[test]
fn ema_crossover_prefix_stable() {
    assert_prefix_stable(|| Box::new(EmaCrossover::new(5, 20, 1.0, false)), 100);
}

#[test]
fn limit_dip_prefix_stable() {
    assert_prefix_stable(|| Box::new(LimitDip::new(0.01, 0.5, 4)), 120);
}
