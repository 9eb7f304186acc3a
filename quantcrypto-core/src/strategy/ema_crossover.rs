//! EMA crossover, the classic trend-following pair (9/21 by default).
//!
//! - Fast EMA crosses above slow: go long (covering any short first)
//! - Fast EMA crosses below slow: exit the long, and go short when allowed
//!
//! EMAs are fed incrementally from the visible history, so the strategy never
//! reads a close beyond the current bar.

use super::Strategy;
use crate::domain::{HistoryView, OrderIntent, Position};
use crate::indicators::StreamingEma;

#[derive(Debug, Clone)]
pub struct EmaCrossover {
    pub fast: usize,
    pub slow: usize,
    /// Fraction of equity per entry.
    pub fraction: f64,
    pub allow_short: bool,
    fast_ema: StreamingEma,
    slow_ema: StreamingEma,
    /// `fast - slow` at the previous bar.
    prev_spread: Option<f64>,
}

impl EmaCrossover {
    pub fn new(fast: usize, slow: usize, fraction: f64, allow_short: bool) -> Self {
        assert!(fast > 0, "fast period must be > 0");
        assert!(slow > fast, "slow period must be > fast period");
        assert!(
            fraction > 0.0 && fraction.is_finite(),
            "fraction must be positive"
        );
        Self {
            fast,
            slow,
            fraction,
            allow_short,
            fast_ema: StreamingEma::new(fast),
            slow_ema: StreamingEma::new(slow),
            prev_spread: None,
        }
    }

    fn reset(&mut self) {
        self.fast_ema = StreamingEma::new(self.fast);
        self.slow_ema = StreamingEma::new(self.slow);
        self.prev_spread = None;
    }

    /// Feed every visible close not yet consumed. Returns the current spread.
    fn catch_up(&mut self, history: HistoryView<'_>) -> Option<f64> {
        if self.fast_ema.seen() > history.len() {
            self.reset();
        }
        let mut spread = None;
        for bar in &history.bars()[self.fast_ema.seen()..] {
            self.prev_spread = spread.or(self.prev_spread);
            let fast = self.fast_ema.update(bar.close);
            let slow = self.slow_ema.update(bar.close);
            spread = fast.zip(slow).map(|(f, s)| f - s);
        }
        spread
    }
}

impl Default for EmaCrossover {
    fn default() -> Self {
        Self::new(9, 21, 1.0, false)
    }
}

impl Strategy for EmaCrossover {
    fn name(&self) -> &str {
        "ema_crossover"
    }

    fn on_bar(&mut self, history: HistoryView<'_>, position: &Position) -> Vec<OrderIntent> {
        let Some(spread) = self.catch_up(history) else {
            return Vec::new();
        };
        let Some(prev) = self.prev_spread.replace(spread) else {
            return Vec::new();
        };

        let mut intents = Vec::new();
        if prev <= 0.0 && spread > 0.0 {
            if position.is_short() {
                intents.push(OrderIntent::close());
            }
            if !position.is_long() {
                intents.push(OrderIntent::buy_fraction(self.fraction));
            }
        } else if prev >= 0.0 && spread < 0.0 {
            if position.is_long() {
                intents.push(OrderIntent::close());
            }
            if self.allow_short && !position.is_short() {
                intents.push(OrderIntent::sell_fraction(self.fraction));
            }
        }
        intents
    }
}
