//! Limit-dip: bids a fixed discount below the close, exits after a holding period.

use super::Strategy;
use crate::domain::{HistoryView, IntentSide, OrderIntent, OrderSize, Position};

#[derive(Debug, Clone)]
pub struct LimitDip {
    /// Limit price = close * (1 - discount).
    pub discount: f64,
    pub fraction: f64,
    /// Bars to hold a filled entry before closing at market.
    pub hold_bars: usize,
}

impl LimitDip {
    pub fn new(discount: f64, fraction: f64, hold_bars: usize) -> Self {
        assert!(
            (0.0..1.0).contains(&discount),
            "discount must be in [0, 1)"
        );
        assert!(
            fraction > 0.0 && fraction.is_finite(),
            "fraction must be positive"
        );
        Self {
            discount,
            fraction,
            hold_bars,
        }
    }
}

impl Default for LimitDip {
    fn default() -> Self {
        Self::new(0.02, 1.0, 5)
    }
}

impl Strategy for LimitDip {
    fn name(&self) -> &str {
        "limit_dip"
    }

    fn on_bar(&mut self, history: HistoryView<'_>, position: &Position) -> Vec<OrderIntent> {
        if let Some(entry_bar) = position.entry_bar() {
            let held = history.index().saturating_sub(entry_bar);
            if held >= self.hold_bars {
                return vec![OrderIntent::close()];
            }
            return Vec::new();
        }

        let limit_price = history.current().close * (1.0 - self.discount);
        vec![OrderIntent::limit(
            IntentSide::Long,
            OrderSize::FractionOfEquity(self.fraction),
            limit_price,
        )]
    }
}
