//! Buy-and-hold: one long market intent on the first bar, then nothing.

use super::Strategy;
use crate::domain::{HistoryView, OrderIntent, Position};

#[derive(Debug, Clone)]
pub struct BuyAndHold {
    /// Fraction of equity to invest.
    pub fraction: f64,
    entered: bool,
}

impl BuyAndHold {
    pub fn new(fraction: f64) -> Self {
        assert!(
            fraction > 0.0 && fraction.is_finite(),
            "fraction must be positive"
        );
        Self {
            fraction,
            entered: false,
        }
    }
}

impl Default for BuyAndHold {
    fn default() -> Self {
        Self::new(1.0)
    }
}

impl Strategy for BuyAndHold {
    fn name(&self) -> &str {
        "buy_and_hold"
    }

    fn on_bar(&mut self, history: HistoryView<'_>, _position: &Position) -> Vec<OrderIntent> {
        // A fresh series starts over
        if history.index() == 0 {
            self.entered = false;
        }
        if self.entered {
            return Vec::new();
        }
        self.entered = true;
        vec![OrderIntent::buy_fraction(self.fraction)]
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::{test_bars, PriceSeries};

    #[test]
    fn emits_once() {
        let series = PriceSeries::new("ETHUSDT", test_bars(&[10.0, 11.0, 12.0])).unwrap();
        let mut strategy = BuyAndHold::new(0.5);
        let flat = Position::flat();
        let first = strategy.on_bar(series.slice_up_to(0).unwrap(), &flat);
        assert_eq!(first, vec![OrderIntent::buy_fraction(0.5)]);
        assert!(strategy.on_bar(series.slice_up_to(1).unwrap(), &flat).is_empty());
        assert!(strategy.on_bar(series.slice_up_to(2).unwrap(), &flat).is_empty());
    }
}
