use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::fill::Fill;

/// Quantities with magnitude below this are treated as flat.
pub const QTY_EPSILON: f64 = 1e-12;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PositionSide {
    Long,
    Short,
    Flat,
}

/// The single open position of a run.
///
/// `quantity` is signed: positive = long, negative = short. Only the
/// portfolio mutates a position; strategies receive `&Position`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Position {
    pub quantity: f64,
    pub average_entry_price: f64,
    /// Unrealized P&L at the most recent mark.
    pub unrealized_pnl: f64,
    /// Realized gross P&L from partial reductions of the current trade.
    pub realized_pnl: f64,
    /// Fees paid on all fills belonging to the current trade.
    pub fees_paid: f64,
    /// Largest absolute quantity held during the current trade.
    pub peak_quantity: f64,
    /// The fill that opened the current trade.
    pub entry_fill: Option<Fill>,
    /// Maximum adverse excursion (most negative unrealized P&L seen).
    pub mae: f64,
    /// Maximum favorable excursion (most positive unrealized P&L seen).
    pub mfe: f64,
}

impl Default for Position {
    fn default() -> Self {
        Self::flat()
    }
}

impl Position {
    pub fn flat() -> Self {
        Self {
            quantity: 0.0,
            average_entry_price: 0.0,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            fees_paid: 0.0,
            peak_quantity: 0.0,
            entry_fill: None,
            mae: 0.0,
            mfe: 0.0,
        }
    }

    pub fn side(&self) -> PositionSide {
        if self.quantity > QTY_EPSILON {
            PositionSide::Long
        } else if self.quantity < -QTY_EPSILON {
            PositionSide::Short
        } else {
            PositionSide::Flat
        }
    }

    pub fn is_flat(&self) -> bool {
        self.side() == PositionSide::Flat
    }

    pub fn is_long(&self) -> bool {
        self.side() == PositionSide::Long
    }

    pub fn is_short(&self) -> bool {
        self.side() == PositionSide::Short
    }

    pub fn market_value(&self, mark_price: f64) -> f64 {
        self.quantity * mark_price
    }

    pub fn unrealized_at(&self, mark_price: f64) -> f64 {
        self.quantity * (mark_price - self.average_entry_price)
    }

    /// Bar index the current trade was opened on.
    pub fn entry_bar(&self) -> Option<usize> {
        self.entry_fill.as_ref().map(|f| f.bar_index)
    }

    /// Mark to a bar: unrealized P&L at the close, excursions at the extremes.
    pub fn update_mark(&mut self, bar: &Bar) {
        if self.is_flat() {
            self.unrealized_pnl = 0.0;
            return;
        }
        self.unrealized_pnl = self.unrealized_at(bar.close);
        let at_high = self.unrealized_at(bar.high);
        let at_low = self.unrealized_at(bar.low);
        let (best, worst) = if at_high >= at_low {
            (at_high, at_low)
        } else {
            (at_low, at_high)
        };
        self.mfe = self.mfe.max(best);
        self.mae = self.mae.min(worst);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{TimeZone, Utc};

    fn bar(high: f64, low: f64, close: f64) -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap(),
            open: close,
            high,
            low,
            close,
            volume: 1.0,
        }
    }

    fn long(qty: f64, price: f64) -> Position {
        Position {
            quantity: qty,
            average_entry_price: price,
            ..Position::flat()
        }
    }

    #[test]
    fn side_from_sign() {
        assert_eq!(long(2.0, 100.0).side(), PositionSide::Long);
        assert_eq!(long(-2.0, 100.0).side(), PositionSide::Short);
        assert_eq!(Position::flat().side(), PositionSide::Flat);
    }

    #[test]
    fn unrealized_long_and_short() {
        assert_eq!(long(2.0, 100.0).unrealized_at(110.0), 20.0);
        assert_eq!(long(-2.0, 100.0).unrealized_at(110.0), -20.0);
    }

    #[test]
    fn mark_tracks_excursions_long() {
        let mut pos = long(1.0, 100.0);
        pos.update_mark(&bar(108.0, 95.0, 104.0));
        assert_eq!(pos.unrealized_pnl, 4.0);
        assert_eq!(pos.mfe, 8.0);
        assert_eq!(pos.mae, -5.0);
        // Excursions only ever widen
        pos.update_mark(&bar(103.0, 101.0, 102.0));
        assert_eq!(pos.mfe, 8.0);
        assert_eq!(pos.mae, -5.0);
    }

    #[test]
    fn mark_tracks_excursions_short() {
        let mut pos = long(-1.0, 100.0);
        pos.update_mark(&bar(108.0, 95.0, 104.0));
        assert_eq!(pos.unrealized_pnl, -4.0);
        assert_eq!(pos.mfe, 5.0);
        assert_eq!(pos.mae, -8.0);
    }
}
