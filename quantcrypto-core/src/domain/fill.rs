use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FillSide {
    Buy,
    Sell,
}

impl FillSide {
    /// +1 for buys, -1 for sells.
    pub fn sign(&self) -> f64 {
        match self {
            FillSide::Buy => 1.0,
            FillSide::Sell => -1.0,
        }
    }
}

/// An executed trade. Immutable once recorded.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Fill {
    pub timestamp: DateTime<Utc>,
    pub bar_index: usize,
    pub side: FillSide,
    /// Execution price after slippage.
    pub price: f64,
    /// Always positive; direction is carried by `side`.
    pub quantity: f64,
    pub fee: f64,
    /// Cost of slippage in quote currency (already included in `price`).
    pub slippage_cost: f64,
}

impl Fill {
    pub fn notional(&self) -> f64 {
        self.price * self.quantity
    }

    /// Signed cash change caused by this fill: buys pay notional + fee,
    /// sells receive notional - fee.
    pub fn cash_delta(&self) -> f64 {
        match self.side {
            FillSide::Buy => -(self.notional() + self.fee),
            FillSide::Sell => self.notional() - self.fee,
        }
    }

    /// Signed position change caused by this fill.
    pub fn signed_quantity(&self) -> f64 {
        self.side.sign() * self.quantity
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn fill(side: FillSide) -> Fill {
        Fill {
            timestamp: Utc.with_ymd_and_hms(2024, 3, 1, 0, 0, 0).unwrap(),
            bar_index: 3,
            side,
            price: 200.0,
            quantity: 2.0,
            fee: 0.4,
            slippage_cost: 0.0,
        }
    }

    #[test]
    fn buy_cash_delta_includes_fee() {
        assert!((fill(FillSide::Buy).cash_delta() - (-400.4)).abs() < 1e-12);
    }

    #[test]
    fn sell_cash_delta_nets_fee() {
        assert!((fill(FillSide::Sell).cash_delta() - 399.6).abs() < 1e-12);
    }

    #[test]
    fn signed_quantity_follows_side() {
        assert_eq!(fill(FillSide::Buy).signed_quantity(), 2.0);
        assert_eq!(fill(FillSide::Sell).signed_quantity(), -2.0);
    }
}
