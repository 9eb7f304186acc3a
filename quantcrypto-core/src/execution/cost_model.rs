//! Cost model: slippage and exchange fees.
//!
//! Slippage is directional: buyers pay more, sellers receive less.
//! Fees are a flat fraction of notional, charged on every fill.

use serde::{Deserialize, Serialize};

use crate::domain::FillSide;

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CostModel {
    /// Slippage in basis points, applied against the trader on market fills.
    pub slippage_bps: f64,
    /// Fee as a fraction of notional (0.0004 = 4 bps taker fee).
    pub fee_pct: f64,
}

impl Default for CostModel {
    fn default() -> Self {
        Self::frictionless()
    }
}

impl CostModel {
    pub fn new(slippage_bps: f64, fee_pct: f64) -> Self {
        Self {
            slippage_bps,
            fee_pct,
        }
    }

    pub fn frictionless() -> Self {
        Self::new(0.0, 0.0)
    }

    /// Apply slippage to a raw fill price.
    ///
    /// Returns `(slipped_price, slippage_cost)` where the cost is in quote currency.
    pub fn apply_slippage(&self, raw_price: f64, side: FillSide, quantity: f64) -> (f64, f64) {
        if self.slippage_bps == 0.0 {
            return (raw_price, 0.0);
        }
        let slipped = raw_price * (1.0 + side.sign() * self.slippage_bps / 10_000.0);
        let cost = (slipped - raw_price).abs() * quantity;
        (slipped, cost)
    }

    /// `fee = price * quantity * fee_pct`
    pub fn fee(&self, price: f64, quantity: f64) -> f64 {
        price * quantity * self.fee_pct
    }
}
