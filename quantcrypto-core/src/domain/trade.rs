//! TradeRecord: a completed round trip, from the opening fill to the fill
//! that brought the position back to flat.

use serde::{Deserialize, Serialize};
use std::fmt;

use super::fill::Fill;
use super::position::PositionSide;

/// What closed a trade.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ExitReason {
    /// The strategy's own exit or reversal.
    #[default]
    Signal,
    StopLoss,
    TakeProfit,
    TrailingStop,
}

impl ExitReason {
    pub fn as_str(&self) -> &'static str {
        match self {
            ExitReason::Signal => "signal",
            ExitReason::StopLoss => "stop_loss",
            ExitReason::TakeProfit => "take_profit",
            ExitReason::TrailingStop => "trailing_stop",
        }
    }
}

impl fmt::Display for ExitReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TradeRecord {
    pub side: PositionSide,

    // ── Entry / exit ──
    pub entry_fill: Fill,
    pub exit_fill: Fill,
    /// Volume-weighted entry price when the trade was scaled into.
    pub average_entry_price: f64,
    /// Largest absolute quantity held (the quantity closed by the exit).
    pub quantity: f64,

    // ── PnL ──
    pub gross_pnl: f64,
    pub fees: f64,
    /// Net of all fees paid on the trade's fills.
    pub pnl: f64,

    // ── Duration ──
    /// Bars between the entry fill and the exit fill.
    pub holding_period: usize,
    pub holding_seconds: i64,

    // ── Excursion ──
    pub mae: f64,
    pub mfe: f64,

    #[serde(default)]
    pub exit_reason: ExitReason,
}

impl TradeRecord {
    /// Net P&L as a fraction of entry notional.
    pub fn return_pct(&self) -> f64 {
        let notional = self.average_entry_price * self.quantity;
        if notional <= 0.0 {
            return 0.0;
        }
        self.pnl / notional
    }

    pub fn is_winner(&self) -> bool {
        self.pnl > 0.0
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::fill::FillSide;
    use chrono::{TimeZone, Utc};

    fn sample_trade() -> TradeRecord {
        let entry = Fill {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 5, 0, 0, 0).unwrap(),
            bar_index: 4,
            side: FillSide::Buy,
            price: 100.0,
            quantity: 5.0,
            fee: 0.5,
            slippage_cost: 0.0,
        };
        let exit = Fill {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 9, 0, 0, 0).unwrap(),
            bar_index: 8,
            side: FillSide::Sell,
            price: 110.0,
            quantity: 5.0,
            fee: 0.55,
            slippage_cost: 0.0,
        };
        TradeRecord {
            side: PositionSide::Long,
            entry_fill: entry,
            exit_fill: exit,
            average_entry_price: 100.0,
            quantity: 5.0,
            gross_pnl: 50.0,
            fees: 1.05,
            pnl: 48.95,
            holding_period: 4,
            holding_seconds: 4 * 86_400,
            mae: -10.0,
            mfe: 60.0,
            exit_reason: ExitReason::TakeProfit,
        }
    }

    #[test]
    fn return_pct_calculation() {
        let trade = sample_trade();
        assert!((trade.return_pct() - 48.95 / 500.0).abs() < 1e-12);
    }

    #[test]
    fn is_winner() {
        assert!(sample_trade().is_winner());
    }

    #[test]
    fn trade_serialization_roundtrip() {
        let trade = sample_trade();
        let json = serde_json::to_string(&trade).unwrap();
        let deser: TradeRecord = serde_json::from_str(&json).unwrap();
        assert_eq!(trade, deser);
    }

    #[test]
    fn missing_exit_reason_defaults_to_signal() {
        let mut value = serde_json::to_value(sample_trade()).unwrap();
        value.as_object_mut().unwrap().remove("exit_reason");
        let trade: TradeRecord = serde_json::from_value(value).unwrap();
        assert_eq!(trade.exit_reason, ExitReason::Signal);
        assert_eq!(ExitReason::TrailingStop.to_string(), "trailing_stop");
    }
}
