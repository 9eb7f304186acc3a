//! Portfolio state: cash, the single open position, the running equity peak.
//!
//! The accounting identity must hold at every snapshot:
//! `total_equity == cash + position.quantity * mark_price`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::bar::Bar;
use super::fill::{Fill, FillSide};
use super::position::{Position, PositionSide, QTY_EPSILON};
use super::snapshot::EquitySnapshot;
use super::trade::{ExitReason, TradeRecord};

/// Tolerance for cash going below zero through float rounding.
const CASH_EPSILON: f64 = 1e-9;

/// Why the portfolio refused a fill. Nothing is mutated when a fill is refused.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "reason", rename_all = "snake_case")]
pub enum FillRejection {
    InsufficientFunds { required: f64, available: f64 },
    ShortingDisabled { resulting_quantity: f64 },
}

/// Which fills the portfolio accepts.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub struct PortfolioPolicy {
    /// Allow cash to go negative on buys.
    pub allow_margin: bool,
    /// Allow sells that leave a negative position.
    pub allow_short: bool,
}

impl Default for PortfolioPolicy {
    fn default() -> Self {
        Self {
            allow_margin: false,
            allow_short: false,
        }
    }
}

#[derive(Debug, Clone)]
pub struct Portfolio {
    pub cash: f64,
    pub initial_cash: f64,
    pub position: Position,
    pub policy: PortfolioPolicy,
    pub total_fees: f64,
    pub total_slippage: f64,
    peak_equity: f64,
}

impl Portfolio {
    pub fn new(initial_cash: f64, policy: PortfolioPolicy) -> Self {
        Self {
            cash: initial_cash,
            initial_cash,
            position: Position::flat(),
            policy,
            total_fees: 0.0,
            total_slippage: 0.0,
            peak_equity: initial_cash,
        }
    }

    /// Total equity at `mark_price`.
    pub fn equity(&self, mark_price: f64) -> f64 {
        self.cash + self.position.market_value(mark_price)
    }

    /// Check a fill against the policy without mutating anything.
    pub fn check_fill(&self, fill: &Fill) -> Result<(), FillRejection> {
        match fill.side {
            FillSide::Buy => {
                let required = fill.notional() + fill.fee;
                if !self.policy.allow_margin && self.cash - required < -CASH_EPSILON {
                    return Err(FillRejection::InsufficientFunds {
                        required,
                        available: self.cash,
                    });
                }
            }
            FillSide::Sell => {
                let resulting_quantity = self.position.quantity - fill.quantity;
                if !self.policy.allow_short && resulting_quantity < -QTY_EPSILON {
                    return Err(FillRejection::ShortingDisabled { resulting_quantity });
                }
            }
        }
        Ok(())
    }

    /// Apply a fill to cash and position.
    ///
    /// Returns the completed trade when the fill brings the position back to
    /// flat. A fill that crosses through zero closes the current trade and
    /// opens a new one with the remainder.
    pub fn apply_fill(&mut self, fill: Fill) -> Result<Option<TradeRecord>, FillRejection> {
        self.check_fill(&fill)?;

        self.cash += fill.cash_delta();
        self.total_fees += fill.fee;
        self.total_slippage += fill.slippage_cost;

        if self.position.is_flat() {
            self.open_position(fill);
            return Ok(None);
        }

        let current = self.position.quantity;
        let delta = fill.signed_quantity();

        if current.signum() == delta.signum() {
            // Scaling in: volume-weighted average entry
            let held = current.abs();
            let pos = &mut self.position;
            pos.average_entry_price =
                (pos.average_entry_price * held + fill.price * fill.quantity) / (held + fill.quantity);
            pos.quantity += delta;
            pos.fees_paid += fill.fee;
            pos.peak_quantity = pos.peak_quantity.max(pos.quantity.abs());
            return Ok(None);
        }

        // Reducing, closing, or flipping
        let closing_qty = fill.quantity.min(current.abs());
        let remaining_qty = fill.quantity - closing_qty;
        let closing_fee = fill.fee * closing_qty / fill.quantity;

        let pos = &mut self.position;
        pos.realized_pnl += (fill.price - pos.average_entry_price) * closing_qty * current.signum();
        pos.fees_paid += closing_fee;
        pos.quantity -= current.signum() * closing_qty;

        if pos.quantity.abs() > QTY_EPSILON {
            return Ok(None);
        }

        let exit_fill = Fill {
            quantity: closing_qty,
            fee: closing_fee,
            slippage_cost: fill.slippage_cost * closing_qty / fill.quantity,
            ..fill.clone()
        };
        let trade = self.close_trade(exit_fill);

        if remaining_qty > QTY_EPSILON {
            let opening_fill = Fill {
                quantity: remaining_qty,
                fee: fill.fee - closing_fee,
                slippage_cost: fill.slippage_cost * remaining_qty / fill.quantity,
                ..fill
            };
            self.open_position(opening_fill);
        }

        Ok(trade)
    }

    /// Update unrealized P&L and excursions at a bar.
    pub fn mark_to_market(&mut self, bar: &Bar) {
        self.position.update_mark(bar);
    }

    /// Record the portfolio's state at `mark_price`, advancing the running peak.
    pub fn snapshot(
        &mut self,
        bar_index: usize,
        timestamp: DateTime<Utc>,
        mark_price: f64,
    ) -> EquitySnapshot {
        let position_value = self.position.market_value(mark_price);
        let total_equity = self.cash + position_value;
        if total_equity > self.peak_equity {
            self.peak_equity = total_equity;
        }
        let drawdown_from_peak = if self.peak_equity > 0.0 {
            ((self.peak_equity - total_equity) / self.peak_equity).max(0.0)
        } else {
            0.0
        };
        EquitySnapshot {
            bar_index,
            timestamp,
            cash: self.cash,
            position_quantity: self.position.quantity,
            position_value,
            unrealized_pnl: if self.position.is_flat() {
                0.0
            } else {
                self.position.unrealized_at(mark_price)
            },
            total_equity,
            drawdown_from_peak,
        }
    }

    fn open_position(&mut self, fill: Fill) {
        self.position = Position {
            quantity: fill.signed_quantity(),
            average_entry_price: fill.price,
            unrealized_pnl: 0.0,
            realized_pnl: 0.0,
            fees_paid: fill.fee,
            peak_quantity: fill.quantity,
            entry_fill: Some(fill),
            mae: 0.0,
            mfe: 0.0,
        };
    }

    fn close_trade(&mut self, exit_fill: Fill) -> Option<TradeRecord> {
        let closed = std::mem::take(&mut self.position);
        let entry_fill = closed.entry_fill?;
        let side = match entry_fill.side {
            FillSide::Buy => PositionSide::Long,
            FillSide::Sell => PositionSide::Short,
        };
        let holding_period = exit_fill.bar_index.saturating_sub(entry_fill.bar_index);
        let holding_seconds = (exit_fill.timestamp - entry_fill.timestamp).num_seconds();
        Some(TradeRecord {
            side,
            average_entry_price: closed.average_entry_price,
            quantity: closed.peak_quantity,
            gross_pnl: closed.realized_pnl,
            fees: closed.fees_paid,
            pnl: closed.realized_pnl - closed.fees_paid,
            holding_period,
            holding_seconds,
            mae: closed.mae,
            mfe: closed.mfe,
            exit_reason: ExitReason::Signal,
            entry_fill,
            exit_fill,
        })
    }
}
