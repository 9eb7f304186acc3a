//! ExecutionSimulator: turns an intent accepted at bar `t` into a fill at bar `t + 1`.
//!
//! - Market intents fill at the next open, slipped against the trader.
//! - Limit intents fill at the limit price only when the next bar's range
//!   contains it. Passive fills pay no slippage.
//! - Fraction-of-equity sizes resolve against equity and close of bar `t`,
//!   captured in [`PendingIntent`] when the intent is queued.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::cost_model::CostModel;
use crate::domain::{Bar, Fill, FillSide, IntentSide, OrderIntent, OrderSize, OrderType, Position};
use crate::error::ExecutionError;

/// An intent waiting for the next bar, with the sizing context of the bar
/// that emitted it.
#[derive(Debug, Clone, PartialEq)]
pub struct PendingIntent {
    pub intent: OrderIntent,
    /// Bar index the strategy emitted the intent on.
    pub decided_at: usize,
    /// Total equity at the close of `decided_at`.
    pub sizing_equity: f64,
    /// Close of `decided_at`.
    pub sizing_price: f64,
}

/// Why an intent produced no fill.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum SkipReason {
    LimitNotReached { limit_price: f64, low: f64, high: f64 },
    InsufficientFunds { required: f64, available: f64 },
    ShortingDisabled { resulting_quantity: f64 },
    NothingToClose,
    /// Fraction-of-equity sizing resolved to nothing (equity at or below zero).
    NoEquity { equity: f64 },
}

impl std::fmt::Display for SkipReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            SkipReason::LimitNotReached {
                limit_price,
                low,
                high,
            } => write!(f, "limit {limit_price} outside bar range [{low}, {high}]"),
            SkipReason::InsufficientFunds {
                required,
                available,
            } => write!(f, "insufficient funds: need {required:.2}, have {available:.2}"),
            SkipReason::ShortingDisabled { resulting_quantity } => {
                write!(f, "shorting disabled (would leave {resulting_quantity})")
            }
            SkipReason::NothingToClose => write!(f, "no open position to close"),
            SkipReason::NoEquity { equity } => write!(f, "no equity to size against ({equity:.2})"),
        }
    }
}

/// A skipped-fill event, recorded in the run output.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SkippedFill {
    /// Bar the intent was due to execute on.
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub intent: OrderIntent,
    pub reason: SkipReason,
}

#[derive(Debug, Clone, PartialEq)]
pub enum ExecutionOutcome {
    Filled(Fill),
    Skipped(SkipReason),
}

#[derive(Debug, Clone, Default)]
pub struct ExecutionSimulator {
    cost: CostModel,
}

impl ExecutionSimulator {
    pub fn new(cost: CostModel) -> Self {
        Self { cost }
    }

    pub fn cost_model(&self) -> &CostModel {
        &self.cost
    }

    /// Execute `pending` against `bar` (the bar after the one it was decided on).
    ///
    /// `position` is the position at the moment of execution, which is what a
    /// `Flat` intent closes. Portfolio constraints are not checked here.
    pub fn execute(
        &self,
        pending: &PendingIntent,
        position: &Position,
        bar: &Bar,
        bar_index: usize,
    ) -> Result<ExecutionOutcome, ExecutionError> {
        let intent = &pending.intent;
        intent.validate().map_err(|reason| ExecutionError {
            bar_index: pending.decided_at,
            intent: *intent,
            reason,
        })?;

        let (side, quantity) = match intent.side {
            IntentSide::Flat => {
                if position.is_flat() {
                    return Ok(ExecutionOutcome::Skipped(SkipReason::NothingToClose));
                }
                let side = if position.is_long() {
                    FillSide::Sell
                } else {
                    FillSide::Buy
                };
                (side, position.quantity.abs())
            }
            IntentSide::Long => (FillSide::Buy, self.resolve_quantity(pending)),
            IntentSide::Short => (FillSide::Sell, self.resolve_quantity(pending)),
        };

        if !(quantity.is_finite() && quantity > 0.0) {
            return Ok(ExecutionOutcome::Skipped(SkipReason::NoEquity {
                equity: pending.sizing_equity,
            }));
        }

        let (price, slippage_cost) = match intent.order_type {
            OrderType::Market => self.cost.apply_slippage(bar.open, side, quantity),
            OrderType::Limit { price } => {
                if !bar.contains_price(price) {
                    return Ok(ExecutionOutcome::Skipped(SkipReason::LimitNotReached {
                        limit_price: price,
                        low: bar.low,
                        high: bar.high,
                    }));
                }
                (price, 0.0)
            }
        };

        Ok(ExecutionOutcome::Filled(Fill {
            timestamp: bar.timestamp,
            bar_index,
            side,
            price,
            quantity,
            fee: self.cost.fee(price, quantity),
            slippage_cost,
        }))
    }

    fn resolve_quantity(&self, pending: &PendingIntent) -> f64 {
        match pending.intent.size {
            OrderSize::Quantity(q) => q,
            OrderSize::FractionOfEquity(fraction) => {
                if pending.sizing_equity <= 0.0 {
                    return 0.0;
                }
                fraction * pending.sizing_equity / pending.sizing_price
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn next_bar() -> Bar {
        Bar {
            timestamp: Utc.with_ymd_and_hms(2024, 1, 2, 0, 0, 0).unwrap(),
            open: 100.0,
            high: 105.0,
            low: 95.0,
            close: 102.0,
            volume: 10.0,
        }
    }

    fn pending(intent: OrderIntent) -> PendingIntent {
        PendingIntent {
            intent,
            decided_at: 0,
            sizing_equity: 10_000.0,
            sizing_price: 50.0,
        }
    }

    fn filled(outcome: ExecutionOutcome) -> Fill {
        match outcome {
            ExecutionOutcome::Filled(f) => f,
            other => panic!("expected fill, got {other:?}"),
        }
    }

    #[test]
    fn market_buy_fills_at_next_open_with_slippage_and_fee() {
        let sim = ExecutionSimulator::new(CostModel::new(10.0, 0.001));
        let fill = filled(
            sim.execute(
                &pending(OrderIntent::market(IntentSide::Long, OrderSize::Quantity(2.0))),
                &Position::flat(),
                &next_bar(),
                1,
            )
            .unwrap(),
        );
        assert_eq!(fill.side, FillSide::Buy);
        assert_eq!(fill.bar_index, 1);
        assert!((fill.price - 100.1).abs() < 1e-10);
        assert!((fill.slippage_cost - 0.2).abs() < 1e-9);
        assert!((fill.fee - 0.2002).abs() < 1e-10);
    }

    #[test]
    fn fraction_sizes_against_decision_bar_close() {
        let sim = ExecutionSimulator::default();
        let fill = filled(
            sim.execute(
                &pending(OrderIntent::buy_fraction(0.5)),
                &Position::flat(),
                &next_bar(),
                1,
            )
            .unwrap(),
        );
        // 0.5 * 10_000 / 50
        assert!((fill.quantity - 100.0).abs() < 1e-10);
        assert_eq!(fill.price, 100.0);
    }

    #[test]
    fn limit_inside_range_fills_at_limit_without_slippage() {
        let sim = ExecutionSimulator::new(CostModel::new(25.0, 0.0));
        let intent = OrderIntent::limit(IntentSide::Long, OrderSize::Quantity(1.0), 96.0);
        let fill = filled(
            sim.execute(&pending(intent), &Position::flat(), &next_bar(), 1)
                .unwrap(),
        );
        assert_eq!(fill.price, 96.0);
        assert_eq!(fill.slippage_cost, 0.0);
    }

    #[test]
    fn limit_outside_range_is_skipped() {
        let sim = ExecutionSimulator::default();
        let intent = OrderIntent::limit(IntentSide::Long, OrderSize::Quantity(1.0), 90.0);
        let outcome = sim
            .execute(&pending(intent), &Position::flat(), &next_bar(), 1)
            .unwrap();
        assert!(matches!(
            outcome,
            ExecutionOutcome::Skipped(SkipReason::LimitNotReached { .. })
        ));
    }

    #[test]
    fn flat_closes_whole_position() {
        let sim = ExecutionSimulator::default();
        let position = Position {
            quantity: -3.0,
            average_entry_price: 110.0,
            ..Position::flat()
        };
        let fill = filled(
            sim.execute(&pending(OrderIntent::close()), &position, &next_bar(), 1)
                .unwrap(),
        );
        assert_eq!(fill.side, FillSide::Buy);
        assert_eq!(fill.quantity, 3.0);
    }

    #[test]
    fn flat_with_no_position_is_skipped() {
        let sim = ExecutionSimulator::default();
        let outcome = sim
            .execute(&pending(OrderIntent::close()), &Position::flat(), &next_bar(), 1)
            .unwrap();
        assert_eq!(outcome, ExecutionOutcome::Skipped(SkipReason::NothingToClose));
    }

    #[test]
    fn malformed_intent_is_an_error() {
        let sim = ExecutionSimulator::default();
        let mut p = pending(OrderIntent::market(IntentSide::Short, OrderSize::Quantity(f64::INFINITY)));
        p.decided_at = 7;
        let err = sim
            .execute(&p, &Position::flat(), &next_bar(), 8)
            .unwrap_err();
        assert_eq!(err.bar_index, 7);
    }

    #[test]
    fn negative_equity_sizes_to_nothing() {
        let sim = ExecutionSimulator::default();
        let mut p = pending(OrderIntent::buy_fraction(1.0));
        p.sizing_equity = -50.0;
        let outcome = sim.execute(&p, &Position::flat(), &next_bar(), 1).unwrap();
        assert!(matches!(
            outcome,
            ExecutionOutcome::Skipped(SkipReason::NoEquity { .. })
        ));
    }
}
