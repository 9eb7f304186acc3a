//! Order intents: what a strategy asks the engine to do on the next bar.

use serde::{Deserialize, Serialize};

use super::trade::ExitReason;

/// Direction of an intent.
///
/// `Long` buys the sized quantity, `Short` sells it, `Flat` closes whatever
/// position is open when the intent executes (size is ignored).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentSide {
    Long,
    Short,
    Flat,
}

/// How large the order is.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "kind", content = "value", rename_all = "snake_case")]
pub enum OrderSize {
    /// Fraction of total equity at the close of the bar that emitted the intent.
    FractionOfEquity(f64),
    /// Absolute quantity in base-asset units.
    Quantity(f64),
}

impl OrderSize {
    pub fn raw(&self) -> f64 {
        match *self {
            OrderSize::FractionOfEquity(v) | OrderSize::Quantity(v) => v,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderType {
    /// Fill at the next bar's open, adjusted by slippage.
    Market,
    /// Fill at `price` only if the next bar trades through it.
    Limit { price: f64 },
}

/// An order request emitted by a strategy at bar `t`, executable at `t + 1`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct OrderIntent {
    pub side: IntentSide,
    pub size: OrderSize,
    pub order_type: OrderType,
    /// Recorded on the trade this intent closes. `None` means a signal exit.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub exit_reason: Option<ExitReason>,
}

impl OrderIntent {
    pub fn market(side: IntentSide, size: OrderSize) -> Self {
        Self {
            side,
            size,
            order_type: OrderType::Market,
            exit_reason: None,
        }
    }

    pub fn limit(side: IntentSide, size: OrderSize, price: f64) -> Self {
        Self {
            side,
            size,
            order_type: OrderType::Limit { price },
            exit_reason: None,
        }
    }

    /// Market buy sized as a fraction of equity.
    pub fn buy_fraction(fraction: f64) -> Self {
        Self::market(IntentSide::Long, OrderSize::FractionOfEquity(fraction))
    }

    /// Market sell sized as a fraction of equity.
    pub fn sell_fraction(fraction: f64) -> Self {
        Self::market(IntentSide::Short, OrderSize::FractionOfEquity(fraction))
    }

    /// Close the open position at the next open.
    pub fn close() -> Self {
        Self::market(IntentSide::Flat, OrderSize::Quantity(0.0))
    }

    /// Tag the trade this intent closes with `reason`.
    pub fn with_exit_reason(mut self, reason: ExitReason) -> Self {
        self.exit_reason = Some(reason);
        self
    }

    /// Structural validation. Returns the reason the intent is malformed.
    pub fn validate(&self) -> Result<(), String> {
        if let OrderType::Limit { price } = self.order_type {
            if !price.is_finite() || price <= 0.0 {
                return Err(format!("limit price must be positive and finite, got {price}"));
            }
        }
        if self.side == IntentSide::Flat {
            return Ok(());
        }
        let size = self.size.raw();
        if !size.is_finite() {
            return Err(format!("size must be finite, got {size}"));
        }
        if size <= 0.0 {
            return Err(format!("size must be positive, got {size}"));
        }
        Ok(())
    }
}
