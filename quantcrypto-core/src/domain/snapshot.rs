use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Portfolio state at the close of one bar. One per bar, never mutated.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EquitySnapshot {
    pub bar_index: usize,
    pub timestamp: DateTime<Utc>,
    pub cash: f64,
    pub position_quantity: f64,
    pub position_value: f64,
    pub unrealized_pnl: f64,
    /// `cash + position_quantity * mark_price`.
    pub total_equity: f64,
    /// `(peak - total_equity) / peak`, always >= 0.
    pub drawdown_from_peak: f64,
}

impl EquitySnapshot {
    pub fn has_exposure(&self) -> bool {
        self.position_quantity.abs() > super::position::QTY_EPSILON
    }
}

/// Project an equity curve down to its total-equity values.
pub fn equity_values(curve: &[EquitySnapshot]) -> Vec<f64> {
    curve.iter().map(|s| s.total_equity).collect()
}
