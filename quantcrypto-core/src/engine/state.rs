//! Engine configuration, lifecycle status, and run output types.

use serde::{Deserialize, Serialize};

use crate::domain::{EquitySnapshot, Fill, PortfolioPolicy, Position, TradeRecord};
use crate::error::BacktestError;
use crate::execution::{CostModel, SkippedFill};
use crate::fingerprint::{ContentHash, RunFingerprint};

/// Configuration for a single backtest run. Every field has a default, so a
/// partial TOML `[engine]` table deserializes.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct EngineConfig {
    pub initial_cash: f64,
    /// Market-order slippage in basis points.
    pub slippage_bps: f64,
    /// Fee per fill as a fraction of notional.
    pub fee_pct: f64,
    /// Allow cash below zero.
    pub allow_margin: bool,
    /// Allow sells that open or increase a short.
    pub allow_short: bool,
    /// Keep unfilled limit orders pending for the following bar.
    pub limit_order_carry_over: bool,
    /// Abort the run on an unaffordable fill instead of skipping it.
    pub strict_funds: bool,
}

impl Default for EngineConfig {
    fn default() -> Self {
        Self {
            initial_cash: 10_000.0,
            slippage_bps: 0.0,
            fee_pct: 0.0,
            allow_margin: false,
            allow_short: false,
            limit_order_carry_over: false,
            strict_funds: false,
        }
    }
}

impl EngineConfig {
    pub fn new(initial_cash: f64) -> Self {
        Self {
            initial_cash,
            ..Self::default()
        }
    }

    /// Builder-style cost override.
    pub fn with_costs(mut self, slippage_bps: f64, fee_pct: f64) -> Self {
        self.slippage_bps = slippage_bps;
        self.fee_pct = fee_pct;
        self
    }

    pub fn validate(&self) -> Result<(), BacktestError> {
        if !(self.initial_cash.is_finite() && self.initial_cash > 0.0) {
            return Err(BacktestError::InvalidConfig(format!(
                "initial_cash must be positive, got {}",
                self.initial_cash
            )));
        }
        // 10_000 bps would price a sell at zero or below
        if !(self.slippage_bps.is_finite() && (0.0..10_000.0).contains(&self.slippage_bps)) {
            return Err(BacktestError::InvalidConfig(format!(
                "slippage_bps must be in [0, 10000), got {}",
                self.slippage_bps
            )));
        }
        if !(self.fee_pct.is_finite() && (0.0..1.0).contains(&self.fee_pct)) {
            return Err(BacktestError::InvalidConfig(format!(
                "fee_pct must be in [0, 1), got {}",
                self.fee_pct
            )));
        }
        Ok(())
    }

    pub fn cost_model(&self) -> CostModel {
        CostModel::new(self.slippage_bps, self.fee_pct)
    }

    pub fn portfolio_policy(&self) -> PortfolioPolicy {
        PortfolioPolicy {
            allow_margin: self.allow_margin,
            allow_short: self.allow_short,
        }
    }

    /// Canonical hash of every field.
    pub fn fingerprint(&self) -> ContentHash {
        let canonical = serde_json::json!({
            "allow_margin": self.allow_margin,
            "allow_short": self.allow_short,
            "fee_pct": self.fee_pct,
            "initial_cash": self.initial_cash,
            "limit_order_carry_over": self.limit_order_carry_over,
            "slippage_bps": self.slippage_bps,
            "strict_funds": self.strict_funds,
        });
        ContentHash::from_bytes(canonical.to_string().as_bytes())
    }
}

/// `NotStarted → Running → Completed`, or `Failed` on a fatal error.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EngineStatus {
    NotStarted,
    Running,
    Completed,
    Failed,
}

/// Everything a completed run produces.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunOutput {
    /// One snapshot per bar, in bar order.
    pub equity_curve: Vec<EquitySnapshot>,
    /// Completed round trips.
    pub trades: Vec<TradeRecord>,
    pub fills: Vec<Fill>,
    pub skipped_fills: Vec<SkippedFill>,
    /// Position still open after the last bar (flat if none).
    pub final_position: Position,
    pub initial_cash: f64,
    pub total_fees: f64,
    pub total_slippage: f64,
    /// Intents still queued after the last bar, never executed.
    pub discarded_intents: usize,
    pub fingerprint: RunFingerprint,
}

impl RunOutput {
    pub fn final_equity(&self) -> f64 {
        self.equity_curve
            .last()
            .map(|s| s.total_equity)
            .unwrap_or(self.initial_cash)
    }

    pub fn bar_count(&self) -> usize {
        self.equity_curve.len()
    }
}
