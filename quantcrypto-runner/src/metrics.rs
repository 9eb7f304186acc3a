//! Performance metrics: pure functions that compute strategy statistics.
//!
//! Every metric is a pure function: equity values and/or trade list in, scalar out.
//! Per-bar returns are `equity[i] / equity[i-1] - 1`, annualised with
//! `bars_per_year` (365 for daily crypto bars, 8760 for hourly).

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

use quantcrypto_core::domain::{EquitySnapshot, TradeRecord};
use quantcrypto_core::engine::RunOutput;

/// Inputs to annualisation and excess-return calculations.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct MetricsConfig {
    /// Annual risk-free rate as a fraction (0.04 = 4%).
    pub risk_free_rate: f64,
    pub bars_per_year: u32,
}

impl Default for MetricsConfig {
    fn default() -> Self {
        Self {
            risk_free_rate: 0.0,
            bars_per_year: 365,
        }
    }
}

impl MetricsConfig {
    pub fn per_bar_risk_free(&self) -> f64 {
        self.risk_free_rate / self.bars_per_year.max(1) as f64
    }

    fn annualizer(&self) -> f64 {
        (self.bars_per_year.max(1) as f64).sqrt()
    }
}

/// Aggregate performance metrics for a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PerformanceMetrics {
    // ── Returns ──
    pub total_return: f64,
    pub cagr: f64,
    pub net_profit: f64,
    pub final_equity: f64,

    // ── Risk ──
    pub sharpe: f64,
    pub sortino: f64,
    pub calmar: f64,
    /// Largest peak-to-trough decline as a positive fraction.
    pub max_drawdown: f64,
    pub annual_volatility: f64,
    /// Fraction of bars with an open position.
    pub exposure: f64,

    // ── Trades ──
    pub trade_count: usize,
    pub win_rate: f64,
    pub profit_factor: f64,
    pub gross_profit: f64,
    /// Sum of losing trade PnL, as a positive amount.
    pub gross_loss: f64,
    pub expectancy: f64,
    pub avg_win: f64,
    /// Mean losing trade PnL (negative, or zero without losers).
    pub avg_loss: f64,
    pub max_consecutive_wins: usize,
    pub max_consecutive_losses: usize,
    pub avg_holding_bars: f64,
    pub total_fees: f64,
}

impl PerformanceMetrics {
    /// Compute all metrics from an equity curve and trade list.
    pub fn compute(
        equity_curve: &[EquitySnapshot],
        trades: &[TradeRecord],
        config: &MetricsConfig,
    ) -> Self {
        let equity: Vec<f64> = equity_curve.iter().map(|s| s.total_equity).collect();
        let initial = equity.first().copied().unwrap_or(0.0);
        let final_equity = equity.last().copied().unwrap_or(0.0);

        Self {
            total_return: total_return(&equity),
            cagr: cagr(&equity, config.bars_per_year),
            net_profit: final_equity - initial,
            final_equity,
            sharpe: sharpe_ratio(&equity, config),
            sortino: sortino_ratio(&equity, config),
            calmar: calmar_ratio(&equity, config.bars_per_year),
            max_drawdown: max_drawdown(&equity),
            annual_volatility: annual_volatility(&equity, config),
            exposure: exposure(equity_curve),
            trade_count: trades.len(),
            win_rate: win_rate(trades),
            profit_factor: profit_factor(trades),
            gross_profit: gross_profit(trades),
            gross_loss: gross_loss(trades),
            expectancy: expectancy(trades),
            avg_win: avg_win(trades),
            avg_loss: avg_loss(trades),
            max_consecutive_wins: max_consecutive_wins(trades),
            max_consecutive_losses: max_consecutive_losses(trades),
            avg_holding_bars: avg_holding_bars(trades),
            total_fees: trades.iter().map(|t| t.fees).sum(),
        }
    }

    /// Metrics for a finished run. Fees include those paid on a position
    /// still open at the end.
    pub fn from_run(output: &RunOutput, config: &MetricsConfig) -> Self {
        Self {
            total_fees: output.total_fees,
            ..Self::compute(&output.equity_curve, &output.trades, config)
        }
    }

    /// Name → value view, for reports and sweep tables.
    pub fn to_map(&self) -> BTreeMap<String, f64> {
        let entries: [(&str, f64); 22] = [
            ("total_return", self.total_return),
            ("cagr", self.cagr),
            ("net_profit", self.net_profit),
            ("final_equity", self.final_equity),
            ("sharpe", self.sharpe),
            ("sortino", self.sortino),
            ("calmar", self.calmar),
            ("max_drawdown", self.max_drawdown),
            ("annual_volatility", self.annual_volatility),
            ("exposure", self.exposure),
            ("trade_count", self.trade_count as f64),
            ("win_rate", self.win_rate),
            ("profit_factor", self.profit_factor),
            ("gross_profit", self.gross_profit),
            ("gross_loss", self.gross_loss),
            ("expectancy", self.expectancy),
            ("avg_win", self.avg_win),
            ("avg_loss", self.avg_loss),
            ("max_consecutive_wins", self.max_consecutive_wins as f64),
            ("max_consecutive_losses", self.max_consecutive_losses as f64),
            ("avg_holding_bars", self.avg_holding_bars),
            ("total_fees", self.total_fees),
        ];
        entries
            .into_iter()
            .map(|(k, v)| (k.to_string(), v))
            .collect()
    }
}

/// Upper bound for profit factor when there are no losing trades.
pub const PROFIT_FACTOR_CAP: f64 = 100.0;

// ─── Individual metric functions ────────────────────────────────────

/// Total return as a fraction: final / initial - 1.
pub fn total_return(equity: &[f64]) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    if equity.len() < 2 || initial <= 0.0 {
        return 0.0;
    }
    final_eq / initial - 1.0
}

/// Compound annual growth rate over `len - 1` elapsed bars.
///
/// Returns 0.0 for single-bar curves or when either end is non-positive.
pub fn cagr(equity: &[f64], bars_per_year: u32) -> f64 {
    let (Some(&initial), Some(&final_eq)) = (equity.first(), equity.last()) else {
        return 0.0;
    };
    if equity.len() < 2 || initial <= 0.0 || final_eq <= 0.0 || bars_per_year == 0 {
        return 0.0;
    }
    let years = (equity.len() - 1) as f64 / bars_per_year as f64;
    (final_eq / initial).powf(1.0 / years) - 1.0
}

/// Annualised Sharpe ratio.
///
/// Sharpe = mean(r - rf) / sample_std(r - rf) * sqrt(bars_per_year).
/// Returns 0.0 if variance is zero or there are fewer than 2 returns.
pub fn sharpe_ratio(equity: &[f64], config: &MetricsConfig) -> f64 {
    let excess = excess_returns(equity, config);
    if excess.len() < 2 {
        return 0.0;
    }
    let std = std_dev(&excess);
    if std < 1e-15 {
        return 0.0;
    }
    mean_f64(&excess) / std * config.annualizer()
}

/// Annualised Sortino ratio.
///
/// Sortino = mean(r - rf) / sqrt(sum(min(r, 0)^2) / n) * sqrt(bars_per_year).
/// Downside counts raw returns below zero only. Returns 0.0 with no downside
/// or fewer than 2 returns.
pub fn sortino_ratio(equity: &[f64], config: &MetricsConfig) -> f64 {
    let returns = bar_returns(equity);
    if returns.len() < 2 {
        return 0.0;
    }
    let downside_var =
        returns.iter().map(|r| r.min(0.0).powi(2)).sum::<f64>() / returns.len() as f64;
    let downside_std = downside_var.sqrt();
    if downside_std < 1e-15 {
        return 0.0;
    }
    let rf = config.per_bar_risk_free();
    (mean_f64(&returns) - rf) / downside_std * config.annualizer()
}

/// Calmar ratio: CAGR / max drawdown.
///
/// Returns 0.0 if max drawdown is zero or CAGR is non-positive.
pub fn calmar_ratio(equity: &[f64], bars_per_year: u32) -> f64 {
    let c = cagr(equity, bars_per_year);
    let dd = max_drawdown(equity);
    if dd <= 0.0 || c <= 0.0 {
        return 0.0;
    }
    c / dd
}

/// Maximum drawdown as a positive fraction (0.15 = 15% below the running peak).
///
/// Returns 0.0 if equity is constant or monotonically increasing.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let Some(&first) = equity.first() else {
        return 0.0;
    };
    let mut peak = first;
    let mut max_dd = 0.0_f64;
    for &eq in equity {
        if eq > peak {
            peak = eq;
        }
        if peak > 0.0 {
            max_dd = max_dd.max((peak - eq) / peak);
        }
    }
    max_dd
}

/// Sample standard deviation of per-bar returns, annualised.
pub fn annual_volatility(equity: &[f64], config: &MetricsConfig) -> f64 {
    std_dev(&bar_returns(equity)) * config.annualizer()
}

/// Fraction of snapshots holding a non-zero position.
pub fn exposure(curve: &[EquitySnapshot]) -> f64 {
    if curve.is_empty() {
        return 0.0;
    }
    curve.iter().filter(|s| s.has_exposure()).count() as f64 / curve.len() as f64
}

/// Win rate: fraction of trades with pnl > 0.
pub fn win_rate(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    trades.iter().filter(|t| t.is_winner()).count() as f64 / trades.len() as f64
}

pub fn gross_profit(trades: &[TradeRecord]) -> f64 {
    trades.iter().filter(|t| t.pnl > 0.0).map(|t| t.pnl).sum()
}

pub fn gross_loss(trades: &[TradeRecord]) -> f64 {
    trades
        .iter()
        .filter(|t| t.pnl < 0.0)
        .map(|t| t.pnl.abs())
        .sum()
}

/// Profit factor: gross profit / gross loss.
///
/// Capped at 100.0 for edge cases (all winners, zero losses).
pub fn profit_factor(trades: &[TradeRecord]) -> f64 {
    if trades.is_empty() {
        return 0.0;
    }
    let profit = gross_profit(trades);
    let loss = gross_loss(trades);
    if loss < 1e-10 {
        return if profit > 0.0 { PROFIT_FACTOR_CAP } else { 0.0 };
    }
    (profit / loss).min(PROFIT_FACTOR_CAP)
}

/// Mean net PnL per trade.
pub fn expectancy(trades: &[TradeRecord]) -> f64 {
    mean_f64(&trades.iter().map(|t| t.pnl).collect::<Vec<_>>())
}

pub fn avg_win(trades: &[TradeRecord]) -> f64 {
    mean_f64(
        &trades
            .iter()
            .filter(|t| t.pnl > 0.0)
            .map(|t| t.pnl)
            .collect::<Vec<_>>(),
    )
}

pub fn avg_loss(trades: &[TradeRecord]) -> f64 {
    mean_f64(
        &trades
            .iter()
            .filter(|t| t.pnl < 0.0)
            .map(|t| t.pnl)
            .collect::<Vec<_>>(),
    )
}

/// Maximum consecutive winning trades.
pub fn max_consecutive_wins(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, true)
}

/// Maximum consecutive losing trades (pnl <= 0).
pub fn max_consecutive_losses(trades: &[TradeRecord]) -> usize {
    max_consecutive(trades, false)
}

pub fn avg_holding_bars(trades: &[TradeRecord]) -> f64 {
    mean_f64(
        &trades
            .iter()
            .map(|t| t.holding_period as f64)
            .collect::<Vec<_>>(),
    )
}

// ─── Helpers ────────────────────────────────────────────────────────

/// Per-bar returns. A bar following non-positive equity contributes 0.0.
pub fn bar_returns(equity: &[f64]) -> Vec<f64> {
    equity
        .windows(2)
        .map(|w| if w[0] > 0.0 { w[1] / w[0] - 1.0 } else { 0.0 })
        .collect()
}

fn excess_returns(equity: &[f64], config: &MetricsConfig) -> Vec<f64> {
    let rf = config.per_bar_risk_free();
    bar_returns(equity).into_iter().map(|r| r - rf).collect()
}

pub(crate) fn mean_f64(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

pub(crate) fn std_dev(values: &[f64]) -> f64 {
    if values.len() < 2 {
        return 0.0;
    }
    let mean = mean_f64(values);
    let variance =
        values.iter().map(|v| (v - mean).powi(2)).sum::<f64>() / (values.len() - 1) as f64;
    variance.sqrt()
}

fn max_consecutive(trades: &[TradeRecord], winners: bool) -> usize {
    let mut max_streak = 0;
    let mut current = 0;
    for trade in trades {
        if trade.is_winner() == winners {
            current += 1;
            max_streak = max_streak.max(current);
        } else {
            current = 0;
        }
    }
    max_streak
}
