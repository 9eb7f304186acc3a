//! Bar-by-bar event loop: the heart of the backtesting engine.
//!
//! Three phases per bar `i`:
//! 1. Start-of-bar: execute intents queued at bar `i - 1` against bar `i`
//!    (market at the open, limits inside the range), apply fills
//! 2. Post-fill: mark-to-market at the close, record the equity snapshot
//! 3. Decision: hand the strategy bars `[0..=i]` and queue its intents
//!
//! Intents queued on the final bar have no next bar and are discarded.

use tracing::{debug, info, warn};

use crate::domain::{FillRejection, Portfolio, PriceSeries, TradeRecord};
use crate::error::{BacktestError, ExecutionError};
use crate::execution::{
    ExecutionOutcome, ExecutionSimulator, PendingIntent, SkipReason, SkippedFill,
};
use crate::fingerprint::{hash_series, RunFingerprint};
use crate::strategy::Strategy;

use super::state::{EngineConfig, EngineStatus, RunOutput};

use crate::domain::{Bar, EquitySnapshot, Fill};

/// Owns everything mutable for exactly one run over a borrowed series.
pub struct BacktestEngine<'a> {
    series: &'a PriceSeries,
    config: EngineConfig,
    simulator: ExecutionSimulator,
    portfolio: Portfolio,
    status: EngineStatus,
    pending: Vec<PendingIntent>,
    equity_curve: Vec<EquitySnapshot>,
    trades: Vec<TradeRecord>,
    fills: Vec<Fill>,
    skipped_fills: Vec<SkippedFill>,
}

impl<'a> BacktestEngine<'a> {
    pub fn new(series: &'a PriceSeries, config: EngineConfig) -> Result<Self, BacktestError> {
        config.validate()?;
        Ok(Self {
            series,
            simulator: ExecutionSimulator::new(config.cost_model()),
            portfolio: Portfolio::new(config.initial_cash, config.portfolio_policy()),
            status: EngineStatus::NotStarted,
            pending: Vec::new(),
            equity_curve: Vec::with_capacity(series.length()),
            trades: Vec::new(),
            fills: Vec::new(),
            skipped_fills: Vec::new(),
            config,
        })
    }

    pub fn status(&self) -> EngineStatus {
        self.status
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    /// Run `strategy` over the whole series. An engine runs once.
    ///
    /// On error no partial output is returned and the status becomes `Failed`.
    pub fn run(&mut self, strategy: &mut dyn Strategy) -> Result<RunOutput, BacktestError> {
        if self.status != EngineStatus::NotStarted {
            return Err(BacktestError::AlreadyRan);
        }
        self.status = EngineStatus::Running;
        info!(
            symbol = self.series.symbol(),
            strategy = strategy.name(),
            bars = self.series.length(),
            "backtest started"
        );

        match self.run_loop(strategy) {
            Ok(()) => {
                self.status = EngineStatus::Completed;
                let output = self.finish(strategy.name());
                info!(
                    trades = output.trades.len(),
                    fills = output.fills.len(),
                    skipped = output.skipped_fills.len(),
                    final_equity = output.final_equity(),
                    "backtest completed"
                );
                Ok(output)
            }
            Err(e) => {
                self.status = EngineStatus::Failed;
                warn!(error = %e, "backtest failed");
                Err(e)
            }
        }
    }

    fn run_loop(&mut self, strategy: &mut dyn Strategy) -> Result<(), BacktestError> {
        let series = self.series;
        for i in 0..series.length() {
            let bar = series.bar_at(i)?;

            // ─── Phase 1: Start-of-bar ───
            for pending in std::mem::take(&mut self.pending) {
                self.execute_pending(pending, bar, i)?;
            }

            // ─── Phase 2: Post-fill accounting ───
            self.portfolio.mark_to_market(bar);
            let snapshot = self.portfolio.snapshot(i, bar.timestamp, bar.close);
            let sizing_equity = snapshot.total_equity;
            self.equity_curve.push(snapshot);

            // ─── Phase 3: Decision ───
            let history = series.slice_up_to(i)?;
            for intent in strategy.on_bar(history, &self.portfolio.position) {
                intent.validate().map_err(|reason| ExecutionError {
                    bar_index: i,
                    intent,
                    reason,
                })?;
                self.pending.push(PendingIntent {
                    intent,
                    decided_at: i,
                    sizing_equity,
                    sizing_price: bar.close,
                });
            }
        }

        if !self.pending.is_empty() {
            warn!(
                count = self.pending.len(),
                "discarding intents queued on the final bar"
            );
        }
        Ok(())
    }

    fn execute_pending(
        &mut self,
        pending: PendingIntent,
        bar: &Bar,
        bar_index: usize,
    ) -> Result<(), BacktestError> {
        let fill = match self
            .simulator
            .execute(&pending, &self.portfolio.position, bar, bar_index)?
        {
            ExecutionOutcome::Filled(fill) => fill,
            ExecutionOutcome::Skipped(reason @ SkipReason::LimitNotReached { .. })
                if self.config.limit_order_carry_over =>
            {
                debug!(bar = bar_index, %reason, "limit carried over");
                self.pending.push(pending);
                return Ok(());
            }
            ExecutionOutcome::Skipped(reason) => {
                self.skip(&pending, bar, bar_index, reason);
                return Ok(());
            }
        };

        match self.portfolio.apply_fill(fill.clone()) {
            Ok(trade) => {
                debug!(
                    bar = bar_index,
                    side = ?fill.side,
                    price = fill.price,
                    quantity = fill.quantity,
                    fee = fill.fee,
                    "fill"
                );
                self.fills.push(fill);
                if let Some(mut trade) = trade {
                    if let Some(reason) = pending.intent.exit_reason {
                        trade.exit_reason = reason;
                    }
                    debug!(bar = bar_index, pnl = trade.pnl, reason = %trade.exit_reason, "trade closed");
                    self.trades.push(trade);
                }
            }
            Err(FillRejection::InsufficientFunds {
                required,
                available,
            }) => {
                if self.config.strict_funds {
                    return Err(BacktestError::InsufficientFunds {
                        bar_index,
                        intent: pending.intent,
                        required,
                        available,
                    });
                }
                warn!(bar = bar_index, required, available, "fill rejected: insufficient funds");
                self.skip(
                    &pending,
                    bar,
                    bar_index,
                    SkipReason::InsufficientFunds {
                        required,
                        available,
                    },
                );
            }
            Err(FillRejection::ShortingDisabled { resulting_quantity }) => {
                warn!(bar = bar_index, resulting_quantity, "fill rejected: shorting disabled");
                self.skip(
                    &pending,
                    bar,
                    bar_index,
                    SkipReason::ShortingDisabled { resulting_quantity },
                );
            }
        }
        Ok(())
    }

    fn skip(&mut self, pending: &PendingIntent, bar: &Bar, bar_index: usize, reason: SkipReason) {
        debug!(bar = bar_index, %reason, "skipped fill");
        self.skipped_fills.push(SkippedFill {
            bar_index,
            timestamp: bar.timestamp,
            intent: pending.intent,
            reason,
        });
    }

    fn finish(&mut self, strategy_name: &str) -> RunOutput {
        let discarded_intents = std::mem::take(&mut self.pending).len();
        RunOutput {
            equity_curve: std::mem::take(&mut self.equity_curve),
            trades: std::mem::take(&mut self.trades),
            fills: std::mem::take(&mut self.fills),
            skipped_fills: std::mem::take(&mut self.skipped_fills),
            final_position: self.portfolio.position.clone(),
            initial_cash: self.portfolio.initial_cash,
            total_fees: self.portfolio.total_fees,
            total_slippage: self.portfolio.total_slippage,
            discarded_intents,
            fingerprint: RunFingerprint {
                symbol: self.series.symbol().to_string(),
                strategy: strategy_name.to_string(),
                bar_count: self.series.length(),
                start: self.series.first().timestamp,
                end: self.series.last().timestamp,
                series_hash: hash_series(self.series),
                config_hash: self.config.fingerprint(),
            },
        }
    }
}

/// Run a backtest in one call.
pub fn run_backtest(
    series: &PriceSeries,
    config: EngineConfig,
    strategy: &mut dyn Strategy,
) -> Result<RunOutput, BacktestError> {
    BacktestEngine::new(series, config)?.run(strategy)
}
