//! QuantCrypto Core: domain types, strategy interface, execution, portfolio
//! accounting, and the bar-by-bar backtest engine.
//!
//! This crate contains the heart of the backtester:
//! - Domain types (bars, price series, intents, fills, positions, trades)
//! - Bar-by-bar event loop with start-of-bar execution of queued intents
//! - Execution simulator with slippage, fees, and limit-range checks
//! - Single-position portfolio with the `cash + quantity * mark` identity
//! - Reference strategies and EMA/SMA indicators
//! - Data-quality audit and run fingerprinting

pub mod domain;
pub mod engine;
pub mod error;
pub mod execution;
pub mod fingerprint;
pub mod indicators;
pub mod quality;
pub mod strategy;

pub use domain::{Bar, HistoryView, OrderIntent, Position, PriceSeries};
pub use engine::{run_backtest, BacktestEngine, EngineConfig, RunOutput};
pub use error::{BacktestError, DataError, ExecutionError};
pub use strategy::Strategy;

#[cfg(test)]
mod tests {
    use super::*;

    /// Compile-time check: run inputs and outputs can cross threads, so
    /// parameter sweeps can fan runs out over a worker pool.
    #[allow(dead_code)]
    fn assert_send_sync() {
        fn require_send<T: Send>() {}
        fn require_sync<T: Sync>() {}

        // Domain types
        require_send::<domain::Bar>();
        require_sync::<domain::Bar>();
        require_send::<domain::PriceSeries>();
        require_sync::<domain::PriceSeries>();
        require_send::<domain::OrderIntent>();
        require_sync::<domain::OrderIntent>();
        require_send::<domain::Fill>();
        require_sync::<domain::Fill>();
        require_send::<domain::Position>();
        require_sync::<domain::Position>();
        require_send::<domain::Portfolio>();
        require_sync::<domain::Portfolio>();
        require_send::<domain::TradeRecord>();
        require_sync::<domain::TradeRecord>();
        require_send::<domain::EquitySnapshot>();
        require_sync::<domain::EquitySnapshot>();

        // Engine types
        require_send::<engine::EngineConfig>();
        require_sync::<engine::EngineConfig>();
        require_send::<engine::RunOutput>();
        require_sync::<engine::RunOutput>();
        require_send::<error::BacktestError>();
        require_sync::<error::BacktestError>();

        // Strategies
        require_send::<strategy::FlatStrategy>();
        require_send::<strategy::BuyAndHold>();
        require_send::<strategy::EmaCrossover>();
        require_send::<strategy::LimitDip>();
        require_send::<Box<dyn Strategy>>();
    }

    /// The strategy hook receives a history view and a shared position borrow,
    /// never the portfolio or the full series.
    #[test]
    fn strategy_trait_sees_only_history_and_position() {
        fn _check_trait_object_builds(
            strategy: &mut dyn Strategy,
            history: HistoryView<'_>,
            position: &Position,
        ) -> Vec<OrderIntent> {
            strategy.on_bar(history, position)
        }
    }
}
