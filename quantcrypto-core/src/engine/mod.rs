//! Backtesting engine: bar-by-bar event loop and run lifecycle.
//!
//! The engine borrows a validated `PriceSeries`, drives a `dyn Strategy`
//! through it one bar at a time, and returns a `RunOutput`: the equity curve,
//! the trade log, the fill and skipped-fill logs, and the final position.

pub mod loop_runner;
pub mod state;

pub use loop_runner::{run_backtest, BacktestEngine};
pub use state::{EngineConfig, EngineStatus, RunOutput};
