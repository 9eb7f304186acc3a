//! QuantCrypto Runner: backtest orchestration around `quantcrypto-core`.
//!
//! - TOML configuration (`[engine]`, `[metrics]`, `[strategy]`, `[data]`)
//! - CSV and synthetic data loading
//! - Performance metrics over the equity curve and trade log
//! - Single runs and rayon-parallel EMA parameter sweeps
//! - JSON/CSV/Markdown artifact export

pub mod config;
pub mod data_loader;
pub mod export;
pub mod metrics;
pub mod runner;
pub mod sweep;

pub use config::{BacktestConfig, ConfigError, DataConfig, StrategyConfig, SyntheticConfig};
pub use data_loader::{load_csv, load_series, read_csv_file, LoadError};
pub use export::{load_artifacts, save_artifacts};
pub use metrics::{MetricsConfig, PerformanceMetrics};
pub use runner::{run_backtest, run_on_series, BacktestResult, RunError, SCHEMA_VERSION};
pub use sweep::{EmaGrid, ParamSweep, RankMetric, SweepResults};
