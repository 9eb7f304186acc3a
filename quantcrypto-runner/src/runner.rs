//! Backtest runner: wires config, data, engine, and metrics together.
//!
//! Two entry points:
//! - `run_backtest()`: resolves the data source from the config, then runs. Used by the CLI.
//! - `run_on_series()`: takes a pre-loaded series. Used by parameter sweeps,
//!   which share one series across many runs.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use thiserror::Error;
use tracing::{info, warn};

use quantcrypto_core::domain::{PriceSeries, Timeframe};
use quantcrypto_core::engine::{self, RunOutput};
use quantcrypto_core::quality::{audit, QualityReport};
use quantcrypto_core::BacktestError;

use crate::config::{BacktestConfig, ConfigError, StrategyConfig};
use crate::data_loader::{load_series, LoadError};
use crate::metrics::PerformanceMetrics;

/// Errors from the runner.
#[derive(Debug, Error)]
pub enum RunError {
    #[error("config error: {0}")]
    Config(#[from] ConfigError),
    #[error("data error: {0}")]
    Load(#[from] LoadError),
    #[error("backtest failed: {0}")]
    Backtest(#[from] BacktestError),
}

/// Current schema version for persisted artifacts.
pub const SCHEMA_VERSION: u32 = 1;

/// Complete result of a single backtest run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BacktestResult {
    /// Schema version for forward-compatible deserialization.
    #[serde(default = "default_schema_version")]
    pub schema_version: u32,
    /// Combined hash of series, engine config and strategy.
    pub run_id: String,
    pub symbol: String,
    pub timeframe: Timeframe,
    pub strategy: StrategyConfig,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,
    pub synthetic: bool,
    pub config: BacktestConfig,
    pub metrics: PerformanceMetrics,
    pub data_quality: QualityReport,
    pub output: RunOutput,
}

fn default_schema_version() -> u32 {
    SCHEMA_VERSION
}

impl BacktestResult {
    /// Metric name → value view of the summary.
    pub fn metrics_map(&self) -> BTreeMap<String, f64> {
        self.metrics.to_map()
    }

    /// Strategy label including any protective exits.
    pub fn strategy_label(&self) -> String {
        self.config.strategy_label()
    }
}

/// Validate the config, load its data source, and run.
pub fn run_backtest(config: &BacktestConfig) -> Result<BacktestResult, RunError> {
    config.validate()?;
    let series = load_series(&config.data)?;
    run_on_series(&series, config)
}

/// Run against an already-loaded series. No I/O.
pub fn run_on_series(
    series: &PriceSeries,
    config: &BacktestConfig,
) -> Result<BacktestResult, RunError> {
    config.strategy.validate()?;
    config.metrics.validate()?;

    let data_quality = audit(series.bars(), config.data.timeframe);
    if !data_quality.is_clean() {
        warn!(
            symbol = series.symbol(),
            score = data_quality.score,
            issues = data_quality.issue_count(),
            "data quality issues in input series"
        );
    }

    let mut strategy = config.build_strategy();
    let mut output = engine::run_backtest(series, config.engine.clone(), strategy.as_mut())?;
    // Parameters and exits belong in the run identity, not just the name
    output.fingerprint.strategy = config.strategy_label();
    let metrics = PerformanceMetrics::from_run(&output, &config.metrics);

    info!(
        run_id = %output.fingerprint.run_hash().short(),
        strategy = %output.fingerprint.strategy,
        total_return = metrics.total_return,
        sharpe = metrics.sharpe,
        max_drawdown = metrics.max_drawdown,
        trades = metrics.trade_count,
        "run complete"
    );

    Ok(BacktestResult {
        schema_version: SCHEMA_VERSION,
        run_id: output.fingerprint.run_hash().to_string(),
        symbol: series.symbol().to_string(),
        timeframe: config.data.timeframe,
        strategy: config.strategy.clone(),
        start: series.first().timestamp,
        end: series.last().timestamp,
        synthetic: config.data.path.is_none(),
        config: config.clone(),
        metrics,
        data_quality,
        output,
    })
}
