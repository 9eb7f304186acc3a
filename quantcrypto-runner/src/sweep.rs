//! Parameter sweeps over EMA-crossover periods.
//!
//! Every grid point is an independent run on the same shared series: each run
//! builds its own strategy and engine, so the points fan out over rayon's pool
//! with no shared mutable state.

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;
use thiserror::Error;
use tracing::info;

use quantcrypto_core::domain::PriceSeries;

use crate::config::{BacktestConfig, StrategyConfig, DEFAULT_FRACTION};
use crate::metrics::PerformanceMetrics;
use crate::runner::{run_on_series, BacktestResult, RunError};

/// Fast × slow period grid for the EMA crossover.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EmaGrid {
    pub fast: Vec<usize>,
    pub slow: Vec<usize>,
    pub fraction: f64,
    pub allow_short: bool,
}

impl Default for EmaGrid {
    /// Fast 5..=20 step 5 against slow 20..=60 step 10.
    fn default() -> Self {
        Self {
            fast: vec![5, 10, 15, 20],
            slow: vec![20, 30, 40, 50, 60],
            fraction: DEFAULT_FRACTION,
            allow_short: false,
        }
    }
}

impl EmaGrid {
    pub fn new(fast: Vec<usize>, slow: Vec<usize>) -> Self {
        Self {
            fast,
            slow,
            ..Self::default()
        }
    }

    /// Valid `(fast, slow)` pairs in grid order. Pairs with `fast >= slow`
    /// or a zero period are skipped.
    pub fn pairs(&self) -> Vec<(usize, usize)> {
        let mut pairs = Vec::new();
        for &fast in &self.fast {
            for &slow in &self.slow {
                if fast > 0 && fast < slow {
                    pairs.push((fast, slow));
                }
            }
        }
        pairs
    }

    pub fn size(&self) -> usize {
        self.pairs().len()
    }

    /// One strategy config per grid point.
    pub fn strategies(&self) -> Vec<StrategyConfig> {
        self.pairs()
            .into_iter()
            .map(|(fast, slow)| StrategyConfig::EmaCrossover {
                fast,
                slow,
                fraction: self.fraction,
                allow_short: self.allow_short,
            })
            .collect()
    }
}

/// Metric used to rank sweep results (higher is better, except drawdown).
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RankMetric {
    Sharpe,
    Sortino,
    TotalReturn,
    Calmar,
    ProfitFactor,
    MaxDrawdown,
}

#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("unknown rank metric '{0}' (expected sharpe, sortino, total_return, calmar, profit_factor, max_drawdown)")]
pub struct UnknownRankMetric(pub String);

impl RankMetric {
    /// Score where larger is better.
    pub fn score(&self, metrics: &PerformanceMetrics) -> f64 {
        match self {
            RankMetric::Sharpe => metrics.sharpe,
            RankMetric::Sortino => metrics.sortino,
            RankMetric::TotalReturn => metrics.total_return,
            RankMetric::Calmar => metrics.calmar,
            RankMetric::ProfitFactor => metrics.profit_factor,
            RankMetric::MaxDrawdown => -metrics.max_drawdown,
        }
    }

    pub fn name(&self) -> &'static str {
        match self {
            RankMetric::Sharpe => "sharpe",
            RankMetric::Sortino => "sortino",
            RankMetric::TotalReturn => "total_return",
            RankMetric::Calmar => "calmar",
            RankMetric::ProfitFactor => "profit_factor",
            RankMetric::MaxDrawdown => "max_drawdown",
        }
    }
}

impl fmt::Display for RankMetric {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

impl FromStr for RankMetric {
    type Err = UnknownRankMetric;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "sharpe" => Ok(RankMetric::Sharpe),
            "sortino" => Ok(RankMetric::Sortino),
            "total_return" | "return" => Ok(RankMetric::TotalReturn),
            "calmar" => Ok(RankMetric::Calmar),
            "profit_factor" => Ok(RankMetric::ProfitFactor),
            "max_drawdown" | "drawdown" => Ok(RankMetric::MaxDrawdown),
            other => Err(UnknownRankMetric(other.to_string())),
        }
    }
}

/// Runs a grid against one series.
#[derive(Debug, Clone)]
pub struct ParamSweep {
    base: BacktestConfig,
    parallel: bool,
}

impl ParamSweep {
    /// `base` supplies engine, metrics and data settings; its strategy is
    /// replaced at every grid point.
    pub fn new(base: BacktestConfig) -> Self {
        Self {
            base,
            parallel: true,
        }
    }

    pub fn with_parallelism(mut self, parallel: bool) -> Self {
        self.parallel = parallel;
        self
    }

    /// Run every grid point. The first failing run aborts the sweep.
    pub fn run(&self, series: &PriceSeries, grid: &EmaGrid) -> Result<SweepResults, RunError> {
        let configs: Vec<BacktestConfig> = grid
            .strategies()
            .into_iter()
            .map(|strategy| BacktestConfig {
                strategy,
                ..self.base.clone()
            })
            .collect();
        info!(
            points = configs.len(),
            parallel = self.parallel,
            symbol = series.symbol(),
            "starting sweep"
        );

        let results: Vec<BacktestResult> = if self.parallel {
            configs
                .par_iter()
                .map(|config| run_on_series(series, config))
                .collect::<Result<Vec<_>, _>>()?
        } else {
            configs
                .iter()
                .map(|config| run_on_series(series, config))
                .collect::<Result<Vec<_>, _>>()?
        };

        Ok(SweepResults { results })
    }
}

/// Results from a parameter sweep, in grid order.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SweepResults {
    results: Vec<BacktestResult>,
}

impl SweepResults {
    pub fn all(&self) -> &[BacktestResult] {
        &self.results
    }

    pub fn len(&self) -> usize {
        self.results.len()
    }

    pub fn is_empty(&self) -> bool {
        self.results.is_empty()
    }

    /// Results sorted best-first. NaN scores sort last; ties keep grid order.
    pub fn ranked_by(&self, metric: RankMetric) -> Vec<&BacktestResult> {
        let mut sorted: Vec<_> = self.results.iter().collect();
        sorted.sort_by(|a, b| {
            let (sa, sb) = (metric.score(&a.metrics), metric.score(&b.metrics));
            match (sa.is_nan(), sb.is_nan()) {
                (true, true) => std::cmp::Ordering::Equal,
                (true, false) => std::cmp::Ordering::Greater,
                (false, true) => std::cmp::Ordering::Less,
                (false, false) => sb.total_cmp(&sa),
            }
        });
        sorted
    }

    pub fn top_n(&self, metric: RankMetric, n: usize) -> Vec<&BacktestResult> {
        self.ranked_by(metric).into_iter().take(n).collect()
    }

    pub fn best(&self, metric: RankMetric) -> Option<&BacktestResult> {
        self.ranked_by(metric).into_iter().next()
    }
}
