//! Serializable backtest configuration, loaded from TOML.
//!
//! ```toml
//! [engine]
//! initial_cash = 1000.0
//! fee_pct = 0.0004
//! slippage_bps = 1.0
//!
//! [metrics]
//! bars_per_year = 8760
//!
//! [strategy]
//! type = "ema_crossover"
//! fast = 9
//! slow = 21
//!
//! [exits]
//! stop_loss = 0.05
//! trailing_stop = 0.08
//!
//! [data]
//! path = "data/BTCUSDT-1h.csv"
//! symbol = "BTCUSDT"
//! timeframe = "1h"
//! ```
//!
//! Every table and field is optional. Without a `data.path` the runner
//! generates a seeded synthetic series.

use chrono::{DateTime, TimeZone, Utc};
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use thiserror::Error;

use quantcrypto_core::domain::Timeframe;
use quantcrypto_core::engine::EngineConfig;
use quantcrypto_core::fingerprint::ContentHash;
use quantcrypto_core::strategy::{
    BuyAndHold, EmaCrossover, ExitRules, FlatStrategy, LimitDip, ProtectiveExit, Strategy,
};
use quantcrypto_core::BacktestError;

use crate::metrics::MetricsConfig;

/// Fraction of equity committed per entry when a strategy table omits it.
///
/// Bars open where the previous bar closed, so sizing at the full 1.0 on the
/// decision close leaves no room for fees or slippage on the next open.
pub const DEFAULT_FRACTION: f64 = 0.95;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("failed to read config {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("failed to parse config: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("failed to serialize config: {0}")]
    Serialize(#[from] toml::ser::Error),

    #[error(transparent)]
    Engine(#[from] BacktestError),

    #[error("invalid [{section}] config: {reason}")]
    Invalid {
        section: &'static str,
        reason: String,
    },
}

impl ConfigError {
    fn invalid(section: &'static str, reason: impl Into<String>) -> Self {
        ConfigError::Invalid {
            section,
            reason: reason.into(),
        }
    }
}

/// Full configuration for one backtest run.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct BacktestConfig {
    pub engine: EngineConfig,
    pub metrics: MetricsConfig,
    pub strategy: StrategyConfig,
    /// Stop-loss, take-profit and trailing exits applied over the strategy.
    pub exits: ExitRules,
    pub data: DataConfig,
}

impl BacktestConfig {
    /// Read, parse and validate a TOML file.
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Io {
            path: path.to_path_buf(),
            source,
        })?;
        Self::from_toml_str(&text)
    }

    /// Parse and validate TOML text.
    pub fn from_toml_str(text: &str) -> Result<Self, ConfigError> {
        let config: Self = toml::from_str(text)?;
        config.validate()?;
        Ok(config)
    }

    pub fn to_toml_string(&self) -> Result<String, ConfigError> {
        Ok(toml::to_string_pretty(self)?)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        self.engine.validate()?;
        self.metrics.validate()?;
        self.strategy.validate()?;
        self.exits
            .validate()
            .map_err(|reason| ConfigError::invalid("exits", reason))?;
        self.data.validate()?;
        Ok(())
    }

    /// The configured strategy, wrapped in protective exits when any are set.
    pub fn build_strategy(&self) -> Box<dyn Strategy> {
        let inner = self.strategy.build();
        if self.exits.is_empty() {
            inner
        } else {
            Box::new(ProtectiveExit::new(inner, self.exits))
        }
    }

    /// Strategy label with the exit levels appended, e.g.
    /// `ema_crossover(9/21)+sl5%`.
    pub fn strategy_label(&self) -> String {
        if self.exits.is_empty() {
            self.strategy.label()
        } else {
            format!("{}+{}", self.strategy.label(), self.exits.label())
        }
    }

    /// Deterministic hash of the whole configuration.
    pub fn config_hash(&self) -> ContentHash {
        let json = serde_json::to_vec(self).unwrap_or_default();
        ContentHash::from_bytes(&json)
    }
}

impl MetricsConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bars_per_year == 0 {
            return Err(ConfigError::invalid("metrics", "bars_per_year must be > 0"));
        }
        if !self.risk_free_rate.is_finite() {
            return Err(ConfigError::invalid(
                "metrics",
                "risk_free_rate must be finite",
            ));
        }
        Ok(())
    }
}

// ─── Strategy ───────────────────────────────────────────────────────

fn default_fraction() -> f64 {
    DEFAULT_FRACTION
}
fn default_fast() -> usize {
    9
}
fn default_slow() -> usize {
    21
}
fn default_discount() -> f64 {
    0.02
}
fn default_hold_bars() -> usize {
    5
}

/// Which reference strategy to run, with its parameters.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StrategyConfig {
    /// Never trades.
    Flat,

    /// Buys once on the first bar and holds.
    BuyAndHold {
        #[serde(default = "default_fraction")]
        fraction: f64,
    },

    /// Fast/slow EMA crossover.
    EmaCrossover {
        #[serde(default = "default_fast")]
        fast: usize,
        #[serde(default = "default_slow")]
        slow: usize,
        #[serde(default = "default_fraction")]
        fraction: f64,
        #[serde(default)]
        allow_short: bool,
    },

    /// Limit bid below the close, exited after a fixed holding period.
    LimitDip {
        #[serde(default = "default_discount")]
        discount: f64,
        #[serde(default = "default_fraction")]
        fraction: f64,
        #[serde(default = "default_hold_bars")]
        hold_bars: usize,
    },
}

impl Default for StrategyConfig {
    fn default() -> Self {
        StrategyConfig::EmaCrossover {
            fast: default_fast(),
            slow: default_slow(),
            fraction: DEFAULT_FRACTION,
            allow_short: false,
        }
    }
}

impl StrategyConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        let check_fraction = |fraction: f64| {
            if fraction > 0.0 && fraction.is_finite() {
                Ok(())
            } else {
                Err(ConfigError::invalid(
                    "strategy",
                    format!("fraction must be positive, got {fraction}"),
                ))
            }
        };
        match *self {
            StrategyConfig::Flat => Ok(()),
            StrategyConfig::BuyAndHold { fraction } => check_fraction(fraction),
            StrategyConfig::EmaCrossover {
                fast,
                slow,
                fraction,
                ..
            } => {
                if fast == 0 {
                    return Err(ConfigError::invalid("strategy", "fast period must be > 0"));
                }
                if slow <= fast {
                    return Err(ConfigError::invalid(
                        "strategy",
                        format!("slow period ({slow}) must exceed fast period ({fast})"),
                    ));
                }
                check_fraction(fraction)
            }
            StrategyConfig::LimitDip {
                discount, fraction, ..
            } => {
                if !(0.0..1.0).contains(&discount) {
                    return Err(ConfigError::invalid(
                        "strategy",
                        format!("discount must be in [0, 1), got {discount}"),
                    ));
                }
                check_fraction(fraction)
            }
        }
    }

    /// Instantiate the configured strategy. Call `validate` first: the
    /// constructors panic on out-of-range parameters.
    pub fn build(&self) -> Box<dyn Strategy> {
        match *self {
            StrategyConfig::Flat => Box::new(FlatStrategy),
            StrategyConfig::BuyAndHold { fraction } => Box::new(BuyAndHold::new(fraction)),
            StrategyConfig::EmaCrossover {
                fast,
                slow,
                fraction,
                allow_short,
            } => Box::new(EmaCrossover::new(fast, slow, fraction, allow_short)),
            StrategyConfig::LimitDip {
                discount,
                fraction,
                hold_bars,
            } => Box::new(LimitDip::new(discount, fraction, hold_bars)),
        }
    }

    /// Short human-readable label, e.g. `ema_crossover(9/21)`.
    pub fn label(&self) -> String {
        match self {
            StrategyConfig::Flat => "flat".to_string(),
            StrategyConfig::BuyAndHold { .. } => "buy_and_hold".to_string(),
            StrategyConfig::EmaCrossover { fast, slow, .. } => {
                format!("ema_crossover({fast}/{slow})")
            }
            StrategyConfig::LimitDip {
                discount,
                hold_bars,
                ..
            } => format!("limit_dip({:.2}%/{hold_bars})", discount * 100.0),
        }
    }
}

// ─── Data ───────────────────────────────────────────────────────────

/// Where the price series comes from.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DataConfig {
    /// CSV file of OHLCV bars. `None` means synthetic data.
    pub path: Option<PathBuf>,
    pub symbol: String,
    pub timeframe: Timeframe,
    /// Sort rows and drop duplicate timestamps before building the series.
    pub clean: bool,
    pub synthetic: SyntheticConfig,
}

impl Default for DataConfig {
    fn default() -> Self {
        Self {
            path: None,
            symbol: "BTCUSDT".to_string(),
            timeframe: Timeframe::D1,
            clean: true,
            synthetic: SyntheticConfig::default(),
        }
    }
}

impl DataConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.symbol.trim().is_empty() {
            return Err(ConfigError::invalid("data", "symbol must not be empty"));
        }
        if self.path.is_none() {
            self.synthetic.validate()?;
        }
        Ok(())
    }
}

/// Parameters of the seeded random-walk generator.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyntheticConfig {
    pub bars: usize,
    pub start_price: f64,
    /// Maximum absolute per-bar return.
    pub volatility: f64,
    pub seed: u64,
    pub start: DateTime<Utc>,
}

impl Default for SyntheticConfig {
    fn default() -> Self {
        Self {
            bars: 500,
            start_price: 30_000.0,
            volatility: 0.03,
            seed: 42,
            start: Utc
                .with_ymd_and_hms(2024, 1, 1, 0, 0, 0)
                .single()
                .unwrap_or_default(),
        }
    }
}

impl SyntheticConfig {
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.bars == 0 {
            return Err(ConfigError::invalid("data.synthetic", "bars must be > 0"));
        }
        if !(self.start_price.is_finite() && self.start_price > 0.0) {
            return Err(ConfigError::invalid(
                "data.synthetic",
                "start_price must be positive",
            ));
        }
        if !(self.volatility > 0.0 && self.volatility < 0.5) {
            return Err(ConfigError::invalid(
                "data.synthetic",
                "volatility must be in (0, 0.5)",
            ));
        }
        Ok(())
    }
}
