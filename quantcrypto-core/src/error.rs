//! Error taxonomy for a backtest run.
//!
//! - `DataError`: malformed or empty price series, out-of-range access. Fatal,
//!   raised before any portfolio state is touched.
//! - `ExecutionError`: a strategy emitted a malformed intent. Fatal.
//! - `BacktestError::InsufficientFunds`: only surfaced in strict mode; the
//!   default policy rejects the fill and keeps running.

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::domain::bar::BarError;
use crate::domain::intent::OrderIntent;

#[derive(Debug, Clone, PartialEq, Error)]
pub enum DataError {
    #[error("price series is empty")]
    Empty,

    #[error("bar index {index} out of range (series length {len})")]
    OutOfRange { index: usize, len: usize },

    #[error("invalid bar at index {index} ({timestamp}): {source}")]
    InvalidBar {
        index: usize,
        timestamp: DateTime<Utc>,
        #[source]
        source: BarError,
    },

    #[error(
        "timestamps must strictly increase: bar {index} at {timestamp} follows {previous}"
    )]
    NonIncreasingTimestamp {
        index: usize,
        timestamp: DateTime<Utc>,
        previous: DateTime<Utc>,
    },
}

/// A malformed order intent, with enough context to reproduce it.
#[derive(Debug, Clone, PartialEq, Error)]
#[error("malformed intent at bar {bar_index}: {reason} ({intent:?})")]
pub struct ExecutionError {
    pub bar_index: usize,
    pub intent: OrderIntent,
    pub reason: String,
}

#[derive(Debug, Clone, PartialEq, Error)]
pub enum BacktestError {
    #[error(transparent)]
    Data(#[from] DataError),

    #[error(transparent)]
    Execution(#[from] ExecutionError),

    #[error(
        "insufficient funds at bar {bar_index}: fill requires {required:.8} but only {available:.8} cash is available"
    )]
    InsufficientFunds {
        bar_index: usize,
        intent: OrderIntent,
        required: f64,
        available: f64,
    },

    #[error("invalid engine configuration: {0}")]
    InvalidConfig(String),

    #[error("engine already ran; construct a new engine for another run")]
    AlreadyRan,
}
