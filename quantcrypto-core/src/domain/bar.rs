//! Bar: the fundamental market data unit.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// OHLCV bar for a single instrument over one fixed interval.
///
/// `timestamp` is the bar's open time in UTC. Volume is fractional because
/// crypto venues report base-asset volume with decimals.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Bar {
    pub timestamp: DateTime<Utc>,
    pub open: f64,
    pub high: f64,
    pub low: f64,
    pub close: f64,
    pub volume: f64,
}

/// Why a bar failed its OHLC sanity check.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum BarError {
    #[error("non-finite price field")]
    NonFinite,
    #[error("non-positive price (open={open}, high={high}, low={low}, close={close})")]
    NonPositive {
        open: f64,
        high: f64,
        low: f64,
        close: f64,
    },
    #[error("high {high} is below max(open, close) = {bound}")]
    HighBelowBody { high: f64, bound: f64 },
    #[error("low {low} is above min(open, close) = {bound}")]
    LowAboveBody { low: f64, bound: f64 },
    #[error("negative volume {0}")]
    NegativeVolume(f64),
}

impl Bar {
    /// Returns true if any price field is NaN or infinite.
    pub fn is_void(&self) -> bool {
        !(self.open.is_finite()
            && self.high.is_finite()
            && self.low.is_finite()
            && self.close.is_finite())
    }

    /// Check the OHLC invariants: all prices > 0, high >= max(open, close),
    /// low <= min(open, close), volume >= 0.
    pub fn validate(&self) -> Result<(), BarError> {
        if self.is_void() {
            return Err(BarError::NonFinite);
        }
        if self.open <= 0.0 || self.high <= 0.0 || self.low <= 0.0 || self.close <= 0.0 {
            return Err(BarError::NonPositive {
                open: self.open,
                high: self.high,
                low: self.low,
                close: self.close,
            });
        }
        let body_top = self.open.max(self.close);
        if self.high < body_top {
            return Err(BarError::HighBelowBody {
                high: self.high,
                bound: body_top,
            });
        }
        let body_bottom = self.open.min(self.close);
        if self.low > body_bottom {
            return Err(BarError::LowAboveBody {
                low: self.low,
                bound: body_bottom,
            });
        }
        if self.volume < 0.0 || self.volume.is_nan() {
            return Err(BarError::NegativeVolume(self.volume));
        }
        Ok(())
    }

    pub fn is_sane(&self) -> bool {
        self.validate().is_ok()
    }

    /// Whether `price` lies inside this bar's traded range.
    pub fn contains_price(&self, price: f64) -> bool {
        self.low <= price && price <= self.high
    }
}
