//! Moving-average indicators over close-price slices.
//!
//! Batch functions return one value per input with NaN during the lookback.
//! Strategies that run bar by bar use [`StreamingEma`] so each bar costs O(1).

pub mod ema;
pub mod sma;

pub use ema::{ema, StreamingEma};
pub use sma::sma;

/// Assert two f64 values are approximately equal (within epsilon).
#[cfg(test)]
pub fn assert_approx(actual: f64, expected: f64, epsilon: f64) {
    assert!(
        (actual - expected).abs() < epsilon,
        "assert_approx failed: actual={actual}, expected={expected}, diff={}, epsilon={epsilon}",
        (actual - expected).abs()
    );
}

/// Default epsilon for indicator tests.
#[cfg(test)]
pub const DEFAULT_EPSILON: f64 = 1e-10;
