//! Simple Moving Average (SMA).
//!
//! SMA[t] = mean(values[t-period+1..=t]). Lookback: period - 1.

/// Rolling mean over a slice. Values before index `period - 1` are NaN, as is
/// any window containing a NaN.
pub fn sma(values: &[f64], period: usize) -> Vec<f64> {
    let n = values.len();
    let mut result = vec![f64::NAN; n];
    if period == 0 || n < period {
        return result;
    }

    for (i, window) in values.windows(period).enumerate() {
        if window.iter().any(|v| v.is_nan()) {
            continue;
        }
        result[i + period - 1] = window.iter().sum::<f64>() / period as f64;
    }
    result
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::indicators::{assert_approx, DEFAULT_EPSILON};

    #[test]
    fn sma_3_known_values() {
        let result = sma(&[10.0, 11.0, 12.0, 13.0, 14.0], 3);
        assert!(result[0].is_nan());
        assert!(result[1].is_nan());
        assert_approx(result[2], 11.0, DEFAULT_EPSILON);
        assert_approx(result[3], 12.0, DEFAULT_EPSILON);
        assert_approx(result[4], 13.0, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_nan_only_taints_its_windows() {
        let result = sma(&[1.0, f64::NAN, 3.0, 4.0, 5.0, 6.0], 2);
        assert!(result[1].is_nan());
        assert!(result[2].is_nan());
        assert_approx(result[3], 3.5, DEFAULT_EPSILON);
    }

    #[test]
    fn sma_zero_period_is_all_nan() {
        assert!(sma(&[1.0, 2.0], 0).iter().all(|v| v.is_nan()));
    }
}
