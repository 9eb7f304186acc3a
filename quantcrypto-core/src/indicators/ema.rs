//! Exponential Moving Average (EMA).
//!
//! Recursive: EMA[t] = alpha * close[t] + (1 - alpha) * EMA[t-1]
//! Seed: EMA[period-1] = SMA of first `period` values.
//! Lookback: period - 1.

/// EMA over a full slice. Values before the seed index are NaN.
pub fn ema(values: &[f64], period: usize) -> Vec<f64> {
    let mut result = vec![f64::NAN; values.len()];
    let mut state = StreamingEma::new(period);
    for (i, &v) in values.iter().enumerate() {
        if let Some(value) = state.update(v) {
            result[i] = value;
        }
    }
    result
}

/// Incremental EMA, fed one value at a time.
///
/// Produces the same values as [`ema`] over the same inputs. A NaN input
/// poisons the state: every later output is `None`.
#[derive(Debug, Clone)]
pub struct StreamingEma {
    period: usize,
    alpha: f64,
    seed_sum: f64,
    seen: usize,
    value: Option<f64>,
    poisoned: bool,
}

impl StreamingEma {
    pub fn new(period: usize) -> Self {
        let period = period.max(1);
        Self {
            period,
            alpha: 2.0 / (period as f64 + 1.0),
            seed_sum: 0.0,
            seen: 0,
            value: None,
            poisoned: false,
        }
    }

    pub fn period(&self) -> usize {
        self.period
    }

    /// Number of values consumed so far.
    pub fn seen(&self) -> usize {
        self.seen
    }

    pub fn value(&self) -> Option<f64> {
        if self.poisoned {
            None
        } else {
            self.value
        }
    }

    pub fn update(&mut self, x: f64) -> Option<f64> {
        self.seen += 1;
        if self.poisoned || x.is_nan() {
            self.poisoned = true;
            return None;
        }
        match self.value {
            Some(prev) => {
                self.value = Some(self.alpha * x + (1.0 - self.alpha) * prev);
            }
            None => {
                self.seed_sum += x;
                if self.seen == self.period {
                    self.value = Some(self.seed_sum / self.period as f64);
                }
            }
        }
        self.value
    }
}
