//! `PriceSeries`, the validated bar history of one instrument, and
//! `HistoryView`, the prefix of it a strategy is allowed to see.

use serde::{Deserialize, Serialize};

use super::bar::Bar;
use crate::error::DataError;

/// Ordered OHLCV bars with strictly increasing timestamps.
///
/// Construction validates every bar, so a `PriceSeries` in hand is always
/// non-empty and well-formed. The series is never mutated during a run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PriceSeries {
    symbol: String,
    bars: Vec<Bar>,
}

impl PriceSeries {
    pub fn new(symbol: impl Into<String>, bars: Vec<Bar>) -> Result<Self, DataError> {
        if bars.is_empty() {
            return Err(DataError::Empty);
        }
        for (index, bar) in bars.iter().enumerate() {
            bar.validate().map_err(|source| DataError::InvalidBar {
                index,
                timestamp: bar.timestamp,
                source,
            })?;
            if index > 0 {
                let previous = bars[index - 1].timestamp;
                if bar.timestamp <= previous {
                    return Err(DataError::NonIncreasingTimestamp {
                        index,
                        timestamp: bar.timestamp,
                        previous,
                    });
                }
            }
        }
        Ok(Self {
            symbol: symbol.into(),
            bars,
        })
    }

    pub fn symbol(&self) -> &str {
        &self.symbol
    }

    pub fn length(&self) -> usize {
        self.bars.len()
    }

    pub fn bar_at(&self, index: usize) -> Result<&Bar, DataError> {
        self.bars.get(index).ok_or(DataError::OutOfRange {
            index,
            len: self.bars.len(),
        })
    }

    /// Bars `[0..=index]`: everything observable at the close of bar `index`.
    pub fn slice_up_to(&self, index: usize) -> Result<HistoryView<'_>, DataError> {
        if index >= self.bars.len() {
            return Err(DataError::OutOfRange {
                index,
                len: self.bars.len(),
            });
        }
        Ok(HistoryView {
            bars: &self.bars[..=index],
        })
    }

    pub fn first(&self) -> &Bar {
        &self.bars[0]
    }

    pub fn last(&self) -> &Bar {
        &self.bars[self.bars.len() - 1]
    }

    /// The whole series. Strategies never get this; they see a `HistoryView`.
    pub fn bars(&self) -> &[Bar] {
        &self.bars
    }
}

/// Read-only prefix of a `PriceSeries`.
///
/// Holds a borrowed slice ending at the current bar. There is no accessor that
/// reaches past the slice, so a strategy holding a view cannot observe future
/// bars no matter how it is written.
#[derive(Debug, Clone, Copy)]
pub struct HistoryView<'a> {
    bars: &'a [Bar],
}

impl<'a> HistoryView<'a> {
    /// Number of visible bars (current index + 1).
    pub fn len(&self) -> usize {
        self.bars.len()
    }

    pub fn is_empty(&self) -> bool {
        self.bars.is_empty()
    }

    /// Index of the current bar within the full series.
    pub fn index(&self) -> usize {
        self.bars.len() - 1
    }

    /// The bar being decided on.
    pub fn current(&self) -> &'a Bar {
        &self.bars[self.bars.len() - 1]
    }

    pub fn bar(&self, index: usize) -> Option<&'a Bar> {
        self.bars.get(index)
    }

    pub fn bars(&self) -> &'a [Bar] {
        self.bars
    }

    /// The most recent `n` bars (fewer if history is shorter).
    pub fn last_n(&self, n: usize) -> &'a [Bar] {
        let start = self.bars.len().saturating_sub(n);
        &self.bars[start..]
    }

    pub fn closes(&self) -> impl Iterator<Item = f64> + 'a {
        self.bars.iter().map(|b| b.close)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_bars;

    #[test]
    fn empty_series_rejected() {
        assert_eq!(PriceSeries::new("BTCUSDT", vec![]), Err(DataError::Empty));
    }

    #[test]
    fn duplicate_timestamp_rejected() {
        let mut bars = test_bars(&[100.0, 101.0, 102.0]);
        bars[2].timestamp = bars[1].timestamp;
        let err = PriceSeries::new("BTCUSDT", bars).unwrap_err();
        assert!(matches!(
            err,
            DataError::NonIncreasingTimestamp { index: 2, .. }
        ));
    }

    #[test]
    fn invalid_bar_reports_index() {
        let mut bars = test_bars(&[100.0, 101.0, 102.0]);
        bars[1].high = 50.0;
        let err = PriceSeries::new("BTCUSDT", bars).unwrap_err();
        assert!(matches!(err, DataError::InvalidBar { index: 1, .. }));
    }

    #[test]
    fn bar_at_out_of_range() {
        let series = PriceSeries::new("BTCUSDT", test_bars(&[100.0, 101.0])).unwrap();
        assert_eq!(series.length(), 2);
        assert!(series.bar_at(1).is_ok());
        assert_eq!(
            series.bar_at(2),
            Err(DataError::OutOfRange { index: 2, len: 2 })
        );
    }

    #[test]
    fn slice_up_to_is_a_prefix() {
        let series =
            PriceSeries::new("BTCUSDT", test_bars(&[100.0, 101.0, 102.0, 103.0])).unwrap();
        let view = series.slice_up_to(1).unwrap();
        assert_eq!(view.len(), 2);
        assert_eq!(view.index(), 1);
        assert_eq!(view.current().close, 101.0);
        assert!(view.bar(2).is_none());
        assert_eq!(view.closes().collect::<Vec<_>>(), vec![100.0, 101.0]);
        assert!(series.slice_up_to(4).is_err());
    }

    #[test]
    fn last_n_clamps_to_history() {
        let series = PriceSeries::new("BTCUSDT", test_bars(&[1.0, 2.0, 3.0])).unwrap();
        let view = series.slice_up_to(2).unwrap();
        assert_eq!(view.last_n(2).len(), 2);
        assert_eq!(view.last_n(10).len(), 3);
    }
}
