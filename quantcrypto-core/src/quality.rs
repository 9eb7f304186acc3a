//! Data-quality audit for raw OHLCV candles, before they become a `PriceSeries`.
//!
//! Checks, each reported with bar indices into the raw input:
//! - timestamp gaps wider than the expected interval
//! - duplicate timestamps
//! - out-of-order timestamps
//! - invalid candles (non-positive or inconsistent OHLC)
//! - price spikes: `(high - low) / open > 0.20`
//! - zero-volume bars (ignored for 1m data, where they are routine)
//!
//! The score starts at 100 and loses `100 * weight * fraction_of_bars_flagged`
//! per check, clamped to `[0, 100]`.

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use std::collections::HashSet;

use crate::domain::{Bar, Timeframe};

/// Range-to-open ratio above which a candle counts as a spike.
pub const SPIKE_THRESHOLD: f64 = 0.20;

const GAP_WEIGHT: f64 = 1.0;
const DUPLICATE_WEIGHT: f64 = 2.0;
const OUT_OF_ORDER_WEIGHT: f64 = 2.0;
const INVALID_WEIGHT: f64 = 3.0;
const SPIKE_WEIGHT: f64 = 0.5;
const ZERO_VOLUME_WEIGHT: f64 = 0.5;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampGap {
    /// Index of the bar after the gap.
    pub index: usize,
    pub from: DateTime<Utc>,
    pub to: DateTime<Utc>,
    /// Bars that should have existed between `from` and `to`.
    pub missing_bars: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FlaggedBar {
    pub index: usize,
    pub timestamp: DateTime<Utc>,
    pub detail: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct QualityReport {
    pub timeframe: Timeframe,
    pub bar_count: usize,
    pub gaps: Vec<TimestampGap>,
    pub duplicates: Vec<FlaggedBar>,
    pub out_of_order: Vec<FlaggedBar>,
    pub invalid_candles: Vec<FlaggedBar>,
    pub price_spikes: Vec<FlaggedBar>,
    pub zero_volume: Vec<FlaggedBar>,
    /// 0 (unusable) to 100 (clean).
    pub score: f64,
}

impl QualityReport {
    pub fn issue_count(&self) -> usize {
        self.gaps.len()
            + self.duplicates.len()
            + self.out_of_order.len()
            + self.invalid_candles.len()
            + self.price_spikes.len()
            + self.zero_volume.len()
    }

    pub fn is_clean(&self) -> bool {
        self.issue_count() == 0
    }

    /// Whether a `PriceSeries` built from these bars would be rejected.
    pub fn blocks_backtest(&self) -> bool {
        self.bar_count == 0
            || !self.duplicates.is_empty()
            || !self.out_of_order.is_empty()
            || !self.invalid_candles.is_empty()
    }

    /// Plain-text summary, one line per check.
    pub fn summary(&self) -> String {
        let mut lines = vec![format!(
            "{} bars @ {}, score {:.1}/100",
            self.bar_count, self.timeframe, self.score
        )];
        let missing: i64 = self.gaps.iter().map(|g| g.missing_bars).sum();
        lines.push(format!("gaps:            {} ({} missing bars)", self.gaps.len(), missing));
        lines.push(format!("duplicates:      {}", self.duplicates.len()));
        lines.push(format!("out of order:    {}", self.out_of_order.len()));
        lines.push(format!("invalid candles: {}", self.invalid_candles.len()));
        lines.push(format!("price spikes:    {}", self.price_spikes.len()));
        lines.push(format!("zero volume:     {}", self.zero_volume.len()));
        lines.join("\n")
    }
}

/// Audit raw bars against the expected interval.
pub fn audit(bars: &[Bar], timeframe: Timeframe) -> QualityReport {
    let expected = timeframe.duration();
    let mut report = QualityReport {
        timeframe,
        bar_count: bars.len(),
        gaps: Vec::new(),
        duplicates: Vec::new(),
        out_of_order: Vec::new(),
        invalid_candles: Vec::new(),
        price_spikes: Vec::new(),
        zero_volume: Vec::new(),
        score: 100.0,
    };

    let mut seen = HashSet::with_capacity(bars.len());
    for (index, bar) in bars.iter().enumerate() {
        let flag = |detail: String| FlaggedBar {
            index,
            timestamp: bar.timestamp,
            detail,
        };

        if !seen.insert(bar.timestamp) {
            report.duplicates.push(flag("timestamp seen earlier".into()));
        }

        if index > 0 {
            let previous = bars[index - 1].timestamp;
            let delta = bar.timestamp - previous;
            if delta < Duration::zero() {
                report
                    .out_of_order
                    .push(flag(format!("follows later bar at {previous}")));
            } else if delta > expected {
                report.gaps.push(TimestampGap {
                    index,
                    from: previous,
                    to: bar.timestamp,
                    missing_bars: delta.num_seconds() / expected.num_seconds() - 1,
                });
            }
        }

        if let Err(e) = bar.validate() {
            report.invalid_candles.push(flag(e.to_string()));
        } else {
            let range_pct = (bar.high - bar.low) / bar.open;
            if range_pct > SPIKE_THRESHOLD {
                report
                    .price_spikes
                    .push(flag(format!("range {:.1}% of open", range_pct * 100.0)));
            }
        }

        if timeframe != Timeframe::M1 && bar.volume == 0.0 {
            report.zero_volume.push(flag("zero volume".into()));
        }
    }

    report.score = score(&report);
    report
}

fn score(report: &QualityReport) -> f64 {
    if report.bar_count == 0 {
        return 0.0;
    }
    let n = report.bar_count as f64;
    let penalty = GAP_WEIGHT * report.gaps.len() as f64
        + DUPLICATE_WEIGHT * report.duplicates.len() as f64
        + OUT_OF_ORDER_WEIGHT * report.out_of_order.len() as f64
        + INVALID_WEIGHT * report.invalid_candles.len() as f64
        + SPIKE_WEIGHT * report.price_spikes.len() as f64
        + ZERO_VOLUME_WEIGHT * report.zero_volume.len() as f64;
    (100.0 - 100.0 * penalty / n).clamp(0.0, 100.0)
}
