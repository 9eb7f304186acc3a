//! Run fingerprinting: content hashes that prove two runs saw identical inputs.
//!
//! - `ContentHash`: BLAKE3 hex digest.
//! - `hash_series`: over every bar's timestamp and OHLCV bit pattern.
//! - `RunFingerprint`: series hash + engine config hash + strategy name.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::fmt;

use crate::domain::PriceSeries;

/// BLAKE3 digest, hex-encoded.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub struct ContentHash(pub String);

impl ContentHash {
    pub fn from_bytes(bytes: &[u8]) -> Self {
        Self(blake3::hash(bytes).to_hex().to_string())
    }

    /// First 12 hex chars, for log lines and report headers.
    pub fn short(&self) -> &str {
        &self.0[..self.0.len().min(12)]
    }
}

impl fmt::Display for ContentHash {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// Hash the series content. The symbol label is included; float fields are
/// hashed by bit pattern so `-0.0` and `0.0` differ.
pub fn hash_series(series: &PriceSeries) -> ContentHash {
    let mut hasher = blake3::Hasher::new();
    hasher.update(series.symbol().as_bytes());
    for bar in series.bars() {
        hasher.update(&bar.timestamp.timestamp_millis().to_le_bytes());
        for v in [bar.open, bar.high, bar.low, bar.close, bar.volume] {
            hasher.update(&v.to_bits().to_le_bytes());
        }
    }
    ContentHash(hasher.finalize().to_hex().to_string())
}

/// Complete identity of a single run.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunFingerprint {
    // ── Inputs ──
    pub symbol: String,
    pub strategy: String,
    pub bar_count: usize,
    pub start: DateTime<Utc>,
    pub end: DateTime<Utc>,

    // ── Derived hashes ──
    pub series_hash: ContentHash,
    pub config_hash: ContentHash,
}

impl RunFingerprint {
    /// Combined identity: equal iff series, config and strategy name match.
    pub fn run_hash(&self) -> ContentHash {
        let canonical = serde_json::json!({
            "config_hash": &self.config_hash.0,
            "series_hash": &self.series_hash.0,
            "strategy": &self.strategy,
        });
        ContentHash::from_bytes(canonical.to_string().as_bytes())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::test_bars;

    #[test]
    fn series_hash_is_deterministic() {
        let a = PriceSeries::new("BTCUSDT", test_bars(&[1.0, 2.0, 3.0])).unwrap();
        let b = PriceSeries::new("BTCUSDT", test_bars(&[1.0, 2.0, 3.0])).unwrap();
        assert_eq!(hash_series(&a), hash_series(&b));
        assert_eq!(hash_series(&a).0.len(), 64);
    }

    #[test]
    fn series_hash_changes_with_content() {
        let a = PriceSeries::new("BTCUSDT", test_bars(&[1.0, 2.0, 3.0])).unwrap();
        let b = PriceSeries::new("BTCUSDT", test_bars(&[1.0, 2.0, 3.5])).unwrap();
        let c = PriceSeries::new("ETHUSDT", test_bars(&[1.0, 2.0, 3.0])).unwrap();
        assert_ne!(hash_series(&a), hash_series(&b));
        assert_ne!(hash_series(&a), hash_series(&c));
    }

    #[test]
    fn short_hash_prefix() {
        let h = ContentHash::from_bytes(b"abc");
        assert_eq!(h.short().len(), 12);
        assert!(h.0.starts_with(h.short()));
    }

    #[test]
    fn run_hash_depends_on_strategy() {
        let series = PriceSeries::new("BTCUSDT", test_bars(&[1.0, 2.0])).unwrap();
        let fp = RunFingerprint {
            symbol: "BTCUSDT".into(),
            strategy: "flat".into(),
            bar_count: 2,
            start: series.first().timestamp,
            end: series.last().timestamp,
            series_hash: hash_series(&series),
            config_hash: ContentHash::from_bytes(b"{}"),
        };
        let other = RunFingerprint {
            strategy: "buy_and_hold".into(),
            ..fp.clone()
        };
        assert_ne!(fp.run_hash(), other.run_hash());
        assert_eq!(fp.run_hash(), fp.clone().run_hash());
    }
}
