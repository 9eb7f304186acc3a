//! Bar loading for the runner.
//!
//! Two sources:
//! 1. CSV files. Either a header row naming `timestamp` (or `datetime`,
//!    `open_time`, `date`) plus `open, high, low, close, volume`, or a
//!    headerless Binance kline dump whose first six columns are
//!    `open_time, open, high, low, close, volume`.
//! 2. A seeded random walk, for offline runs and tests.
//!
//! Raw rows are returned as-is for the quality audit. Series built for a
//! backtest are optionally cleaned first (sorted, duplicate timestamps dropped).

use chrono::{DateTime, NaiveDate, NaiveDateTime, TimeZone, Utc};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use std::io::Read;
use std::path::{Path, PathBuf};
use thiserror::Error;
use tracing::{info, warn};

use quantcrypto_core::domain::{Bar, PriceSeries, Timeframe};
use quantcrypto_core::DataError;

use crate::config::{DataConfig, SyntheticConfig};

/// Timestamp columns accepted in a header row, in lookup order.
const TIMESTAMP_COLUMNS: [&str; 4] = ["timestamp", "datetime", "open_time", "date"];
const PRICE_COLUMNS: [&str; 5] = ["open", "high", "low", "close", "volume"];

/// Binance dumps occasionally carry corrupt open times; anything at or past
/// year 3000 (in ms) is dropped.
const MAX_OPEN_TIME_MS: i64 = 32_503_680_000_000;

#[derive(Debug, Error)]
pub enum LoadError {
    #[error("failed to open {path}: {source}")]
    Io {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("csv error: {0}")]
    Csv(#[from] csv::Error),

    #[error("no data rows found")]
    NoRows,

    #[error("header has no '{0}' column")]
    MissingColumn(String),

    #[error("line {line}: unparseable timestamp '{value}'")]
    BadTimestamp { line: u64, value: String },

    #[error("line {line}: column '{column}' is not a number: '{value}'")]
    BadNumber {
        line: u64,
        column: &'static str,
        value: String,
    },

    #[error(transparent)]
    Data(#[from] DataError),
}

/// Column positions of one CSV layout.
#[derive(Debug, Clone, Copy)]
struct Layout {
    timestamp: usize,
    prices: [usize; 5],
}

impl Layout {
    const BINANCE: Layout = Layout {
        timestamp: 0,
        prices: [1, 2, 3, 4, 5],
    };

    fn from_header(header: &csv::StringRecord) -> Result<Self, LoadError> {
        let names: Vec<String> = header.iter().map(|h| h.trim().to_ascii_lowercase()).collect();
        let find = |name: &str| names.iter().position(|n| n == name);

        let timestamp = TIMESTAMP_COLUMNS
            .iter()
            .find_map(|c| find(c))
            .ok_or_else(|| LoadError::MissingColumn("timestamp".to_string()))?;
        let mut prices = [0; 5];
        for (slot, name) in prices.iter_mut().zip(PRICE_COLUMNS) {
            *slot = find(name).ok_or_else(|| LoadError::MissingColumn(name.to_string()))?;
        }
        Ok(Self { timestamp, prices })
    }
}

/// Parse one timestamp field.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS`, `YYYY-MM-DDTHH:MM:SS`,
/// `YYYY-MM-DD`, and integer epochs. Integers are read as seconds,
/// milliseconds or microseconds by magnitude.
pub fn parse_timestamp(raw: &str) -> Option<DateTime<Utc>> {
    let raw = raw.trim();
    if let Ok(epoch) = raw.parse::<i64>() {
        return parse_epoch(epoch);
    }
    if let Ok(dt) = DateTime::parse_from_rfc3339(raw) {
        return Some(dt.with_timezone(&Utc));
    }
    for format in ["%Y-%m-%d %H:%M:%S", "%Y-%m-%dT%H:%M:%S", "%Y-%m-%d %H:%M"] {
        if let Ok(naive) = NaiveDateTime::parse_from_str(raw, format) {
            return Some(Utc.from_utc_datetime(&naive));
        }
    }
    NaiveDate::parse_from_str(raw, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|naive| Utc.from_utc_datetime(&naive))
}

fn parse_epoch(epoch: i64) -> Option<DateTime<Utc>> {
    match epoch.unsigned_abs() {
        n if n >= 100_000_000_000_000 => Utc.timestamp_micros(epoch).single(),
        n if n >= 100_000_000_000 => Utc.timestamp_millis_opt(epoch).single(),
        _ => Utc.timestamp_opt(epoch, 0).single(),
    }
}

fn is_plausible_open_time(epoch: i64) -> bool {
    // µs dumps are scaled down before the range check
    let ms = if epoch >= 100_000_000_000_000 {
        epoch / 1_000
    } else {
        epoch
    };
    ms > 0 && ms < MAX_OPEN_TIME_MS
}

/// Read raw bars from any CSV source. Rows are returned in file order,
/// unvalidated.
pub fn read_bars<R: Read>(reader: R) -> Result<Vec<Bar>, LoadError> {
    let mut csv_reader = csv::ReaderBuilder::new()
        .has_headers(false)
        .flexible(true)
        .trim(csv::Trim::All)
        .from_reader(reader);

    let mut records = csv_reader.records();
    let first = records.next().ok_or(LoadError::NoRows)??;

    let headerless = first
        .get(0)
        .map(|f| f.trim().parse::<i64>().is_ok())
        .unwrap_or(false);

    let (layout, mut bars) = if headerless {
        (Layout::BINANCE, Vec::new())
    } else {
        (Layout::from_header(&first)?, Vec::new())
    };

    let mut dropped = 0usize;
    let rows = std::iter::once(Ok(first))
        .filter(|_| headerless)
        .chain(records);

    for record in rows {
        let record = record?;
        let line = record.position().map(|p| p.line()).unwrap_or(0);
        if record.iter().all(|f| f.is_empty()) {
            continue;
        }

        let raw_ts = record.get(layout.timestamp).unwrap_or_default();
        if headerless {
            if let Ok(epoch) = raw_ts.parse::<i64>() {
                if !is_plausible_open_time(epoch) {
                    dropped += 1;
                    continue;
                }
            }
        }
        let timestamp = parse_timestamp(raw_ts).ok_or_else(|| LoadError::BadTimestamp {
            line,
            value: raw_ts.to_string(),
        })?;

        let mut values = [0.0; 5];
        for ((value, &column), name) in values.iter_mut().zip(&layout.prices).zip(PRICE_COLUMNS) {
            let raw = record.get(column).unwrap_or_default();
            *value = raw.parse::<f64>().map_err(|_| LoadError::BadNumber {
                line,
                column: name,
                value: raw.to_string(),
            })?;
        }
        let [open, high, low, close, volume] = values;
        bars.push(Bar {
            timestamp,
            open,
            high,
            low,
            close,
            volume,
        });
    }

    if dropped > 0 {
        warn!(dropped, "dropped rows with implausible open_time");
    }
    if bars.is_empty() {
        return Err(LoadError::NoRows);
    }
    Ok(bars)
}

/// Read raw bars from a CSV file.
pub fn read_csv_file(path: impl AsRef<Path>) -> Result<Vec<Bar>, LoadError> {
    let path = path.as_ref();
    let file = std::fs::File::open(path).map_err(|source| LoadError::Io {
        path: path.to_path_buf(),
        source,
    })?;
    read_bars(file)
}

/// Outcome of [`clean_bars`].
#[derive(Debug, Clone, PartialEq)]
pub struct CleanedBars {
    pub bars: Vec<Bar>,
    pub duplicates_removed: usize,
    /// Whether the input needed reordering.
    pub resorted: bool,
}

/// Sort by timestamp (stable) and keep the first bar of each timestamp.
pub fn clean_bars(mut bars: Vec<Bar>) -> CleanedBars {
    let resorted = bars.windows(2).any(|w| w[1].timestamp < w[0].timestamp);
    if resorted {
        bars.sort_by_key(|b| b.timestamp);
    }
    let before = bars.len();
    bars.dedup_by_key(|b| b.timestamp);
    CleanedBars {
        duplicates_removed: before - bars.len(),
        bars,
        resorted,
    }
}

/// Load a CSV file into a validated series.
pub fn load_csv(
    path: impl AsRef<Path>,
    symbol: &str,
    clean: bool,
) -> Result<PriceSeries, LoadError> {
    let path = path.as_ref();
    let mut bars = read_csv_file(path)?;
    if clean {
        let cleaned = clean_bars(bars);
        if cleaned.duplicates_removed > 0 || cleaned.resorted {
            warn!(
                path = %path.display(),
                duplicates = cleaned.duplicates_removed,
                resorted = cleaned.resorted,
                "cleaned input rows"
            );
        }
        bars = cleaned.bars;
    }
    let series = PriceSeries::new(symbol, bars)?;
    info!(path = %path.display(), symbol, bars = series.length(), "loaded csv");
    Ok(series)
}

/// Deterministic random-walk series. The same symbol, timeframe and config
/// always produce the same bars.
pub fn generate_synthetic(
    symbol: &str,
    timeframe: Timeframe,
    config: &SyntheticConfig,
) -> Result<PriceSeries, LoadError> {
    let mut hasher = blake3::Hasher::new();
    hasher.update(symbol.as_bytes());
    hasher.update(&config.seed.to_le_bytes());
    let mut rng = StdRng::from_seed(*hasher.finalize().as_bytes());

    let vol = config.volatility;
    let step = timeframe.duration();
    let mut price = config.start_price;
    let mut bars = Vec::with_capacity(config.bars);

    for i in 0..config.bars {
        let ret: f64 = rng.gen_range(-vol..vol);
        let open = price;
        let close = (price * (1.0 + ret)).max(f64::MIN_POSITIVE);
        let high = open.max(close) * (1.0 + rng.gen_range(0.0..vol / 2.0));
        let low = open.min(close) * (1.0 - rng.gen_range(0.0..vol / 2.0));
        bars.push(Bar {
            timestamp: config.start + step * i as i32,
            open,
            high,
            low,
            close,
            volume: rng.gen_range(10.0..1_000.0),
        });
        price = close;
    }

    let series = PriceSeries::new(symbol, bars)?;
    info!(
        symbol,
        timeframe = %timeframe,
        bars = series.length(),
        seed = config.seed,
        "generated synthetic series"
    );
    Ok(series)
}

/// Resolve a [`DataConfig`] into a series: the CSV when a path is set,
/// otherwise synthetic bars.
pub fn load_series(config: &DataConfig) -> Result<PriceSeries, LoadError> {
    match &config.path {
        Some(path) => load_csv(path, &config.symbol, config.clean),
        None => generate_synthetic(&config.symbol, config.timeframe, &config.synthetic),
    }
}
