//! Domain types for QuantCrypto

pub mod bar;
pub mod fill;
pub mod intent;
pub mod portfolio;
pub mod position;
pub mod series;
pub mod snapshot;
pub mod timeframe;
pub mod trade;

pub use bar::{Bar, BarError};
pub use fill::{Fill, FillSide};
pub use intent::{IntentSide, OrderIntent, OrderSize, OrderType};
pub use portfolio::{FillRejection, Portfolio, PortfolioPolicy};
pub use position::{Position, PositionSide, QTY_EPSILON};
pub use series::{HistoryView, PriceSeries};
pub use snapshot::{equity_values, EquitySnapshot};
pub use timeframe::{Timeframe, UnknownTimeframe};
pub use trade::{ExitReason, TradeRecord};

/// Daily UTC bars from a list of closes. Each bar opens at the previous
/// close and spans one unit beyond its body on both sides.
#[cfg(test)]
pub fn test_bars(closes: &[f64]) -> Vec<Bar> {
    use chrono::{Duration, TimeZone, Utc};

    let start = Utc.with_ymd_and_hms(2024, 1, 1, 0, 0, 0).unwrap();
    closes
        .iter()
        .enumerate()
        .map(|(i, &close)| {
            let open = if i == 0 { close } else { closes[i - 1] };
            Bar {
                timestamp: start + Duration::days(i as i64),
                open,
                high: open.max(close) + 1.0,
                low: (open.min(close) - 1.0).max(open.min(close) * 0.5),
                close,
                volume: 1_000.0,
            }
        })
        .collect()
}
