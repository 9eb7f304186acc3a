//! Protective exits layered over any strategy: stop-loss, take-profit and a
//! trailing stop.
//!
//! Levels are fractions of the position's average entry price (stop and
//! target) or of the best close since entry (trailing). A level is breached
//! when the visible close crosses it; the wrapper then emits a tagged
//! `OrderIntent::close()` that fills at the next open like any market exit.
//!
//! On a breach bar the inner strategy still sees the bar, but its intents are
//! dropped. Stop-loss wins over trailing, trailing over take-profit.

use serde::{Deserialize, Serialize};

use super::Strategy;
use crate::domain::{ExitReason, HistoryView, OrderIntent, Position, PositionSide};

/// Exit levels, each optional. All `None` makes the wrapper a pass-through.
#[derive(Debug, Clone, Copy, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ExitRules {
    /// Exit when the close moves this fraction against the entry price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub stop_loss: Option<f64>,
    /// Exit when the close moves this fraction in favor of the entry price.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub take_profit: Option<f64>,
    /// Exit when the close gives back this fraction from the best close since entry.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub trailing_stop: Option<f64>,
}

impl ExitRules {
    pub fn is_empty(&self) -> bool {
        self.stop_loss.is_none() && self.take_profit.is_none() && self.trailing_stop.is_none()
    }

    pub fn validate(&self) -> Result<(), String> {
        for (name, value) in [("stop_loss", self.stop_loss), ("trailing_stop", self.trailing_stop)] {
            if let Some(v) = value {
                if !(v > 0.0 && v < 1.0) {
                    return Err(format!("{name} must be in (0, 1), got {v}"));
                }
            }
        }
        if let Some(v) = self.take_profit {
            if !(v > 0.0 && v.is_finite()) {
                return Err(format!("take_profit must be positive, got {v}"));
            }
        }
        Ok(())
    }

    /// Compact label such as `sl5%/tp10%/trail3%`.
    pub fn label(&self) -> String {
        let parts: Vec<String> = [
            ("sl", self.stop_loss),
            ("tp", self.take_profit),
            ("trail", self.trailing_stop),
        ]
        .into_iter()
        .filter_map(|(tag, v)| v.map(|v| format!("{tag}{}%", (v * 10_000.0).round() / 100.0)))
        .collect();
        parts.join("/")
    }
}

/// Wraps `inner` and closes its positions when an exit level is breached.
#[derive(Debug, Clone)]
pub struct ProtectiveExit<S> {
    inner: S,
    rules: ExitRules,
    name: String,
    /// Entry bar and side of the position being tracked.
    tracked: Option<(usize, PositionSide)>,
    /// Highest close since entry for longs, lowest for shorts.
    best_close: f64,
}

impl<S: Strategy> ProtectiveExit<S> {
    pub fn new(inner: S, rules: ExitRules) -> Self {
        if let Err(reason) = rules.validate() {
            panic!("invalid exit rules: {reason}");
        }
        let name = format!("{}+exits", inner.name());
        Self {
            inner,
            rules,
            name,
            tracked: None,
            best_close: 0.0,
        }
    }

    pub fn rules(&self) -> &ExitRules {
        &self.rules
    }

    fn track(&mut self, position: &Position, close: f64) -> Option<PositionSide> {
        let side = position.side();
        let entry_bar = position.entry_bar()?;
        if side == PositionSide::Flat {
            return None;
        }
        if self.tracked != Some((entry_bar, side)) {
            self.tracked = Some((entry_bar, side));
            self.best_close = position.average_entry_price;
        }
        self.best_close = match side {
            PositionSide::Long => self.best_close.max(close),
            _ => self.best_close.min(close),
        };
        Some(side)
    }

    fn breached(&self, side: PositionSide, entry: f64, close: f64) -> Option<ExitReason> {
        // +1 for longs: adverse moves are downward
        let dir = if side == PositionSide::Long { 1.0 } else { -1.0 };
        let against = |level: f64| dir * (close - level) <= 0.0;

        if let Some(sl) = self.rules.stop_loss {
            if against(entry * (1.0 - dir * sl)) {
                return Some(ExitReason::StopLoss);
            }
        }
        if let Some(trail) = self.rules.trailing_stop {
            if against(self.best_close * (1.0 - dir * trail)) {
                return Some(ExitReason::TrailingStop);
            }
        }
        if let Some(tp) = self.rules.take_profit {
            if dir * (close - entry * (1.0 + dir * tp)) >= 0.0 {
                return Some(ExitReason::TakeProfit);
            }
        }
        None
    }
}

impl<S: Strategy> Strategy for ProtectiveExit<S> {
    fn name(&self) -> &str {
        &self.name
    }

    fn on_bar(&mut self, history: HistoryView<'_>, position: &Position) -> Vec<OrderIntent> {
        let intents = self.inner.on_bar(history, position);
        let close = history.current().close;

        let Some(side) = self.track(position, close) else {
            self.tracked = None;
            return intents;
        };
        match self.breached(side, position.average_entry_price, close) {
            Some(reason) => vec![OrderIntent::close().with_exit_reason(reason)],
            None => intents,
        }
    }
}
