use super::Strategy;
use crate::domain::{HistoryView, OrderIntent, Position};

/// Never trades. Equity stays at initial cash; useful as a baseline.
#[derive(Debug, Clone, Copy, Default)]
pub struct FlatStrategy;

impl Strategy for FlatStrategy {
    fn name(&self) -> &str {
        "flat"
    }

    fn on_bar(&mut self, _history: HistoryView<'_>, _position: &Position) -> Vec<OrderIntent> {
        Vec::new()
    }
}
