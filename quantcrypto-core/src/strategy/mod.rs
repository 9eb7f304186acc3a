//! Strategy capability interface and the reference strategies.
//!
//! A strategy sees only a [`HistoryView`] ending at the current bar and a
//! read-only borrow of the open position. Whatever it returns is queued and
//! executed against the next bar. [`ProtectiveExit`] layers stop-loss,
//! take-profit and trailing exits over any of them.
//!
//! # Invariants
//! - `on_bar()` MUST be deterministic for the same bar sequence and positions
//! - The engine never names a concrete strategy; it drives `dyn Strategy`

pub mod buy_and_hold;
pub mod ema_crossover;
pub mod flat;
pub mod limit_dip;
pub mod protective_exit;

pub use buy_and_hold::BuyAndHold;
pub use ema_crossover::EmaCrossover;
pub use flat::FlatStrategy;
pub use limit_dip::LimitDip;
pub use protective_exit::{ExitRules, ProtectiveExit};

use crate::domain::{HistoryView, OrderIntent, Position};

pub trait Strategy: Send {
    /// Strategy name for logs and reports.
    fn name(&self) -> &str;

    /// Decide on the close of `history.current()`.
    ///
    /// Returned intents become eligible for execution at the next bar's open.
    fn on_bar(&mut self, history: HistoryView<'_>, position: &Position) -> Vec<OrderIntent>;
}

impl<S: Strategy + ?Sized> Strategy for Box<S> {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn on_bar(&mut self, history: HistoryView<'_>, position: &Position) -> Vec<OrderIntent> {
        (**self).on_bar(history, position)
    }
}
