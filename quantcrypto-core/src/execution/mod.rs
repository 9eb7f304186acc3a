//! Execution: converts queued intents into fills against the next bar.

pub mod cost_model;
pub mod simulator;

pub use cost_model::CostModel;
pub use simulator::{
    ExecutionOutcome, ExecutionSimulator, PendingIntent, SkipReason, SkippedFill,
};
