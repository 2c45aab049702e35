//! Mean-reversion backtest engine.
//!
//! Couples the hedge-ratio filter, the spread signal, and the position
//! state machine into a causal bar-by-bar simulation with transaction
//! and borrow costs. One run is strictly sequential; independent runs
//! share no state and parallelize freely (see the optimizer).

pub mod config;
pub mod error;
pub mod result;
pub mod simulator;

pub use config::BacktestConfig;
pub use error::BacktestError;
pub use result::{BacktestResult, SummaryStats, TradeRecord};
pub use simulator::run_backtest;
