//! Error types for the backtest engine.

use thiserror::Error;

use crate::math::FilterError;

/// Errors that terminate a backtest run.
///
/// Undersized input is deliberately NOT an error: the simulator returns
/// an inert zero-activity result instead so batch evaluation over many
/// candidate pairs degrades gracefully.
#[derive(Error, Debug)]
pub enum BacktestError {
    /// Configuration rejected before any bar is processed
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// Input series are not aligned
    #[error("Price series length mismatch: x has {x_len} bars, y has {y_len}")]
    LengthMismatch { x_len: usize, y_len: usize },

    /// A price the arithmetic cannot digest (non-finite, or non-positive
    /// where log returns are taken)
    #[error("Invalid price at bar {bar}: x = {x}, y = {y}")]
    InvalidPrice { bar: usize, x: f64, y: f64 },

    /// Filter recursion failed; fatal to the run, no retry
    #[error("Numerical instability at bar {bar}: {source}")]
    Numerics { bar: usize, source: FilterError },
}
