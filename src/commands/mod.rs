//! Subcommand handlers.

pub mod backtest;
pub mod optimize;
pub mod screen;
