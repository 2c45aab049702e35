//! Kalman-filter statistical arbitrage toolkit.
//!
//! The core pipeline estimates a time-varying hedge ratio between two
//! co-moving price series with a recursive Bayesian filter, turns the
//! filtered spread into a rolling z-score signal, and simulates a
//! mean-reversion strategy with transaction and borrow costs.
//!
//! Supporting modules cover the rest of a research workflow: screening a
//! universe for cointegrated pairs, grid-searching filter and threshold
//! parameters, and loading aligned price data from CSV.

pub mod backtest;
pub mod cli;
pub mod commands;
pub mod data;
pub mod math;
pub mod optimize;
pub mod screening;
pub mod signal;
