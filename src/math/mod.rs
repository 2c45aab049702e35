//! Mathematical primitives for trading strategies.
//!
//! This module provides the statistical machinery used by the backtest
//! engine, centered on Kalman filtering for dynamic hedge ratio
//! estimation.

pub mod kalman;

pub use kalman::{
    FilterError, HedgeEstimate, HedgeEstimator, KalmanHedgeFilter, ScalarKalmanFilter,
};
