//! Backtest configuration.

use rust_decimal::Decimal;
use rust_decimal_macros::dec;
use serde::{Deserialize, Serialize};

use crate::signal::SpreadMode;

/// Full parameter set for one backtest run.
///
/// Validation happens once, before any bar is processed; the simulator
/// refuses to start on an invalid configuration rather than producing a
/// run whose numbers cannot be trusted.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BacktestConfig {
    /// Kalman process noise q (relationship drift per bar)
    #[serde(default = "default_process_noise")]
    pub process_noise: f64,

    /// Kalman measurement noise r
    #[serde(default = "default_measurement_noise")]
    pub measurement_noise: f64,

    /// Estimate an intercept alongside the slope (2-state filter);
    /// false selects the slope-only variant
    #[serde(default = "default_estimate_intercept")]
    pub estimate_intercept: bool,

    /// Price transform applied before filtering and spread construction
    #[serde(default)]
    pub spread_mode: SpreadMode,

    /// Rolling window length W for the z-score (bars)
    #[serde(default = "default_window")]
    pub window: usize,

    /// Z-score magnitude that opens a position (must exceed exit_threshold)
    #[serde(default = "default_entry_threshold")]
    pub entry_threshold: f64,

    /// Z-score magnitude below which an open position closes
    #[serde(default = "default_exit_threshold")]
    pub exit_threshold: f64,

    /// Per-leg sizing as a fraction of current equity (0, 1]
    #[serde(default = "default_size_fraction")]
    pub size_fraction: f64,

    /// Transaction cost per leg, in basis points
    #[serde(default = "default_cost_bps")]
    pub cost_bps: f64,

    /// Annualized borrow rate charged on the short leg
    #[serde(default = "default_borrow_rate")]
    pub borrow_rate: f64,

    /// Initial capital (in USD); the simulation itself runs on a
    /// normalized equity curve starting at 1.0 and this scales the
    /// reported dollar PnL
    #[serde(default = "default_initial_capital")]
    pub initial_capital: Decimal,
}

// Default value functions for serde
fn default_process_noise() -> f64 {
    1e-3
}
fn default_measurement_noise() -> f64 {
    1e-3
}
fn default_estimate_intercept() -> bool {
    true
}
fn default_window() -> usize {
    60
}
fn default_entry_threshold() -> f64 {
    2.0
}
fn default_exit_threshold() -> f64 {
    0.5
}
fn default_size_fraction() -> f64 {
    0.4
}
fn default_cost_bps() -> f64 {
    10.0
}
fn default_borrow_rate() -> f64 {
    0.0025
}
fn default_initial_capital() -> Decimal {
    dec!(1_000_000)
}

impl Default for BacktestConfig {
    fn default() -> Self {
        Self {
            process_noise: default_process_noise(),
            measurement_noise: default_measurement_noise(),
            estimate_intercept: default_estimate_intercept(),
            spread_mode: SpreadMode::default(),
            window: default_window(),
            entry_threshold: default_entry_threshold(),
            exit_threshold: default_exit_threshold(),
            size_fraction: default_size_fraction(),
            cost_bps: default_cost_bps(),
            borrow_rate: default_borrow_rate(),
            initial_capital: default_initial_capital(),
        }
    }
}

impl BacktestConfig {
    /// Minimum aligned bar count below which a run returns the inert
    /// result: bar 0 seeds the series and the first z-score needs a full
    /// window of spreads.
    pub fn min_bars(&self) -> usize {
        self.window + 1
    }

    /// Validate configuration
    pub fn validate(&self) -> Result<(), String> {
        if !(self.process_noise > 0.0) {
            return Err(format!(
                "process_noise must be positive, got {}",
                self.process_noise
            ));
        }
        if !(self.measurement_noise > 0.0) {
            return Err(format!(
                "measurement_noise must be positive, got {}",
                self.measurement_noise
            ));
        }
        if self.window < 2 {
            return Err(format!("window must be at least 2, got {}", self.window));
        }
        if self.exit_threshold < 0.0 {
            return Err(format!(
                "exit_threshold cannot be negative, got {}",
                self.exit_threshold
            ));
        }
        if !(self.entry_threshold > self.exit_threshold) {
            return Err(format!(
                "entry_threshold ({}) must exceed exit_threshold ({})",
                self.entry_threshold, self.exit_threshold
            ));
        }
        if !(self.size_fraction > 0.0 && self.size_fraction <= 1.0) {
            return Err(format!(
                "size_fraction must be in (0, 1], got {}",
                self.size_fraction
            ));
        }
        if !(self.cost_bps >= 0.0) {
            return Err(format!("cost_bps cannot be negative, got {}", self.cost_bps));
        }
        if !(self.borrow_rate >= 0.0) {
            return Err(format!(
                "borrow_rate cannot be negative, got {}",
                self.borrow_rate
            ));
        }
        if self.initial_capital <= Decimal::ZERO {
            return Err("initial_capital must be positive".to_string());
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = BacktestConfig::default();
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_non_positive_noise_invalid() {
        let config = BacktestConfig {
            process_noise: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BacktestConfig {
            measurement_noise: -1e-3,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_thresholds_must_be_ordered() {
        let config = BacktestConfig {
            entry_threshold: 0.5,
            exit_threshold: 2.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        // Equal thresholds thrash; rejected too.
        let config = BacktestConfig {
            entry_threshold: 1.0,
            exit_threshold: 1.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_nan_threshold_invalid() {
        let config = BacktestConfig {
            entry_threshold: f64::NAN,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_size_fraction_bounds() {
        let config = BacktestConfig {
            size_fraction: 0.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = BacktestConfig {
            size_fraction: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }

    #[test]
    fn test_min_bars_covers_seed_plus_window() {
        let config = BacktestConfig {
            window: 60,
            ..Default::default()
        };
        assert_eq!(config.min_bars(), 61);
    }
}
