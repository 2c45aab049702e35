//! Spread computation and rolling z-score standardization.

use std::collections::VecDeque;

use serde::{Deserialize, Serialize};
use tracing::debug;

/// How observations enter the spread.
///
/// One mode is fixed per run: the filter, the spread, and the simulator
/// all see the same transform. Mixing price-level and log-price
/// arithmetic within a run corrupts the hedge ratio's units.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SpreadMode {
    /// Raw price levels: `spread = y - beta * x`.
    #[default]
    Price,
    /// Natural-log prices: `spread = ln(y) - beta * ln(x)`.
    LogPrice,
}

impl SpreadMode {
    /// Apply the mode's transform to one raw price.
    #[inline]
    pub fn transform(self, price: f64) -> f64 {
        match self {
            SpreadMode::Price => price,
            SpreadMode::LogPrice => price.ln(),
        }
    }
}

/// One bar's derived signal values.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct SignalSample {
    /// Hedge ratio in effect for this bar.
    pub hedge_ratio: f64,
    /// Residual spread after removing the scaled relationship.
    pub spread: f64,
    /// Standardized spread; `None` during warm-up and for zero-variance
    /// windows.
    pub zscore: Option<f64>,
}

/// Rolling z-score over a trailing spread window.
///
/// The window covers exactly `window` bars ending at the current bar
/// inclusive, so the first defined z-score appears once `window` spreads
/// have accumulated. A constant window has zero standard deviation; the
/// z-score for such a bar is undefined rather than ±∞ or 0, and the
/// position logic treats it as insufficient signal.
#[derive(Debug, Clone)]
pub struct SpreadSignalEngine {
    window: usize,
    history: VecDeque<f64>,
}

impl SpreadSignalEngine {
    pub fn new(window: usize) -> Self {
        Self {
            window,
            history: VecDeque::with_capacity(window),
        }
    }

    /// Window length `W`.
    #[inline]
    pub fn window(&self) -> usize {
        self.window
    }

    /// Fold in one bar's already-transformed observation pair and the
    /// hedge ratio estimated for that bar.
    ///
    /// `x_obs` and `y_obs` must already carry the run's [`SpreadMode`]
    /// transform; the engine itself is linear.
    pub fn push(&mut self, x_obs: f64, y_obs: f64, hedge_ratio: f64) -> SignalSample {
        let spread = y_obs - hedge_ratio * x_obs;

        self.history.push_back(spread);
        if self.history.len() > self.window {
            self.history.pop_front();
        }

        let zscore = if self.history.len() < self.window {
            None
        } else {
            let n = self.history.len() as f64;
            let mean = self.history.iter().sum::<f64>() / n;
            let variance = self
                .history
                .iter()
                .map(|val| {
                    let diff = val - mean;
                    diff * diff
                })
                .sum::<f64>()
                / n;
            let std_dev = variance.sqrt();

            if std_dev == 0.0 {
                None
            } else {
                Some((spread - mean) / std_dev)
            }
        };

        debug!(spread, ?zscore, hedge_ratio, "signal sample");

        SignalSample {
            hedge_ratio,
            spread,
            zscore,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn warm_up_bars_have_no_zscore() {
        let mut engine = SpreadSignalEngine::new(3);
        assert!(engine.push(100.0, 201.0, 2.0).zscore.is_none());
        assert!(engine.push(100.0, 203.0, 2.0).zscore.is_none());
        assert!(engine.push(100.0, 205.0, 2.0).zscore.is_some());
    }

    #[test]
    fn constant_spread_window_is_undefined() {
        let mut engine = SpreadSignalEngine::new(3);
        for _ in 0..10 {
            let sample = engine.push(100.0, 200.0, 2.0);
            assert_eq!(sample.spread, 0.0);
            assert!(sample.zscore.is_none(), "zero-variance window must not standardize");
        }
    }

    #[test]
    fn zscore_matches_hand_computation() {
        // Spreads 1, 2, 3 in a window of 3: mean 2, population std sqrt(2/3).
        let mut engine = SpreadSignalEngine::new(3);
        engine.push(0.0, 1.0, 1.0);
        engine.push(0.0, 2.0, 1.0);
        let sample = engine.push(0.0, 3.0, 1.0);

        let expected = (3.0 - 2.0) / (2.0f64 / 3.0).sqrt();
        let z = sample.zscore.unwrap();
        assert!((z - expected).abs() < 1e-12, "expected {}, got {}", expected, z);
    }

    #[test]
    fn window_slides_over_old_spreads() {
        let mut engine = SpreadSignalEngine::new(2);
        engine.push(0.0, 10.0, 1.0);
        engine.push(0.0, 10.0, 1.0);
        engine.push(0.0, 10.0, 1.0);
        // Window is now [10, 12]: the early constant bars must be gone.
        let sample = engine.push(0.0, 12.0, 1.0);
        let z = sample.zscore.unwrap();
        assert!(z > 0.0);
        assert!((z - 1.0).abs() < 1e-12, "two-point window z is ±1, got {}", z);
    }

    #[test]
    fn log_mode_transform() {
        assert_eq!(SpreadMode::Price.transform(100.0), 100.0);
        assert!((SpreadMode::LogPrice.transform(100.0) - 100.0f64.ln()).abs() < 1e-15);
    }
}
