//! Discrete position state machine.

use serde::{Deserialize, Serialize};

/// Position held against the spread for one bar.
///
/// `LongSpread` is long X and short `beta * Y`; `ShortSpread` is the
/// mirror. The sequence is driven bar-by-bar through [`Position::transition`],
/// which never flips between the two spread sides in a single step: a
/// reversal must pass through `Flat`, and the flat bar does not permit
/// re-entry in the same evaluation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Position {
    #[default]
    Flat,
    LongSpread,
    ShortSpread,
}

impl Position {
    /// Evaluate one bar's transition from the current state.
    ///
    /// All comparisons are strict, so a z-score exactly on a threshold
    /// takes the no-transition branch and the backtest stays
    /// reproducible. An undefined z-score (warm-up or zero-variance
    /// window) holds the current state: no entries, but an open position
    /// is not force-closed by a missing signal.
    pub fn transition(self, zscore: Option<f64>, entry_threshold: f64, exit_threshold: f64) -> Self {
        let Some(z) = zscore else {
            return self;
        };

        match self {
            Position::Flat => {
                if z > entry_threshold {
                    Position::ShortSpread
                } else if z < -entry_threshold {
                    Position::LongSpread
                } else {
                    Position::Flat
                }
            }
            Position::LongSpread | Position::ShortSpread => {
                if z.abs() < exit_threshold {
                    Position::Flat
                } else {
                    self
                }
            }
        }
    }

    /// True for either spread side.
    #[inline]
    pub fn is_open(self) -> bool {
        self != Position::Flat
    }
}

impl std::fmt::Display for Position {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Position::Flat => write!(f, "flat"),
            Position::LongSpread => write!(f, "long_spread"),
            Position::ShortSpread => write!(f, "short_spread"),
        }
    }
}
