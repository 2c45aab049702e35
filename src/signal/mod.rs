//! Signal generation: spread construction, rolling z-score, and the
//! position state machine.
//!
//! The [`SpreadSignalEngine`] turns the filtered hedge ratio and the raw
//! price pair into a standardized mean-reversion signal; [`Position`]
//! turns that signal into a discrete position, one value per bar.

pub mod position;
pub mod spread;

pub use position::Position;
pub use spread::{SignalSample, SpreadMode, SpreadSignalEngine};
