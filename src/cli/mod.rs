//! CLI configuration layer.

pub mod config;

pub use config::{BacktestCliConfig, DataSourceConfig, OptimizeCliConfig, ScreenCliConfig};
