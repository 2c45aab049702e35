//! CLI configuration structs bridging CLI arguments to domain types.
//!
//! These structs decouple the CLI parsing layer from the business logic,
//! allowing command handlers to work with validated, typed configurations.

use std::path::PathBuf;

use crate::backtest::BacktestConfig;
use crate::data::{self, DataError};
use crate::optimize::OptimizeConfig;
use crate::screening::ScreenConfig;

/// Where the price pair comes from: a CSV file, or the deterministic
/// synthetic generator when no file is given.
#[derive(Debug, Clone)]
pub struct DataSourceConfig {
    /// CSV path; `None` selects synthetic data
    pub csv: Option<PathBuf>,
    /// Column name for the X leg
    pub column_x: String,
    /// Column name for the Y leg
    pub column_y: String,
    /// Synthetic series length
    pub synthetic_bars: usize,
    /// Synthetic true hedge ratio
    pub synthetic_beta: f64,
    /// Synthetic generator seed
    pub seed: u64,
}

impl DataSourceConfig {
    /// Resolve the configured source into aligned price series.
    pub fn load_pair(&self) -> Result<(Vec<f64>, Vec<f64>), DataError> {
        match &self.csv {
            Some(path) => data::load_pair(path, &self.column_x, &self.column_y),
            None => Ok(data::synthetic_pair(
                self.synthetic_bars,
                self.synthetic_beta,
                self.seed,
            )),
        }
    }

    /// Human-readable source label for logs and output files.
    pub fn describe(&self) -> String {
        match &self.csv {
            Some(path) => format!("{} ({}/{})", path.display(), self.column_x, self.column_y),
            None => format!(
                "synthetic (bars={}, beta={}, seed={})",
                self.synthetic_bars, self.synthetic_beta, self.seed
            ),
        }
    }
}

/// CLI configuration for the `backtest` subcommand.
#[derive(Debug, Clone)]
pub struct BacktestCliConfig {
    /// Price source
    pub source: DataSourceConfig,
    /// Simulator parameters
    pub backtest: BacktestConfig,
    /// Output directory for results
    pub output_dir: String,
}

/// CLI configuration for the `screen` subcommand.
#[derive(Debug, Clone)]
pub struct ScreenCliConfig {
    /// CSV holding one price column per symbol
    pub universe_csv: PathBuf,
    /// Screening thresholds
    pub screen: ScreenConfig,
    /// Output directory for results
    pub output_dir: String,
}

/// CLI configuration for the `optimize` subcommand.
#[derive(Debug, Clone)]
pub struct OptimizeCliConfig {
    /// Price source
    pub source: DataSourceConfig,
    /// Base simulator parameters the grid perturbs
    pub backtest: BacktestConfig,
    /// Search gates and output shaping
    pub optimize: OptimizeConfig,
    /// Output directory for results
    pub output_dir: String,
}
