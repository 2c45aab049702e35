//! Optimize command handler.
//!
//! Grid-searches filter and threshold parameters over one pair, prints
//! the ranked survivors, and writes them as JSON.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::cli::OptimizeCliConfig;
use crate::optimize::{optimize_pair, ParamGrid};

/// Run the grid search with the provided CLI configuration.
///
/// # Errors
/// Returns error if data loading or the search fails.
pub fn run(config: OptimizeCliConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("--- Optimizing Parameters ---");
    info!(source = %config.source.describe(), "Optimization configuration");

    let (x, y) = config.source.load_pair()?;
    info!(bars = x.len(), "Data loaded");

    let grid = ParamGrid::default();
    let results = optimize_pair(&x, &y, &config.backtest, &grid, &config.optimize)?;

    if results.is_empty() {
        warn!("No parameter combination passed the gates");
        return Ok(());
    }

    println!(
        "\n{:>6} | {:>7} | {:>6} | {:>8} | {:>8} | {:>6} | {:>8} | {:>6}",
        "Window", "Z-Entry", "Z-Exit", "q", "r", "Sharpe", "Return", "Trades"
    );
    println!("{}", "-".repeat(76));
    for trial in &results {
        println!(
            "{:>6} | {:>7.2} | {:>6.2} | {:>8.0e} | {:>8.0e} | {:>6.2} | {:>7.2}% | {:>6}",
            trial.window,
            trial.entry_threshold,
            trial.exit_threshold,
            trial.process_noise,
            trial.measurement_noise,
            trial.sharpe_ratio,
            trial.total_return * 100.0,
            trial.trades
        );
    }

    fs::create_dir_all(&config.output_dir)?;
    let output_path = Path::new(&config.output_dir).join("trials.json");
    fs::write(&output_path, serde_json::to_string_pretty(&results)?)?;
    info!(
        path = %output_path.display(),
        trials = results.len(),
        "Trials saved"
    );

    Ok(())
}
