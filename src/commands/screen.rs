//! Screen command handler.
//!
//! Loads a symbol universe from CSV, screens every pair, prints a ranked
//! table, and writes the candidate list as JSON.

use std::fs;
use std::path::Path;

use tracing::{info, warn};

use crate::cli::ScreenCliConfig;
use crate::data;
use crate::screening::{screen_pairs, ScreenError};

/// Run the screening pipeline with the provided CLI configuration.
///
/// # Errors
/// Returns error if the universe cannot be loaded or nothing passes the
/// screens.
pub fn run(config: ScreenCliConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("--- Screening Pair Universe ---");

    let universe = data::load_universe(&config.universe_csv)?;
    info!(symbols = universe.len(), "Universe loaded");

    let candidates = match screen_pairs(&universe, &config.screen) {
        Ok(candidates) => candidates,
        Err(err @ ScreenError::NoViablePairs { .. }) => {
            warn!("{err}");
            return Ok(());
        }
        Err(err) => return Err(err.into()),
    };

    println!(
        "\n{:<16} | {:>6} | {:>7} | {:>9} | {:>7}",
        "Pair", "Corr", "Hedge", "Half-life", "ADF"
    );
    println!("{}", "-".repeat(58));
    for candidate in &candidates {
        println!(
            "{:<16} | {:>6.3} | {:>7.3} | {:>9.1} | {:>7.2}",
            format!("{}/{}", candidate.symbol_x, candidate.symbol_y),
            candidate.correlation,
            candidate.hedge_ratio,
            candidate.half_life_bars,
            candidate.adf_statistic
        );
    }

    fs::create_dir_all(&config.output_dir)?;
    let output_path = Path::new(&config.output_dir).join("candidates.json");
    fs::write(&output_path, serde_json::to_string_pretty(&candidates)?)?;
    info!(
        path = %output_path.display(),
        pairs = candidates.len(),
        "Candidates saved"
    );

    Ok(())
}
