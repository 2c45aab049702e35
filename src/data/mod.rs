//! Price data loading and synthetic pair generation.
//!
//! The core simulator wants two gap-free aligned `Vec<f64>` series; this
//! module produces them, either from CSV files (one column per symbol,
//! interior nulls forward-filled) or from a deterministic synthetic
//! generator for CI runs where no data files exist.

use std::collections::HashMap;
use std::fs::File;
use std::path::Path;

use polars::prelude::*;
use thiserror::Error;
use tracing::{debug, info};

/// Errors from data loading.
#[derive(Error, Debug)]
pub enum DataError {
    /// File missing or unreadable
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// CSV parsing or column extraction failed
    #[error("CSV error: {0}")]
    Csv(#[from] PolarsError),

    /// A requested column is absent
    #[error("Column '{0}' not found in CSV")]
    MissingColumn(String),

    /// A column starts with null (nothing to forward-fill from) or is
    /// non-numeric
    #[error("Column '{0}' has no usable leading value")]
    UnusableColumn(String),
}

/// Load one named price column from a CSV file.
///
/// Interior nulls are forward-filled from the previous bar, matching the
/// gap-free contract the simulator expects. A leading null cannot be
/// filled and is an error.
pub fn load_series(path: &Path, column: &str) -> Result<Vec<f64>, DataError> {
    info!(path = %path.display(), column, "Loading CSV data");
    let file = File::open(path)?;
    let df = CsvReader::new(file).finish()?;
    extract_column(&df, column)
}

/// Load two aligned price columns from one CSV file.
pub fn load_pair(path: &Path, col_x: &str, col_y: &str) -> Result<(Vec<f64>, Vec<f64>), DataError> {
    info!(path = %path.display(), x = col_x, y = col_y, "Loading CSV pair");
    let file = File::open(path)?;
    let df = CsvReader::new(file).finish()?;
    let x = extract_column(&df, col_x)?;
    let y = extract_column(&df, col_y)?;
    Ok((x, y))
}

/// Load every numeric column of a CSV as a symbol universe, keyed by
/// column name. Non-numeric columns (e.g. a date index) are skipped.
pub fn load_universe(path: &Path) -> Result<HashMap<String, Vec<f64>>, DataError> {
    info!(path = %path.display(), "Loading CSV universe");
    let file = File::open(path)?;
    let df = CsvReader::new(file).finish()?;

    let mut universe = HashMap::new();
    for series in df.get_columns() {
        let name = series.name().to_string();
        if !series.dtype().is_numeric() {
            debug!(column = %name, "skipping non-numeric column");
            continue;
        }
        universe.insert(name.clone(), extract_column(&df, &name)?);
    }
    Ok(universe)
}

fn extract_column(df: &DataFrame, column: &str) -> Result<Vec<f64>, DataError> {
    let series = df
        .column(column)
        .map_err(|_| DataError::MissingColumn(column.to_string()))?;
    let floats = series
        .cast(&DataType::Float64)
        .map_err(|_| DataError::UnusableColumn(column.to_string()))?;
    let ca = floats.f64()?;

    let mut values = Vec::with_capacity(ca.len());
    let mut last: Option<f64> = None;
    for opt in ca.into_iter() {
        match opt.or(last) {
            Some(v) => {
                values.push(v);
                last = Some(v);
            }
            None => return Err(DataError::UnusableColumn(column.to_string())),
        }
    }
    Ok(values)
}

/// Generate a deterministic synthetic cointegrated pair.
///
/// X follows a geometric random walk from an LCG seeded by `seed`;
/// Y tracks `beta * X` plus a mean-reverting disturbance, so the pair is
/// cointegrated by construction. Same seed, same series, every run.
pub fn synthetic_pair(bars: usize, beta: f64, seed: u64) -> (Vec<f64>, Vec<f64>) {
    info!(bars, beta, seed, "Generating synthetic pair");

    let mut x = Vec::with_capacity(bars);
    let mut y = Vec::with_capacity(bars);
    let mut price = 100.0_f64;
    let mut disturbance = 0.0_f64;
    let mut state = seed;

    let mut next_rand = move || {
        // Simple LCG random number generator
        state = state.wrapping_mul(6364136223846793005).wrapping_add(1);
        ((state >> 33) as f64) / (u32::MAX as f64) - 0.5
    };

    for _ in 0..bars {
        let drift = 0.0001;
        let volatility = 0.02;
        price *= 1.0 + drift + volatility * next_rand();
        price = price.max(1.0);

        // O-U style disturbance keeps y reverting to beta * x.
        disturbance = 0.9 * disturbance + 0.5 * next_rand();

        x.push(price);
        y.push((beta * price + disturbance).max(1.0));
    }

    (x, y)
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Write;

    fn write_temp_csv(name: &str, contents: &str) -> std::path::PathBuf {
        let path = std::env::temp_dir().join(name);
        let mut file = File::create(&path).unwrap();
        file.write_all(contents.as_bytes()).unwrap();
        path
    }

    #[test]
    fn test_load_pair_from_csv() {
        let path = write_temp_csv(
            "statarb_test_pair.csv",
            "date,AAA,BBB\n2024-01-01,100.0,200.0\n2024-01-02,101.0,202.0\n2024-01-03,102.0,204.0\n",
        );
        let (x, y) = load_pair(&path, "AAA", "BBB").unwrap();
        assert_eq!(x, vec![100.0, 101.0, 102.0]);
        assert_eq!(y, vec![200.0, 202.0, 204.0]);
    }

    #[test]
    fn test_missing_column_is_error() {
        let path = write_temp_csv("statarb_test_missing.csv", "AAA\n100.0\n101.0\n");
        assert!(matches!(
            load_pair(&path, "AAA", "BBB"),
            Err(DataError::MissingColumn(_))
        ));
    }

    #[test]
    fn test_interior_null_forward_filled() {
        let path = write_temp_csv(
            "statarb_test_ffill.csv",
            "date,AAA\n2024-01-01,100.0\n2024-01-02,\n2024-01-03,102.0\n",
        );
        let series = load_series(&path, "AAA").unwrap();
        assert_eq!(series, vec![100.0, 100.0, 102.0]);
    }

    #[test]
    fn test_universe_skips_date_column() {
        let path = write_temp_csv(
            "statarb_test_universe.csv",
            "date,AAA,BBB\n2024-01-01,100.0,200.0\n2024-01-02,101.0,202.0\n",
        );
        let universe = load_universe(&path).unwrap();
        assert!(universe.contains_key("AAA"));
        assert!(universe.contains_key("BBB"));
        assert!(!universe.contains_key("date"));
    }

    #[test]
    fn test_synthetic_pair_deterministic() {
        let (x1, y1) = synthetic_pair(200, 2.0, 42);
        let (x2, y2) = synthetic_pair(200, 2.0, 42);
        assert_eq!(x1, x2);
        assert_eq!(y1, y2);
        assert_eq!(x1.len(), 200);
    }

    #[test]
    fn test_synthetic_pair_tracks_beta() {
        let (x, y) = synthetic_pair(500, 2.0, 7);
        // The disturbance is bounded, so the price ratio stays near beta.
        let mean_ratio: f64 = x.iter().zip(&y).map(|(a, b)| b / a).sum::<f64>() / 500.0;
        assert!(
            (mean_ratio - 2.0).abs() < 0.2,
            "mean ratio should be near 2.0, got {}",
            mean_ratio
        );
    }

    #[test]
    fn test_synthetic_prices_positive() {
        let (x, y) = synthetic_pair(1000, 0.5, 123);
        assert!(x.iter().chain(y.iter()).all(|&p| p >= 1.0));
    }
}
