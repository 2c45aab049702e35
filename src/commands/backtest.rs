//! Backtest command handler.
//!
//! Runs one simulation over the configured pair and writes a summary
//! JSON plus the full per-bar series for external plotting.

use std::fs::{self, File};
use std::io::Write;
use std::path::Path;

use serde::Serialize;
use tracing::info;

use crate::backtest::{self, BacktestResult};
use crate::cli::BacktestCliConfig;
use crate::signal::Position;

/// Backtest summary in JSON-serializable format.
#[derive(Debug, Serialize)]
struct BacktestOutput {
    source: String,
    bars: usize,
    window: usize,
    entry_threshold: f64,
    exit_threshold: f64,
    final_equity: f64,
    total_return_pct: f64,
    sharpe_ratio: f64,
    max_drawdown_pct: f64,
    total_trades: usize,
    win_rate_pct: f64,
    net_profit: String,
    insufficient_data: bool,
}

/// Per-bar series for plotting, aligned by index.
#[derive(Debug, Serialize)]
struct SeriesOutput<'a> {
    equity_curve: &'a [f64],
    daily_returns: &'a [f64],
    hedge_ratios: &'a [f64],
    spreads: &'a [f64],
    zscores: &'a [Option<f64>],
    positions: &'a [Position],
}

/// Run a backtest with the provided CLI configuration.
///
/// # Errors
/// Returns error if data loading, the simulation, or output writing fails.
pub fn run(config: BacktestCliConfig) -> Result<(), Box<dyn std::error::Error>> {
    info!("--- Running Backtest ---");
    info!(source = %config.source.describe(), "Backtest configuration");

    let (x, y) = config.source.load_pair()?;
    info!(bars = x.len(), "Data loaded");

    let result = backtest::run_backtest(&x, &y, &config.backtest)?;
    print_summary(&result);

    let output = BacktestOutput {
        source: config.source.describe(),
        bars: x.len(),
        window: config.backtest.window,
        entry_threshold: config.backtest.entry_threshold,
        exit_threshold: config.backtest.exit_threshold,
        final_equity: result.stats.final_equity,
        total_return_pct: result.stats.total_return * 100.0,
        sharpe_ratio: result.stats.sharpe_ratio,
        max_drawdown_pct: result.stats.max_drawdown * 100.0,
        total_trades: result.stats.trade_count,
        win_rate_pct: result.stats.win_rate * 100.0,
        net_profit: result.stats.net_profit.to_string(),
        insufficient_data: result.insufficient_data,
    };

    fs::create_dir_all(&config.output_dir)?;

    let summary_path = Path::new(&config.output_dir).join("results.json");
    let mut file = File::create(&summary_path)?;
    file.write_all(serde_json::to_string_pretty(&output)?.as_bytes())?;
    info!(path = %summary_path.display(), "Results written");

    let series_path = Path::new(&config.output_dir).join("series.json");
    let series = SeriesOutput {
        equity_curve: &result.equity_curve,
        daily_returns: &result.daily_returns,
        hedge_ratios: &result.hedge_ratios,
        spreads: &result.spreads,
        zscores: &result.zscores,
        positions: &result.positions,
    };
    let mut file = File::create(&series_path)?;
    file.write_all(serde_json::to_string(&series)?.as_bytes())?;

    let trades_path = Path::new(&config.output_dir).join("trades.json");
    let mut file = File::create(&trades_path)?;
    file.write_all(serde_json::to_string_pretty(&result.trades)?.as_bytes())?;
    info!(path = %config.output_dir, "Series and trade ledger written");

    Ok(())
}

fn print_summary(result: &BacktestResult) {
    info!("--- Backtest Results ---");
    info!("Final Equity:  {:.4}", result.stats.final_equity);
    info!("Total Return:  {:.2}%", result.stats.total_return * 100.0);
    info!("Sharpe Ratio:  {:.2}", result.stats.sharpe_ratio);
    info!("Max Drawdown:  {:.2}%", result.stats.max_drawdown * 100.0);
    info!("Total Trades:  {}", result.stats.trade_count);
    info!("Win Rate:      {:.1}%", result.stats.win_rate * 100.0);
    info!("Net Profit:    ${}", result.stats.net_profit);
    info!("------------------------");
}
