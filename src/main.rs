use std::path::PathBuf;

use clap::Parser;
use rust_decimal::Decimal;
use tracing_subscriber::EnvFilter;

use statarb::backtest::BacktestConfig;
use statarb::cli::{BacktestCliConfig, DataSourceConfig, OptimizeCliConfig, ScreenCliConfig};
use statarb::commands;
use statarb::optimize::OptimizeConfig;
use statarb::screening::ScreenConfig;
use statarb::signal::SpreadMode;

// --- CLI Argument Parsing ---
#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Set the verbosity level (error, warn, info, debug, trace)
    #[arg(long, global = true, default_value = "info")]
    verbose: String,
}

#[derive(clap::Args, Debug, Clone)]
struct DataArgs {
    /// CSV file with one price column per symbol; omit for synthetic data
    #[arg(long)]
    csv: Option<PathBuf>,
    /// Column name for the X leg
    #[arg(long, default_value = "x")]
    col_x: String,
    /// Column name for the Y leg
    #[arg(long, default_value = "y")]
    col_y: String,
    /// Synthetic series length (used when --csv is absent)
    #[arg(long, default_value_t = 500)]
    bars: usize,
    /// Synthetic true hedge ratio
    #[arg(long, default_value_t = 2.0)]
    beta: f64,
    /// Synthetic generator seed
    #[arg(long, default_value_t = 42)]
    seed: u64,
}

impl From<DataArgs> for DataSourceConfig {
    fn from(args: DataArgs) -> Self {
        Self {
            csv: args.csv,
            column_x: args.col_x,
            column_y: args.col_y,
            synthetic_bars: args.bars,
            synthetic_beta: args.beta,
            seed: args.seed,
        }
    }
}

#[derive(clap::Args, Debug, Clone)]
struct SimArgs {
    /// Rolling z-score window in bars
    #[arg(long, default_value_t = 60)]
    window: usize,
    /// Z-score entry threshold
    #[arg(long, default_value_t = 2.0)]
    entry: f64,
    /// Z-score exit threshold
    #[arg(long, default_value_t = 0.5)]
    exit: f64,
    /// Kalman process noise q
    #[arg(long, default_value_t = 1e-3)]
    process_noise: f64,
    /// Kalman measurement noise r
    #[arg(long, default_value_t = 1e-3)]
    measurement_noise: f64,
    /// Per-leg sizing fraction of equity
    #[arg(long, default_value_t = 0.4)]
    size: f64,
    /// Transaction cost per leg in basis points
    #[arg(long, default_value_t = 10.0)]
    cost_bps: f64,
    /// Annualized borrow rate on the short leg
    #[arg(long, default_value_t = 0.0025)]
    borrow: f64,
    /// Initial capital in USD
    #[arg(long, default_value = "1000000")]
    capital: Decimal,
    /// Filter and spread on log prices instead of price levels
    #[arg(long, default_value_t = false)]
    log_price: bool,
    /// Slope-only filter (no intercept state)
    #[arg(long, default_value_t = false)]
    no_intercept: bool,
}

impl From<SimArgs> for BacktestConfig {
    fn from(args: SimArgs) -> Self {
        Self {
            process_noise: args.process_noise,
            measurement_noise: args.measurement_noise,
            estimate_intercept: !args.no_intercept,
            spread_mode: if args.log_price {
                SpreadMode::LogPrice
            } else {
                SpreadMode::Price
            },
            window: args.window,
            entry_threshold: args.entry,
            exit_threshold: args.exit,
            size_fraction: args.size,
            cost_bps: args.cost_bps,
            borrow_rate: args.borrow,
            initial_capital: args.capital,
        }
    }
}

#[derive(clap::Subcommand)]
enum Commands {
    /// Run a pairs backtest on CSV or synthetic data
    Backtest {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        sim: SimArgs,
        /// Output directory for results
        #[arg(long, default_value = "results")]
        output_dir: String,
    },
    /// Screen a symbol universe for cointegrated pairs
    Screen {
        /// CSV file with one price column per symbol
        #[arg(long)]
        csv: PathBuf,
        /// Minimum Pearson correlation of log prices
        #[arg(long, default_value_t = 0.8)]
        min_correlation: f64,
        /// Minimum mean-reversion half-life in bars
        #[arg(long, default_value_t = 2.0)]
        min_half_life: f64,
        /// Maximum mean-reversion half-life in bars
        #[arg(long, default_value_t = 60.0)]
        max_half_life: f64,
        /// Skip the ADF cointegration requirement
        #[arg(long, default_value_t = false)]
        no_cointegration: bool,
        /// Maximum number of candidates to report
        #[arg(long, default_value_t = 10)]
        max_pairs: usize,
        /// Output directory for results
        #[arg(long, default_value = "results")]
        output_dir: String,
    },
    /// Grid-search filter and threshold parameters for one pair
    Optimize {
        #[command(flatten)]
        data: DataArgs,
        #[command(flatten)]
        sim: SimArgs,
        /// Minimum closed trades for a grid cell to count
        #[arg(long, default_value_t = 5)]
        min_trades: usize,
        /// Sharpe cap above which a cell is treated as overfit
        #[arg(long, default_value_t = 4.0)]
        max_sharpe: f64,
        /// Number of ranked results to keep
        #[arg(long, default_value_t = 10)]
        top_n: usize,
        /// Output directory for results
        #[arg(long, default_value = "results")]
        output_dir: String,
    },
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // RUST_LOG takes precedence over --verbose when set.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(cli.verbose.clone()));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match cli.command {
        Commands::Backtest {
            data,
            sim,
            output_dir,
        } => commands::backtest::run(BacktestCliConfig {
            source: data.into(),
            backtest: sim.into(),
            output_dir,
        }),
        Commands::Screen {
            csv,
            min_correlation,
            min_half_life,
            max_half_life,
            no_cointegration,
            max_pairs,
            output_dir,
        } => commands::screen::run(ScreenCliConfig {
            universe_csv: csv,
            screen: ScreenConfig {
                min_correlation,
                min_half_life_bars: min_half_life,
                max_half_life_bars: max_half_life,
                require_cointegration: !no_cointegration,
                max_pairs,
            },
            output_dir,
        }),
        Commands::Optimize {
            data,
            sim,
            min_trades,
            max_sharpe,
            top_n,
            output_dir,
        } => commands::optimize::run(OptimizeCliConfig {
            source: data.into(),
            backtest: sim.into(),
            optimize: OptimizeConfig {
                min_trades,
                max_sharpe,
                top_n,
            },
            output_dir,
        }),
    }
}
