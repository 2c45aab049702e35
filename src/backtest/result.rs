//! Backtest outputs: per-bar series, trade ledger, summary metrics.

use rust_decimal::Decimal;
use serde::Serialize;

use crate::signal::Position;

/// Trading days per year for Sharpe annualization
pub const ANNUALIZATION_FACTOR: f64 = 252.0;

/// One closed round trip.
///
/// Entry and exit equity are recorded explicitly at open and close time;
/// realized PnL is their difference and is never inferred from adjacent
/// equity-curve deltas.
#[derive(Debug, Clone, Serialize)]
pub struct TradeRecord {
    /// Bar index at which the position opened
    pub entry_bar: usize,
    /// Bar index at which the position closed
    pub exit_bar: usize,
    /// Side held for the duration of the trade
    pub side: Position,
    /// Hedge ratio at entry
    pub entry_hedge_ratio: f64,
    /// Hedge ratio at exit
    pub exit_hedge_ratio: f64,
    /// Normalized equity when the position opened (entry bar's prior equity)
    pub entry_equity: f64,
    /// Normalized equity after the closing bar settled
    pub exit_equity: f64,
    /// exit_equity - entry_equity, net of all costs inside the trade
    pub realized_pnl: f64,
    /// Bars held (exit_bar - entry_bar)
    pub holding_bars: usize,
}

impl TradeRecord {
    /// True when the round trip finished above water.
    pub fn is_win(&self) -> bool {
        self.realized_pnl > 0.0
    }
}

/// Summary metrics over one run.
#[derive(Debug, Clone, Serialize)]
pub struct SummaryStats {
    /// Final normalized equity (1.0 = initial capital)
    pub final_equity: f64,
    /// equity[final] / equity[0] - 1
    pub total_return: f64,
    /// Annualized Sharpe of daily returns (0 when undefined)
    pub sharpe_ratio: f64,
    /// Worst peak-to-trough equity decline (negative or 0)
    pub max_drawdown: f64,
    /// Closed round trips
    pub trade_count: usize,
    /// Winning trades / closed trades (0 with no trades)
    pub win_rate: f64,
    /// Dollar PnL: initial_capital scaled by the normalized return
    pub net_profit: Decimal,
}

/// Everything one run produces.
///
/// Per-bar vectors are indexed by bar and equal in length to the input
/// series; the inert short-input result carries a flat equity curve with
/// the diagnostic series empty.
#[derive(Debug, Clone, Serialize)]
pub struct BacktestResult {
    /// Normalized equity, one value per bar, equity[0] = 1.0
    pub equity_curve: Vec<f64>,
    /// equity[t] / equity[t-1] - 1, with dailyReturns[0] = 0.0
    pub daily_returns: Vec<f64>,
    /// Filtered hedge ratio per bar
    pub hedge_ratios: Vec<f64>,
    /// Spread per bar
    pub spreads: Vec<f64>,
    /// Rolling z-score per bar (None during warm-up / zero variance)
    pub zscores: Vec<Option<f64>>,
    /// Position held per bar
    pub positions: Vec<Position>,
    /// Closed trades in entry order
    pub trades: Vec<TradeRecord>,
    /// Post-run metrics
    pub stats: SummaryStats,
    /// True when the input was too short to trade and the result is the
    /// zero-activity placeholder
    pub insufficient_data: bool,
}

impl BacktestResult {
    /// Zero-activity result for undersized input: flat equity, no trades,
    /// zeroed metrics. Well-formed so batch callers can rank it without
    /// special-casing.
    pub fn inert(bars: usize) -> Self {
        Self {
            equity_curve: vec![1.0; bars],
            daily_returns: vec![0.0; bars],
            hedge_ratios: Vec::new(),
            spreads: Vec::new(),
            zscores: Vec::new(),
            positions: vec![Position::Flat; bars],
            trades: Vec::new(),
            stats: SummaryStats {
                final_equity: 1.0,
                total_return: 0.0,
                sharpe_ratio: 0.0,
                max_drawdown: 0.0,
                trade_count: 0,
                win_rate: 0.0,
                net_profit: Decimal::ZERO,
            },
            insufficient_data: true,
        }
    }
}

/// Annualized Sharpe ratio of per-bar returns; sample std (n-1), 0 when
/// undefined.
pub fn sharpe_ratio(returns: &[f64]) -> f64 {
    if returns.len() < 2 {
        return 0.0;
    }

    let n = returns.len() as f64;
    let mean = returns.iter().sum::<f64>() / n;

    // Sample variance (n-1 denominator)
    let variance = returns.iter().map(|r| (r - mean).powi(2)).sum::<f64>() / (n - 1.0);
    let std_dev = variance.sqrt();

    if std_dev.abs() < f64::EPSILON {
        return 0.0;
    }

    (mean / std_dev) * ANNUALIZATION_FACTOR.sqrt()
}

/// Worst peak-to-trough decline: min over t of equity[t]/peak[t] - 1.
pub fn max_drawdown(equity: &[f64]) -> f64 {
    let mut peak = f64::MIN;
    let mut worst = 0.0f64;
    for &value in equity {
        peak = peak.max(value);
        let drawdown = value / peak - 1.0;
        worst = worst.min(drawdown);
    }
    worst
}
