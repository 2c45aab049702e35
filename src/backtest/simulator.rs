//! The bar-by-bar simulation loop.

use rust_decimal::Decimal;
use tracing::{debug, info};

use crate::math::{HedgeEstimator, KalmanHedgeFilter, ScalarKalmanFilter};
use crate::signal::{Position, SpreadSignalEngine};

use super::config::BacktestConfig;
use super::error::BacktestError;
use super::result::{
    max_drawdown, sharpe_ratio, BacktestResult, SummaryStats, TradeRecord, ANNUALIZATION_FACTOR,
};

/// A position opened but not yet closed.
struct OpenTrade {
    entry_bar: usize,
    side: Position,
    entry_hedge_ratio: f64,
    entry_equity: f64,
}

impl OpenTrade {
    fn close(self, exit_bar: usize, exit_hedge_ratio: f64, exit_equity: f64) -> TradeRecord {
        TradeRecord {
            entry_bar: self.entry_bar,
            exit_bar,
            side: self.side,
            entry_hedge_ratio: self.entry_hedge_ratio,
            exit_hedge_ratio,
            entry_equity: self.entry_equity,
            exit_equity,
            realized_pnl: exit_equity - self.entry_equity,
            holding_bars: exit_bar - self.entry_bar,
        }
    }
}

/// Run one deterministic backtest over aligned price series.
///
/// The loop is strictly causal: the decision at bar `t` sees only
/// `zscore[..=t]`, and the filter state at `t` depends only on bars
/// `0..=t`. Truncating the input after `t` reproduces the identical
/// prefix. There is no randomness anywhere in the run; identical inputs
/// produce bit-for-bit identical output.
///
/// Undersized input (fewer than `window + 1` bars) returns the inert
/// zero-activity result rather than an error.
pub fn run_backtest(
    x: &[f64],
    y: &[f64],
    config: &BacktestConfig,
) -> Result<BacktestResult, BacktestError> {
    config.validate().map_err(BacktestError::InvalidConfig)?;

    if x.len() != y.len() {
        return Err(BacktestError::LengthMismatch {
            x_len: x.len(),
            y_len: y.len(),
        });
    }

    let n = x.len();
    if n < config.min_bars() {
        debug!(bars = n, min_bars = config.min_bars(), "input too short, returning inert result");
        return Ok(BacktestResult::inert(n));
    }

    // Log returns need strictly positive prices in either spread mode.
    for (t, (&px, &py)) in x.iter().zip(y).enumerate() {
        if !px.is_finite() || !py.is_finite() || px <= 0.0 || py <= 0.0 {
            return Err(BacktestError::InvalidPrice { bar: t, x: px, y: py });
        }
    }

    info!(
        bars = n,
        window = config.window,
        entry = config.entry_threshold,
        exit = config.exit_threshold,
        mode = ?config.spread_mode,
        "starting backtest"
    );

    let mut filter: Box<dyn HedgeEstimator> = if config.estimate_intercept {
        Box::new(KalmanHedgeFilter::new(
            config.process_noise,
            config.measurement_noise,
        ))
    } else {
        Box::new(ScalarKalmanFilter::new(
            1.0,
            config.process_noise,
            config.measurement_noise,
        ))
    };
    let mut engine = SpreadSignalEngine::new(config.window);

    let mut equity_curve = Vec::with_capacity(n);
    let mut daily_returns = Vec::with_capacity(n);
    let mut hedge_ratios = Vec::with_capacity(n);
    let mut spreads = Vec::with_capacity(n);
    let mut zscores = Vec::with_capacity(n);
    let mut positions = Vec::with_capacity(n);
    let mut trades: Vec<TradeRecord> = Vec::new();
    let mut open_trade: Option<OpenTrade> = None;

    // Per-transition commission: (1 - c) per leg, both legs at once.
    let commission_factor = {
        let per_leg = 1.0 - config.cost_bps / 10_000.0;
        per_leg * per_leg
    };
    let daily_borrow = config.borrow_rate / ANNUALIZATION_FACTOR;

    // Bar 0 seeds the filter and the z-score window; no trade decision.
    let tx0 = config.spread_mode.transform(x[0]);
    let ty0 = config.spread_mode.transform(y[0]);
    let est = filter
        .step(tx0, ty0)
        .map_err(|source| BacktestError::Numerics { bar: 0, source })?;
    let sample = engine.push(tx0, ty0, est.hedge_ratio);
    hedge_ratios.push(sample.hedge_ratio);
    spreads.push(sample.spread);
    zscores.push(sample.zscore);
    positions.push(Position::Flat);
    equity_curve.push(1.0);
    daily_returns.push(0.0);

    for t in 1..n {
        // 1. Filter and signal for this bar.
        let tx = config.spread_mode.transform(x[t]);
        let ty = config.spread_mode.transform(y[t]);
        let est = filter
            .step(tx, ty)
            .map_err(|source| BacktestError::Numerics { bar: t, source })?;
        let sample = engine.push(tx, ty, est.hedge_ratio);
        let beta = sample.hedge_ratio;

        // 2. Position transition.
        let prev_position = positions[t - 1];
        let position = prev_position.transition(
            sample.zscore,
            config.entry_threshold,
            config.exit_threshold,
        );

        let prev_equity = equity_curve[t - 1];
        let mut equity = prev_equity;
        let mut closing = false;

        // 3. Transition costs; the FSM guarantees no direct flips, so a
        // transition is either an open or a close.
        if position != prev_position {
            equity *= commission_factor;
            if position.is_open() {
                open_trade = Some(OpenTrade {
                    entry_bar: t,
                    side: position,
                    entry_hedge_ratio: beta,
                    entry_equity: prev_equity,
                });
                debug!(bar = t, side = %position, zscore = sample.zscore, "opening position");
            } else {
                closing = true;
            }
        }

        // 4.-6. Leg returns, sizing, PnL and borrow for the bar. Leg
        // returns always use raw price levels; the spread mode only
        // shapes the filter's view.
        let ret_x = (x[t] / x[t - 1]).ln();
        let ret_y = (y[t] / y[t - 1]).ln();
        let notional = prev_equity * config.size_fraction;

        let (pnl, borrow_cost) = match position {
            Position::LongSpread => (
                notional * ret_x - notional * beta * ret_y,
                notional * beta.abs() * daily_borrow,
            ),
            Position::ShortSpread => (
                -notional * ret_x + notional * beta * ret_y,
                notional * daily_borrow,
            ),
            Position::Flat => (0.0, 0.0),
        };

        // 7.-8. Settle the bar.
        equity += pnl - borrow_cost;
        equity_curve.push(equity);
        daily_returns.push(equity / prev_equity - 1.0);

        if closing {
            // Exit equity is this bar's settled value, so exit commission
            // and the final bar's PnL are inside the realized number.
            if let Some(open) = open_trade.take() {
                let record = open.close(t, beta, equity);
                debug!(
                    bar = t,
                    side = %record.side,
                    pnl = record.realized_pnl,
                    held = record.holding_bars,
                    "closed trade"
                );
                trades.push(record);
            }
        }

        hedge_ratios.push(beta);
        spreads.push(sample.spread);
        zscores.push(sample.zscore);
        positions.push(position);
    }

    let final_equity = equity_curve[n - 1];
    let total_return = final_equity / equity_curve[0] - 1.0;
    let wins = trades.iter().filter(|trade| trade.is_win()).count();
    let win_rate = if trades.is_empty() {
        0.0
    } else {
        wins as f64 / trades.len() as f64
    };

    let stats = SummaryStats {
        final_equity,
        total_return,
        sharpe_ratio: sharpe_ratio(&daily_returns[1..]),
        max_drawdown: max_drawdown(&equity_curve),
        trade_count: trades.len(),
        win_rate,
        net_profit: config.initial_capital
            * Decimal::from_f64_retain(total_return).unwrap_or(Decimal::ZERO),
    };

    info!(
        final_equity,
        total_return,
        sharpe = stats.sharpe_ratio,
        trades = trades.len(),
        "backtest complete"
    );

    Ok(BacktestResult {
        equity_curve,
        daily_returns,
        hedge_ratios,
        spreads,
        zscores,
        positions,
        trades,
        stats,
        insufficient_data: false,
    })
}
