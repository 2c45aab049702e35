//! Cross-sectional pair screening.
//!
//! Filters a universe of price series down to candidate pairs worth
//! backtesting: Pearson correlation on log prices, a static OLS hedge
//! ratio, an ADF stationarity test on the OLS residual spread, and an
//! Ornstein-Uhlenbeck half-life estimate. The dynamic Kalman hedge ratio
//! takes over once a candidate reaches the simulator; the static OLS fit
//! here only has to be good enough to judge cointegration.

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::{debug, info, warn};

/// Half-life reported for non-stationary or degenerate spreads (bars)
const NON_STATIONARY_HALF_LIFE: f64 = 1000.0;

/// Beyond this price ratio, f64 precision loss may affect correlation
const MAX_PRICE_RATIO: f64 = 1e9;

/// ADF critical value at 5% significance (MacKinnon, 1994), n > 100
const ADF_CRITICAL_VALUE_5PCT: f64 = -2.86;

/// Errors from the screening pipeline.
#[derive(Error, Debug)]
pub enum ScreenError {
    /// Invalid configuration
    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),

    /// No pairs passed the filtering criteria
    #[error("No viable pairs found (correlation >= {min_correlation}, half-life in [{min_half_life}, {max_half_life}] bars)")]
    NoViablePairs {
        min_correlation: f64,
        min_half_life: f64,
        max_half_life: f64,
    },
}

/// Screening thresholds.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ScreenConfig {
    /// Minimum Pearson correlation of log prices (0.0-1.0)
    #[serde(default = "default_min_correlation")]
    pub min_correlation: f64,

    /// Half-life window in bars; too fast is microstructure noise, too
    /// slow never reverts inside a backtest
    #[serde(default = "default_min_half_life")]
    pub min_half_life_bars: f64,
    #[serde(default = "default_max_half_life")]
    pub max_half_life_bars: f64,

    /// Require the ADF test to reject a unit root in the residual spread
    #[serde(default = "default_require_cointegration")]
    pub require_cointegration: bool,

    /// Maximum number of candidates to return
    #[serde(default = "default_max_pairs")]
    pub max_pairs: usize,
}

// Default value functions for serde
fn default_min_correlation() -> f64 {
    0.8
}
fn default_min_half_life() -> f64 {
    2.0
}
fn default_max_half_life() -> f64 {
    60.0
}
fn default_require_cointegration() -> bool {
    true
}
fn default_max_pairs() -> usize {
    10
}

impl Default for ScreenConfig {
    fn default() -> Self {
        Self {
            min_correlation: default_min_correlation(),
            min_half_life_bars: default_min_half_life(),
            max_half_life_bars: default_max_half_life(),
            require_cointegration: default_require_cointegration(),
            max_pairs: default_max_pairs(),
        }
    }
}

impl ScreenConfig {
    /// Validate configuration
    pub fn validate(&self) -> Result<(), ScreenError> {
        if !(0.0..=1.0).contains(&self.min_correlation) {
            return Err(ScreenError::InvalidConfig(format!(
                "min_correlation must be between 0.0 and 1.0, got {}",
                self.min_correlation
            )));
        }
        if !(self.min_half_life_bars > 0.0) {
            return Err(ScreenError::InvalidConfig(format!(
                "min_half_life_bars must be positive, got {}",
                self.min_half_life_bars
            )));
        }
        if self.max_half_life_bars <= self.min_half_life_bars {
            return Err(ScreenError::InvalidConfig(format!(
                "max_half_life_bars ({}) must exceed min_half_life_bars ({})",
                self.max_half_life_bars, self.min_half_life_bars
            )));
        }
        if self.max_pairs == 0 {
            return Err(ScreenError::InvalidConfig(
                "max_pairs must be at least 1".to_string(),
            ));
        }
        Ok(())
    }
}

/// A pair that passed every screen.
#[derive(Debug, Clone, Serialize)]
pub struct PairCandidate {
    /// Independent leg (X)
    pub symbol_x: String,
    /// Dependent leg (Y)
    pub symbol_y: String,
    /// Pearson correlation of log prices
    pub correlation: f64,
    /// Static OLS hedge ratio of log(y) on log(x)
    pub hedge_ratio: f64,
    /// Residual spread standard deviation
    pub spread_std: f64,
    /// Estimated mean-reversion half-life in bars
    pub half_life_bars: f64,
    /// ADF test statistic (more negative = more stationary)
    pub adf_statistic: f64,
}

/// Pearson correlation coefficient between two equal-length series.
///
/// Returns `None` on degenerate input, or when the mean price ratio is
/// extreme enough that f64 precision would pollute the result.
pub fn pearson_correlation(a: &[f64], b: &[f64]) -> Option<f64> {
    if a.len() != b.len() || a.len() < 2 {
        return None;
    }

    let mean_a: f64 = a.iter().sum::<f64>() / a.len() as f64;
    let mean_b: f64 = b.iter().sum::<f64>() / b.len() as f64;

    if mean_b != 0.0 {
        let ratio = (mean_a / mean_b).abs();
        if !(1.0 / MAX_PRICE_RATIO..=MAX_PRICE_RATIO).contains(&ratio) {
            warn!(
                ratio = format!("{:.2e}", ratio),
                limit = format!("{:.2e}", MAX_PRICE_RATIO),
                "Price ratio exceeds safe bounds for correlation calculation"
            );
            return None;
        }
    }

    let mut covariance = 0.0;
    let mut var_a = 0.0;
    let mut var_b = 0.0;

    for (x, y) in a.iter().zip(b.iter()) {
        let dx = x - mean_a;
        let dy = y - mean_b;
        covariance += dx * dy;
        var_a += dx * dx;
        var_b += dy * dy;
    }

    if var_a == 0.0 || var_b == 0.0 {
        return Some(0.0);
    }

    let correlation = covariance / (var_a.sqrt() * var_b.sqrt());
    correlation.is_finite().then_some(correlation)
}

/// OLS fit of `y = alpha + beta * x`; returns `(alpha, beta)`.
///
/// `None` when `x` has no variance.
pub fn ols_fit(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    if x.len() != y.len() || x.len() < 2 {
        return None;
    }

    let n = x.len() as f64;
    let mean_x = x.iter().sum::<f64>() / n;
    let mean_y = y.iter().sum::<f64>() / n;

    let mut covariance = 0.0;
    let mut var_x = 0.0;
    for (xi, yi) in x.iter().zip(y.iter()) {
        let dx = xi - mean_x;
        covariance += dx * (yi - mean_y);
        var_x += dx * dx;
    }

    if var_x.abs() < f64::EPSILON {
        return None;
    }

    let beta = covariance / var_x;
    let alpha = mean_y - beta * mean_x;
    Some((alpha, beta))
}

/// Residual spread after removing the static OLS relationship:
/// `spread[t] = log(y[t]) - alpha - beta * log(x[t])`.
pub fn residual_spread(log_x: &[f64], log_y: &[f64], alpha: f64, beta: f64) -> Vec<f64> {
    log_x
        .iter()
        .zip(log_y.iter())
        .map(|(lx, ly)| ly - alpha - beta * lx)
        .collect()
}

/// Spread standard deviation and Ornstein-Uhlenbeck half-life (bars).
///
/// Half-life from lag-1 autocorrelation: `-ln(2) / ln(rho)`.
pub fn analyze_spread(spread: &[f64]) -> (f64, f64) {
    if spread.len() < 3 {
        return (0.0, f64::INFINITY);
    }

    let n = spread.len() as f64;
    let mean = spread.iter().sum::<f64>() / n;

    let variance = spread.iter().map(|x| (x - mean).powi(2)).sum::<f64>() / n;
    let std_dev = variance.sqrt();

    // Lag-1 autocorrelation for mean-reversion speed
    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..spread.len() - 1 {
        let dx = spread[i] - mean;
        let dy = spread[i + 1] - mean;
        numerator += dx * dy;
        denominator += dx * dx;
    }

    let rho = if denominator == 0.0 {
        0.0
    } else {
        numerator / denominator
    };

    let half_life = if rho > 0.0 && rho < 1.0 {
        -2.0f64.ln() / rho.ln()
    } else {
        NON_STATIONARY_HALF_LIFE
    };

    (std_dev, half_life)
}

/// Augmented Dickey-Fuller stationarity test on a spread series.
///
/// Regresses the first difference on the demeaned lagged level and
/// compares the t-statistic of the coefficient to the 5% critical value.
/// Returns `(t_statistic, is_stationary)`; degenerate input reports
/// `(0.0, false)`.
pub fn adf_test(spread: &[f64]) -> (f64, bool) {
    if spread.len() < 20 {
        return (0.0, false);
    }

    let n = spread.len() - 1;
    let mut delta_y: Vec<f64> = Vec::with_capacity(n);
    let mut y_lag: Vec<f64> = Vec::with_capacity(n);
    for i in 1..spread.len() {
        delta_y.push(spread[i] - spread[i - 1]);
        y_lag.push(spread[i - 1]);
    }

    let n_f64 = n as f64;
    let y_lag_mean = y_lag.iter().sum::<f64>() / n_f64;
    let delta_y_mean = delta_y.iter().sum::<f64>() / n_f64;

    let mut numerator = 0.0;
    let mut denominator = 0.0;
    for i in 0..n {
        let y_centered = y_lag[i] - y_lag_mean;
        let d_centered = delta_y[i] - delta_y_mean;
        numerator += y_centered * d_centered;
        denominator += y_centered * y_centered;
    }

    if denominator.abs() < f64::EPSILON {
        return (0.0, false);
    }

    let gamma = numerator / denominator;

    let mut sse = 0.0;
    for i in 0..n {
        let predicted = gamma * (y_lag[i] - y_lag_mean) + delta_y_mean;
        let residual = delta_y[i] - predicted;
        sse += residual * residual;
    }

    let mse = sse / (n_f64 - 1.0);
    let se_gamma = (mse / denominator).sqrt();

    if se_gamma.abs() < f64::EPSILON {
        return (0.0, false);
    }

    let t_statistic = gamma / se_gamma;
    (t_statistic, t_statistic < ADF_CRITICAL_VALUE_5PCT)
}

/// Screen every unordered pair in the universe.
///
/// Symbols are visited in sorted order so the candidate list is
/// reproducible regardless of map iteration order. Each passing pair is
/// reported with X as the lexicographically smaller symbol.
pub fn screen_pairs(
    prices: &HashMap<String, Vec<f64>>,
    config: &ScreenConfig,
) -> Result<Vec<PairCandidate>, ScreenError> {
    config.validate()?;

    let mut symbols: Vec<&String> = prices.keys().collect();
    symbols.sort();

    info!(
        candidates = symbols.len(),
        min_corr = config.min_correlation,
        half_life = format!("[{}, {}]", config.min_half_life_bars, config.max_half_life_bars),
        require_coint = config.require_cointegration,
        "Screening pair candidates"
    );

    let mut results = Vec::new();
    let mut rejected_adf = 0u32;

    for i in 0..symbols.len() {
        for j in (i + 1)..symbols.len() {
            let sym_x = symbols[i];
            let sym_y = symbols[j];
            let series_x = &prices[sym_x];
            let series_y = &prices[sym_y];

            if series_x.len() != series_y.len() {
                warn!(x = %sym_x, y = %sym_y, "Length mismatch, skipping pair");
                continue;
            }
            if series_x
                .iter()
                .chain(series_y.iter())
                .any(|&p| !(p > 0.0) || !p.is_finite())
            {
                warn!(x = %sym_x, y = %sym_y, "Non-positive price, skipping pair");
                continue;
            }

            let log_x: Vec<f64> = series_x.iter().map(|p| p.ln()).collect();
            let log_y: Vec<f64> = series_y.iter().map(|p| p.ln()).collect();

            let Some(correlation) = pearson_correlation(&log_x, &log_y) else {
                continue;
            };
            if correlation < config.min_correlation {
                debug!(
                    pair = format!("{}-{}", sym_x, sym_y),
                    corr = correlation,
                    "Correlation too low"
                );
                continue;
            }

            let Some((alpha, beta)) = ols_fit(&log_x, &log_y) else {
                continue;
            };
            let spread = residual_spread(&log_x, &log_y, alpha, beta);

            let (spread_std, half_life) = analyze_spread(&spread);
            if half_life < config.min_half_life_bars || half_life > config.max_half_life_bars {
                debug!(
                    pair = format!("{}-{}", sym_x, sym_y),
                    half_life,
                    "Half-life outside bounds"
                );
                continue;
            }

            let (adf_stat, is_cointegrated) = adf_test(&spread);
            if config.require_cointegration && !is_cointegrated {
                debug!(
                    pair = format!("{}-{}", sym_x, sym_y),
                    adf = format!("{:.2}", adf_stat),
                    critical = ADF_CRITICAL_VALUE_5PCT,
                    "Failed ADF cointegration test"
                );
                rejected_adf += 1;
                continue;
            }

            info!(
                pair = format!("{}-{}", sym_x, sym_y),
                correlation = format!("{:.3}", correlation),
                hedge_ratio = format!("{:.3}", beta),
                half_life = format!("{:.1}", half_life),
                adf = format!("{:.2}", adf_stat),
                "Viable pair found"
            );

            results.push(PairCandidate {
                symbol_x: sym_x.clone(),
                symbol_y: sym_y.clone(),
                correlation,
                hedge_ratio: beta,
                spread_std,
                half_life_bars: half_life,
                adf_statistic: adf_stat,
            });
        }
    }

    // Most stationary first; correlation breaks ties deterministically.
    results.sort_by(|a, b| {
        a.adf_statistic
            .partial_cmp(&b.adf_statistic)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(
                b.correlation
                    .partial_cmp(&a.correlation)
                    .unwrap_or(std::cmp::Ordering::Equal),
            )
    });
    results.truncate(config.max_pairs);

    info!(
        viable_pairs = results.len(),
        rejected_adf, "Screening complete"
    );

    if results.is_empty() {
        return Err(ScreenError::NoViablePairs {
            min_correlation: config.min_correlation,
            min_half_life: config.min_half_life_bars,
            max_half_life: config.max_half_life_bars,
        });
    }
    Ok(results)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_correlation_perfect() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let corr = pearson_correlation(&a, &b).unwrap();
        assert!((corr - 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_correlation_negative() {
        let a = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let b = vec![5.0, 4.0, 3.0, 2.0, 1.0];
        let corr = pearson_correlation(&a, &b).unwrap();
        assert!((corr + 1.0).abs() < 0.0001);
    }

    #[test]
    fn test_correlation_extreme_ratio_rejected() {
        let a = vec![1e12, 2e12, 3e12];
        let b = vec![1e-3, 2e-3, 3e-3];
        assert!(pearson_correlation(&a, &b).is_none());
    }

    #[test]
    fn test_ols_recovers_line() {
        let x = vec![1.0, 2.0, 3.0, 4.0, 5.0];
        let y: Vec<f64> = x.iter().map(|v| 3.0 + 2.0 * v).collect();
        let (alpha, beta) = ols_fit(&x, &y).unwrap();
        assert!((alpha - 3.0).abs() < 1e-10);
        assert!((beta - 2.0).abs() < 1e-10);
    }

    #[test]
    fn test_ols_constant_x_degenerate() {
        let x = vec![2.0; 10];
        let y: Vec<f64> = (0..10).map(|i| i as f64).collect();
        assert!(ols_fit(&x, &y).is_none());
    }

    #[test]
    fn test_residual_spread_of_exact_fit_is_zero() {
        let x = vec![1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| 0.5 + 1.5 * v).collect();
        let spread = residual_spread(&x, &y, 0.5, 1.5);
        assert!(spread.iter().all(|s| s.abs() < 1e-12));
    }

    #[test]
    fn test_spread_constant() {
        let spread = vec![1.0, 1.0, 1.0, 1.0, 1.0];
        let (std_dev, _half_life) = analyze_spread(&spread);
        assert_eq!(std_dev, 0.0);
    }

    #[test]
    fn test_adf_insufficient_data() {
        let spread: Vec<f64> = (0..15).map(|x| x as f64).collect();
        let (stat, is_stationary) = adf_test(&spread);
        assert_eq!(stat, 0.0);
        assert!(!is_stationary);
    }

    #[test]
    fn test_adf_mean_reverting_stationary() {
        // y[t] = 0.3 * y[t-1] + noise reverts hard; expect a clearly
        // negative statistic.
        let mut spread: Vec<f64> = Vec::with_capacity(100);
        let mut current = 10.0;
        for i in 0..100 {
            let noise = ((i * 31) % 11) as f64 / 10.0 - 0.5;
            current = 0.3 * current + noise;
            spread.push(current);
        }
        let (stat, _is_stationary) = adf_test(&spread);
        assert!(
            stat < -1.5,
            "Mean-reverting series should have negative ADF stat, got {:.2}",
            stat
        );
    }

    #[test]
    fn test_adf_constant_series() {
        let spread = vec![5.0; 50];
        let (stat, is_stationary) = adf_test(&spread);
        assert_eq!(stat, 0.0);
        assert!(!is_stationary);
    }

    fn cointegrated_universe() -> HashMap<String, Vec<f64>> {
        let n = 300;
        let mut base = Vec::with_capacity(n);
        for i in 0..n {
            base.push(100.0 + ((i * 7) % 23) as f64 * 0.5);
        }
        let partner: Vec<f64> = base
            .iter()
            .enumerate()
            .map(|(i, p)| 2.0 * p + ((i * 31) % 11) as f64 * 0.05)
            .collect();
        let unrelated: Vec<f64> = (0..n).map(|i| 50.0 + ((i * 13) % 97) as f64).collect();

        let mut prices = HashMap::new();
        prices.insert("AAA".to_string(), base);
        prices.insert("BBB".to_string(), partner);
        prices.insert("ZZZ".to_string(), unrelated);
        prices
    }

    #[test]
    fn test_screen_finds_cointegrated_pair() {
        let prices = cointegrated_universe();
        let config = ScreenConfig {
            min_correlation: 0.9,
            min_half_life_bars: 0.1,
            max_half_life_bars: 60.0,
            ..Default::default()
        };
        let candidates = screen_pairs(&prices, &config).unwrap();

        assert!(!candidates.is_empty());
        let top = &candidates[0];
        assert_eq!(top.symbol_x, "AAA");
        assert_eq!(top.symbol_y, "BBB");
        assert!(top.correlation > 0.9);
    }

    #[test]
    fn test_screen_is_deterministic() {
        let prices = cointegrated_universe();
        let config = ScreenConfig {
            min_correlation: 0.0,
            min_half_life_bars: 0.1,
            max_half_life_bars: 1000.0,
            require_cointegration: false,
            ..Default::default()
        };
        let a = screen_pairs(&prices, &config).unwrap();
        let b = screen_pairs(&prices, &config).unwrap();
        let names_a: Vec<_> = a.iter().map(|c| (&c.symbol_x, &c.symbol_y)).collect();
        let names_b: Vec<_> = b.iter().map(|c| (&c.symbol_x, &c.symbol_y)).collect();
        assert_eq!(names_a, names_b);
    }

    #[test]
    fn test_invalid_config_rejected() {
        let config = ScreenConfig {
            min_correlation: 1.5,
            ..Default::default()
        };
        assert!(config.validate().is_err());

        let config = ScreenConfig {
            min_half_life_bars: 10.0,
            max_half_life_bars: 5.0,
            ..Default::default()
        };
        assert!(config.validate().is_err());
    }
}
