//! Kalman filters for dynamic hedge ratio estimation.
//!
//! Tracks the linear relationship between two assets in a pairs trading
//! strategy, adapting to changing cointegration relationships bar by bar.
//!
//! # Mathematical Model
//!
//! **State equation** (random walk):
//! ```text
//! [α, β][t] = [α, β][t-1] + w,  where w ~ N(0, Q)
//! ```
//!
//! **Observation equation**:
//! ```text
//! y[t] = α[t] + β[t] * x[t] + v,  where v ~ N(0, R)
//! ```
//!
//! Where:
//! - `y[t]` is the dependent asset price
//! - `x[t]` is the independent asset price
//! - `α[t]` is the intercept and `β[t]` the hedge ratio being estimated
//! - `Q` is process noise (how fast the relationship drifts)
//! - `R` is observation noise (measurement uncertainty)
//!
//! Two variants are provided behind the [`HedgeEstimator`] trait:
//! [`KalmanHedgeFilter`] carries the full (intercept, slope) state with a
//! 2x2 covariance; [`ScalarKalmanFilter`] drops the intercept and runs the
//! same recursion on a 1x1 covariance.
//!
//! Neither filter stores history. Callers that need the hedge ratio
//! trajectory capture each [`HedgeEstimator::update`] return value into
//! their own sequence, which keeps the filter O(1) in memory and decouples
//! it from reporting.
//!
//! # References
//!
//! - Chan, E. (2013). "Algorithmic Trading: Winning Strategies and Their Rationale"

use thiserror::Error;

/// Floor applied to covariance diagonal entries after each update.
/// f64 rounding can push a mathematically non-negative variance slightly
/// below zero; anything below `-COV_TOLERANCE` is a genuine failure.
const COV_TOLERANCE: f64 = 1e-9;

/// Errors surfaced by the filters.
///
/// With positive noise parameters the recursion cannot degenerate on
/// finite input, so any of these indicates bad data (NaN/Inf prices) or a
/// configuration that broke the arithmetic. Retrying with identical input
/// cannot help; the run must be aborted.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum FilterError {
    /// Covariance or innovation covariance became non-positive, or a
    /// non-finite value entered the recursion.
    #[error("numerical instability: {0}")]
    NumericalInstability(String),
}

/// One filtered estimate of the pair relationship.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct HedgeEstimate {
    /// Intercept α (always 0.0 for the scalar variant).
    pub intercept: f64,
    /// Hedge ratio β.
    pub hedge_ratio: f64,
}

/// Common contract for the hedge ratio filters.
///
/// `predict` advances the covariance under the random-walk process model;
/// `update` folds in one observation pair and returns the new estimate.
/// [`HedgeEstimator::step`] chains the two, which is the per-bar call the
/// simulator makes.
pub trait HedgeEstimator {
    /// Advance the state one step under the process model. The state
    /// itself is unchanged (identity transition); only uncertainty grows.
    fn predict(&mut self);

    /// Incorporate a new observation pair and return the updated estimate.
    fn update(&mut self, x_obs: f64, y_obs: f64) -> Result<HedgeEstimate, FilterError>;

    /// One full predict-then-update cycle for a single bar.
    fn step(&mut self, x_obs: f64, y_obs: f64) -> Result<HedgeEstimate, FilterError> {
        self.predict();
        self.update(x_obs, y_obs)
    }

    /// Trace of the state covariance, a scalar proxy for estimation
    /// uncertainty. Useful for convergence diagnostics.
    fn covariance_trace(&self) -> f64;
}

fn check_observation(x_obs: f64, y_obs: f64) -> Result<(), FilterError> {
    if !x_obs.is_finite() || !y_obs.is_finite() {
        return Err(FilterError::NumericalInstability(format!(
            "non-finite observation pair ({x_obs}, {y_obs})"
        )));
    }
    Ok(())
}

/// Two-state Kalman filter estimating (intercept, hedge ratio).
///
/// The default prior is state `(0, 1)` with covariance `100·I`: effectively
/// uninformative, so the first few observations dominate and the filter
/// converges quickly before process noise takes over.
#[derive(Debug, Clone)]
pub struct KalmanHedgeFilter {
    /// State vector (intercept, slope).
    state: [f64; 2],
    /// Symmetric 2x2 state covariance P.
    cov: [[f64; 2]; 2],
    /// Process noise q, added to both diagonal entries at predict time.
    process_noise: f64,
    /// Measurement noise r.
    measurement_noise: f64,
}

impl KalmanHedgeFilter {
    /// Create a filter with the standard uninformative prior.
    ///
    /// `process_noise` and `measurement_noise` must be strictly positive;
    /// the backtest configuration validates this before any filter is
    /// constructed.
    pub fn new(process_noise: f64, measurement_noise: f64) -> Self {
        Self::with_prior(0.0, 1.0, 100.0, process_noise, measurement_noise)
    }

    /// Create a filter with an explicit prior state and prior variance
    /// (applied to both diagonal covariance entries).
    pub fn with_prior(
        intercept: f64,
        hedge_ratio: f64,
        prior_variance: f64,
        process_noise: f64,
        measurement_noise: f64,
    ) -> Self {
        Self {
            state: [intercept, hedge_ratio],
            cov: [[prior_variance, 0.0], [0.0, prior_variance]],
            process_noise,
            measurement_noise,
        }
    }

    /// Current intercept estimate.
    #[inline]
    pub fn intercept(&self) -> f64 {
        self.state[0]
    }

    /// Current hedge ratio estimate.
    #[inline]
    pub fn hedge_ratio(&self) -> f64 {
        self.state[1]
    }
}

impl HedgeEstimator for KalmanHedgeFilter {
    fn predict(&mut self) {
        // Identity transition: P = P + Q with Q = q·I.
        self.cov[0][0] += self.process_noise;
        self.cov[1][1] += self.process_noise;
    }

    fn update(&mut self, x_obs: f64, y_obs: f64) -> Result<HedgeEstimate, FilterError> {
        check_observation(x_obs, y_obs)?;

        let p = self.cov;

        // Observation row H = [1, x]. Innovation covariance is the scalar
        // S = H·P·Hᵗ + r.
        let s = p[0][0] + x_obs * (p[0][1] + p[1][0]) + x_obs * x_obs * p[1][1]
            + self.measurement_noise;
        if !s.is_finite() || s <= 0.0 {
            return Err(FilterError::NumericalInstability(format!(
                "innovation covariance S = {s} is not positive"
            )));
        }

        // Gain K = P·Hᵗ / S.
        let k0 = (p[0][0] + x_obs * p[0][1]) / s;
        let k1 = (p[1][0] + x_obs * p[1][1]) / s;

        let residual = y_obs - (self.state[0] + self.state[1] * x_obs);
        self.state[0] += k0 * residual;
        self.state[1] += k1 * residual;

        // P = (I - K·H)·P, expanded for the 2x2 case.
        let a00 = 1.0 - k0;
        let a01 = -k0 * x_obs;
        let a10 = -k1;
        let a11 = 1.0 - k1 * x_obs;

        let q00 = a00 * p[0][0] + a01 * p[1][0];
        let q01 = a00 * p[0][1] + a01 * p[1][1];
        let q10 = a10 * p[0][0] + a11 * p[1][0];
        let q11 = a10 * p[0][1] + a11 * p[1][1];

        // The exact result is symmetric; rounding skew is averaged away so
        // the PSD invariant survives long runs.
        let off = 0.5 * (q01 + q10);

        if !(q00.is_finite() && q11.is_finite() && off.is_finite())
            || q00 < -COV_TOLERANCE
            || q11 < -COV_TOLERANCE
        {
            return Err(FilterError::NumericalInstability(format!(
                "covariance left the PSD cone: diag = ({q00}, {q11})"
            )));
        }

        self.cov = [[q00.max(0.0), off], [off, q11.max(0.0)]];

        if !self.state[0].is_finite() || !self.state[1].is_finite() {
            return Err(FilterError::NumericalInstability(format!(
                "state became non-finite: ({}, {})",
                self.state[0], self.state[1]
            )));
        }

        Ok(HedgeEstimate {
            intercept: self.state[0],
            hedge_ratio: self.state[1],
        })
    }

    fn covariance_trace(&self) -> f64 {
        self.cov[0][0] + self.cov[1][1]
    }
}

/// Single-state variant: hedge ratio only, no intercept.
///
/// Same recursion as [`KalmanHedgeFilter`] with `H = x` and a scalar
/// covariance. Appropriate when the pair is believed to trade through the
/// origin, or when one fewer degree of freedom is worth the bias.
#[derive(Debug, Clone)]
pub struct ScalarKalmanFilter {
    beta: f64,
    variance: f64,
    process_noise: f64,
    measurement_noise: f64,
}

impl ScalarKalmanFilter {
    /// Create a filter starting from `initial_beta` with prior variance
    /// 100, matching the two-state prior.
    pub fn new(initial_beta: f64, process_noise: f64, measurement_noise: f64) -> Self {
        Self {
            beta: initial_beta,
            variance: 100.0,
            process_noise,
            measurement_noise,
        }
    }

    /// Current hedge ratio estimate.
    #[inline]
    pub fn hedge_ratio(&self) -> f64 {
        self.beta
    }
}

impl HedgeEstimator for ScalarKalmanFilter {
    fn predict(&mut self) {
        self.variance += self.process_noise;
    }

    fn update(&mut self, x_obs: f64, y_obs: f64) -> Result<HedgeEstimate, FilterError> {
        check_observation(x_obs, y_obs)?;

        // H = x, so S = x²·P + r.
        let s = x_obs * x_obs * self.variance + self.measurement_noise;
        if !s.is_finite() || s <= 0.0 {
            return Err(FilterError::NumericalInstability(format!(
                "innovation covariance S = {s} is not positive"
            )));
        }

        let gain = self.variance * x_obs / s;
        let residual = y_obs - self.beta * x_obs;

        self.beta += gain * residual;
        self.variance = ((1.0 - gain * x_obs) * self.variance).max(0.0);

        if !self.beta.is_finite() || !self.variance.is_finite() {
            return Err(FilterError::NumericalInstability(format!(
                "state became non-finite: beta = {}, variance = {}",
                self.beta, self.variance
            )));
        }

        Ok(HedgeEstimate {
            intercept: 0.0,
            hedge_ratio: self.beta,
        })
    }

    fn covariance_trace(&self) -> f64 {
        self.variance
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn two_state_converges_to_true_relationship() {
        // Simulate: y = 5.0 + 2.0 * x + noise
        let mut filter = KalmanHedgeFilter::new(1e-5, 1e-3);

        for i in 0..1000 {
            let x = 100.0 + (i as f64 * 0.1);
            let noise = ((i * 17) % 11) as f64 / 100.0 - 0.05; // Deterministic pseudo-noise
            let y = 5.0 + 2.0 * x + noise;
            filter.step(x, y).unwrap();
        }

        assert!(
            (filter.hedge_ratio() - 2.0).abs() < 0.05,
            "hedge ratio should converge to 2.0, got {}",
            filter.hedge_ratio()
        );
    }

    #[test]
    fn scalar_converges_to_true_beta() {
        let true_beta = 0.8;
        let mut filter = ScalarKalmanFilter::new(1.0, 1e-5, 1e-3);

        for i in 0..1000 {
            let x = 100.0 + (i as f64 * 0.1);
            let noise = ((i * 17) % 11) as f64 / 100.0 - 0.05;
            let y = true_beta * x + noise;
            filter.step(x, y).unwrap();
        }

        assert!(
            (filter.hedge_ratio() - true_beta).abs() < 0.05,
            "expected ~{}, got {}",
            true_beta,
            filter.hedge_ratio()
        );
    }

    #[test]
    fn two_state_tracks_drifting_beta() {
        let mut filter = KalmanHedgeFilter::new(1e-4, 1e-3); // Higher q for faster tracking

        for i in 0..500 {
            let x = 100.0 + (i as f64 * 0.01);
            filter.step(x, 1.0 * x).unwrap();
        }
        assert!(
            (filter.hedge_ratio() - 1.0).abs() < 0.1,
            "should track beta=1.0, got {}",
            filter.hedge_ratio()
        );

        // Regime shift.
        for i in 0..500 {
            let x = 100.0 + (i as f64 * 0.01);
            filter.step(x, 1.5 * x).unwrap();
        }
        assert!(
            (filter.hedge_ratio() - 1.5).abs() < 0.1,
            "should adapt to beta=1.5, got {}",
            filter.hedge_ratio()
        );
    }

    #[test]
    fn covariance_trace_never_increases_on_repeated_observation() {
        // Update only: predict() re-inflates the covariance by q, so the
        // monotonicity invariant belongs to the measurement step.
        let mut filter = KalmanHedgeFilter::new(1e-5, 1e-3);
        let mut previous = filter.covariance_trace();

        for _ in 0..200 {
            filter.update(100.0, 200.0).unwrap();
            let trace = filter.covariance_trace();
            assert!(
                trace <= previous + 1e-12,
                "trace increased: {} -> {}",
                previous,
                trace
            );
            previous = trace;
        }
    }

    #[test]
    fn non_finite_input_is_rejected() {
        let mut filter = KalmanHedgeFilter::new(1e-5, 1e-3);
        assert!(filter.step(f64::NAN, 100.0).is_err());
        assert!(filter.step(100.0, f64::INFINITY).is_err());

        let mut scalar = ScalarKalmanFilter::new(1.0, 1e-5, 1e-3);
        assert!(scalar.step(f64::NEG_INFINITY, 100.0).is_err());
    }

    #[test]
    fn filter_state_survives_rejected_observation() {
        let mut filter = KalmanHedgeFilter::new(1e-5, 1e-3);
        for i in 0..50 {
            let x = 100.0 + i as f64;
            filter.step(x, 2.0 * x).unwrap();
        }
        let beta_before = filter.hedge_ratio();

        // The error path must not corrupt the recursion.
        assert!(filter.update(f64::NAN, 1.0).is_err());
        let est = filter.step(150.0, 300.0).unwrap();
        assert!((est.hedge_ratio - beta_before).abs() < 0.1);
    }

    #[test]
    fn intercept_is_recovered() {
        let mut filter = KalmanHedgeFilter::new(1e-6, 1e-4);
        for i in 0..2000 {
            let x = 50.0 + ((i * 13) % 97) as f64; // Varying design keeps both states observable
            let y = 10.0 + 0.5 * x;
            filter.step(x, y).unwrap();
        }
        assert!(
            (filter.intercept() - 10.0).abs() < 0.5,
            "intercept should converge to 10.0, got {}",
            filter.intercept()
        );
        assert!((filter.hedge_ratio() - 0.5).abs() < 0.01);
    }

    #[test]
    fn scalar_zero_x_keeps_s_positive() {
        // x = 0 makes the design row vanish; S = r keeps the update defined.
        let mut filter = ScalarKalmanFilter::new(1.0, 1e-5, 1e-3);
        let est = filter.step(0.0, 100.0).unwrap();
        assert_eq!(est.hedge_ratio, 1.0);
    }
}
