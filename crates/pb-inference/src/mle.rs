//! Binomial maximum likelihood for the probit line.
//!
//! The likelihood uses the corrected counts:
//! `L(a, b) = Σ kᵢ·ln pᵢ + (nᵢ − kᵢ)·ln(1 − pᵢ)`, `pᵢ = Φ(a + b·xᵢ)`, with `pᵢ`
//! clipped to `[1e-10, 1 − 1e-10]`.

use pb_core::{CorrectedObservation, Error, Result};
use pb_prob::{binomial, normal};
use serde::Serialize;

use crate::optimizer::{LbfgsMinimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
use crate::wls::ols_line;

/// Start used when the empirical-probit regression is infeasible.
pub const FALLBACK_START: [f64; 2] = [-1.4, 2.2];

/// Projected-gradient norm (relative to `1 + |LL|`) below which a run that
/// argmin did not flag as converged is still accepted.
const GRAD_ACCEPT: f64 = 1e-3;

/// Binomial probit log-likelihood over corrected observations.
#[derive(Debug, Clone)]
pub struct ProbitLikelihood {
    log_dose: Vec<f64>,
    total: Vec<f64>,
    count: Vec<f64>,
}

impl ProbitLikelihood {
    /// Collect `(log_dose, total, corrected_count)` from the observations.
    pub fn new(observations: &[CorrectedObservation]) -> Self {
        Self {
            log_dose: observations.iter().map(|o| o.log_dose).collect(),
            total: observations.iter().map(|o| o.total as f64).collect(),
            count: observations.iter().map(|o| o.corrected_count as f64).collect(),
        }
    }

    /// Whether there are no dose groups.
    pub fn is_empty(&self) -> bool {
        self.log_dose.is_empty()
    }

    /// Log-likelihood at `(intercept, slope)`.
    pub fn log_likelihood(&self, intercept: f64, slope: f64) -> f64 {
        self.log_dose
            .iter()
            .zip(&self.total)
            .zip(&self.count)
            .map(|((&x, &n), &k)| binomial::loglik_kernel(k, n, normal::cdf(intercept + slope * x)))
            .sum()
    }

    /// Per-group `∂L/∂η` at the linear predictor, paired with the group's log-dose.
    fn eta_scores(&self, intercept: f64, slope: f64) -> impl Iterator<Item = (f64, f64)> + '_ {
        self.log_dose.iter().zip(&self.total).zip(&self.count).map(move |((&x, &n), &k)| {
            let eta = intercept + slope * x;
            let dp = binomial::loglik_kernel_dp(k, n, normal::cdf(eta));
            (x, dp * normal::pdf(eta))
        })
    }

    /// `(∂L/∂a, ∂L/∂b)`.
    pub fn gradient(&self, intercept: f64, slope: f64) -> [f64; 2] {
        self.eta_scores(intercept, slope)
            .fold([0.0, 0.0], |[ga, gb], (x, s)| [ga + s, gb + s * x])
    }

    /// `∂/∂b` of `L(t − b·x₀, b)`: the slope score with the intercept tied to
    /// pass through `(x₀, t)`.
    pub fn pinned_slope_score(&self, target_probit: f64, fixed_log_dose: f64, slope: f64) -> f64 {
        let intercept = target_probit - slope * fixed_log_dose;
        self.eta_scores(intercept, slope).map(|(x, s)| s * (x - fixed_log_dose)).sum()
    }
}

/// `-L(a, b)` over `[a, b]`.
struct NegLogLik<'a>(&'a ProbitLikelihood);

impl ObjectiveFunction for NegLogLik<'_> {
    fn eval(&self, p: &[f64]) -> Result<f64> {
        Ok(-self.0.log_likelihood(p[0], p[1]))
    }

    fn gradient(&self, p: &[f64]) -> Result<Vec<f64>> {
        let [ga, gb] = self.0.gradient(p[0], p[1]);
        Ok(vec![-ga, -gb])
    }
}

/// Result of the binomial MLE.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct MleFit {
    pub intercept: f64,
    pub slope: f64,
    pub max_log_likelihood: f64,
    /// Accepted as converged (argmin status or small gradient).
    pub converged: bool,
    pub n_iter: u64,
    /// `[intercept, slope]` the optimizer started from.
    pub start: [f64; 2],
    /// Norm of the log-likelihood gradient at the optimum.
    pub grad_norm: f64,
}

impl MleFit {
    /// `log10` of the dose at `target_probit` on the MLE line, NaN for a degenerate slope.
    pub fn log_effective_dose(&self, target_probit: f64) -> f64 {
        if self.slope == 0.0 || !self.slope.is_finite() {
            return f64::NAN;
        }
        (target_probit - self.intercept) / self.slope
    }
}

/// Starting point: ordinary regression of the empirical probits on log-dose.
pub fn starting_point(observations: &[CorrectedObservation]) -> [f64; 2] {
    let x: Vec<f64> = observations.iter().map(|o| o.log_dose).collect();
    let y: Vec<f64> = observations.iter().map(|o| o.empirical_probit).collect();
    match ols_line(&x, &y) {
        Some((a, b)) => [a, b],
        None => {
            log::warn!(
                "empirical-probit regression infeasible; starting MLE at ({}, {})",
                FALLBACK_START[0],
                FALLBACK_START[1]
            );
            FALLBACK_START
        }
    }
}

/// Binomial probit maximum-likelihood estimator.
#[derive(Debug, Clone, Default)]
pub struct ProbitMle {
    minimizer: LbfgsMinimizer,
}

impl ProbitMle {
    /// Create an estimator with the given optimizer configuration.
    pub fn new(config: OptimizerConfig) -> Self {
        Self { minimizer: LbfgsMinimizer::new(config) }
    }

    /// The underlying minimizer (shared with the profile scan).
    pub fn minimizer(&self) -> &LbfgsMinimizer {
        &self.minimizer
    }

    /// Maximize the likelihood from [`starting_point`].
    pub fn fit(
        &self,
        likelihood: &ProbitLikelihood,
        observations: &[CorrectedObservation],
    ) -> Result<MleFit> {
        self.fit_from(likelihood, starting_point(observations))
    }

    /// Maximize the likelihood from an explicit start.
    pub fn fit_from(&self, likelihood: &ProbitLikelihood, start: [f64; 2]) -> Result<MleFit> {
        if likelihood.is_empty() {
            return Err(Error::InsufficientData { usable: 0, required: 2 });
        }
        let objective = NegLogLik(likelihood);
        let free = [(f64::NEG_INFINITY, f64::INFINITY); 2];

        let res: OptimizationResult = match self.minimizer.minimize(&objective, &start, &free) {
            Ok(r) if r.fval.is_finite() => r,
            Ok(r) => {
                log::warn!("L-BFGS ended at a non-finite likelihood ({}); retrying with Nelder-Mead", r);
                self.minimizer.minimize_nelder_mead(&objective, &start, 0.5)?
            }
            Err(e) => {
                log::warn!("L-BFGS failed ({}); retrying with Nelder-Mead", e);
                self.minimizer.minimize_nelder_mead(&objective, &start, 0.5)?
            }
        };

        let (intercept, slope) = (res.parameters[0], res.parameters[1]);
        let max_ll = -res.fval;
        if !(intercept.is_finite() && slope.is_finite() && max_ll.is_finite()) {
            return Err(Error::NonConvergentOptimization(format!(
                "MLE ended at a non-finite point (a={}, b={}, LL={})",
                intercept, slope, max_ll
            )));
        }

        let [ga, gb] = likelihood.gradient(intercept, slope);
        let grad_norm = (ga * ga + gb * gb).sqrt();
        let small_gradient = grad_norm <= GRAD_ACCEPT * (1.0 + max_ll.abs());
        if !res.converged && !small_gradient {
            return Err(Error::NonConvergentOptimization(format!(
                "MLE did not converge after {} iterations (|grad| = {:.3e}): {}",
                res.n_iter, grad_norm, res.message
            )));
        }

        log::debug!(
            "probit MLE: a={:.6}, b={:.6}, LL={:.6}, iters={}, |grad|={:.2e}",
            intercept,
            slope,
            max_ll,
            res.n_iter,
            grad_norm
        );

        Ok(MleFit {
            intercept,
            slope,
            max_log_likelihood: max_ll,
            converged: res.converged || small_gradient,
            n_iter: res.n_iter,
            start,
            grad_norm,
        })
    }
}
