//! Optimization algorithms
//!
//! Thin wrappers around argmin: box-constrained L-BFGS (bounds via clamping)
//! for the probit likelihood and its slope profile, and Nelder-Mead as a
//! derivative-free fallback.

use std::fmt;
use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};

use argmin::core::{CostFunction, Executor, Gradient, State, TerminationReason, TerminationStatus};
use argmin::solver::linesearch::MoreThuenteLineSearch;
use argmin::solver::neldermead::NelderMead;
use argmin::solver::quasinewton::LBFGS;
use pb_core::{Error, Result};

/// Configuration for the L-BFGS minimizer
#[derive(Debug, Clone)]
pub struct OptimizerConfig {
    /// Maximum number of iterations
    pub max_iter: u64,
    /// Convergence tolerance for the gradient norm
    pub tol: f64,
    /// Number of corrections kept for the inverse-Hessian approximation
    pub m: usize,
}

impl Default for OptimizerConfig {
    fn default() -> Self {
        Self { max_iter: 1000, tol: 1e-6, m: 10 }
    }
}

impl OptimizerConfig {
    /// Reject configurations argmin cannot run with.
    pub fn validate(&self) -> Result<()> {
        if self.max_iter == 0 {
            return Err(Error::Validation("optimizer max_iter must be > 0".to_string()));
        }
        if !(self.tol.is_finite() && self.tol >= 0.0) {
            return Err(Error::Validation(format!(
                "optimizer tol must be finite and >= 0, got {}",
                self.tol
            )));
        }
        if self.m == 0 {
            return Err(Error::Validation("optimizer history size m must be > 0".to_string()));
        }
        Ok(())
    }
}

/// Result of a minimization
#[derive(Debug, Clone)]
pub struct OptimizationResult {
    /// Best parameters (already clamped to the bounds)
    pub parameters: Vec<f64>,
    /// Objective value at `parameters`
    pub fval: f64,
    /// Solver iterations
    pub n_iter: u64,
    /// Objective evaluations
    pub n_fev: usize,
    /// Gradient evaluations
    pub n_gev: usize,
    /// Whether argmin reported convergence
    pub converged: bool,
    /// L2 norm of the projected gradient at `parameters` (NaN for derivative-free runs)
    pub grad_norm: f64,
    /// Termination message
    pub message: String,
}

impl fmt::Display for OptimizationResult {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "OptimizationResult(fval={:.6}, n_iter={}, n_fev={}, n_gev={}, converged={}, |g|={:.3e})",
            self.fval, self.n_iter, self.n_fev, self.n_gev, self.converged, self.grad_norm
        )
    }
}

/// Objective function trait for minimization
pub trait ObjectiveFunction: Send + Sync {
    /// Evaluate the objective at `params`
    fn eval(&self, params: &[f64]) -> Result<f64>;

    /// Gradient at `params` (central differences unless overridden)
    fn gradient(&self, params: &[f64]) -> Result<Vec<f64>> {
        let mut grad = vec![0.0; params.len()];
        let mut work = params.to_vec();
        for i in 0..params.len() {
            let h = 1e-7 * params[i].abs().max(1.0);
            work[i] = params[i] + h;
            let f_plus = self.eval(&work)?;
            work[i] = params[i] - h;
            let f_minus = self.eval(&work)?;
            work[i] = params[i];
            grad[i] = (f_plus - f_minus) / (2.0 * h);
        }
        Ok(grad)
    }
}

fn clamp_params(params: &[f64], bounds: &[(f64, f64)]) -> Vec<f64> {
    params.iter().zip(bounds).map(|(&v, &(lo, hi))| v.clamp(lo, hi)).collect()
}

/// Zero gradient components that point out of an active bound.
fn project_gradient(params: &[f64], grad: &mut [f64], bounds: &[(f64, f64)]) {
    const EPS: f64 = 1e-12;
    for ((&x, g), &(lo, hi)) in params.iter().zip(grad.iter_mut()).zip(bounds) {
        if (x <= lo + EPS && *g > 0.0) || (x >= hi - EPS && *g < 0.0) {
            *g = 0.0;
        }
    }
}

#[derive(Default)]
struct EvalCounts {
    cost: AtomicUsize,
    grad: AtomicUsize,
}

/// Adapter from [`ObjectiveFunction`] to argmin's problem traits.
struct Problem<'a> {
    objective: &'a dyn ObjectiveFunction,
    bounds: &'a [(f64, f64)],
    counts: Arc<EvalCounts>,
}

impl CostFunction for Problem<'_> {
    type Param = Vec<f64>;
    type Output = f64;

    fn cost(&self, params: &Self::Param) -> std::result::Result<f64, argmin::core::Error> {
        self.counts.cost.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        self.objective.eval(&clamped).map_err(|e| argmin::core::Error::msg(e.to_string()))
    }
}

impl Gradient for Problem<'_> {
    type Param = Vec<f64>;
    type Gradient = Vec<f64>;

    fn gradient(&self, params: &Self::Param) -> std::result::Result<Vec<f64>, argmin::core::Error> {
        self.counts.grad.fetch_add(1, Ordering::Relaxed);
        let clamped = clamp_params(params, self.bounds);
        let mut g = self
            .objective
            .gradient(&clamped)
            .map_err(|e| argmin::core::Error::msg(e.to_string()))?;
        project_gradient(&clamped, &mut g, self.bounds);
        Ok(g)
    }
}

fn is_converged(status: &TerminationStatus) -> bool {
    matches!(
        status,
        TerminationStatus::Terminated(TerminationReason::SolverConverged)
            | TerminationStatus::Terminated(TerminationReason::TargetCostReached)
    )
}

/// L-BFGS minimizer with box constraints applied by clamping
#[derive(Debug, Clone, Default)]
pub struct LbfgsMinimizer {
    config: OptimizerConfig,
}

impl LbfgsMinimizer {
    /// Create a minimizer with the given configuration
    pub fn new(config: OptimizerConfig) -> Self {
        Self { config }
    }

    /// Access the configuration.
    pub fn config(&self) -> &OptimizerConfig {
        &self.config
    }

    /// Minimize `objective` from `init` subject to `bounds` (use infinities for free parameters).
    pub fn minimize(
        &self,
        objective: &dyn ObjectiveFunction,
        init: &[f64],
        bounds: &[(f64, f64)],
    ) -> Result<OptimizationResult> {
        if init.len() != bounds.len() {
            return Err(Error::Validation(format!(
                "parameter and bounds length mismatch: {} != {}",
                init.len(),
                bounds.len()
            )));
        }

        let counts = Arc::new(EvalCounts::default());
        let problem = Problem { objective, bounds, counts: Arc::clone(&counts) };

        // Stop on a stalled objective long before the line search starts failing.
        let tol_cost = if self.config.tol == 0.0 { 0.0 } else { 1e-12 };
        let solver = LBFGS::new(MoreThuenteLineSearch::new(), self.config.m)
            .with_tolerance_grad(self.config.tol)
            .map_err(|e| Error::Validation(format!("invalid optimizer tolerance: {e}")))?
            .with_tolerance_cost(tol_cost)
            .map_err(|e| Error::Validation(format!("invalid optimizer cost tolerance: {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.param(clamp_params(init, bounds)).max_iters(self.config.max_iter))
            .run()
            .map_err(|e| Error::Computation(format!("L-BFGS failed: {e}")))?;

        let state = res.state();
        let best = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("L-BFGS returned no parameters".to_string()))?;
        let parameters = clamp_params(best, bounds);
        let fval = state.get_best_cost();
        let status = state.get_termination_status();

        let mut grad = objective.gradient(&parameters)?;
        project_gradient(&parameters, &mut grad, bounds);
        let grad_norm = grad.iter().map(|g| g * g).sum::<f64>().sqrt();

        Ok(OptimizationResult {
            parameters,
            fval,
            n_iter: state.get_iter(),
            n_fev: counts.cost.load(Ordering::Relaxed),
            n_gev: counts.grad.load(Ordering::Relaxed),
            converged: is_converged(status),
            grad_norm,
            message: status.to_string(),
        })
    }

    /// Derivative-free Nelder-Mead minimization (unbounded).
    ///
    /// The initial simplex is `init` plus one vertex per coordinate offset by `step`.
    pub fn minimize_nelder_mead(
        &self,
        objective: &dyn ObjectiveFunction,
        init: &[f64],
        step: f64,
    ) -> Result<OptimizationResult> {
        let bounds = vec![(f64::NEG_INFINITY, f64::INFINITY); init.len()];
        let counts = Arc::new(EvalCounts::default());
        let problem = Problem { objective, bounds: &bounds, counts: Arc::clone(&counts) };

        let mut simplex = vec![init.to_vec()];
        for i in 0..init.len() {
            let mut vertex = init.to_vec();
            vertex[i] += step;
            simplex.push(vertex);
        }
        let solver = NelderMead::new(simplex)
            .with_sd_tolerance(1e-12)
            .map_err(|e| Error::Validation(format!("invalid Nelder-Mead tolerance: {e}")))?;

        let res = Executor::new(problem, solver)
            .configure(|state| state.max_iters(self.config.max_iter.max(2000)))
            .run()
            .map_err(|e| Error::Computation(format!("Nelder-Mead failed: {e}")))?;

        let state = res.state();
        let parameters = state
            .get_best_param()
            .ok_or_else(|| Error::Computation("Nelder-Mead returned no parameters".to_string()))?
            .clone();
        let status = state.get_termination_status();

        Ok(OptimizationResult {
            fval: state.get_best_cost(),
            parameters,
            n_iter: state.get_iter(),
            n_fev: counts.cost.load(Ordering::Relaxed),
            n_gev: 0,
            converged: is_converged(status),
            grad_norm: f64::NAN,
            message: status.to_string(),
        })
    }
}
