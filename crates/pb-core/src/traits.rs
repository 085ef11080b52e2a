//! Core traits for probitstat
//!
//! The weighted regression of empirical probits on log-dose is injected
//! through [`LeastSquaresSolver`], so the inference layer does not depend on a
//! concrete linear-algebra backend.

use crate::Result;
use crate::types::WeightedFit;

/// Weighted straight-line least squares: `y = intercept + slope · x`.
///
/// Contract:
/// - rows where `x`, `y` or `w` is NaN/Inf are dropped before fitting
/// - fewer than 2 remaining rows is [`crate::Error::InsufficientData`]
/// - the returned covariance is that of `(intercept, slope)`
pub trait LeastSquaresSolver: Send + Sync {
    /// Fit the weighted line.
    fn solve(&self, x: &[f64], y: &[f64], weights: &[f64]) -> Result<WeightedFit>;

    /// Backend name, reported in logs.
    fn name(&self) -> &str;
}
