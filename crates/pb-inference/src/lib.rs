//! # pb-inference
//!
//! Probit dose-response inference for quantal bioassays (Finney's method).
//!
//! This crate provides:
//! - Abbott control correction and the empirical probit transform
//! - weighted least squares through the injected [`pb_core::LeastSquaresSolver`]
//! - binomial maximum likelihood (L-BFGS via argmin)
//! - Fieller and profile-likelihood intervals for effective doses
//! - Pearson goodness of fit
//!
//! [`ProbitAnalysis`] runs the whole pipeline and yields a [`ProbitFit`].

#![warn(clippy::all)]

/// End-to-end analysis and the serializable report.
pub mod analysis;
/// Abbott correction and empirical probits.
pub mod correction;
/// Fieller's theorem interval.
pub mod fieller;
/// Pearson goodness of fit.
pub mod gof;
/// Binomial probit maximum likelihood.
pub mod mle;
/// argmin-backed L-BFGS minimizer.
pub mod optimizer;
/// Profile-likelihood scans.
pub mod profile_likelihood;
/// Weighted least squares and the regression table.
pub mod wls;

pub use analysis::{AnalysisConfig, DEFAULT_LEVELS, ProbitAnalysis, ProbitFit, ProbitReport, level_label};
pub use correction::ControlSummary;
pub use mle::{MleFit, ProbitLikelihood, ProbitMle};
pub use optimizer::{LbfgsMinimizer, ObjectiveFunction, OptimizationResult, OptimizerConfig};
pub use profile_likelihood::{ProfileConfig, ProfileLikelihood, ProfilePoint, ProfileScan};
pub use wls::{RegressionSummary, WeightedLeastSquares};
