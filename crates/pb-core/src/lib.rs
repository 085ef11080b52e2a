//! # pb-core
//!
//! Core types for probitstat.
//!
//! This crate holds the pieces shared by every other crate in the workspace:
//! - the error taxonomy ([`Error`], [`Result`])
//! - the request-scoped data model ([`Trial`], [`CorrectedObservation`], [`FittedModel`], ...)
//! - the [`LeastSquaresSolver`] seam used to inject the weighted regression backend
//! - table input (CSV / JSON rows)

#![warn(missing_docs)]
#![warn(clippy::all)]

pub mod error;
pub mod table;
pub mod traits;
pub mod types;

pub use error::{Error, Result};
pub use traits::LeastSquaresSolver;
pub use types::{
    Covariance2, CorrectedObservation, DoseGroup, EffectiveDoseEstimate, FittedModel,
    GoodnessOfFit, Trial, WeightedFit,
};

/// Crate version, shared by the CLI and server for `version` / `/v1/health`.
pub const VERSION: &str = env!("CARGO_PKG_VERSION");
