//! Probability building blocks for probitstat.
//!
//! This crate hosts the small set of distribution functions the probit
//! workflow needs:
//! - standard normal density / CDF / quantile (the probit transform)
//! - chi-square quantiles and tail probabilities (Fieller, profile threshold, GOF)
//! - Student-t quantiles and p-values (WLS summary, confidence bands)
//! - the binomial log-likelihood kernel
//! - numeric helpers (probability clipping, banker's rounding)

pub mod binomial;
pub mod chi_squared;
pub mod math;
pub mod normal;
pub mod student_t;
