//! Standard normal distribution utilities.
//!
//! `ppf` is the probit transform Φ⁻¹.

use std::f64::consts::SQRT_2;

use statrs::function::erf::{erfc, erfc_inv};

/// `1 / sqrt(2π)`.
const INV_SQRT_2PI: f64 = 0.398_942_280_401_432_7;

/// Standard normal density φ(z).
#[inline]
pub fn pdf(z: f64) -> f64 {
    (-0.5 * z * z).exp() * INV_SQRT_2PI
}

/// Standard normal CDF Φ(z).
///
/// Uses `erfc` for better tail behavior: `Φ(z) = 0.5 * erfc(-z / sqrt(2))`.
#[inline]
pub fn cdf(z: f64) -> f64 {
    0.5 * erfc(-z / SQRT_2)
}

/// Standard normal quantile Φ⁻¹(p).
///
/// Returns `-inf` / `+inf` at `p = 0` / `p = 1` and NaN outside `[0, 1]`.
pub fn ppf(p: f64) -> f64 {
    if p.is_nan() || !(0.0..=1.0).contains(&p) {
        return f64::NAN;
    }
    if p == 0.0 {
        return f64::NEG_INFINITY;
    }
    if p == 1.0 {
        return f64::INFINITY;
    }
    -SQRT_2 * erfc_inv(2.0 * p)
}
