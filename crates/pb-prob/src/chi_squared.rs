//! Chi-square distribution utilities.

use pb_core::{Error, Result};
use statrs::function::gamma::gamma_ur;

use crate::normal;

/// Quantile of χ²(1) at probability `q`, via `χ²₁(q) = Φ⁻¹((1+q)/2)²`.
///
/// statrs' `ChiSquared::inverse_cdf` is only good to about 1e-5 here, which
/// shows up directly in the Fieller and profile thresholds.
pub fn ppf_df1(q: f64) -> Result<f64> {
    if !(q.is_finite() && (0.0..1.0).contains(&q)) {
        return Err(Error::Validation(format!("chi-square quantile needs q in [0,1), got {}", q)));
    }
    let z = normal::ppf(0.5 * (1.0 + q));
    Ok(z * z)
}

/// Upper tail `P(X > x)` of χ²(df).
///
/// Returns NaN for non-finite statistics or `df <= 0`.
pub fn sf(x: f64, df: f64) -> f64 {
    if x.is_nan() || !(df.is_finite() && df > 0.0) {
        return f64::NAN;
    }
    if x <= 0.0 {
        return 1.0;
    }
    if x.is_infinite() {
        return 0.0;
    }
    // P(X > x) = Q(df/2, x/2), the regularized upper incomplete gamma.
    gamma_ur(0.5 * df, 0.5 * x)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_ppf_df1() {
        assert_relative_eq!(ppf_df1(0.95).unwrap(), 3.841_458_820_694_124, epsilon = 1e-8);
        assert_relative_eq!(ppf_df1(0.99).unwrap(), 6.634_896_601_021_214, epsilon = 1e-8);
        assert_relative_eq!(ppf_df1(0.0).unwrap(), 0.0, epsilon = 1e-15);
    }

    #[test]
    fn test_sf_known_values() {
        assert_relative_eq!(sf(3.841_458_820_694_124, 1.0), 0.05, epsilon = 1e-10);
        // df = 2 is exponential with mean 2.
        assert_relative_eq!(sf(4.0, 2.0), (-2.0f64).exp(), epsilon = 1e-12);
        assert_eq!(sf(0.0, 2.0), 1.0);
        assert_eq!(sf(f64::INFINITY, 2.0), 0.0);
    }

    #[test]
    fn test_invalid_inputs() {
        assert!(ppf_df1(1.0).is_err());
        assert!(ppf_df1(f64::NAN).is_err());
        assert!(sf(1.0, 0.0).is_nan());
        assert!(sf(f64::NAN, 1.0).is_nan());
    }
}
