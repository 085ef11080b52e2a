//! Student-t distribution utilities.

use pb_core::{Error, Result};
use statrs::distribution::{ContinuousCDF, StudentsT};
use statrs::function::beta::beta_reg;

/// Two-sided p-value `P(|T| > |t|)` for `T ~ t(df)`.
///
/// Uses `P(|T| > |t|) = I_{df/(df+t²)}(df/2, 1/2)`. NaN for `df <= 0` or NaN `t`.
pub fn two_sided_p(t: f64, df: f64) -> f64 {
    if t.is_nan() || !(df.is_finite() && df > 0.0) {
        return f64::NAN;
    }
    if t.is_infinite() {
        return 0.0;
    }
    let x = df / (df + t * t);
    beta_reg(0.5 * df, 0.5, x)
}

/// Quantile of the standard Student-t distribution with `df` degrees of freedom.
pub fn ppf(q: f64, df: f64) -> Result<f64> {
    if !(q.is_finite() && q > 0.0 && q < 1.0) {
        return Err(Error::Validation(format!("Student-t quantile needs q in (0,1), got {}", q)));
    }
    if !(df.is_finite() && df > 0.0) {
        return Err(Error::Validation(format!("Student-t df must be finite and > 0, got {}", df)));
    }
    let dist = StudentsT::new(0.0, 1.0, df)
        .map_err(|e| Error::Computation(format!("Student-t df={}: {}", df, e)))?;
    Ok(dist.inverse_cdf(q))
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_two_sided_p_known_values() {
        // t(1) is Cauchy: P(|T| > 1) = 0.5.
        assert_relative_eq!(two_sided_p(1.0, 1.0), 0.5, epsilon = 1e-12);
        assert_relative_eq!(two_sided_p(0.0, 5.0), 1.0, epsilon = 1e-12);
        assert_relative_eq!(two_sided_p(2.570_581_835_636_314, 5.0), 0.05, epsilon = 1e-8);
        assert_relative_eq!(two_sided_p(-2.0, 7.0), two_sided_p(2.0, 7.0), epsilon = 1e-15);
    }

    #[test]
    fn test_ppf_known_values() {
        assert_relative_eq!(ppf(0.975, 5.0).unwrap(), 2.570_581_835_636_314, epsilon = 1e-8);
        assert_relative_eq!(ppf(0.025, 5.0).unwrap(), -2.570_581_835_636_314, epsilon = 1e-8);
        assert_relative_eq!(ppf(0.975, 2.0).unwrap(), 4.302_652_729_749_464, epsilon = 1e-8);
        assert_relative_eq!(ppf(0.5, 3.0).unwrap(), 0.0, epsilon = 1e-9);
    }

    #[test]
    fn test_invalid_params() {
        assert!(two_sided_p(1.0, 0.0).is_nan());
        assert!(ppf(0.975, 0.0).is_err());
        assert!(ppf(1.0, 3.0).is_err());
    }
}
