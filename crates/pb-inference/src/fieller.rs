//! Fieller's theorem interval for `log10(ED)`.

use pb_core::{FittedModel, Result};
use pb_prob::chi_squared;

/// Why a Fieller interval could not be formed.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum FiellerUndefined {
    /// The slope is zero or not finite.
    ZeroSlope,
    /// `g >= 1`: the slope is not significantly different from zero.
    SlopeNotSignificant,
    /// The variance term under the square root is negative.
    NegativeVariance,
    /// A covariance term is degenerate (e.g. zero slope variance from a perfect fit).
    DegenerateCovariance,
}

impl FiellerUndefined {
    /// Human-readable note for the report.
    pub fn note(self) -> &'static str {
        match self {
            Self::ZeroSlope => "Fieller interval undefined: slope is zero",
            Self::SlopeNotSignificant => {
                "Fieller interval undefined: slope not significantly different from zero"
            }
            Self::NegativeVariance => "Fieller interval undefined: negative variance term",
            Self::DegenerateCovariance => {
                "Fieller interval undefined: degenerate slope variance (perfect fit)"
            }
        }
    }
}

/// Fieller bounds in log10-dose space. Both bounds are NaN when `undefined` is set.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FiellerInterval {
    pub lower: f64,
    pub upper: f64,
    pub undefined: Option<FiellerUndefined>,
}

impl FiellerInterval {
    fn undefined(reason: FiellerUndefined) -> Self {
        Self { lower: f64::NAN, upper: f64::NAN, undefined: Some(reason) }
    }
}

/// Fieller interval for `log10(ED)` at confidence `1 - alpha`.
pub fn fieller_log_interval(
    model: &FittedModel,
    target_probit: f64,
    alpha: f64,
) -> Result<FiellerInterval> {
    let chi2 = chi_squared::ppf_df1(1.0 - alpha)?;
    let b = model.slope;
    let c = &model.covariance;

    if b == 0.0 || !b.is_finite() {
        return Ok(FiellerInterval::undefined(FiellerUndefined::ZeroSlope));
    }
    let b2 = b * b;
    let g = chi2 * c.var_slope / b2;
    if !g.is_finite() {
        return Ok(FiellerInterval::undefined(FiellerUndefined::DegenerateCovariance));
    }
    if g >= 1.0 {
        return Ok(FiellerInterval::undefined(FiellerUndefined::SlopeNotSignificant));
    }

    let m = (target_probit - model.intercept) / b;
    let term1 = (m - g * c.cov / c.var_slope) / (1.0 - g);
    let inner = c.var_intercept / b2 + m * m * c.var_slope / b2 - 2.0 * m * c.cov / b2
        + g * (c.var_intercept * c.var_slope - c.cov * c.cov) / (b2 * c.var_slope);
    if !(inner.is_finite() && term1.is_finite()) {
        return Ok(FiellerInterval::undefined(FiellerUndefined::DegenerateCovariance));
    }
    if inner < 0.0 {
        return Ok(FiellerInterval::undefined(FiellerUndefined::NegativeVariance));
    }
    let half = inner.sqrt() / (1.0 - g) * chi2.sqrt();

    Ok(FiellerInterval { lower: term1 - half, upper: term1 + half, undefined: None })
}
