//! Common data types for probitstat
//!
//! Everything here is request-scoped: built once per analysis, never mutated
//! after construction and never shared between requests.

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// One row of a quantal bioassay table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct DoseGroup {
    /// Dose / concentration. `0` marks the control group.
    pub dose: f64,
    /// Subjects tested.
    pub total: u64,
    /// Responders (deaths).
    pub response: u64,
}

impl DoseGroup {
    /// Create a dose group without validation.
    pub fn new(dose: f64, total: u64, response: u64) -> Self {
        Self { dose, total, response }
    }

    /// Whether this row is the control group (`dose == 0`).
    pub fn is_control(&self) -> bool {
        self.dose == 0.0
    }

    /// Observed response proportion `response / total`.
    pub fn proportion(&self) -> f64 {
        self.response as f64 / self.total as f64
    }
}

/// Validated bioassay table.
///
/// Invariants: non-empty, every dose finite and `>= 0`, at most one control
/// row (`dose == 0`), `total > 0`, `response <= total`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(try_from = "Vec<DoseGroup>", into = "Vec<DoseGroup>")]
pub struct Trial {
    groups: Vec<DoseGroup>,
}

impl Trial {
    /// Validate and wrap a sequence of dose groups. Row order is preserved.
    pub fn new(groups: Vec<DoseGroup>) -> Result<Self> {
        if groups.is_empty() {
            return Err(Error::Validation("trial table must contain at least one row".to_string()));
        }
        let mut n_control = 0usize;
        for (i, g) in groups.iter().enumerate() {
            if !g.dose.is_finite() {
                return Err(Error::Validation(format!("row {}: dose must be finite, got {}", i, g.dose)));
            }
            if g.dose < 0.0 {
                return Err(Error::Validation(format!("row {}: dose must be >= 0, got {}", i, g.dose)));
            }
            if g.total == 0 {
                return Err(Error::Validation(format!("row {}: total must be > 0", i)));
            }
            if g.response > g.total {
                return Err(Error::Validation(format!(
                    "row {}: response ({}) exceeds total ({})",
                    i, g.response, g.total
                )));
            }
            if g.is_control() {
                n_control += 1;
            }
        }
        if n_control > 1 {
            return Err(Error::Validation(format!(
                "at most one control row (dose == 0) is allowed, found {}",
                n_control
            )));
        }
        Ok(Self { groups })
    }

    /// All rows, in input order.
    pub fn groups(&self) -> &[DoseGroup] {
        &self.groups
    }

    /// The control row, if present.
    pub fn control(&self) -> Option<&DoseGroup> {
        self.groups.iter().find(|g| g.is_control())
    }

    /// Non-control rows, in input order.
    pub fn treated(&self) -> impl Iterator<Item = &DoseGroup> {
        self.groups.iter().filter(|g| !g.is_control())
    }

    /// Control-group mortality `response / total`, if a control row exists.
    pub fn control_mortality(&self) -> Option<f64> {
        self.control().map(DoseGroup::proportion)
    }
}

impl TryFrom<Vec<DoseGroup>> for Trial {
    type Error = Error;

    fn try_from(groups: Vec<DoseGroup>) -> Result<Self> {
        Trial::new(groups)
    }
}

impl From<Trial> for Vec<DoseGroup> {
    fn from(trial: Trial) -> Self {
        trial.groups
    }
}

/// Per-dose observation after control correction and probit transform.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CorrectedObservation {
    /// Dose (always `> 0`).
    pub dose: f64,
    /// Subjects tested.
    pub total: u64,
    /// Observed responders.
    pub response: u64,
    /// `log10(dose)`.
    pub log_dose: f64,
    /// `response / total`.
    pub raw_proportion: f64,
    /// Abbott-corrected proportion, clipped to `[0, 1]`.
    pub corrected_proportion: f64,
    /// `corrected_proportion * total`, rounded half-to-even.
    pub corrected_count: u64,
    /// `Φ⁻¹(clip(corrected_proportion, ε, 1 - ε))`.
    pub empirical_probit: f64,
    /// Finney working weight used by the WLS fit.
    pub weight: f64,
}

/// Symmetric 2×2 covariance of `(intercept, slope)`.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Covariance2 {
    /// `Var(intercept)`.
    pub var_intercept: f64,
    /// `Var(slope)`.
    pub var_slope: f64,
    /// `Cov(intercept, slope)`.
    pub cov: f64,
}

impl Covariance2 {
    /// Variance of the linear predictor `a + b·x` at `x`.
    pub fn predictor_variance(&self, x: f64) -> f64 {
        self.var_intercept + 2.0 * x * self.cov + x * x * self.var_slope
    }
}

/// Straight line `probit = intercept + slope · log10(dose)` with its covariance.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FittedModel {
    /// Intercept.
    pub intercept: f64,
    /// Slope on `log10(dose)`.
    pub slope: f64,
    /// Parameter covariance.
    pub covariance: Covariance2,
}

impl FittedModel {
    /// Predicted probit at `log_dose`.
    pub fn predict(&self, log_dose: f64) -> f64 {
        self.intercept + self.slope * log_dose
    }

    /// `log10` of the dose giving `target_probit`.
    pub fn log_effective_dose(&self, target_probit: f64) -> Result<f64> {
        if self.slope == 0.0 || !self.slope.is_finite() {
            return Err(Error::DegenerateSlope(format!(
                "cannot invert the probit line with slope {}",
                self.slope
            )));
        }
        Ok((target_probit - self.intercept) / self.slope)
    }
}

/// Output of a [`crate::LeastSquaresSolver`]: the line plus residual diagnostics.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct WeightedFit {
    /// Fitted line and covariance.
    pub model: FittedModel,
    /// Rows that entered the fit.
    pub n_obs: usize,
    /// Residual degrees of freedom (`n_obs - 2`).
    pub df_resid: usize,
    /// Residual variance used to scale the covariance.
    pub scale: f64,
    /// Weighted residual sum of squares.
    pub weighted_ssr: f64,
    /// Weighted coefficient of determination.
    pub r_squared: f64,
}

/// ED/LD estimate at one target response level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EffectiveDoseEstimate {
    /// Target response fraction in `(0, 1)`.
    pub level: f64,
    /// Display label, e.g. `LD50`.
    pub label: String,
    /// `Φ⁻¹(level)`.
    pub target_probit: f64,
    /// `log10` of the WLS dose estimate.
    pub log_estimate: f64,
    /// WLS dose estimate.
    pub estimate: f64,
    /// Dose estimate from the binomial MLE line.
    pub mle_estimate: f64,
    /// Fieller lower bound (dose scale).
    pub fieller_lower: f64,
    /// Fieller upper bound (dose scale).
    pub fieller_upper: f64,
    /// Profile-likelihood lower bound (dose scale).
    pub profile_lower: f64,
    /// Profile-likelihood upper bound (dose scale).
    pub profile_upper: f64,
    /// Diagnostic note when a bound could not be resolved.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Pearson chi-square goodness of fit.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct GoodnessOfFit {
    /// Pearson statistic.
    pub chi_squared: f64,
    /// `n_groups - 2` (may be `<= 0`).
    pub df: i64,
    /// Upper-tail p-value, NaN when `df <= 0`.
    pub p_value: f64,
}
