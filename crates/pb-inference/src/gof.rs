//! Pearson chi-square goodness of fit of the probit line.

use pb_core::{CorrectedObservation, FittedModel, GoodnessOfFit};
use pb_prob::{chi_squared, normal};

/// Pearson statistic of corrected counts against `n·Φ(a + b·x)`.
///
/// `df = groups − 2`; the p-value is NaN when `df <= 0`.
pub fn pearson_goodness_of_fit(
    observations: &[CorrectedObservation],
    model: &FittedModel,
) -> GoodnessOfFit {
    let chi_squared: f64 = observations
        .iter()
        .map(|o| {
            let expected = o.total as f64 * normal::cdf(model.predict(o.log_dose));
            let diff = o.corrected_count as f64 - expected;
            diff * diff / expected
        })
        .sum();
    let df = observations.len() as i64 - 2;
    let p_value = if df > 0 { chi_squared::sf(chi_squared, df as f64) } else { f64::NAN };
    GoodnessOfFit { chi_squared, df, p_value }
}
