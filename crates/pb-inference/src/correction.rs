//! Control correction and the empirical probit transform.

use pb_core::{CorrectedObservation, Trial};
use pb_prob::math::{clip_probability, round_half_even};
use pb_prob::normal;
use serde::Serialize;

use crate::wls::finney_weight;

/// Clip applied to corrected proportions before the probit transform.
pub const PROBIT_EPS: f64 = 1e-6;

/// What happened to the control group.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ControlSummary {
    /// A `dose == 0` row was present.
    pub present: bool,
    /// `response / total` of the control row.
    pub mortality: Option<f64>,
    /// Abbott's correction was applied (control mortality > 0).
    pub applied: bool,
}

/// Abbott's formula: `(p - c) / (1 - c)`, clipped to `[0, 1]`.
///
/// A control mortality of 1 leaves nothing to correct against; the result is 0.
pub fn abbott(raw: f64, control_mortality: f64) -> f64 {
    let denom = 1.0 - control_mortality;
    if denom <= 0.0 {
        return 0.0;
    }
    ((raw - control_mortality) / denom).clamp(0.0, 1.0)
}

/// Correct every non-control row for background mortality and attach the
/// empirical probit and working weight.
pub fn correct(trial: &Trial) -> (ControlSummary, Vec<CorrectedObservation>) {
    let mortality = trial.control_mortality();
    let applied = matches!(mortality, Some(c) if c > 0.0);
    let summary = ControlSummary { present: mortality.is_some(), mortality, applied };

    let observations = trial
        .treated()
        .map(|g| {
            let raw = g.proportion();
            let corrected = match mortality {
                Some(c) if c > 0.0 => abbott(raw, c),
                _ => raw,
            };
            let probit = normal::ppf(clip_probability(corrected, PROBIT_EPS));
            CorrectedObservation {
                dose: g.dose,
                total: g.total,
                response: g.response,
                log_dose: g.dose.log10(),
                raw_proportion: raw,
                corrected_proportion: corrected,
                corrected_count: round_half_even(corrected * g.total as f64) as u64,
                empirical_probit: probit,
                weight: finney_weight(g.total, probit, corrected),
            }
        })
        .collect();

    (summary, observations)
}
