use pb_core::{Error, Result};
use pb_inference::ProbitFit;
use pb_prob::math::linspace;
use pb_prob::{normal, student_t};
use serde::{Deserialize, Serialize};

/// Default number of points on the fitted line.
pub const DEFAULT_LINE_POINTS: usize = 100;

/// One observed dose group in probit space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ObservedPoint {
    /// Dose.
    pub dose: f64,
    /// `log10(dose)`.
    pub log_dose: f64,
    /// Empirical probit of the corrected proportion.
    pub empirical_probit: f64,
    /// Abbott-corrected response proportion.
    pub corrected_proportion: f64,
    /// WLS weight (useful for marker sizes).
    pub weight: f64,
}

/// Effective-dose marker (vertical line with a horizontal error bar).
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseMarker {
    /// Display label, e.g. `LD50`.
    pub label: String,
    /// Target probit.
    pub target_probit: f64,
    /// `log10` of the WLS estimate.
    pub log_dose: f64,
    /// `log10` of the Fieller bounds (NaN when undefined).
    pub log_lower: f64,
    /// See `log_lower`.
    pub log_upper: f64,
}

/// Plot-friendly artifact for the probit line: observed points, fitted line and
/// mean-response confidence band, in both probit and proportion space.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DoseResponseArtifact {
    /// Confidence level of the band.
    pub confidence_level: f64,
    /// WLS intercept.
    pub intercept: f64,
    /// WLS slope.
    pub slope: f64,
    /// Critical value multiplying the standard error.
    pub critical_value: f64,
    /// `t` (residual df > 0) or `normal`.
    pub critical_distribution: String,
    /// Observed groups.
    pub observed: Vec<ObservedPoint>,
    /// Line x-values.
    pub log_dose_values: Vec<f64>,
    /// `10^log_dose_values`.
    pub dose_values: Vec<f64>,
    /// Fitted probit aligned with `log_dose_values`.
    pub probit_fit: Vec<f64>,
    /// Lower band in probit space.
    pub probit_lower: Vec<f64>,
    /// Upper band in probit space.
    pub probit_upper: Vec<f64>,
    /// `Φ(probit_fit)`.
    pub response_fit: Vec<f64>,
    /// `Φ(probit_lower)`.
    pub response_lower: Vec<f64>,
    /// `Φ(probit_upper)`.
    pub response_upper: Vec<f64>,
    /// One marker per reported level.
    pub markers: Vec<DoseMarker>,
}

impl DoseResponseArtifact {
    /// Build the artifact over `n_points` log-doses spanning the observed range.
    pub fn from_fit(fit: &ProbitFit, n_points: usize) -> Result<Self> {
        if n_points < 2 {
            return Err(Error::Validation(format!("n_points must be >= 2, got {}", n_points)));
        }
        let model = &fit.wls.model;
        let q = 0.5 + fit.confidence_level / 2.0;
        let (critical_value, critical_distribution) = if fit.wls.df_resid > 0 {
            (student_t::ppf(q, fit.wls.df_resid as f64)?, "t")
        } else {
            (normal::ppf(q), "normal")
        };

        let observed: Vec<ObservedPoint> = fit
            .observations
            .iter()
            .map(|o| ObservedPoint {
                dose: o.dose,
                log_dose: o.log_dose,
                empirical_probit: o.empirical_probit,
                corrected_proportion: o.corrected_proportion,
                weight: o.weight,
            })
            .collect();

        let (lo, hi) = observed
            .iter()
            .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), p| (lo.min(p.log_dose), hi.max(p.log_dose)));
        if !(lo.is_finite() && hi.is_finite()) {
            return Err(Error::Validation("no observed dose groups to plot".to_string()));
        }

        let log_dose_values = linspace(lo, hi, n_points);
        let n = log_dose_values.len();
        let mut dose_values = Vec::with_capacity(n);
        let mut probit_fit = Vec::with_capacity(n);
        let mut probit_lower = Vec::with_capacity(n);
        let mut probit_upper = Vec::with_capacity(n);
        for &x in &log_dose_values {
            let y = model.predict(x);
            let se = model.covariance.predictor_variance(x).max(0.0).sqrt();
            dose_values.push(10f64.powf(x));
            probit_fit.push(y);
            probit_lower.push(y - critical_value * se);
            probit_upper.push(y + critical_value * se);
        }
        let to_response = |v: &[f64]| v.iter().map(|&z| normal::cdf(z)).collect::<Vec<f64>>();

        let markers = fit
            .effective_doses
            .iter()
            .map(|e| DoseMarker {
                label: e.label.clone(),
                target_probit: e.target_probit,
                log_dose: e.log_estimate,
                log_lower: e.fieller_lower.log10(),
                log_upper: e.fieller_upper.log10(),
            })
            .collect();

        Ok(Self {
            confidence_level: fit.confidence_level,
            intercept: model.intercept,
            slope: model.slope,
            critical_value,
            critical_distribution: critical_distribution.to_string(),
            observed,
            response_fit: to_response(&probit_fit),
            response_lower: to_response(&probit_lower),
            response_upper: to_response(&probit_upper),
            log_dose_values,
            dose_values,
            probit_fit,
            probit_lower,
            probit_upper,
            markers,
        })
    }
}
