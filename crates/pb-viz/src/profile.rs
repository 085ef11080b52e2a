use pb_inference::{ProbitFit, ProfileScan, level_label};
use serde::{Deserialize, Serialize};

/// Single point in a profile likelihood curve artifact.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCurvePoint {
    /// Fixed log10-dose.
    pub log_dose: f64,
    /// Profile log-likelihood (NaN if the inner fit failed).
    pub log_likelihood: f64,
    /// Profiled slope.
    pub slope: f64,
    /// Whether the inner fit converged.
    pub converged: bool,
}

/// Plot-friendly artifact for one profile-likelihood scan.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ProfileCurveArtifact {
    /// Response level.
    pub level: f64,
    /// Display label, e.g. `LD50`.
    pub label: String,
    /// MLE log10-dose at this level.
    pub center: f64,
    /// Global maximum log-likelihood.
    pub max_log_likelihood: f64,
    /// Horizontal cut-off line.
    pub threshold: f64,
    /// Per-point results.
    pub points: Vec<ProfileCurvePoint>,
    /// Scan x-values (same as `points[*].log_dose`).
    pub log_dose_values: Vec<f64>,
    /// Profile log-likelihoods aligned with `log_dose_values`.
    pub log_likelihood_values: Vec<f64>,
    /// `2 * (max_log_likelihood - log_likelihood)`; compare against χ²₁.
    pub twice_delta_ll: Vec<f64>,
    /// Resolved bounds in log10-dose (NaN when unresolved).
    pub lower: f64,
    /// See `lower`.
    pub upper: f64,
    /// The grid was widened after inner-fit failures.
    pub widened: bool,
    /// Diagnostic note from the scan.
    #[serde(skip_serializing_if = "Option::is_none", default)]
    pub note: Option<String>,
}

impl From<&ProfileScan> for ProfileCurveArtifact {
    fn from(scan: &ProfileScan) -> Self {
        let mut points = Vec::with_capacity(scan.points.len());
        let mut log_dose_values = Vec::with_capacity(scan.points.len());
        let mut log_likelihood_values = Vec::with_capacity(scan.points.len());
        let mut twice_delta_ll = Vec::with_capacity(scan.points.len());

        for p in &scan.points {
            log_dose_values.push(p.log_dose);
            log_likelihood_values.push(p.log_likelihood);
            twice_delta_ll.push(2.0 * (scan.max_log_likelihood - p.log_likelihood));
            points.push(ProfileCurvePoint {
                log_dose: p.log_dose,
                log_likelihood: p.log_likelihood,
                slope: p.slope,
                converged: p.converged,
            });
        }

        Self {
            level: scan.level,
            label: level_label(scan.level),
            center: scan.center,
            max_log_likelihood: scan.max_log_likelihood,
            threshold: scan.threshold,
            points,
            log_dose_values,
            log_likelihood_values,
            twice_delta_ll,
            lower: scan.lower,
            upper: scan.upper,
            widened: scan.widened,
            note: scan.note.clone(),
        }
    }
}

/// One curve per level of the fit, in level order.
pub fn profile_curves(fit: &ProbitFit) -> Vec<ProfileCurveArtifact> {
    fit.profiles.iter().map(ProfileCurveArtifact::from).collect()
}
