//! Profile-likelihood intervals for `log10(ED)`.
//!
//! For a target probit `t` and a fixed log-dose `x₀` the line is pinned through
//! `(x₀, t)`, i.e. `a = t − b·x₀`, and the likelihood is maximized over the slope
//! alone. Scanning `x₀` over a grid around the MLE estimate gives the profile
//! curve; the interval is where it stays above `LL_max − χ²₁(conf)/2`.

use pb_core::{Error, Result};
use pb_prob::math::linspace;
use pb_prob::{chi_squared, normal};
use serde::Serialize;

use crate::mle::{MleFit, ProbitLikelihood};
use crate::optimizer::{LbfgsMinimizer, ObjectiveFunction};

/// Grid and bound settings for the profile scan.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileConfig {
    /// Points per scan.
    pub grid_points: usize,
    /// Half-width of the scan around the MLE log-dose (log10 units).
    pub half_width: f64,
    /// Half-width multiplier for the single retry after inner-fit failures.
    pub widen_factor: f64,
    /// Smallest admissible slope magnitude in the inner fits.
    pub min_slope: f64,
}

impl Default for ProfileConfig {
    fn default() -> Self {
        Self { grid_points: 100, half_width: 1.0, widen_factor: 2.0, min_slope: 1e-5 }
    }
}

impl ProfileConfig {
    /// Validate grid settings.
    pub fn validate(&self) -> Result<()> {
        if self.grid_points < 2 {
            return Err(Error::Validation(format!(
                "profile grid_points must be >= 2, got {}",
                self.grid_points
            )));
        }
        if !(self.half_width.is_finite() && self.half_width > 0.0) {
            return Err(Error::Validation(format!(
                "profile half_width must be finite and > 0, got {}",
                self.half_width
            )));
        }
        if !(self.widen_factor.is_finite() && self.widen_factor >= 1.0) {
            return Err(Error::Validation(format!(
                "profile widen_factor must be >= 1, got {}",
                self.widen_factor
            )));
        }
        if !(self.min_slope.is_finite() && self.min_slope > 0.0) {
            return Err(Error::Validation(format!(
                "profile min_slope must be finite and > 0, got {}",
                self.min_slope
            )));
        }
        Ok(())
    }
}

/// One grid point of a profile scan.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ProfilePoint {
    /// Fixed log10-dose.
    pub log_dose: f64,
    /// Profile log-likelihood; NaN when the inner fit failed.
    pub log_likelihood: f64,
    /// Slope maximizing the pinned likelihood.
    pub slope: f64,
    /// Inner fit convergence.
    pub converged: bool,
}

impl ProfilePoint {
    fn failed(&self) -> bool {
        !self.log_likelihood.is_finite()
    }
}

/// Profile scan at one response level.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ProfileScan {
    pub level: f64,
    pub target_probit: f64,
    /// MLE log10-dose the grid is centred on.
    pub center: f64,
    /// Half-width actually scanned (after any widening).
    pub half_width: f64,
    pub max_log_likelihood: f64,
    pub threshold: f64,
    pub points: Vec<ProfilePoint>,
    /// Lower bound in log10-dose, NaN when unresolved.
    pub lower: f64,
    /// Upper bound in log10-dose, NaN when unresolved.
    pub upper: f64,
    /// The scan was repeated on a wider grid after inner-fit failures.
    pub widened: bool,
    pub failed_points: usize,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub note: Option<String>,
}

/// Threshold crossings of a profile curve.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Crossings {
    pub lower: f64,
    pub upper: f64,
    pub count: usize,
}

fn sign(v: f64) -> i8 {
    if v > 0.0 {
        1
    } else if v < 0.0 {
        -1
    } else {
        0
    }
}

/// Locate where `ll − threshold` changes sign between adjacent points and
/// interpolate linearly.
///
/// Two or more crossings give `(first, last)`. A single crossing is the upper
/// bound when the curve starts above the threshold, otherwise the lower bound.
pub fn find_crossings(points: &[(f64, f64)], threshold: f64) -> Crossings {
    let mut xs = Vec::new();
    for w in points.windows(2) {
        let (x1, y1) = w[0];
        let (x2, y2) = w[1];
        if sign(y1 - threshold) != sign(y2 - threshold) {
            let x = if y2 == y1 { f64::NAN } else { x1 + (threshold - y1) * (x2 - x1) / (y2 - y1) };
            xs.push(x);
        }
    }

    match xs.as_slice() {
        [] => Crossings { lower: f64::NAN, upper: f64::NAN, count: 0 },
        [only] => {
            let starts_above = points.first().map(|p| p.1 > threshold).unwrap_or(false);
            if starts_above {
                Crossings { lower: f64::NAN, upper: *only, count: 1 }
            } else {
                Crossings { lower: *only, upper: f64::NAN, count: 1 }
            }
        }
        [first, .., last] => {
            let (lower, upper) = if first <= last { (*first, *last) } else { (*last, *first) };
            Crossings { lower, upper, count: xs.len() }
        }
    }
}

/// `-L(t − b·x₀, b)` as a function of the slope alone.
struct PinnedSlope<'a> {
    likelihood: &'a ProbitLikelihood,
    target_probit: f64,
    fixed_log_dose: f64,
}

impl ObjectiveFunction for PinnedSlope<'_> {
    fn eval(&self, p: &[f64]) -> Result<f64> {
        let b = p[0];
        Ok(-self.likelihood.log_likelihood(self.target_probit - b * self.fixed_log_dose, b))
    }

    fn gradient(&self, p: &[f64]) -> Result<Vec<f64>> {
        Ok(vec![-self.likelihood.pinned_slope_score(self.target_probit, self.fixed_log_dose, p[0])])
    }
}

/// Profile-likelihood interval engine around a fitted MLE.
pub struct ProfileLikelihood<'a> {
    likelihood: &'a ProbitLikelihood,
    mle: &'a MleFit,
    minimizer: &'a LbfgsMinimizer,
    config: &'a ProfileConfig,
    threshold: f64,
}

impl<'a> ProfileLikelihood<'a> {
    /// Prepare scans at `confidence_level` (threshold `LL_max − χ²₁(conf)/2`).
    pub fn new(
        likelihood: &'a ProbitLikelihood,
        mle: &'a MleFit,
        minimizer: &'a LbfgsMinimizer,
        config: &'a ProfileConfig,
        confidence_level: f64,
    ) -> Result<Self> {
        config.validate()?;
        let threshold = mle.max_log_likelihood - 0.5 * chi_squared::ppf_df1(confidence_level)?;
        Ok(Self { likelihood, mle, minimizer, config, threshold })
    }

    /// Likelihood cut-off defining the interval.
    pub fn threshold(&self) -> f64 {
        self.threshold
    }

    fn slope_bounds(&self) -> (f64, f64) {
        if self.mle.slope > 0.0 {
            (self.config.min_slope, f64::INFINITY)
        } else {
            (f64::NEG_INFINITY, -self.config.min_slope)
        }
    }

    fn profile_point(&self, target_probit: f64, log_dose: f64) -> ProfilePoint {
        let objective = PinnedSlope { likelihood: self.likelihood, target_probit, fixed_log_dose: log_dose };
        let bounds = [self.slope_bounds()];
        match self.minimizer.minimize(&objective, &[self.mle.slope], &bounds) {
            Ok(r) if r.fval.is_finite() => ProfilePoint {
                log_dose,
                log_likelihood: -r.fval,
                slope: r.parameters[0],
                converged: r.converged,
            },
            Ok(r) => {
                log::debug!("profile point x0={:.4}: non-finite objective ({})", log_dose, r);
                ProfilePoint { log_dose, log_likelihood: f64::NAN, slope: f64::NAN, converged: false }
            }
            Err(e) => {
                log::debug!("profile point x0={:.4}: {}", log_dose, e);
                ProfilePoint { log_dose, log_likelihood: f64::NAN, slope: f64::NAN, converged: false }
            }
        }
    }

    fn grid(&self, target_probit: f64, center: f64, half_width: f64) -> Vec<ProfilePoint> {
        linspace(center - half_width, center + half_width, self.config.grid_points)
            .into_iter()
            .map(|x| self.profile_point(target_probit, x))
            .collect()
    }

    /// Scan the profile at response `level` and resolve the interval.
    pub fn scan(&self, level: f64) -> ProfileScan {
        let target_probit = normal::ppf(level);
        let center = self.mle.log_effective_dose(target_probit);
        let mut scan = ProfileScan {
            level,
            target_probit,
            center,
            half_width: self.config.half_width,
            max_log_likelihood: self.mle.max_log_likelihood,
            threshold: self.threshold,
            points: Vec::new(),
            lower: f64::NAN,
            upper: f64::NAN,
            widened: false,
            failed_points: 0,
            note: None,
        };
        if !center.is_finite() {
            scan.note = Some(format!(
                "profile interval unavailable: degenerate MLE slope ({})",
                self.mle.slope
            ));
            return scan;
        }

        let mut points = self.grid(target_probit, center, scan.half_width);
        if points.iter().any(ProfilePoint::failed) {
            let failed = points.iter().filter(|p| p.failed()).count();
            scan.half_width *= self.config.widen_factor;
            log::warn!(
                "profile at level {}: {} inner fit(s) failed; rescanning with half-width {}",
                level,
                failed,
                scan.half_width
            );
            points = self.grid(target_probit, center, scan.half_width);
            scan.widened = true;
        }

        let finite: Vec<(f64, f64)> =
            points.iter().filter(|p| !p.failed()).map(|p| (p.log_dose, p.log_likelihood)).collect();
        scan.failed_points = points.len() - finite.len();
        let crossings = find_crossings(&finite, self.threshold);
        scan.lower = crossings.lower;
        scan.upper = crossings.upper;
        scan.points = points;

        let mut notes = Vec::new();
        match crossings.count {
            0 => notes.push(format!(
                "profile likelihood does not cross the threshold within ±{} log10 units; bounds unresolved",
                scan.half_width
            )),
            1 => {
                let missing = if scan.lower.is_nan() { "lower" } else { "upper" };
                log::warn!("profile at level {}: one-sided interval ({} bound missing)", level, missing);
                notes.push(format!(
                    "profile likelihood crosses the threshold only once; {} bound not found within ±{} log10 units, widen the grid",
                    missing, scan.half_width
                ));
            }
            _ => {}
        }
        if scan.failed_points > 0 && (scan.lower.is_nan() || scan.upper.is_nan()) {
            notes.push(format!(
                "{} of {} inner slope fits failed",
                scan.failed_points,
                scan.points.len()
            ));
        }
        if !notes.is_empty() {
            scan.note = Some(notes.join("; "));
        }
        scan
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::correction::correct;
    use crate::mle::ProbitMle;
    use crate::optimizer::OptimizerConfig;
    use approx::assert_relative_eq;
    use pb_core::{DoseGroup, Trial};

    #[test]
    fn test_find_crossings_two_sided() {
        // Tent peaking at x = 0; piecewise linear, so interpolation is exact.
        let pts: Vec<(f64, f64)> =
            linspace(-2.0, 2.0, 41).into_iter().map(|x| (x, -x.abs())).collect();
        let c = find_crossings(&pts, -1.05);
        assert_eq!(c.count, 2);
        assert_relative_eq!(c.lower, -1.05, epsilon = 1e-9);
        assert_relative_eq!(c.upper, 1.05, epsilon = 1e-9);
    }

    #[test]
    fn test_find_crossings_one_sided() {
        let rising: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, i as f64)).collect();
        let c = find_crossings(&rising, 1.5);
        assert_eq!(c.count, 1);
        assert_relative_eq!(c.lower, 1.5);
        assert!(c.upper.is_nan());

        let falling: Vec<(f64, f64)> = (0..5).map(|i| (i as f64, -(i as f64))).collect();
        let c = find_crossings(&falling, -2.5);
        assert!(c.lower.is_nan());
        assert_relative_eq!(c.upper, 2.5);
    }

    #[test]
    fn test_find_crossings_none() {
        let flat = [(0.0, 1.0), (1.0, 1.0)];
        let c = find_crossings(&flat, 0.0);
        assert_eq!(c.count, 0);
        assert!(c.lower.is_nan() && c.upper.is_nan());
    }

    fn scenario() -> (ProbitLikelihood, MleFit, ProbitMle) {
        let trial = Trial::new(vec![
            DoseGroup::new(0.0, 20, 1),
            DoseGroup::new(2.0, 20, 5),
            DoseGroup::new(4.0, 20, 10),
            DoseGroup::new(8.0, 20, 16),
            DoseGroup::new(16.0, 20, 19),
        ])
        .unwrap();
        let (_, obs) = correct(&trial);
        let lik = ProbitLikelihood::new(&obs);
        let mle = ProbitMle::default();
        let fit = mle.fit(&lik, &obs).unwrap();
        (lik, fit, mle)
    }

    #[test]
    fn test_scan_brackets_mle_estimate() {
        let (lik, fit, mle) = scenario();
        let cfg = ProfileConfig::default();
        let prof = ProfileLikelihood::new(&lik, &fit, mle.minimizer(), &cfg, 0.95).unwrap();
        let scan = prof.scan(0.5);

        assert_eq!(scan.points.len(), 100);
        assert!(!scan.widened);
        assert!(scan.note.is_none(), "{:?}", scan.note);
        assert!(scan.lower < scan.center && scan.center < scan.upper);
        assert_relative_eq!(scan.threshold, fit.max_log_likelihood - 0.5 * 3.841458820694124, epsilon = 1e-9);
        for p in &scan.points {
            assert!(p.log_likelihood <= fit.max_log_likelihood + 1e-6);
            assert!(p.slope >= cfg.min_slope);
        }
    }

    #[test]
    fn test_narrow_grid_reports_unresolved_bounds() {
        let (lik, fit, mle) = scenario();
        let cfg = ProfileConfig { half_width: 0.01, ..Default::default() };
        let prof = ProfileLikelihood::new(&lik, &fit, mle.minimizer(), &cfg, 0.95).unwrap();
        let scan = prof.scan(0.5);
        assert!(scan.lower.is_nan() && scan.upper.is_nan());
        assert!(scan.note.as_deref().unwrap_or("").contains("does not cross"));
    }

    #[test]
    fn test_failed_inner_fits_trigger_one_wider_rescan() {
        let (lik, fit, _) = scenario();
        let cfg = ProfileConfig::default();
        // A negative gradient tolerance makes every inner L-BFGS run fail at setup.
        let broken = LbfgsMinimizer::new(OptimizerConfig { tol: -1.0, ..Default::default() });
        let prof = ProfileLikelihood::new(&lik, &fit, &broken, &cfg, 0.95).unwrap();
        let scan = prof.scan(0.5);

        assert!(scan.widened);
        assert_relative_eq!(scan.half_width, cfg.half_width * cfg.widen_factor);
        assert_eq!(scan.points.len(), cfg.grid_points);
        assert_eq!(scan.failed_points, cfg.grid_points);
        assert!(scan.points.iter().all(|p| p.log_likelihood.is_nan() && !p.converged));
        assert!(scan.lower.is_nan() && scan.upper.is_nan());
        let note = scan.note.unwrap();
        assert!(note.contains("100 of 100 inner slope fits failed"), "{}", note);
    }

    #[test]
    fn test_degenerate_mle_slope() {
        let (lik, mut fit, mle) = scenario();
        fit.slope = 0.0;
        let cfg = ProfileConfig::default();
        let prof = ProfileLikelihood::new(&lik, &fit, mle.minimizer(), &cfg, 0.95).unwrap();
        let scan = prof.scan(0.5);
        assert!(scan.points.is_empty());
        assert!(scan.lower.is_nan() && scan.upper.is_nan());
        assert!(scan.note.unwrap().contains("degenerate"));
    }

    #[test]
    fn test_config_validation() {
        assert!(ProfileConfig::default().validate().is_ok());
        assert!(ProfileConfig { grid_points: 1, ..Default::default() }.validate().is_err());
        assert!(ProfileConfig { half_width: 0.0, ..Default::default() }.validate().is_err());
        assert!(ProfileConfig { widen_factor: 0.5, ..Default::default() }.validate().is_err());
        assert!(ProfileConfig { min_slope: -1.0, ..Default::default() }.validate().is_err());
    }
}
