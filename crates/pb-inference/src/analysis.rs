//! End-to-end probit analysis: correction, WLS, MLE, intervals, goodness of fit.

use pb_core::{
    CorrectedObservation, Covariance2, EffectiveDoseEstimate, Error, GoodnessOfFit,
    LeastSquaresSolver, Result, Trial, WeightedFit,
};
use pb_prob::normal;
use serde::Serialize;

use crate::correction::{ControlSummary, correct};
use crate::fieller::fieller_log_interval;
use crate::gof::pearson_goodness_of_fit;
use crate::mle::{MleFit, ProbitLikelihood, ProbitMle};
use crate::optimizer::OptimizerConfig;
use crate::profile_likelihood::{ProfileConfig, ProfileLikelihood, ProfileScan};
use crate::wls::{RegressionSummary, WeightedLeastSquares};

/// Response levels reported by default.
pub const DEFAULT_LEVELS: [f64; 6] = [0.10, 0.25, 0.50, 0.75, 0.90, 0.99];

/// Analysis settings.
#[derive(Debug, Clone)]
pub struct AnalysisConfig {
    /// Confidence level for every interval (Fieller, profile, WLS table).
    pub confidence_level: f64,
    /// Target response fractions, each in `(0, 1)`.
    pub levels: Vec<f64>,
    pub profile: ProfileConfig,
    pub optimizer: OptimizerConfig,
}

impl Default for AnalysisConfig {
    fn default() -> Self {
        Self {
            confidence_level: 0.95,
            levels: DEFAULT_LEVELS.to_vec(),
            profile: ProfileConfig::default(),
            optimizer: OptimizerConfig::default(),
        }
    }
}

impl AnalysisConfig {
    /// Reject out-of-range settings before any computation.
    pub fn validate(&self) -> Result<()> {
        if !(self.confidence_level > 0.0 && self.confidence_level < 1.0) {
            return Err(Error::Validation(format!(
                "confidence_level must be in (0, 1), got {}",
                self.confidence_level
            )));
        }
        if self.levels.is_empty() {
            return Err(Error::Validation("at least one response level is required".to_string()));
        }
        if let Some(bad) = self.levels.iter().find(|&&p| !(p > 0.0 && p < 1.0)) {
            return Err(Error::Validation(format!("response levels must be in (0, 1), got {}", bad)));
        }
        self.profile.validate()?;
        self.optimizer.validate()
    }
}

/// `LD50`, `LD10`, `LD2.5`, ...
pub fn level_label(level: f64) -> String {
    let pct = level * 100.0;
    if (pct - pct.round()).abs() < 1e-9 {
        format!("LD{}", pct.round() as i64)
    } else {
        let s = format!("{:.4}", pct);
        format!("LD{}", s.trim_end_matches('0').trim_end_matches('.'))
    }
}

/// Probit analysis with an injectable least-squares backend.
#[derive(Debug, Clone)]
pub struct ProbitAnalysis<S: LeastSquaresSolver = WeightedLeastSquares> {
    config: AnalysisConfig,
    solver: S,
}

impl ProbitAnalysis<WeightedLeastSquares> {
    /// Analysis using the default nalgebra WLS solver.
    pub fn new(config: AnalysisConfig) -> Self {
        Self { config, solver: WeightedLeastSquares }
    }
}

impl Default for ProbitAnalysis<WeightedLeastSquares> {
    fn default() -> Self {
        Self::new(AnalysisConfig::default())
    }
}

impl<S: LeastSquaresSolver> ProbitAnalysis<S> {
    /// Analysis using a caller-supplied solver.
    pub fn with_solver(config: AnalysisConfig, solver: S) -> Self {
        Self { config, solver }
    }

    /// Access the configuration.
    pub fn config(&self) -> &AnalysisConfig {
        &self.config
    }

    /// Run the full analysis on one trial.
    pub fn run(&self, trial: &Trial) -> Result<ProbitFit> {
        self.config.validate()?;
        let conf = self.config.confidence_level;
        let alpha = 1.0 - conf;

        let (control, observations) = correct(trial);
        if observations.len() < 2 {
            return Err(Error::InsufficientData { usable: observations.len(), required: 2 });
        }

        let x: Vec<f64> = observations.iter().map(|o| o.log_dose).collect();
        let y: Vec<f64> = observations.iter().map(|o| o.empirical_probit).collect();
        let w: Vec<f64> = observations.iter().map(|o| o.weight).collect();
        let wls = self.solver.solve(&x, &y, &w)?;
        let summary = RegressionSummary::from_fit(&wls, self.solver.name(), conf)?;
        log::debug!(
            "WLS ({}): a={:.6}, b={:.6}, scale={:.4}, n={}",
            self.solver.name(),
            wls.model.intercept,
            wls.model.slope,
            wls.scale,
            wls.n_obs
        );

        let likelihood = ProbitLikelihood::new(&observations);
        let estimator = ProbitMle::new(self.config.optimizer.clone());
        let mle = estimator.fit(&likelihood, &observations)?;

        let goodness_of_fit = pearson_goodness_of_fit(&observations, &wls.model);

        let mut notes = Vec::new();
        if let Some(c) = control.mortality.filter(|_| control.applied) {
            notes.push(format!("Abbott's correction applied for control mortality {:.4}", c));
        }
        let wls_degenerate = wls.model.slope == 0.0 || !wls.model.slope.is_finite();
        if wls_degenerate {
            log::warn!("WLS slope is {}; dose estimates are undefined", wls.model.slope);
            notes.push(format!(
                "WLS slope is {}; dose estimates and Fieller bounds are undefined",
                wls.model.slope
            ));
        }
        if goodness_of_fit.df <= 0 {
            notes.push("goodness-of-fit p-value undefined with fewer than 3 dose groups".to_string());
        }

        let profile = ProfileLikelihood::new(
            &likelihood,
            &mle,
            estimator.minimizer(),
            &self.config.profile,
            conf,
        )?;

        let mut effective_doses = Vec::with_capacity(self.config.levels.len());
        let mut profiles = Vec::with_capacity(self.config.levels.len());
        for &level in &self.config.levels {
            let target_probit = normal::ppf(level);
            let mut level_notes = Vec::new();

            let log_estimate = wls.model.log_effective_dose(target_probit).unwrap_or(f64::NAN);
            let fieller = fieller_log_interval(&wls.model, target_probit, alpha)?;
            if let Some(reason) = fieller.undefined.filter(|_| !wls_degenerate) {
                level_notes.push(reason.note().to_string());
            }

            let scan = profile.scan(level);
            if let Some(n) = &scan.note {
                level_notes.push(n.clone());
            }

            effective_doses.push(EffectiveDoseEstimate {
                level,
                label: level_label(level),
                target_probit,
                log_estimate,
                estimate: 10f64.powf(log_estimate),
                mle_estimate: 10f64.powf(mle.log_effective_dose(target_probit)),
                fieller_lower: 10f64.powf(fieller.lower),
                fieller_upper: 10f64.powf(fieller.upper),
                profile_lower: 10f64.powf(scan.lower),
                profile_upper: 10f64.powf(scan.upper),
                note: (!level_notes.is_empty()).then(|| level_notes.join("; ")),
            });
            profiles.push(scan);
        }

        Ok(ProbitFit {
            confidence_level: conf,
            control,
            observations,
            wls,
            summary,
            mle,
            goodness_of_fit,
            effective_doses,
            profiles,
            notes,
        })
    }
}

/// Everything computed for one trial.
#[derive(Debug, Clone)]
pub struct ProbitFit {
    pub confidence_level: f64,
    pub control: ControlSummary,
    pub observations: Vec<CorrectedObservation>,
    pub wls: WeightedFit,
    pub summary: RegressionSummary,
    pub mle: MleFit,
    pub goodness_of_fit: GoodnessOfFit,
    pub effective_doses: Vec<EffectiveDoseEstimate>,
    /// Profile scans, one per level, in the same order as `effective_doses`.
    pub profiles: Vec<ProfileScan>,
    pub notes: Vec<String>,
}

/// Fitted WLS line.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct Coefficients {
    pub intercept: f64,
    pub slope: f64,
}

/// Serializable report. NaN values serialize as `null`.
#[derive(Debug, Clone, Serialize)]
pub struct ProbitReport {
    pub confidence_level: f64,
    pub control: ControlSummary,
    pub observations: Vec<CorrectedObservation>,
    pub fitted: Coefficients,
    pub covariance: Covariance2,
    pub summary: RegressionSummary,
    pub mle: MleFit,
    pub goodness_of_fit: GoodnessOfFit,
    pub effective_doses: Vec<EffectiveDoseEstimate>,
    pub notes: Vec<String>,
}

impl ProbitFit {
    /// Build the serializable report.
    pub fn report(&self) -> ProbitReport {
        ProbitReport {
            confidence_level: self.confidence_level,
            control: self.control,
            observations: self.observations.clone(),
            fitted: Coefficients { intercept: self.wls.model.intercept, slope: self.wls.model.slope },
            covariance: self.wls.model.covariance,
            summary: self.summary.clone(),
            mle: self.mle.clone(),
            goodness_of_fit: self.goodness_of_fit,
            effective_doses: self.effective_doses.clone(),
            notes: self.notes.clone(),
        }
    }

    /// Estimate at `level`, if it was requested.
    pub fn effective_dose(&self, level: f64) -> Option<&EffectiveDoseEstimate> {
        self.effective_doses.iter().find(|e| (e.level - level).abs() < 1e-12)
    }

    /// Profile scan at `level`, if it was requested.
    pub fn profile(&self, level: f64) -> Option<&ProfileScan> {
        self.profiles.iter().find(|p| (p.level - level).abs() < 1e-12)
    }
}
