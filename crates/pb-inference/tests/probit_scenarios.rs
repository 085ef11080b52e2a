//! End-to-end probit scenarios and invariants of the fitted report.

use approx::assert_relative_eq;
use pb_core::{DoseGroup, Error, Trial};
use pb_inference::{AnalysisConfig, ProbitAnalysis, ProfileConfig};
use proptest::prelude::*;

fn trial(rows: &[(f64, u64, u64)]) -> Trial {
    Trial::new(rows.iter().map(|&(d, n, k)| DoseGroup::new(d, n, k)).collect()).unwrap()
}

fn bioassay() -> Trial {
    trial(&[(0.0, 20, 1), (2.0, 20, 5), (4.0, 20, 10), (8.0, 20, 16), (16.0, 20, 19)])
}

#[test]
fn scenario_bioassay_report() {
    let fit = ProbitAnalysis::default().run(&bioassay()).unwrap();

    assert!(fit.control.present && fit.control.applied);
    assert_relative_eq!(fit.control.mortality.unwrap(), 0.05);
    assert_eq!(fit.observations.len(), 4);
    for o in &fit.observations {
        assert!((0.0..=1.0).contains(&o.corrected_proportion));
    }

    let ld50 = fit.effective_dose(0.5).unwrap();
    assert!(ld50.estimate > 4.0 && ld50.estimate < 8.0, "LD50 = {}", ld50.estimate);
    assert!(ld50.fieller_lower.is_finite() && ld50.fieller_upper.is_finite());
    assert!(ld50.profile_lower.is_finite() && ld50.profile_upper.is_finite());
    assert!(ld50.note.is_none(), "{:?}", ld50.note);

    assert!(fit.wls.model.slope > 0.0);
    assert_eq!(fit.goodness_of_fit.df, 2);
    assert!(fit.goodness_of_fit.p_value > 0.0 && fit.goodness_of_fit.p_value <= 1.0);
}

#[test]
fn scenario_estimates_increase_with_level() {
    let fit = ProbitAnalysis::default().run(&bioassay()).unwrap();
    for pair in fit.effective_doses.windows(2) {
        assert!(pair[0].estimate < pair[1].estimate);
        assert!(pair[0].mle_estimate < pair[1].mle_estimate);
    }
}

#[test]
fn scenario_profile_never_exceeds_mle() {
    let fit = ProbitAnalysis::default().run(&bioassay()).unwrap();
    for scan in &fit.profiles {
        for p in scan.points.iter().filter(|p| p.log_likelihood.is_finite()) {
            assert!(
                p.log_likelihood <= fit.mle.max_log_likelihood + 1e-6,
                "level {}: {} > {}",
                scan.level,
                p.log_likelihood,
                fit.mle.max_log_likelihood
            );
        }
    }
}

#[test]
fn scenario_single_dose_group_is_insufficient() {
    let err = ProbitAnalysis::default().run(&trial(&[(0.0, 20, 0), (10.0, 20, 7)])).unwrap_err();
    assert!(matches!(err, Error::InsufficientData { .. }));
    assert_eq!(err.kind(), "insufficient_data");
}

#[test]
fn scenario_wider_confidence_gives_wider_intervals() {
    let fit95 = ProbitAnalysis::default().run(&bioassay()).unwrap();
    let cfg = AnalysisConfig { confidence_level: 0.99, ..Default::default() };
    let fit99 = ProbitAnalysis::new(cfg).run(&bioassay()).unwrap();

    let (a, b) = (fit95.effective_dose(0.5).unwrap(), fit99.effective_dose(0.5).unwrap());
    assert_relative_eq!(a.estimate, b.estimate);
    assert!(b.fieller_lower < a.fieller_lower && a.fieller_upper < b.fieller_upper);
    assert!(b.profile_lower < a.profile_lower && a.profile_upper < b.profile_upper);
}

#[test]
fn scenario_narrow_grid_leaves_bounds_unresolved() {
    // ±0.02 log10 units is far inside the interval: nothing crosses the threshold.
    let cfg = AnalysisConfig {
        levels: vec![0.5],
        profile: ProfileConfig { half_width: 0.02, ..Default::default() },
        ..Default::default()
    };
    let fit = ProbitAnalysis::new(cfg).run(&bioassay()).unwrap();
    let ld50 = &fit.effective_doses[0];
    assert!(ld50.profile_lower.is_nan() || ld50.profile_upper.is_nan());
    assert!(ld50.note.is_some());
    // Point estimates and Fieller bounds are unaffected.
    assert!(ld50.estimate.is_finite() && ld50.fieller_lower.is_finite());
}

#[test]
fn scenario_report_json_contract() {
    let fit = ProbitAnalysis::default().run(&bioassay()).unwrap();
    let v = serde_json::to_value(fit.report()).unwrap();
    for key in [
        "confidence_level",
        "control",
        "observations",
        "fitted",
        "covariance",
        "summary",
        "mle",
        "goodness_of_fit",
        "effective_doses",
        "notes",
    ] {
        assert!(v.get(key).is_some(), "missing {key}");
    }
    let ed = &v["effective_doses"][2];
    assert_eq!(ed["label"], "LD50");
    for key in ["fieller_lower", "fieller_upper", "profile_lower", "profile_upper", "mle_estimate"] {
        assert!(ed[key].is_number(), "{key} = {}", ed[key]);
    }
    assert!(v["covariance"]["var_slope"].as_f64().unwrap() > 0.0);
}

/// Monotone response table over 3-6 log-spaced doses.
fn monotone_trial() -> impl Strategy<Value = Trial> {
    (3usize..=6, 10u64..=60, 0.5f64..4.0, -1.0f64..1.0).prop_flat_map(|(k, n, slope, center)| {
        proptest::collection::vec(-0.05f64..0.05, k).prop_map(move |jitter| {
            let rows: Vec<DoseGroup> = (0..k)
                .map(|i| {
                    let log_dose = center - 0.75 + 1.5 * i as f64 / (k as f64 - 1.0);
                    let p = pb_prob::normal::cdf(slope * (log_dose - center)) + jitter[i];
                    let resp = (p.clamp(0.0, 1.0) * n as f64).round() as u64;
                    DoseGroup::new(10f64.powf(log_dose), n, resp.min(n))
                })
                .collect();
            Trial::new(rows).unwrap()
        })
    })
}

proptest! {
    #![proptest_config(ProptestConfig::with_cases(24))]

    #[test]
    fn prop_estimates_monotone_and_fieller_contains_estimate(t in monotone_trial()) {
        let cfg = AnalysisConfig {
            profile: ProfileConfig { grid_points: 20, ..Default::default() },
            ..Default::default()
        };
        let fit = match ProbitAnalysis::new(cfg).run(&t) {
            Ok(f) => f,
            // Degenerate draws (e.g. flat responses) are out of scope here.
            Err(_) => return Ok(()),
        };
        prop_assume!(fit.wls.model.slope > 0.0);

        for pair in fit.effective_doses.windows(2) {
            prop_assert!(pair[0].estimate < pair[1].estimate);
        }
        for e in &fit.effective_doses {
            if e.fieller_lower.is_finite() && e.fieller_upper.is_finite() {
                prop_assert!(e.fieller_lower <= e.estimate * (1.0 + 1e-9));
                prop_assert!(e.estimate <= e.fieller_upper * (1.0 + 1e-9));
            }
        }
    }
}
