//! Weighted least squares of empirical probits on log-dose.

use nalgebra::Matrix2;
use pb_core::{Covariance2, Error, FittedModel, LeastSquaresSolver, Result, WeightedFit};
use pb_prob::{normal, student_t};
use serde::Serialize;

/// Finney working weight `n·φ(y)² / (p·(1-p))`; non-finite values become 1.
pub fn finney_weight(total: u64, empirical_probit: f64, proportion: f64) -> f64 {
    let phi = normal::pdf(empirical_probit);
    let w = total as f64 * phi * phi / (proportion * (1.0 - proportion));
    if w.is_finite() { w } else { 1.0 }
}

/// Keep rows where `x`, `y` and `w` are all finite.
fn finite_rows(x: &[f64], y: &[f64], w: &[f64]) -> Result<Vec<(f64, f64, f64)>> {
    if x.len() != y.len() || x.len() != w.len() {
        return Err(Error::Validation(format!(
            "x/y/weights length mismatch: {}/{}/{}",
            x.len(),
            y.len(),
            w.len()
        )));
    }
    Ok(x.iter()
        .zip(y)
        .zip(w)
        .map(|((&x, &y), &w)| (x, y, w))
        .filter(|(x, y, w)| x.is_finite() && y.is_finite() && w.is_finite())
        .collect())
}

/// Default [`LeastSquaresSolver`]: weighted normal equations solved with nalgebra.
///
/// Covariance is `scale · (XᵀWX)⁻¹` with `scale` the weighted residual variance
/// (1 when there are no residual degrees of freedom).
#[derive(Debug, Clone, Copy, Default)]
pub struct WeightedLeastSquares;

impl LeastSquaresSolver for WeightedLeastSquares {
    fn solve(&self, x: &[f64], y: &[f64], weights: &[f64]) -> Result<WeightedFit> {
        let rows = finite_rows(x, y, weights)?;
        let n = rows.len();
        if n < 2 {
            return Err(Error::InsufficientData { usable: n, required: 2 });
        }

        let mut xtwx = Matrix2::<f64>::zeros();
        for &(xi, _, wi) in &rows {
            xtwx[(0, 0)] += wi;
            xtwx[(0, 1)] += wi * xi;
            xtwx[(1, 1)] += wi * xi * xi;
        }
        xtwx[(1, 0)] = xtwx[(0, 1)];

        let det = xtwx.determinant();
        let inv = match xtwx.try_inverse() {
            Some(inv) if det.abs() > f64::EPSILON * xtwx.norm_squared() => inv,
            _ => {
                return Err(Error::DegenerateSlope(
                    "weighted design matrix is singular (all doses equal?)".to_string(),
                ));
            }
        };

        // Centred weighted sums: a constant response gives a slope of exactly 0.
        let sw: f64 = rows.iter().map(|r| r.2).sum();
        let x_bar = rows.iter().map(|r| r.2 * r.0).sum::<f64>() / sw;
        let y_bar = if rows.iter().all(|r| r.1 == rows[0].1) {
            rows[0].1
        } else {
            rows.iter().map(|r| r.2 * r.1).sum::<f64>() / sw
        };
        let (sxx, sxy) = rows.iter().fold((0.0, 0.0), |(sxx, sxy), &(xi, yi, wi)| {
            let dx = xi - x_bar;
            (sxx + wi * dx * dx, sxy + wi * dx * (yi - y_bar))
        });
        let slope = sxy / sxx;
        let intercept = y_bar - slope * x_bar;

        let mut ssr = 0.0;
        let mut sst = 0.0;
        for &(xi, yi, wi) in &rows {
            let r = yi - (intercept + slope * xi);
            ssr += wi * r * r;
            sst += wi * (yi - y_bar) * (yi - y_bar);
        }

        let df_resid = n - 2;
        let scale = if df_resid > 0 { ssr / df_resid as f64 } else { 1.0 };
        let cov = inv * scale;
        let r_squared = if sst > 0.0 { 1.0 - ssr / sst } else { f64::NAN };

        Ok(WeightedFit {
            model: FittedModel {
                intercept,
                slope,
                covariance: Covariance2 {
                    var_intercept: cov[(0, 0)],
                    var_slope: cov[(1, 1)],
                    cov: cov[(0, 1)],
                },
            },
            n_obs: n,
            df_resid,
            scale,
            weighted_ssr: ssr,
            r_squared,
        })
    }

    fn name(&self) -> &str {
        "wls-normal-equations"
    }
}

/// Unweighted straight line through `(x, y)`; `None` when fewer than two finite
/// points remain or `x` has no spread.
pub fn ols_line(x: &[f64], y: &[f64]) -> Option<(f64, f64)> {
    let pts: Vec<(f64, f64)> =
        x.iter().zip(y).map(|(&a, &b)| (a, b)).filter(|(a, b)| a.is_finite() && b.is_finite()).collect();
    if pts.len() < 2 {
        return None;
    }
    let n = pts.len() as f64;
    let mx = pts.iter().map(|p| p.0).sum::<f64>() / n;
    let my = pts.iter().map(|p| p.1).sum::<f64>() / n;
    let sxx: f64 = pts.iter().map(|p| (p.0 - mx).powi(2)).sum();
    let sxy: f64 = pts.iter().map(|p| (p.0 - mx) * (p.1 - my)).sum();
    if sxx <= 0.0 {
        return None;
    }
    let slope = sxy / sxx;
    let intercept = my - slope * mx;
    (intercept.is_finite() && slope.is_finite()).then_some((intercept, slope))
}

/// One coefficient row of the regression table.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct CoefficientRow {
    /// `const` or `log_dose`.
    pub name: String,
    pub estimate: f64,
    pub std_error: f64,
    pub t_value: f64,
    /// Two-sided Student-t p-value on `df_resid`; NaN when `df_resid == 0`.
    pub p_value: f64,
    pub ci_lower: f64,
    pub ci_upper: f64,
}

/// Regression table for the WLS fit.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RegressionSummary {
    /// Name of the solver that produced the fit.
    pub solver: String,
    pub coefficients: Vec<CoefficientRow>,
    pub n_obs: usize,
    pub df_resid: usize,
    pub scale: f64,
    pub weighted_ssr: f64,
    pub r_squared: f64,
    pub adj_r_squared: f64,
}

impl RegressionSummary {
    /// Build the table at `confidence_level`.
    pub fn from_fit(fit: &WeightedFit, solver: &str, confidence_level: f64) -> Result<Self> {
        let df = fit.df_resid as f64;
        let t_crit = if fit.df_resid > 0 {
            student_t::ppf(0.5 + confidence_level / 2.0, df)?
        } else {
            f64::NAN
        };
        let row = |name: &str, estimate: f64, variance: f64| {
            let std_error = variance.sqrt();
            let t_value = estimate / std_error;
            let p_value =
                if fit.df_resid > 0 { student_t::two_sided_p(t_value, df) } else { f64::NAN };
            CoefficientRow {
                name: name.to_string(),
                estimate,
                std_error,
                t_value,
                p_value,
                ci_lower: estimate - t_crit * std_error,
                ci_upper: estimate + t_crit * std_error,
            }
        };
        let m = &fit.model;
        let adj_r_squared = if fit.df_resid > 0 {
            1.0 - (1.0 - fit.r_squared) * (fit.n_obs as f64 - 1.0) / df
        } else {
            f64::NAN
        };
        Ok(Self {
            solver: solver.to_string(),
            coefficients: vec![
                row("const", m.intercept, m.covariance.var_intercept),
                row("log_dose", m.slope, m.covariance.var_slope),
            ],
            n_obs: fit.n_obs,
            df_resid: fit.df_resid,
            scale: fit.scale,
            weighted_ssr: fit.weighted_ssr,
            r_squared: fit.r_squared,
            adj_r_squared,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_exact_line_recovered() {
        let x = [0.0, 1.0, 2.0, 3.0];
        let y: Vec<f64> = x.iter().map(|v| -1.0 + 2.0 * v).collect();
        let fit = WeightedLeastSquares.solve(&x, &y, &[1.0, 2.0, 3.0, 4.0]).unwrap();
        assert_relative_eq!(fit.model.intercept, -1.0, epsilon = 1e-12);
        assert_relative_eq!(fit.model.slope, 2.0, epsilon = 1e-12);
        assert_relative_eq!(fit.weighted_ssr, 0.0, epsilon = 1e-20);
        assert_eq!(fit.df_resid, 2);
    }

    #[test]
    fn test_matches_closed_form_weighted_fit() {
        let x = [0.3, 0.6, 0.9, 1.2];
        let y = [-0.8, -0.1, 0.9, 1.3];
        let w = [4.0, 9.0, 9.0, 4.0];
        let fit = WeightedLeastSquares.solve(&x, &y, &w).unwrap();

        let sw: f64 = w.iter().sum();
        let xb = x.iter().zip(&w).map(|(a, b)| a * b).sum::<f64>() / sw;
        let yb = y.iter().zip(&w).map(|(a, b)| a * b).sum::<f64>() / sw;
        let sxx: f64 = x.iter().zip(&w).map(|(a, b)| b * (a - xb).powi(2)).sum();
        let sxy: f64 = (0..4).map(|i| w[i] * (x[i] - xb) * (y[i] - yb)).sum();
        let slope = sxy / sxx;
        assert_relative_eq!(fit.model.slope, slope, epsilon = 1e-12);
        assert_relative_eq!(fit.model.intercept, yb - slope * xb, epsilon = 1e-12);
        // Var(slope) = scale / Sxx(w)
        assert_relative_eq!(fit.model.covariance.var_slope, fit.scale / sxx, epsilon = 1e-12);
        assert!(fit.r_squared > 0.9 && fit.r_squared <= 1.0);
    }

    #[test]
    fn test_constant_response_gives_exact_zero_slope() {
        let x = [0.0, 2f64.log10(), 4f64.log10()];
        let y = [normal::ppf(1e-6); 3];
        let fit = WeightedLeastSquares.solve(&x, &y, &[1.0, 1.7, 2.3]).unwrap();
        assert_eq!(fit.model.slope, 0.0);
        assert_eq!(fit.model.intercept, y[0]);
        assert_eq!(fit.weighted_ssr, 0.0);
    }

    #[test]
    fn test_two_rows_scale_falls_back_to_one() {
        let fit = WeightedLeastSquares.solve(&[0.0, 1.0], &[0.0, 1.0], &[2.0, 2.0]).unwrap();
        assert_eq!(fit.df_resid, 0);
        assert_eq!(fit.scale, 1.0);
        assert_relative_eq!(fit.model.covariance.var_slope, 1.0, epsilon = 1e-12);
    }

    #[test]
    fn test_insufficient_rows_after_dropping_non_finite() {
        let err = WeightedLeastSquares
            .solve(&[0.0, f64::NAN, 1.0], &[0.0, 1.0, f64::INFINITY], &[1.0, 1.0, 1.0])
            .unwrap_err();
        assert!(matches!(err, Error::InsufficientData { usable: 1, required: 2 }));
    }

    #[test]
    fn test_identical_doses_degenerate() {
        let err = WeightedLeastSquares.solve(&[0.5, 0.5, 0.5], &[0.0, 1.0, 2.0], &[1.0; 3]).unwrap_err();
        assert!(matches!(err, Error::DegenerateSlope(_)));
    }

    #[test]
    fn test_finney_weight_fallback() {
        assert_eq!(finney_weight(10, 0.0, 0.0), 1.0);
        assert_eq!(finney_weight(10, 0.0, 1.0), 1.0);
        // n φ(0)² / 0.25 = 10 / (2π) / 0.25
        assert_relative_eq!(
            finney_weight(10, 0.0, 0.5),
            10.0 / (2.0 * std::f64::consts::PI) / 0.25,
            epsilon = 1e-12
        );
    }

    #[test]
    fn test_ols_line() {
        let (a, b) = ols_line(&[1.0, 2.0, 3.0], &[3.0, 5.0, 7.0]).unwrap();
        assert_relative_eq!(a, 1.0, epsilon = 1e-12);
        assert_relative_eq!(b, 2.0, epsilon = 1e-12);
        assert!(ols_line(&[1.0, 1.0], &[0.0, 1.0]).is_none());
        assert!(ols_line(&[1.0], &[0.0]).is_none());
    }

    #[test]
    fn test_summary_table() {
        let x = [0.3, 0.6, 0.9, 1.2];
        let y = [-0.8, -0.1, 0.9, 1.3];
        let fit = WeightedLeastSquares.solve(&x, &y, &[1.0; 4]).unwrap();
        let s = RegressionSummary::from_fit(&fit, "wls", 0.95).unwrap();
        assert_eq!(s.coefficients.len(), 2);
        let slope = &s.coefficients[1];
        assert_eq!(slope.name, "log_dose");
        assert!(slope.ci_lower < slope.estimate && slope.estimate < slope.ci_upper);
        assert!(slope.p_value > 0.0 && slope.p_value < 0.05);

        let two = WeightedLeastSquares.solve(&[0.0, 1.0], &[0.0, 1.0], &[1.0, 1.0]).unwrap();
        let s = RegressionSummary::from_fit(&two, "wls", 0.95).unwrap();
        assert!(s.coefficients[0].p_value.is_nan());
        assert!(s.adj_r_squared.is_nan());
    }
}
