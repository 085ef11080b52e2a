//! Binomial log-likelihood kernel for quantal response data.

use crate::math::clip_probability;

/// Lower / upper clip applied to fitted probabilities before taking logs.
pub const PROB_CLIP: f64 = 1e-10;

/// Binomial log-likelihood without the `ln C(n, k)` constant:
/// `k·ln(p) + (n-k)·ln(1-p)`, with `p` clipped to `[1e-10, 1-1e-10]`.
#[inline]
pub fn loglik_kernel(k: f64, n: f64, p: f64) -> f64 {
    let p = clip_probability(p, PROB_CLIP);
    k * p.ln() + (n - k) * (1.0 - p).ln()
}

/// Derivative of [`loglik_kernel`] with respect to `p` (zero where the clip is active).
#[inline]
pub fn loglik_kernel_dp(k: f64, n: f64, p: f64) -> f64 {
    if p <= PROB_CLIP || p >= 1.0 - PROB_CLIP {
        return 0.0;
    }
    k / p - (n - k) / (1.0 - p)
}

#[cfg(test)]
mod tests {
    use super::*;
    use approx::assert_relative_eq;

    #[test]
    fn test_kernel_matches_direct() {
        let (k, n, p) = (3.0, 10.0, 0.25_f64);
        assert_relative_eq!(
            loglik_kernel(k, n, p),
            3.0 * p.ln() + 7.0 * (1.0 - p).ln(),
            epsilon = 1e-14
        );
    }

    #[test]
    fn test_kernel_is_finite_at_edges() {
        assert!(loglik_kernel(5.0, 10.0, 0.0).is_finite());
        assert!(loglik_kernel(5.0, 10.0, 1.0).is_finite());
        assert_eq!(loglik_kernel_dp(5.0, 10.0, 0.0), 0.0);
    }

    #[test]
    fn test_kernel_maximized_at_observed_proportion() {
        let (k, n) = (4.0, 20.0);
        let at_mle = loglik_kernel(k, n, 0.2);
        for &p in &[0.1, 0.15, 0.25, 0.3] {
            assert!(loglik_kernel(k, n, p) < at_mle);
        }
        assert_relative_eq!(loglik_kernel_dp(k, n, 0.2), 0.0, epsilon = 1e-12);
    }
}
