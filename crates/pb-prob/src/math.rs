//! Small numeric helpers shared by the probit code.

/// Clip a probability to `[eps, 1 - eps]`.
#[inline]
pub fn clip_probability(p: f64, eps: f64) -> f64 {
    p.clamp(eps, 1.0 - eps)
}

/// Round to the nearest integer, ties to even (banker's rounding).
///
/// `0.5 -> 0`, `1.5 -> 2`, `2.5 -> 2`, `3.5 -> 4`.
#[inline]
pub fn round_half_even(x: f64) -> f64 {
    x.round_ties_even()
}

/// `n` evenly spaced points from `start` to `stop` inclusive.
pub fn linspace(start: f64, stop: f64, n: usize) -> Vec<f64> {
    match n {
        0 => Vec::new(),
        1 => vec![start],
        _ => {
            let step = (stop - start) / (n as f64 - 1.0);
            (0..n).map(|i| if i + 1 == n { stop } else { start + step * i as f64 }).collect()
        }
    }
}
