//! Gaussian helpers for the blurred rectangle fill.
//!
//! A filled rectangle is separable, so its blurred coverage is the product of
//! two blurred 1-D box profiles. Only the profiles are computed here; the
//! compositing lives in [`crate::surface`].

/// Normalized Gaussian kernel covering `[-radius, radius]`
pub fn gaussian_kernel(sigma: f32) -> Vec<f64> {
    if !sigma.is_finite() || sigma <= 0.0 {
        return vec![1.0];
    }

    let radius = (sigma * 3.0).ceil() as i32;
    let sigma = sigma as f64;
    let denom = 2.0 * sigma * sigma;

    let mut weights: Vec<f64> = (-radius..=radius)
        .map(|i| {
            let x = i as f64;
            (-x * x / denom).exp()
        })
        .collect();

    let sum: f64 = weights.iter().sum();
    for w in &mut weights {
        *w /= sum;
    }
    weights
}

/// Blurred coverage of the span `[start, end)` sampled at every index in
/// `[start, end)`.
///
/// Index `j` of the returned vector is the coverage at `start + j`. Values are
/// in `(0, 1]` for non-empty spans.
pub fn span_profile(start: u32, end: u32, kernel: &[f64]) -> Vec<f64> {
    if end <= start {
        return Vec::new();
    }

    let radius = (kernel.len() / 2) as i64;
    let (start, end) = (start as i64, end as i64);

    (start..end)
        .map(|i| {
            kernel
                .iter()
                .enumerate()
                .filter(|(k, _)| {
                    let src = i + *k as i64 - radius;
                    src >= start && src < end
                })
                .map(|(_, w)| w)
                .sum()
        })
        .collect()
}
