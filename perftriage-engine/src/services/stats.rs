//! Small descriptive-statistics helpers over `f64` samples
//!
//! Empty input yields 0.0 everywhere; callers check emptiness themselves when
//! that distinction matters.

/// Arithmetic mean
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Median (mean of the two middle values for even lengths)
pub fn median(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let mut sorted = values.to_vec();
    sorted.sort_by(f64::total_cmp);
    let mid = sorted.len() / 2;
    if sorted.len() % 2 == 0 {
        (sorted[mid - 1] + sorted[mid]) / 2.0
    } else {
        sorted[mid]
    }
}

/// Population standard deviation
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return 0.0;
    }
    let m = mean(values);
    let variance = values.iter().map(|v| (v - m).powi(2)).sum::<f64>() / values.len() as f64;
    variance.sqrt()
}

/// Coefficient of variation (σ / mean); 0.0 when the mean is zero
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    let m = mean(values);
    if m.abs() < f64::EPSILON {
        return 0.0;
    }
    std_dev(values) / m.abs()
}

/// Spread around `center` used to normalize deviations
///
/// Median absolute deviation, falling back to mean absolute deviation, then
/// to 1.0 when every value equals `center`.
pub fn robust_scale(values: &[f64], center: f64) -> f64 {
    let abs_dev: Vec<f64> = values.iter().map(|v| (v - center).abs()).collect();

    let mad = median(&abs_dev);
    if mad > f64::EPSILON {
        return mad;
    }

    let mean_dev = mean(&abs_dev);
    if mean_dev > f64::EPSILON {
        return mean_dev;
    }

    1.0
}

/// `ceil(count * numerator / denominator)` without floating-point error
pub fn ceil_fraction(count: usize, numerator: usize, denominator: usize) -> usize {
    (count * numerator + denominator - 1) / denominator
}
