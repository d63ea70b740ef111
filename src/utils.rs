//! Small numeric helpers shared across the library.

/// Round a value to a fixed number of decimal places.
/// NaN and infinities pass through unchanged.
pub fn round_to(x: f64, decimals: u32) -> f64 {
    if !x.is_finite() {
        return x;
    }
    let scale = 10f64.powi(decimals as i32);
    (x * scale).round() / scale
}

/// Arithmetic mean of a sample. NaN on an empty sample.
pub fn mean(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation of a sample. NaN on an empty sample.
pub fn std_dev(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let mu = mean(values);
    let var = values.iter().map(|v| (v - mu).powi(2)).sum::<f64>() / values.len() as f64;
    var.sqrt()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_round_to() {
        assert_eq!(round_to(0.98765, 3), 0.988);
        assert_eq!(round_to(0.98765, 2), 0.99);
        assert_eq!(round_to(-1.25, 1), -1.3);
        assert_eq!(round_to(2.0, 3), 2.0);
        assert!(round_to(f64::NAN, 3).is_nan());
        assert_eq!(round_to(f64::INFINITY, 2), f64::INFINITY);
    }

    #[test]
    fn test_mean_and_std_dev() {
        let values = [1.0, 2.0, 3.0, 4.0];
        assert!((mean(&values) - 2.5).abs() < 1e-6);
        assert!((std_dev(&values) - 1.118034).abs() < 1e-6);

        // Degenerate samples
        assert!(mean(&[]).is_nan());
        assert!(std_dev(&[]).is_nan());
        assert!((std_dev(&[5.0]) - 0.0).abs() < 1e-6);
    }
}
