//! Basic sample statistics shared by the calibrator, aggregator, and
//! dataset assembler.
//!
//! Grounded on `lib/statistics/cov.hpp`, with one deliberate correction:
//! that file's `coefficient_of_variation` returns `mean / sigma`, inverted
//! from the textbook definition; [`coefficient_of_variation`] here returns
//! the corrected `sigma / mean`.

/// Population mean. Panics if `values` is empty — callers are expected to
/// have already checked for a non-empty trial batch.
pub fn mean(values: &[f64]) -> f64 {
    values.iter().sum::<f64>() / values.len() as f64
}

/// Population standard deviation around a precomputed `mean`.
pub fn standard_deviation(values: &[f64], mean: f64) -> f64 {
    let sum_sq: f64 = values.iter().map(|v| (v - mean) * (v - mean)).sum();
    (sum_sq / values.len() as f64).sqrt()
}

/// Coefficient of variation, `stddev / mean`. Returns `f64::NAN` if
/// `values` is empty or `mean` is zero, which the Dataset Assembler filters
/// out.
pub fn coefficient_of_variation(values: &[f64]) -> f64 {
    if values.is_empty() {
        return f64::NAN;
    }
    let m = mean(values);
    let sigma = standard_deviation(values, m);
    sigma / m
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mean_of_uniform_values() {
        assert_eq!(mean(&[2.0, 2.0, 2.0]), 2.0);
    }

    #[test]
    fn stddev_of_uniform_values_is_zero() {
        let values = [5.0, 5.0, 5.0];
        let m = mean(&values);
        assert_eq!(standard_deviation(&values, m), 0.0);
    }

    #[test]
    fn cov_is_stddev_over_mean_not_inverted() {
        let values = [8.0, 10.0, 12.0];
        let cov = coefficient_of_variation(&values);
        let m = mean(&values);
        let sigma = standard_deviation(&values, m);
        assert!((cov - sigma / m).abs() < 1e-12);
        assert!(cov < 1.0, "cov should be a small fraction, not mean/sigma");
    }

    #[test]
    fn cov_of_empty_is_nan() {
        assert!(coefficient_of_variation(&[]).is_nan());
    }
}
