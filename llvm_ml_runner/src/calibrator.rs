//! Calibrator: suggest a workload unroll factor from a fast check run.

use llvm_ml_common::consts::{
    CALIBRATION_FILL_FRACTION, CALIBRATION_MIN_UNROLL, CALIBRATION_SLICE_NS,
    MIN_MEASURABLE_NS_PER_ITER,
};
use llvm_ml_common::result::BenchmarkResult;

use crate::error::RunnerError;

/// From the fastest Phase-A trial, estimate `ns_per_iter` and suggest an
/// unroll factor that fills [`CALIBRATION_FILL_FRACTION`] of one
/// [`CALIBRATION_SLICE_NS`] time slice, floored at
/// [`CALIBRATION_MIN_UNROLL`].
pub fn suggest_unroll(fastest: &BenchmarkResult) -> Result<u32, RunnerError> {
    if fastest.num_runs == 0 {
        return Err(RunnerError::NoSuccessfulTrials);
    }

    let ns_per_iter = fastest.wall_time_ns as f64 / fastest.num_runs as f64;
    if ns_per_iter.abs() < MIN_MEASURABLE_NS_PER_ITER {
        return Err(RunnerError::TooFastToCalibrate(ns_per_iter));
    }

    let raw = CALIBRATION_FILL_FRACTION * CALIBRATION_SLICE_NS / ns_per_iter;
    Ok((raw.floor() as u32).max(CALIBRATION_MIN_UNROLL))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(wall_time_ns: u64, num_runs: u32) -> BenchmarkResult {
        BenchmarkResult {
            wall_time_ns,
            num_runs,
            ..Default::default()
        }
    }

    #[test]
    fn too_fast_to_measure_is_an_error() {
        let fastest = trial(1, 1);
        assert!(suggest_unroll(&fastest).is_err());
    }

    #[test]
    fn floors_at_calibration_min_unroll() {
        // ns_per_iter huge -> raw estimate near zero, floor kicks in.
        let fastest = trial(1_000_000_000, 1);
        assert_eq!(suggest_unroll(&fastest).unwrap(), CALIBRATION_MIN_UNROLL);
    }

    #[test]
    fn scales_with_measured_rate() {
        // 100 ns/iter -> raw = 0.8 * 1_000_000 / 100 = 8000.
        let fastest = trial(100_000, 1000);
        assert_eq!(suggest_unroll(&fastest).unwrap(), 8000);
    }
}
