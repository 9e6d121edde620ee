//! Trial Aggregator: reduce a batch of per-trial measurements to one.

use llvm_ml_common::consts::TRIM_TOP_N;
use llvm_ml_common::result::BenchmarkResult;

/// Sort `trials` ascending by cycles, drop the [`TRIM_TOP_N`] highest, and
/// average each counter field over the remaining successful trials.
/// Failed trials are skipped in the average but still counted toward how
/// many were dropped. The returned record carries the original `num_runs`
/// unroll factor (unchanged by averaging).
///
/// Total: if every trial fails (even after trimming), this still returns a
/// record rather than erroring — [`BenchmarkResult::failed`], a zeroed
/// "no sample" payload with `failed: true`. Callers write that record
/// through like any other result instead of aborting the run.
pub fn aggregate(mut trials: Vec<BenchmarkResult>) -> BenchmarkResult {
    trials.sort_by_key(|t| t.cycles);

    let keep = trials.len().saturating_sub(TRIM_TOP_N);
    let trimmed = &trials[..keep];

    let successful: Vec<&BenchmarkResult> = trimmed.iter().filter(|t| !t.failed).collect();
    if successful.is_empty() {
        return BenchmarkResult::failed();
    }

    let n = successful.len() as u64;
    let num_runs = successful[0].num_runs;

    let sum = |f: fn(&BenchmarkResult) -> u64| successful.iter().map(|t| f(t)).sum::<u64>();

    BenchmarkResult {
        failed: false,
        cycles: sum(|t| t.cycles) / n,
        context_switches: sum(|t| t.context_switches) / n,
        cache_misses: sum(|t| t.cache_misses) / n,
        micro_ops: sum(|t| t.micro_ops) / n,
        instructions: sum(|t| t.instructions) / n,
        misaligned_loads: sum(|t| t.misaligned_loads) / n,
        num_runs,
        wall_time_ns: successful.iter().map(|t| t.wall_time_ns).sum::<u64>() / n,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(cycles: u64) -> BenchmarkResult {
        BenchmarkResult {
            failed: false,
            cycles,
            num_runs: 100,
            ..Default::default()
        }
    }

    #[test]
    fn drops_two_slowest_and_averages_the_rest() {
        let trials = vec![trial(10), trial(20), trial(30), trial(1000), trial(2000)];
        let result = aggregate(trials);
        assert_eq!(result.cycles, 20);
        assert_eq!(result.num_runs, 100);
    }

    #[test]
    fn all_failed_trials_after_trim_yields_a_failed_sentinel() {
        let mut a = BenchmarkResult::failed();
        a.cycles = 5;
        let mut b = BenchmarkResult::failed();
        b.cycles = 6;
        let result = aggregate(vec![a, b]);
        assert!(result.failed);
        assert_eq!(result.cycles, 0);
    }
}
