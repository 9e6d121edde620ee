//! Per-trial and aggregated measurement records.
//!
//! `BenchmarkResult` is what one fork of the Sandboxed Runner produces;
//! `Measurement` is what the Trial Aggregator reduces a batch of trials
//! down to. Grounded on `tools/llvm-mc-bench/BenchmarkResult.{hpp,cpp}`,
//! whose `operator-` is the saturating subtraction reproduced in
//! [`measure`].

use serde::{Deserialize, Serialize};

/// The raw counter tuple from one harness invocation (one fork).
///
/// `num_runs` is the unroll factor the harness actually ran, never the
/// trial count — a single `BenchmarkResult` always reflects one fork.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct BenchmarkResult {
    pub failed: bool,
    pub cycles: u64,
    pub context_switches: u64,
    pub cache_misses: u64,
    pub micro_ops: u64,
    pub instructions: u64,
    pub misaligned_loads: u64,
    pub num_runs: u32,
    pub wall_time_ns: u64,
}

impl BenchmarkResult {
    /// A synthetic failed trial, for padding a batch where every fork
    /// errored out.
    pub fn failed() -> Self {
        Self {
            failed: true,
            ..Default::default()
        }
    }
}

/// The aggregated, noise-subtracted result of one harness's trial batch.
///
/// Invariant: `measured_cycles = max(0, workload_cycles - noise_cycles)`.
/// The auxiliary counters are pass-through, not subtracted: `workload_*`
/// mirrors the workload harness's averaged trial, `noise_*` mirrors the
/// noise harness's.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct Measurement {
    pub measured_cycles: u64,
    pub measured_num_runs: u32,

    pub workload_cycles: u64,
    pub workload_cache_misses: u64,
    pub workload_context_switches: u64,
    pub workload_micro_ops: u64,
    pub workload_instructions: u64,
    pub workload_num_runs: u32,

    pub noise_cycles: u64,
    pub noise_cache_misses: u64,
    pub noise_context_switches: u64,
    pub noise_micro_ops: u64,
    pub noise_instructions: u64,
    pub noise_num_runs: u32,
}

/// Combine one trimmed workload trial and one trimmed noise trial into a
/// `Measurement`. `measured_cycles` saturates at zero; the auxiliary
/// counters are copied through unmodified.
pub fn measure(workload: &BenchmarkResult, noise: &BenchmarkResult) -> Measurement {
    Measurement {
        measured_cycles: workload.cycles.saturating_sub(noise.cycles),
        measured_num_runs: workload.num_runs,

        workload_cycles: workload.cycles,
        workload_cache_misses: workload.cache_misses,
        workload_context_switches: workload.context_switches,
        workload_micro_ops: workload.micro_ops,
        workload_instructions: workload.instructions,
        workload_num_runs: workload.num_runs,

        noise_cycles: noise.cycles,
        noise_cache_misses: noise.cache_misses,
        noise_context_switches: noise.context_switches,
        noise_micro_ops: noise.micro_ops,
        noise_instructions: noise.instructions,
        noise_num_runs: noise.num_runs,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn trial(cycles: u64, num_runs: u32) -> BenchmarkResult {
        BenchmarkResult {
            cycles,
            num_runs,
            ..Default::default()
        }
    }

    #[test]
    fn measured_cycles_saturates_at_zero() {
        let workload = trial(10, 3);
        let noise = trial(40, 3);
        let m = measure(&workload, &noise);
        assert_eq!(m.measured_cycles, 0);
        assert_eq!(m.workload_cycles, 10);
        assert_eq!(m.noise_cycles, 40);
    }

    #[test]
    fn measured_cycles_subtracts_normally() {
        let workload = trial(100, 5);
        let noise = trial(30, 5);
        let m = measure(&workload, &noise);
        assert_eq!(m.measured_cycles, 70);
        assert_eq!(m.measured_num_runs, 5);
    }
}
