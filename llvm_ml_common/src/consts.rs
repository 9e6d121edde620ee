//! System-wide constants for the llvm-ml workspace.
//!
//! Single source of truth for every numeric limit, well-known address, and
//! default the measurement core is tuned around. Imported by every other
//! crate — no duplication permitted.

/// Page size assumed for shared-memory arithmetic. The workspace only
/// targets platforms with a 4 KiB base page size.
pub const PAGE_SIZE: usize = 4096;

/// Base address the harness seeds every general-purpose register with
/// before entering the workload, and the base of the demand-mapped arena.
/// Must be page-aligned and must not collide with any address the linker
/// might place the shared object at.
///
/// One named constant everything else derives from, rather than the
/// value (and its sibling below) being copy-pasted wherever it's needed.
pub const HARNESS_SCRATCH_BASE: usize = 0x0232_4000;

/// Address of the saved base/stack-pointer slot, reused across trampoline
/// restarts. Always one page above [`HARNESS_SCRATCH_BASE`].
pub const HARNESS_SAVED_STATE_ADDR: usize = HARNESS_SCRATCH_BASE + PAGE_SIZE;

/// Upper bound on Phase-A page-fault iterations before the runner gives up.
pub const MAX_FAULTS: u32 = 30;

/// Default unroll factor for the noise/baseline harness.
pub const DEFAULT_NUM_REPEAT_NOISE: u32 = 10;

/// Default number of measured trials per harness.
pub const DEFAULT_MAX_TRIALS: u32 = 50;

/// Number of warm-up invocations performed before the measured loop in
/// Phase B, with counters stubbed out.
pub const WARMUP_INVOCATIONS: u32 = 5;

/// Number of slowest trials dropped by the Trial Aggregator.
pub const TRIM_TOP_N: usize = 2;

/// Target CPU time slice the calibrator fills, in nanoseconds (~1ms).
pub const CALIBRATION_SLICE_NS: f64 = 1_000_000.0;

/// Fraction of [`CALIBRATION_SLICE_NS`] the calibrator aims to fill.
pub const CALIBRATION_FILL_FRACTION: f64 = 0.8;

/// Floor under which a calibrated unroll factor is not trusted.
pub const CALIBRATION_MIN_UNROLL: u32 = 200;

/// Below this many nanoseconds per iteration, the calibrator refuses to
/// produce an estimate — too short to measure reliably.
pub const MIN_MEASURABLE_NS_PER_ITER: f64 = 10.0;

/// FIFO scheduling priority the runner requests for pinned child processes.
pub const RUNNER_RT_PRIORITY: i32 = 90;

/// Default maximum coefficient of variation accepted by the dataset
/// assembler, expressed as an integer percentage (`--max-cov`).
pub const DEFAULT_MAX_COV_PERCENT: u32 = 10;

/// Bounded word budget for the packed binary codec reader (128 Mi-words).
pub const CODEC_WORD_BUDGET: u64 = 128 * 1024 * 1024;

/// Bounded nesting depth for the packed binary codec reader.
pub const CODEC_MAX_DEPTH: u32 = 128;

/// Name of the generated baseline/noise harness function.
pub const BASELINE_NOISE_NAME: &str = "baseline";

/// Name of the generated workload harness function.
pub const WORKLOAD_NAME: &str = "workload";

/// Environment variable that selects the mock `CounterGroup` implementation.
pub const MOCK_ENV_VAR: &str = "LLVM_ML_BENCH_MOCK";

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn scratch_addresses_are_page_aligned() {
        assert_eq!(HARNESS_SCRATCH_BASE % PAGE_SIZE, 0);
        assert_eq!(HARNESS_SAVED_STATE_ADDR % PAGE_SIZE, 0);
        assert_eq!(HARNESS_SAVED_STATE_ADDR, HARNESS_SCRATCH_BASE + PAGE_SIZE);
    }

    #[test]
    fn calibration_constants_are_sane() {
        assert!(CALIBRATION_FILL_FRACTION > 0.0 && CALIBRATION_FILL_FRACTION < 1.0);
        assert!(CALIBRATION_MIN_UNROLL > 0);
        assert!(MIN_MEASURABLE_NS_PER_ITER > 0.0);
    }
}
