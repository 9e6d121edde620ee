//! `extern "C"` trampoline functions the compiled harness calls through
//! function pointers (`counters_start`, `counters_stop` in
//! `llvm_ml_harness::generator`'s calling convention).
//!
//! `ctx` is a raw pointer to a boxed [`CounterGroup`], passed across the
//! `fork` boundary as a plain address (the child inherits the same
//! mapping via copy-on-write, so the pointer stays valid).

use std::os::raw::c_void;

use llvm_ml_counters::{CounterGroup, CounterSample};

use crate::shm::RawBenchmarkResult;

/// Per-trial state the two FFI entry points share: the open counter group
/// and the output slot this invocation writes to on stop.
pub struct CounterContext<'a> {
    pub group: &'a mut dyn CounterGroup,
    pub out_slot: *mut RawBenchmarkResult,
    pub num_runs: u32,
}

/// Called by the compiled harness immediately before the unrolled
/// workload. `ctx` must point to a live [`CounterContext`].
///
/// # Safety
/// `ctx` must be non-null and point to a [`CounterContext`] valid for the
/// duration of this call.
pub unsafe extern "C" fn counters_start(ctx: *mut c_void) {
    let ctx = &mut *ctx.cast::<CounterContext>();
    if let Err(err) = ctx.group.start() {
        tracing::error!(%err, "counter group start failed");
    }
}

/// Called by the compiled harness immediately after the unrolled
/// workload. Flushes counter values into the shared output slot.
///
/// # Safety
/// Same preconditions as [`counters_start`].
pub unsafe extern "C" fn counters_stop(ctx: *mut c_void) {
    let ctx = &mut *ctx.cast::<CounterContext>();
    if let Err(err) = ctx.group.stop() {
        tracing::error!(%err, "counter group stop failed");
        return;
    }

    let mut result = RawBenchmarkResult {
        num_runs: ctx.num_runs,
        ..Default::default()
    };
    ctx.group.flush(&mut |samples: &[CounterSample]| {
        for sample in samples {
            apply_sample(&mut result, sample);
        }
    });

    ctx.out_slot.write_volatile(result);
}

/// No-op stand-ins used for the warm-up invocations in Phase B, so the
/// workload runs at full speed before the first measured counter read.
pub unsafe extern "C" fn counters_start_stub(_ctx: *mut c_void) {}
pub unsafe extern "C" fn counters_stop_stub(_ctx: *mut c_void) {}

fn apply_sample(result: &mut RawBenchmarkResult, sample: &CounterSample) {
    use llvm_ml_counters::CounterKind;
    match sample.kind {
        CounterKind::Cycles => result.cycles = sample.value,
        CounterKind::Instructions => result.instructions = sample.value,
        CounterKind::CacheMisses => result.cache_misses = sample.value,
        CounterKind::ContextSwitches => result.context_switches = sample.value,
        CounterKind::MicroOps => result.micro_ops = sample.value,
    }
}
