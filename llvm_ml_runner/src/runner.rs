//! Sandboxed Runner: fork/ptrace page discovery (Phase A) followed by
//! measured runs (Phase B), both pinned to one CPU at FIFO priority 90.
//!
//! Grounded on `cpu_benchmark_runner_linux.cpp`'s `runHarness`/`runParent`
//! pair for the overall fork/ptrace shape, and on a real-time-control
//! crate's `rt_set_affinity`/`rt_set_scheduler` helpers for the
//! affinity/FIFO calls themselves. Phase B's warm-up-then-measure loop and
//! per-trial wall-clock bracketing go further than pass/fail-only trial
//! recording, to also capture counter values per trial.

use std::os::fd::{AsRawFd, OwnedFd};
use std::time::Instant;

use nix::sys::ptrace;
use nix::sys::signal::{self, SigHandler, Signal};
use nix::sys::wait::{waitpid, WaitStatus};
use nix::unistd::{fork, ForkResult, Pid};

use llvm_ml_common::consts::{HARNESS_SCRATCH_BASE, MAX_FAULTS, PAGE_SIZE, WARMUP_INVOCATIONS};
use llvm_ml_common::result::BenchmarkResult;
use llvm_ml_counters::{mock_requested, CounterGroup, MockCounterGroup, PerfCounterGroup};
use llvm_ml_harness::AsmModule;

use crate::compile::{compile, CompiledModule, HarnessFn};
use crate::counters_ffi::{counters_start, counters_start_stub, counters_stop, counters_stop_stub, CounterContext};
use crate::error::RunnerError;
use crate::shm::{SharedArena, PAGE_ARENA_BASE, PAGE_CMD, PAGE_OUTPUT};
use crate::trampoline::{TrampolineState, TRAMPOLINE_STATE_ADDR};

/// Drives one CPU's fork/ptrace chain end to end. One instance per
/// configured worker CPU, so a dataset batch can fan out across cores.
pub struct SandboxedRunner {
    cpu: usize,
    max_faults: u32,
}

impl SandboxedRunner {
    pub fn new(cpu: usize) -> Self {
        Self {
            cpu,
            max_faults: MAX_FAULTS,
        }
    }

    /// `check(ir_module, noise_unroll) -> suggested_unroll`: Phase A only,
    /// then the calibration formula from the fastest (only) trial.
    pub fn check(&self, module: &AsmModule, _noise_unroll: u32) -> Result<u32, RunnerError> {
        let compiled = compile(module)?;
        let arena = SharedArena::create(1, 64).map_err(RunnerError::from)?;

        let start = Instant::now();
        let mapped = self.discover_pages(&compiled, &arena)?;
        let wall_time_ns = start.elapsed().as_nanos() as u64;
        drop(mapped);

        let trial = BenchmarkResult {
            failed: false,
            num_runs: 1,
            wall_time_ns,
            ..Default::default()
        };
        crate::calibrator::suggest_unroll(&trial)
    }

    /// `run(ir_module, noise_unroll, workload_unroll) -> (noise_trials,
    /// workload_trials)`.
    pub fn run(
        &self,
        module: &AsmModule,
        noise_unroll: u32,
        workload_unroll: u32,
        num_trials: u32,
    ) -> Result<(Vec<BenchmarkResult>, Vec<BenchmarkResult>), RunnerError> {
        let compiled = compile(module)?;
        let arena = SharedArena::create(num_trials.max(1), 64)?;

        let mapped = self.discover_pages(&compiled, &arena)?;

        let noise_trials =
            self.measured_runs(&compiled, compiled.baseline, noise_unroll, num_trials, &arena, &mapped)?;
        let workload_trials =
            self.measured_runs(&compiled, compiled.workload, workload_unroll, num_trials, &arena, &mapped)?;

        Ok((noise_trials, workload_trials))
    }

    /// Phase A: fork one child that runs the harness once with an unroll of
    /// 1, intercept its page faults via ptrace, and grow the
    /// mapped-address set until it exits cleanly. The same child is
    /// reused across every trampoline remap — `last_fault_rip` only ever
    /// compares faults within that one child's execution, so a second
    /// fault at the same `rip` genuinely means the trampoline looped back
    /// into trouble, not that an unrelated process touched the same
    /// address.
    fn discover_pages(
        &self,
        compiled: &CompiledModule,
        arena: &SharedArena,
    ) -> Result<Vec<u64>, RunnerError> {
        let mut mapped = Vec::new();
        let mut last_fault_rip: Option<u64> = None;

        let (read_fd, write_fd) = nix::unistd::pipe().map_err(RunnerError::Fork)?;

        let child = match unsafe { fork() }.map_err(RunnerError::Fork)? {
            ForkResult::Child => {
                drop(write_fd);
                run_child_phase_a(self.cpu, compiled, arena, read_fd);
            }
            ForkResult::Parent { child } => child,
        };
        drop(read_fd);
        ptrace::seize(child, ptrace::Options::empty()).map_err(RunnerError::Attach)?;
        // Handshake: release the child only once we're attached.
        let _ = nix::unistd::write(&write_fd, &[1u8]);
        drop(write_fd);

        for _attempt in 0..self.max_faults {
            match waitpid(child, None).map_err(RunnerError::Ptrace)? {
                WaitStatus::Exited(_, 0) => return Ok(mapped),
                WaitStatus::Exited(_, code) => {
                    return Err(RunnerError::UnknownExit(format!("exit code {code}")))
                }
                WaitStatus::Stopped(_, Signal::SIGSEGV) | WaitStatus::Stopped(_, Signal::SIGTRAP) => {
                    let siginfo = ptrace::getsiginfo(child).map_err(RunnerError::Ptrace)?;
                    let regs = ptrace::getregs(child).map_err(RunnerError::Ptrace)?;
                    let fault_addr = fault_addr_from_siginfo(&siginfo);
                    let rip = regs.rip;

                    if fault_addr == 0 {
                        let _ = ptrace::kill(child);
                        return Err(RunnerError::NullFault);
                    }
                    if last_fault_rip == Some(rip) {
                        let _ = ptrace::kill(child);
                        return Err(RunnerError::RepeatedFault(rip));
                    }
                    last_fault_rip = Some(rip);

                    let page_addr = fault_addr & !(PAGE_SIZE as u64 - 1);
                    mapped.push(page_addr);

                    let mut regs = regs;
                    regs.rip = compiled.trampoline_addr;
                    ptrace::setregs(child, regs).map_err(RunnerError::Ptrace)?;

                    write_trampoline_request(child, page_addr, rip, arena)?;

                    ptrace::cont(child, None).map_err(RunnerError::Ptrace)?;
                    // Loop continues: the trampoline's jmp back into the
                    // harness will either finish cleanly or fault again on
                    // the next unmapped page, still in this same child.
                }
                other => {
                    let _ = ptrace::kill(child);
                    return Err(RunnerError::UnknownExit(format!("{other:?}")));
                }
            }
        }

        let _ = ptrace::kill(child);
        Err(RunnerError::TooManyFaults(self.max_faults))
    }

    /// Phase B: `num_trials` forks, each pre-mapping every address
    /// discovered in Phase A, running [`WARMUP_INVOCATIONS`] stubbed-out
    /// warm-ups, then entering the measured loop.
    fn measured_runs(
        &self,
        compiled: &CompiledModule,
        harness_fn: HarnessFn,
        unroll: u32,
        num_trials: u32,
        arena: &SharedArena,
        mapped: &[u64],
    ) -> Result<Vec<BenchmarkResult>, RunnerError> {
        let mut trials = Vec::with_capacity(num_trials as usize);

        for trial_id in 0..num_trials {
            let (read_fd, write_fd) = nix::unistd::pipe().map_err(RunnerError::Fork)?;

            match unsafe { fork() }.map_err(RunnerError::Fork)? {
                ForkResult::Child => {
                    drop(write_fd);
                    run_child_phase_b(self.cpu, compiled, harness_fn, unroll, arena, mapped, trial_id, read_fd);
                }
                ForkResult::Parent { child } => {
                    drop(read_fd);
                    let _ = nix::unistd::write(&write_fd, &[1u8]);
                    drop(write_fd);

                    let start = Instant::now();
                    let status = waitpid(child, None).map_err(RunnerError::Ptrace)?;
                    let wall_time_ns = start.elapsed().as_nanos() as u64;

                    match status {
                        WaitStatus::Exited(_, 0) => {
                            let raw = unsafe { arena.read_output_slot(trial_id) };
                            trials.push(BenchmarkResult {
                                failed: false,
                                cycles: raw.cycles,
                                context_switches: raw.context_switches,
                                cache_misses: raw.cache_misses,
                                micro_ops: raw.micro_ops,
                                instructions: raw.instructions,
                                misaligned_loads: raw.misaligned_loads,
                                num_runs: unroll,
                                wall_time_ns,
                            });
                        }
                        _ => trials.push(BenchmarkResult::failed()),
                    }
                }
            }
        }

        Ok(trials)
    }
}

fn fault_addr_from_siginfo(siginfo: &libc::siginfo_t) -> u64 {
    // `libc::siginfo_t` doesn't expose `si_addr` as a safe field; it lives
    // inside the kernel's `_sifields` union at a fixed offset on x86_64
    // Linux (16 bytes into the struct, just past `si_signo`/`si_errno`/
    // `si_code`/padding).
    const SI_ADDR_OFFSET: isize = 16;
    unsafe {
        let base = siginfo as *const libc::siginfo_t as *const u8;
        (base.offset(SI_ADDR_OFFSET) as *const u64).read_unaligned()
    }
}

/// Write the pending fault address and its backing file offset into the
/// child's [`TrampolineState`] via `PTRACE_POKEDATA`.
fn write_trampoline_request(
    child: Pid,
    page_addr: u64,
    _faulting_rip: u64,
    arena: &SharedArena,
) -> Result<(), RunnerError> {
    let offset = file_offset_for_page(page_addr, arena);

    poke_u64(child, TRAMPOLINE_STATE_ADDR as u64 + 40, page_addr)?;
    poke_u64(child, TRAMPOLINE_STATE_ADDR as u64 + 48, offset)?;
    Ok(())
}

/// Map a harness-side scratch address to its backing offset in the shared
/// memory file. The saved-state address (one page above
/// `HARNESS_SCRATCH_BASE`) reuses the same arena page across every
/// restart.
fn file_offset_for_page(page_addr: u64, _arena: &SharedArena) -> u64 {
    let saved_state_addr = llvm_ml_common::consts::HARNESS_SAVED_STATE_ADDR as u64;
    if page_addr == saved_state_addr {
        return (PAGE_ARENA_BASE as u64) * PAGE_SIZE as u64;
    }
    let index = (page_addr - HARNESS_SCRATCH_BASE as u64) / PAGE_SIZE as u64;
    (PAGE_ARENA_BASE as u64 + 1 + index) * PAGE_SIZE as u64
}

fn poke_u64(pid: Pid, addr: u64, value: u64) -> Result<(), RunnerError> {
    unsafe {
        ptrace::write(pid, addr as *mut libc::c_void, value as *mut libc::c_void)
            .map_err(RunnerError::Ptrace)
    }
}

/// Best-effort: pin to `cpu` and raise to `SCHED_FIFO` priority
/// [`llvm_ml_common::consts::RUNNER_RT_PRIORITY`]. Failures are logged,
/// never fatal — this is a best-effort policy, not a correctness
/// requirement.
fn pin_and_elevate(cpu: usize) {
    use nix::sched::{sched_setaffinity, CpuSet};
    let mut set = CpuSet::new();
    if let Err(err) = set.set(cpu) {
        tracing::warn!(%err, cpu, "CpuSet::set failed");
        return;
    }
    if let Err(err) = sched_setaffinity(Pid::from_raw(0), &set) {
        tracing::warn!(%err, cpu, "sched_setaffinity failed");
    }

    let param = libc::sched_param {
        sched_priority: llvm_ml_common::consts::RUNNER_RT_PRIORITY,
    };
    let ret = unsafe { libc::sched_setscheduler(0, libc::SCHED_FIFO, &param) };
    if ret != 0 {
        tracing::warn!(err = %std::io::Error::last_os_error(), "sched_setscheduler(SCHED_FIFO) failed");
    }
}

/// Restore the platform's default SIGSEGV disposition so faults trap to
/// the tracer rather than any handler the process might otherwise install.
fn disable_default_segv_handler() {
    unsafe {
        let _ = signal::signal(Signal::SIGSEGV, SigHandler::SigDfl);
    }
}

fn open_counter_group() -> Box<dyn CounterGroup> {
    if mock_requested() {
        Box::new(MockCounterGroup::default())
    } else {
        match PerfCounterGroup::open() {
            Ok(group) => Box::new(group),
            Err(err) => {
                tracing::warn!(%err, "perf counter group open failed, falling back to mock");
                Box::new(MockCounterGroup::default())
            }
        }
    }
}

/// Phase A child body. Never returns — exits the process directly, as
/// fork children in this design do not unwind back through the parent's
/// call stack.
fn run_child_phase_a(cpu: usize, compiled: &CompiledModule, arena: &SharedArena, ready: OwnedFd) -> ! {
    pin_and_elevate(cpu);
    disable_default_segv_handler();

    let mut buf = [0u8; 1];
    let _ = nix::unistd::read(ready.as_raw_fd(), &mut buf);
    drop(ready);

    let state = TrampolineState::new(
        arena.fd(),
        compiled.workload as usize as u64,
        0,
        arena.page_ptr(PAGE_CMD) as u64,
        arena.page_ptr(PAGE_OUTPUT) as u64,
        compiled.workload as usize as u64,
    );
    unsafe { state.install() };

    let mut group = MockCounterGroup::default();
    let mut ctx = CounterContext {
        group: &mut group,
        out_slot: arena.page_ptr(PAGE_OUTPUT).cast(),
        num_runs: 1,
    };
    let ctx_ptr = (&mut ctx) as *mut CounterContext as *mut libc::c_void;

    unsafe {
        (compiled.workload)(
            ctx_ptr,
            counters_start as *mut libc::c_void,
            counters_stop as *mut libc::c_void,
            std::ptr::null_mut(),
        );
    }

    std::process::exit(0);
}

/// Phase B child body for one trial: pre-map every Phase-A address,
/// prefetch it, run the warm-ups, then the real measured invocation.
fn run_child_phase_b(
    cpu: usize,
    compiled: &CompiledModule,
    harness_fn: HarnessFn,
    unroll: u32,
    arena: &SharedArena,
    mapped: &[u64],
    trial_id: u32,
    ready: OwnedFd,
) -> ! {
    use nix::sys::mman::{mmap, MapFlags, ProtFlags};

    pin_and_elevate(cpu);
    disable_default_segv_handler();

    let mut buf = [0u8; 1];
    let _ = nix::unistd::read(ready.as_raw_fd(), &mut buf);
    drop(ready);

    for (i, &addr) in mapped.iter().enumerate() {
        let offset = file_offset_for_page(addr, arena);
        unsafe {
            let _ = mmap(
                std::num::NonZeroUsize::new(addr as usize),
                std::num::NonZeroUsize::new(PAGE_SIZE).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED | MapFlags::MAP_FIXED,
                arena.fd(),
                offset as i64,
            );
            std::ptr::read_volatile(addr as *const u8);
        }
        let _ = i;
    }

    let mut group = open_counter_group();
    let mut ctx = CounterContext {
        group: group.as_mut(),
        out_slot: arena.page_ptr(PAGE_OUTPUT).cast::<crate::shm::RawBenchmarkResult>().wrapping_add(trial_id as usize),
        num_runs: unroll,
    };
    let ctx_ptr = (&mut ctx) as *mut CounterContext as *mut libc::c_void;

    for _ in 0..WARMUP_INVOCATIONS {
        unsafe {
            harness_fn(
                ctx_ptr,
                counters_start_stub as *mut libc::c_void,
                counters_stop_stub as *mut libc::c_void,
                std::ptr::null_mut(),
            );
        }
        nix::sched::sched_yield().ok();
    }

    unsafe {
        harness_fn(
            ctx_ptr,
            counters_start as *mut libc::c_void,
            counters_stop as *mut libc::c_void,
            std::ptr::null_mut(),
        );
    }

    let _ = compiled;
    std::process::exit(0);
}
