//! Shared anonymous memory carved into fixed-size pages: one page for the
//! page-fault command, one for the output buffer, and additional pages
//! for the arena the harness demand-maps into.
//!
//! Grounded on the `shm_open` + `ftruncate` + `mmap` pattern used
//! elsewhere in this workspace for shared-memory IPC. Ownership is a
//! scoped handle that unmaps and unlinks on drop, implemented directly in
//! [`SharedArena`]'s `Drop`.

use std::os::fd::{AsRawFd, OwnedFd};

use nix::sys::mman::{mmap, munmap, MapFlags, ProtFlags};
use nix::sys::stat::Mode;
use nix::unistd::ftruncate;

use llvm_ml_common::consts::PAGE_SIZE;

use crate::error::RunnerError;

/// Page index of the page-fault command slot.
pub const PAGE_CMD: usize = 0;
/// Page index of the output buffer (one `BenchmarkResult` slot per trial).
pub const PAGE_OUTPUT: usize = 1;
/// First page index available to the harness's demand-mapped arena.
pub const PAGE_ARENA_BASE: usize = 2;

/// A `BenchmarkResult` packed as it is written by the child across the
/// output page: one slot per trial index, fixed-width so the parent can
/// index it without a length prefix.
#[repr(C)]
#[derive(Debug, Clone, Copy, Default)]
pub struct RawBenchmarkResult {
    pub failed: u8,
    pub _pad: [u8; 7],
    pub cycles: u64,
    pub context_switches: u64,
    pub cache_misses: u64,
    pub micro_ops: u64,
    pub instructions: u64,
    pub misaligned_loads: u64,
    pub num_runs: u32,
    pub _pad2: u32,
    pub wall_time_ns: u64,
}

/// A POSIX shared-memory-file-backed arena, sized to hold the command and
/// output pages plus `arena_pages` additional pages the trampoline can
/// `mmap(MAP_FIXED)` individual pages of on demand.
pub struct SharedArena {
    fd: OwnedFd,
    base: *mut libc::c_void,
    total_len: usize,
    name: String,
}

// SAFETY: the mapping is process-shared memory; `SharedArena` only ever
// hands out raw offsets into it, never a live Rust reference across
// threads without external synchronization (the runner's own fork/wait
// protocol provides that).
unsafe impl Send for SharedArena {}

impl SharedArena {
    /// Allocate a shared memory file big enough for the command page, the
    /// output page sized for `max_trials` result slots, and `arena_pages`
    /// scratch pages, then map it into this process.
    pub fn create(max_trials: u32, arena_pages: usize) -> Result<Self, RunnerError> {
        let output_bytes = max_trials as usize * std::mem::size_of::<RawBenchmarkResult>();
        let output_pages = output_bytes.div_ceil(PAGE_SIZE).max(1);
        let total_pages = PAGE_ARENA_BASE + output_pages.max(1) + arena_pages;
        let total_len = total_pages * PAGE_SIZE;

        let name = format!("/llvm_ml_runner_{}", std::process::id());
        let fd = nix::sys::mman::shm_open(
            name.as_str(),
            nix::fcntl::OFlag::O_CREAT | nix::fcntl::OFlag::O_RDWR | nix::fcntl::OFlag::O_EXCL,
            Mode::S_IRUSR | Mode::S_IWUSR,
        )
        .map_err(|e| RunnerError::SharedMemory(std::io::Error::from(e)))?;

        ftruncate(&fd, total_len as libc::off_t)
            .map_err(|e| RunnerError::SharedMemory(std::io::Error::from(e)))?;

        let base = unsafe {
            mmap(
                None,
                std::num::NonZeroUsize::new(total_len).unwrap(),
                ProtFlags::PROT_READ | ProtFlags::PROT_WRITE,
                MapFlags::MAP_SHARED,
                &fd,
                0,
            )
            .map_err(|e| RunnerError::SharedMemory(std::io::Error::from(e)))?
        };

        Ok(Self {
            fd,
            base: base.as_ptr(),
            total_len,
            name,
        })
    }

    pub fn fd(&self) -> i32 {
        self.fd.as_raw_fd()
    }

    /// Pointer to the start of page `index`.
    pub fn page_ptr(&self, index: usize) -> *mut libc::c_void {
        unsafe { self.base.add(index * PAGE_SIZE) }
    }

    /// Read one `RawBenchmarkResult` slot from the output page.
    ///
    /// # Safety
    /// Caller must ensure the child has finished writing slot `trial_id`
    /// (established by `waitpid` returning) before calling this.
    pub unsafe fn read_output_slot(&self, trial_id: u32) -> RawBenchmarkResult {
        let ptr = self
            .page_ptr(PAGE_OUTPUT)
            .cast::<RawBenchmarkResult>()
            .add(trial_id as usize);
        ptr.read_volatile()
    }
}

impl Drop for SharedArena {
    fn drop(&mut self) {
        unsafe {
            let _ = munmap(
                std::ptr::NonNull::new(self.base).unwrap(),
                self.total_len,
            );
        }
        let _ = nix::sys::mman::shm_unlink(self.name.as_str());
    }
}
