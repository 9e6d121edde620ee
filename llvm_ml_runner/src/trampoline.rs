//! The child-side fault-handling trampoline state: `{shared_mem_fd,
//! bench_fn, counters_ctx, cmd_page, out_page}` bundled into a single
//! page-sized struct at a well-known address, which the trampoline reads
//! its fields from.
//!
//! The trampoline itself is entered by the parent rewriting the child's
//! instruction pointer after a page fault during Phase A; it cannot be
//! called with arguments, so every value it needs lives at this fixed
//! address instead of in a register or on the stack.

use llvm_ml_common::consts::HARNESS_SCRATCH_BASE;

/// One page below [`HARNESS_SCRATCH_BASE`] — outside the demand-mapped
/// arena the workload itself touches, so the trampoline's bookkeeping
/// page never competes with Phase A's fault discovery.
pub const TRAMPOLINE_STATE_ADDR: usize = HARNESS_SCRATCH_BASE - llvm_ml_common::consts::PAGE_SIZE;

/// One instance lives at [`TRAMPOLINE_STATE_ADDR`] in the child's address
/// space, written once before the first harness invocation, bundling
/// every scattered global the trampoline would otherwise need.
///
/// `pending_fault_addr`/`pending_fault_offset` are rewritten by the parent
/// (via `PTRACE_POKEDATA`) before every resume-into-trampoline: the parent
/// already knows, from the fault address, which file offset backs it —
/// including the saved-state address's special case of being backed by a
/// different offset of the same shared memory — so the trampoline itself
/// never branches on address identity, it just mmaps whatever offset it's
/// told to.
#[repr(C, align(64))]
#[derive(Debug, Clone, Copy)]
pub struct TrampolineState {
    pub shared_mem_fd: i32,
    pub _pad: i32,
    pub bench_fn: u64,
    pub counters_ctx: u64,
    pub cmd_page_addr: u64,
    pub out_page_addr: u64,
    /// Address of the harness's own top-of-function restart label, so the
    /// trampoline re-enters from the top rather than resuming mid-fault.
    pub restart_addr: u64,
    pub pending_fault_addr: u64,
    pub pending_fault_offset: u64,
}

impl TrampolineState {
    pub fn new(
        shared_mem_fd: i32,
        bench_fn: u64,
        counters_ctx: u64,
        cmd_page_addr: u64,
        out_page_addr: u64,
        restart_addr: u64,
    ) -> Self {
        Self {
            shared_mem_fd,
            _pad: 0,
            bench_fn,
            counters_ctx,
            cmd_page_addr,
            out_page_addr,
            restart_addr,
            pending_fault_addr: 0,
            pending_fault_offset: 0,
        }
    }

    /// Write `self` into the child's address space at
    /// [`TRAMPOLINE_STATE_ADDR`], which must already be mapped.
    ///
    /// # Safety
    /// Caller must ensure a writable page backs `TRAMPOLINE_STATE_ADDR` in
    /// the current process before calling this (only ever invoked inside
    /// the freshly forked child, immediately after it maps its own copy of
    /// the arena).
    pub unsafe fn install(self) {
        let ptr = TRAMPOLINE_STATE_ADDR as *mut TrampolineState;
        ptr.write_volatile(self);
    }

    /// # Safety
    /// Caller must ensure [`install`](Self::install) already ran in this
    /// process.
    pub unsafe fn load() -> Self {
        let ptr = TRAMPOLINE_STATE_ADDR as *const TrampolineState;
        ptr.read_volatile()
    }
}

/// Symbol name the trampoline function is exported under in the compiled
/// shared object, so the parent can resolve its address once at load time
/// and reuse it for every `PTRACE_SETREGS` rip rewrite.
pub const TRAMPOLINE_SYMBOL: &str = "map_and_restart";

/// Byte offsets of each field within [`TrampolineState`], matching its
/// `#[repr(C)]` layout, so the generated assembly can address them without
/// a real struct definition available to the assembler.
mod field_offset {
    pub const SHARED_MEM_FD: u64 = 0;
    pub const RESTART_ADDR: u64 = 32;
    pub const PENDING_FAULT_ADDR: u64 = 40;
    pub const PENDING_FAULT_OFFSET: u64 = 48;
}

/// `mmap(addr, len, prot, flags, fd, offset)` syscall constants for the
/// x86-64 System V ABI.
const SYS_MMAP: u64 = 9;
const PROT_READ_WRITE: u64 = 0x3; // PROT_READ | PROT_WRITE
const MAP_FIXED_SHARED: u64 = 0x10 | 0x01; // MAP_FIXED | MAP_SHARED

/// Emit the GAS text of the `map_and_restart` trampoline: reads the
/// pending fault address/offset and the shared-memory fd out of
/// [`TrampolineState`], `mmap`s the page, then jumps to `restart_addr`.
/// Entered only by the parent rewriting the child's instruction pointer —
/// never called through the normal ABI, so it takes no arguments and
/// never returns.
pub fn build_trampoline_asm() -> String {
    format!(
        "  .globl {sym}\n  .type {sym}, @function\n{sym}:\n\
           movq ${state:#x}, %rbx\n\
           movq {fd}(%rbx), %edi\n\
           movq {fault_addr}(%rbx), %rsi\n\
           movq %rsi, %rdi\n\
           movq $4096, %rsi\n\
           movq ${prot:#x}, %rdx\n\
           movq ${flags:#x}, %r10\n\
           movq {fd}(%rbx), %r8\n\
           movq {fault_off}(%rbx), %r9\n\
           movq ${sys_mmap}, %rax\n\
           syscall\n\
           movq {restart}(%rbx), %rax\n\
           jmp *%rax\n",
        sym = TRAMPOLINE_SYMBOL,
        state = TRAMPOLINE_STATE_ADDR,
        fd = field_offset::SHARED_MEM_FD,
        fault_addr = field_offset::PENDING_FAULT_ADDR,
        fault_off = field_offset::PENDING_FAULT_OFFSET,
        restart = field_offset::RESTART_ADDR,
        prot = PROT_READ_WRITE,
        flags = MAP_FIXED_SHARED,
        sys_mmap = SYS_MMAP,
    )
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn state_addr_is_page_aligned_and_below_scratch() {
        assert_eq!(TRAMPOLINE_STATE_ADDR % llvm_ml_common::consts::PAGE_SIZE, 0);
        assert!(TRAMPOLINE_STATE_ADDR < HARNESS_SCRATCH_BASE);
    }

    #[test]
    fn trampoline_asm_defines_the_expected_symbol() {
        let text = build_trampoline_asm();
        assert!(text.contains(&format!("{TRAMPOLINE_SYMBOL}:")));
        assert!(text.contains("syscall"));
    }
}
