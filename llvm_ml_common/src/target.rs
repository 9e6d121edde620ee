//! The `MLTarget` capability set.
//!
//! `MLTarget` is a capability set over register classification, instruction
//! classification, and (in `llvm_ml_target`) inline-asm code generation,
//! implemented as one trait with per-target impls dispatched through a
//! `&dyn MLTarget`, not an open inheritance hierarchy.

use std::collections::HashSet;

use crate::instruction::{Instruction, RegId};

/// Target-specific instruction and register classification.
///
/// Implementations must be pure functions of the instruction (and, for
/// register predicates, the register id) — the graph builder and extractor
/// call these repeatedly and assume referential transparency.
pub trait MLTarget {
    /// Registers this instruction reads, including implicit uses.
    fn reads_regs(&self, inst: &Instruction) -> HashSet<RegId>;
    /// Registers this instruction writes, including implicit defs.
    fn writes_regs(&self, inst: &Instruction) -> HashSet<RegId>;

    /// True if the instruction may read memory.
    fn is_load(&self, inst: &Instruction) -> bool;
    /// True if the instruction may write memory.
    fn is_store(&self, inst: &Instruction) -> bool;
    /// True if the instruction is a memory/execution barrier.
    fn is_barrier(&self, inst: &Instruction) -> bool;
    /// True if the instruction operates on vector registers.
    fn is_vector(&self, inst: &Instruction) -> bool;
    /// True if the instruction has the lock/atomic prefix or is inherently atomic.
    fn is_atomic(&self, inst: &Instruction) -> bool;
    /// True if the instruction does real computation (not a pure data-movement op).
    fn is_compute(&self, inst: &Instruction) -> bool;
    /// True if the instruction operates on floating-point state.
    fn is_float(&self, inst: &Instruction) -> bool;
    /// True if the instruction is an address computation (`lea` and kin).
    fn is_lea(&self, inst: &Instruction) -> bool;
    /// True if the instruction pushes onto the stack.
    fn is_push(&self, inst: &Instruction) -> bool;
    /// True if the instruction pops off the stack.
    fn is_pop(&self, inst: &Instruction) -> bool;
    /// True if the instruction is a register/immediate move.
    fn is_mov(&self, inst: &Instruction) -> bool;
    /// True if the instruction is architecturally a no-op.
    fn is_nop(&self, inst: &Instruction) -> bool;
    /// True if the instruction traps into the kernel.
    fn is_syscall(&self, inst: &Instruction) -> bool;
    /// True if the instruction has data-dependent or otherwise
    /// non-deterministic latency, dropped by the postprocessing filter.
    fn is_var_latency(&self, inst: &Instruction) -> bool;

    /// True if `inst` reads or writes `reg` as an implicit (not
    /// operand-list) register use.
    fn is_implicit_reg(&self, inst: &Instruction, reg: RegId) -> bool;
    /// True if `reg` belongs to the vector register file.
    fn is_vector_reg(&self, reg: RegId) -> bool;
    /// True if `reg` belongs to a tile/matrix register file.
    fn is_tile_reg(&self, reg: RegId) -> bool;

    /// True if the instruction ends a basic block by itself (unconditional
    /// or conditional control transfer, return, trap).
    fn is_terminator(&self, inst: &Instruction) -> bool;
    /// True if the instruction is a call.
    fn is_call(&self, inst: &Instruction) -> bool;
}
