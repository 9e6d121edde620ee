//! x86-64 `MLTarget` implementation.
//!
//! Grounded on `lib/target/X86Target.cpp`. That file answers every
//! classification query against LLVM's `MCInstrDesc`
//! (load/store/barrier/optional-def flags looked up by opcode); without
//! that table this target answers the same queries from the mnemonic,
//! which the text assembler and the iced-x86 decoder both agree on. A
//! couple of `TODO`-marked approximations (`isCompute`, `isFloat`) carry
//! over as the same approximations here.

use std::collections::HashSet;

use llvm_ml_common::{Instruction, MLTarget, Operand, RegId};

use crate::regs::{self, GPR_BASE};

const RSP: RegId = GPR_BASE + 4;
const RBP: RegId = GPR_BASE + 5;

/// Variable-latency mnemonics: division, roots, transcendentals,
/// string/rep-prefixed moves, prefetches, gather/scatter, and `cpuid`.
/// Matched as exact mnemonics or prefixes.
const VAR_LATENCY_EXACT: &[&str] = &[
    "div", "idiv", "cpuid", "rep", "repe", "repne", "movsb", "movsd", "stosb", "lodsb", "scasb",
];
const VAR_LATENCY_PREFIXES: &[&str] = &[
    "sqrt", "rsqrt", "prefetch", "vgather", "vscatter", "vpgather", "vpscatter", "div", "idiv",
];

/// Pure data-movement mnemonics: excluded from `is_compute`.
const MOVE_MNEMONICS: &[&str] = &[
    "mov", "movq", "movl", "movw", "movb", "movzx", "movsx", "movaps", "movups", "vmovaps",
    "vmovups", "lea",
];

/// Shape of an instruction's register reads/writes, derived from its
/// mnemonic class. AT&T order is source-then-destination.
#[derive(Clone, Copy, PartialEq, Eq)]
enum RwShape {
    /// All register operands are reads only (`cmp`, `test`).
    AllRead,
    /// Last operand is write-only, the rest are reads (`mov`, `lea`).
    MoveLike,
    /// Last operand is both read and written (`add`, `xor`, `inc`).
    ReadModifyWrite,
}

fn rw_shape(mnemonic: &str) -> RwShape {
    match mnemonic {
        "cmp" | "test" => RwShape::AllRead,
        m if MOVE_MNEMONICS.contains(&m) => RwShape::MoveLike,
        _ => RwShape::ReadModifyWrite,
    }
}

/// x86-64 target. Stateless: every query is a pure function of the
/// instruction, so one instance is shared across an entire run.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86Target;

impl X86Target {
    pub fn new() -> Self {
        Self
    }

    fn is_push_mnemonic(mnemonic: &str) -> bool {
        matches!(mnemonic, "push" | "pushq")
    }

    fn is_pop_mnemonic(mnemonic: &str) -> bool {
        matches!(mnemonic, "pop" | "popq")
    }

    fn is_call_mnemonic(mnemonic: &str) -> bool {
        mnemonic == "call"
    }

    fn is_ret_mnemonic(mnemonic: &str) -> bool {
        matches!(mnemonic, "ret" | "retq" | "leave")
    }

    fn is_jump_mnemonic(mnemonic: &str) -> bool {
        mnemonic.starts_with('j')
    }
}

impl MLTarget for X86Target {
    fn reads_regs(&self, inst: &Instruction) -> HashSet<RegId> {
        let mut regs: HashSet<RegId> = inst.memory_regs().collect();

        if Self::is_push_mnemonic(&inst.mnemonic) || Self::is_ret_mnemonic(&inst.mnemonic) {
            regs.insert(RSP);
        }
        if Self::is_pop_mnemonic(&inst.mnemonic) {
            regs.insert(RSP);
        }
        if Self::is_ret_mnemonic(&inst.mnemonic) {
            regs.insert(RBP);
        }

        let op_regs: Vec<RegId> = inst.operand_regs().collect();
        let shape = rw_shape(&inst.mnemonic);
        match shape {
            RwShape::AllRead => regs.extend(op_regs),
            RwShape::MoveLike | RwShape::ReadModifyWrite => {
                // The destination of a single-operand instruction is its
                // only operand; treat it as read for RMW shapes and
                // skip it for pure move-like shapes.
                if op_regs.len() <= 1 {
                    if shape == RwShape::ReadModifyWrite {
                        regs.extend(op_regs);
                    }
                } else {
                    regs.extend(op_regs[..op_regs.len() - 1].iter().copied());
                    if shape == RwShape::ReadModifyWrite {
                        regs.insert(op_regs[op_regs.len() - 1]);
                    }
                }
            }
        }

        regs
    }

    fn writes_regs(&self, inst: &Instruction) -> HashSet<RegId> {
        let mut regs = HashSet::new();

        if Self::is_push_mnemonic(&inst.mnemonic)
            || Self::is_pop_mnemonic(&inst.mnemonic)
            || Self::is_call_mnemonic(&inst.mnemonic)
            || Self::is_ret_mnemonic(&inst.mnemonic)
        {
            regs.insert(RSP);
        }
        if inst.mnemonic == "leave" {
            regs.insert(RBP);
        }

        let op_regs: Vec<RegId> = inst.operand_regs().collect();
        match rw_shape(&inst.mnemonic) {
            RwShape::AllRead => {}
            RwShape::MoveLike | RwShape::ReadModifyWrite => {
                if let Some(&dest) = op_regs.last() {
                    if op_regs.len() > 1 || rw_shape(&inst.mnemonic) == RwShape::ReadModifyWrite {
                        regs.insert(dest);
                    }
                }
            }
        }
        if Self::is_pop_mnemonic(&inst.mnemonic) {
            regs.extend(op_regs);
        }

        regs
    }

    fn is_load(&self, inst: &Instruction) -> bool {
        inst.operands.iter().any(|op| matches!(op, Operand::Mem(_)))
            && !Self::is_push_mnemonic(&inst.mnemonic)
    }

    fn is_store(&self, inst: &Instruction) -> bool {
        matches!(
            inst.operands.last(),
            Some(Operand::Mem(_))
        ) || Self::is_push_mnemonic(&inst.mnemonic)
    }

    fn is_barrier(&self, inst: &Instruction) -> bool {
        matches!(inst.mnemonic.as_str(), "mfence" | "lfence" | "sfence")
    }

    fn is_vector(&self, inst: &Instruction) -> bool {
        inst.mnemonic.starts_with('v')
            || inst.operand_regs().any(regs::is_vector_reg)
            || inst.mnemonic.ends_with("ps")
            || inst.mnemonic.ends_with("pd")
    }

    fn is_atomic(&self, inst: &Instruction) -> bool {
        inst.mnemonic == "lock" || matches!(inst.mnemonic.as_str(), "xadd" | "cmpxchg" | "xchg")
    }

    fn is_compute(&self, inst: &Instruction) -> bool {
        !self.is_load(inst)
            && !self.is_store(inst)
            && !MOVE_MNEMONICS.contains(&inst.mnemonic.as_str())
    }

    fn is_float(&self, inst: &Instruction) -> bool {
        inst.mnemonic.ends_with("sd")
            || inst.mnemonic.ends_with("ss")
            || inst.mnemonic.contains("fp")
    }

    fn is_lea(&self, inst: &Instruction) -> bool {
        inst.mnemonic == "lea"
    }

    fn is_push(&self, inst: &Instruction) -> bool {
        Self::is_push_mnemonic(&inst.mnemonic)
    }

    fn is_pop(&self, inst: &Instruction) -> bool {
        Self::is_pop_mnemonic(&inst.mnemonic)
    }

    fn is_mov(&self, inst: &Instruction) -> bool {
        MOVE_MNEMONICS.contains(&inst.mnemonic.as_str()) && inst.mnemonic != "lea"
    }

    fn is_nop(&self, inst: &Instruction) -> bool {
        inst.mnemonic == "nop"
    }

    fn is_syscall(&self, inst: &Instruction) -> bool {
        inst.mnemonic == "syscall" || inst.mnemonic == "int"
    }

    fn is_var_latency(&self, inst: &Instruction) -> bool {
        let m = inst.mnemonic.as_str();
        VAR_LATENCY_EXACT.contains(&m) || VAR_LATENCY_PREFIXES.iter().any(|p| m.starts_with(p))
    }

    fn is_implicit_reg(&self, inst: &Instruction, reg: RegId) -> bool {
        let named = inst.operand_regs().any(|r| r == reg);
        !named && (self.reads_regs(inst).contains(&reg) || self.writes_regs(inst).contains(&reg))
    }

    fn is_vector_reg(&self, reg: RegId) -> bool {
        regs::is_vector_reg(reg)
    }

    fn is_tile_reg(&self, reg: RegId) -> bool {
        regs::is_tile_reg(reg)
    }

    fn is_terminator(&self, inst: &Instruction) -> bool {
        Self::is_jump_mnemonic(&inst.mnemonic) || Self::is_ret_mnemonic(&inst.mnemonic)
    }

    fn is_call(&self, inst: &Instruction) -> bool {
        Self::is_call_mnemonic(&inst.mnemonic)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use llvm_ml_common::Instruction as Inst;

    fn reg_inst(mnemonic: &str, regs: &[RegId]) -> Inst {
        Inst {
            opcode: 0,
            mnemonic: mnemonic.to_string(),
            operands: regs.iter().map(|r| Operand::Reg(*r)).collect(),
        }
    }

    #[test]
    fn add_reads_both_and_writes_destination() {
        let target = X86Target::new();
        let inst = reg_inst("add", &[0, 1]);
        assert_eq!(target.reads_regs(&inst), HashSet::from([0, 1]));
        assert_eq!(target.writes_regs(&inst), HashSet::from([1]));
    }

    #[test]
    fn mov_only_writes_destination() {
        let target = X86Target::new();
        let inst = reg_inst("mov", &[0, 1]);
        assert_eq!(target.reads_regs(&inst), HashSet::from([0]));
        assert_eq!(target.writes_regs(&inst), HashSet::from([1]));
    }

    #[test]
    fn push_reads_operand_and_implicit_rsp_writes_rsp() {
        let target = X86Target::new();
        let inst = reg_inst("push", &[0]);
        assert!(target.reads_regs(&inst).contains(&0));
        assert!(target.reads_regs(&inst).contains(&RSP));
        assert_eq!(target.writes_regs(&inst), HashSet::from([RSP]));
    }

    #[test]
    fn classifies_var_latency_instructions() {
        let target = X86Target::new();
        assert!(target.is_var_latency(&Inst::bare(0, "div")));
        assert!(target.is_var_latency(&Inst::bare(0, "sqrtsd")));
        assert!(target.is_var_latency(&Inst::bare(0, "cpuid")));
        assert!(!target.is_var_latency(&Inst::bare(0, "add")));
    }

    #[test]
    fn compute_excludes_moves_and_memory_ops() {
        let target = X86Target::new();
        assert!(target.is_compute(&reg_inst("add", &[0, 1])));
        assert!(!target.is_compute(&reg_inst("mov", &[0, 1])));
    }

    #[test]
    fn terminator_covers_jumps_and_returns() {
        let target = X86Target::new();
        assert!(target.is_terminator(&Inst::bare(0, "jmp")));
        assert!(target.is_terminator(&Inst::bare(0, "ret")));
        assert!(!target.is_terminator(&Inst::bare(0, "add")));
    }
}
