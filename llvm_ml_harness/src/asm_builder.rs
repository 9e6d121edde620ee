//! Target-specific inline-asm fragments the Harness Generator splices
//! around a basic block.
//!
//! Grounded on the `PrologueX64`/`PrologueAVX`/`Epilogue` literals in
//! `lib/target/X86Target.cpp`. The two hard-coded scratch addresses there
//! are replaced by [`llvm_ml_common::consts::HARNESS_SCRATCH_BASE`] and
//! [`llvm_ml_common::consts::HARNESS_SAVED_STATE_ADDR`] — one named
//! constant shared everywhere, instead of two copy-pasted literals.

use llvm_ml_common::consts::{HARNESS_SAVED_STATE_ADDR, HARNESS_SCRATCH_BASE};

/// MXCSR with flush-to-zero, denormals-are-zero, and all exceptions
/// masked except invalid/divide-by-zero.
const MXCSR_SEED: u32 = 0x9fc0;
/// `EFLAGS.AC` (bit 18), set so misaligned accesses raise `#AC` instead of
/// silently succeeding — this is what lets the runner classify
/// `misaligned_loads`.
const EFLAGS_AC: u64 = 1 << 18;
/// Constant every GPR is seeded with in `setup_env`: the base of the
/// demand-mapped scratch arena, guaranteed mappable by the time the
/// workload runs.
const GPR_SEED: usize = HARNESS_SCRATCH_BASE;

const GPRS: [&str; 14] = [
    "rax", "rbx", "rcx", "rdx", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12", "r13", "r14", "r15",
];

/// Emits the inline-asm fragments a harness function's body is assembled
/// from: `save_state`/`restore_state` around the counter calls,
/// `setup_env`/`restore_env` around the workload, and `branch`/`label` for
/// the optimization-barrier pair bracketing the unrolled block.
pub trait InlineAsmBuilder {
    /// Push callee-saved GPRs, save vector/tile state, seed MXCSR and `AC`.
    fn save_state(&self) -> String;
    /// Inverse of [`save_state`](Self::save_state), in reverse order.
    fn restore_state(&self) -> String;
    /// Swap to the scratch stack, save the original stack/base pointer,
    /// seed every GPR with a demand-mappable constant.
    fn setup_env(&self) -> String;
    /// Restore the original stack/base pointer.
    fn restore_env(&self) -> String;
    /// An unconditional jump to `label`.
    fn branch(&self, label: &str) -> String;
    /// A bare label definition.
    fn label(&self, label: &str) -> String;
}

/// x86-64 System V harness fragments.
#[derive(Debug, Default, Clone, Copy)]
pub struct X86AsmBuilder;

impl InlineAsmBuilder for X86AsmBuilder {
    fn save_state(&self) -> String {
        let mut out = String::new();
        for reg in GPRS {
            out.push_str(&format!("  push %{reg}\n"));
        }
        out.push_str("  push %rbp\n");
        out.push_str(&format!(
            "  stmxcsr -4(%rsp)\n  movl ${MXCSR_SEED}, -4(%rsp)\n  ldmxcsr -4(%rsp)\n"
        ));
        out.push_str(&format!(
            "  pushfq\n  orq ${EFLAGS_AC:#x}, (%rsp)\n  popfq\n"
        ));
        out
    }

    fn restore_state(&self) -> String {
        let mut out = String::new();
        out.push_str("  popfq\n");
        out.push_str("  pop %rbp\n");
        for reg in GPRS.iter().rev() {
            out.push_str(&format!("  pop %{reg}\n"));
        }
        out
    }

    fn setup_env(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("  movq ${HARNESS_SAVED_STATE_ADDR:#x}, %rbx\n"));
        out.push_str("  movq %rbp, (%rbx)\n");
        out.push_str("  movq %rsp, 8(%rbx)\n");
        out.push_str(&format!(
            "  movq ${GPR_SEED:#x}, %rbp\n  addq $2048, %rbp\n  movq %rbp, %rsp\n  andq $-32, %rsp\n  subq $16, %rsp\n"
        ));
        for reg in GPRS {
            out.push_str(&format!("  movq ${GPR_SEED:#x}, %{reg}\n"));
        }
        out
    }

    fn restore_env(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("  movq ${HARNESS_SAVED_STATE_ADDR:#x}, %rbx\n"));
        out.push_str("  movq (%rbx), %rbp\n");
        out.push_str("  movq 8(%rbx), %rsp\n");
        out
    }

    fn branch(&self, label: &str) -> String {
        format!("  jmp {label}\n")
    }

    fn label(&self, label: &str) -> String {
        format!("{label}:\n")
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn save_and_restore_state_push_pop_the_same_registers() {
        let builder = X86AsmBuilder;
        let pushes = builder.save_state().matches("push").count();
        let pops = builder.restore_state().matches("pop ").count()
            + builder.restore_state().matches("popfq").count();
        assert_eq!(pushes, pops);
    }

    #[test]
    fn setup_env_seeds_every_gpr() {
        let builder = X86AsmBuilder;
        let text = builder.setup_env();
        for reg in GPRS {
            assert!(text.contains(&format!("%{reg}\n")));
        }
    }
}
