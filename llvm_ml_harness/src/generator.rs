//! Harness Generator: wraps a trimmed basic-block assembly string with a
//! save/restore prologue-epilogue and produces a self-contained GAS source
//! module defining `baseline` and `workload`.
//!
//! There is no LLVM IR or target-machine lowering collaborator here: this
//! emits hand-assembled GAS text directly, compiled by `llvm_ml_runner` via
//! the system `cc`. The calling convention is `(ctx, counters_start,
//! counters_stop, out) -> void`, all four as opaque pointers in
//! `rdi, rsi, rdx, rcx`. `out` is accepted for ABI symmetry but unused —
//! the runner's own closures capture the output location.

use llvm_ml_common::consts::{HARNESS_SAVED_STATE_ADDR, WORKLOAD_NAME};

use crate::asm_builder::InlineAsmBuilder;
use crate::error::HarnessError;

/// Fixed scratch slots the function prologue spills its four incoming
/// arguments to, so `counters_start`/`counters_stop` can be called again
/// after `setup_env` has clobbered every GPR. One page above the
/// save/restore-state slot used by [`crate::asm_builder`].
const ARG_SAVE_BASE: usize = HARNESS_SAVED_STATE_ADDR + 8 * 8;
const ARG_CTX_OFF: usize = 0;
const ARG_START_OFF: usize = 8;
const ARG_STOP_OFF: usize = 16;

/// One compiled harness function's GAS source text.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HarnessFunction {
    pub name: String,
    pub body: String,
}

/// The GAS module a harness compiles to one shared object: a `baseline`
/// function (workload absent, empty body between `counters_start`/`stop`)
/// and a `workload` function (the basic block repeated `num_repeat`
/// times).
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct AsmModule {
    pub baseline: HarnessFunction,
    pub workload: HarnessFunction,
}

impl AsmModule {
    /// Render the full `.s` source text: both functions under one
    /// `.text` section, each `.globl`'d under its own name.
    pub fn to_text(&self) -> String {
        format!(
            "  .text\n{}\n{}\n",
            self.baseline.body, self.workload.body
        )
    }
}

/// Double every `$` in `source` (inline-asm quoting) and normalize line
/// endings to LF. The only pre-processing the original performs.
fn preprocess(source: &str) -> String {
    source.replace('\r', "").replace('$', "$$")
}

/// Build the harness module for one basic block. `num_repeat` is the
/// workload unroll factor. The baseline body is always empty between
/// `counters_start`/`counters_stop` — it measures pure harness/call
/// overhead, not the block.
pub fn create_cpu_test_harness(
    source: &str,
    num_repeat: u32,
    builder: &dyn InlineAsmBuilder,
) -> Result<AsmModule, HarnessError> {
    let processed = preprocess(source);
    let lines = trimmed_lines(&processed, builder)?;

    Ok(AsmModule {
        baseline: build_function("baseline", &[], builder),
        workload: build_function(WORKLOAD_NAME, &vec_repeat(&lines, num_repeat), builder),
    })
}

fn vec_repeat(lines: &[String], n: u32) -> Vec<String> {
    let mut out = Vec::with_capacity(lines.len() * n as usize);
    for _ in 0..n {
        out.extend(lines.iter().cloned());
    }
    out
}

fn trimmed_lines(source: &str, _builder: &dyn InlineAsmBuilder) -> Result<Vec<String>, HarnessError> {
    let mut out = Vec::new();
    for (idx, raw) in source.lines().enumerate() {
        let trimmed = raw.trim();
        if trimmed.is_empty() || trimmed.starts_with(';') || trimmed.starts_with('#') {
            continue;
        }
        if trimmed.bytes().any(|b| b.is_ascii_control() && b != b'\t') {
            return Err(HarnessError::InvalidLine(idx + 1, trimmed.to_string()));
        }
        out.push(trimmed.to_string());
    }
    Ok(out)
}

fn build_function(name: &str, lines: &[String], builder: &dyn InlineAsmBuilder) -> HarnessFunction {
    let start_label = format!("workload_start_{name}");
    let end_label = format!("workload_end_{name}");

    let mut body = String::new();
    body.push_str(&format!("  .globl {name}\n  .type {name}, @function\n{name}:\n"));

    // Spill the four incoming args (ctx, counters_start, counters_stop,
    // out) before touching any GPR.
    body.push_str(&format!("  movq ${ARG_SAVE_BASE:#x}, %rax\n"));
    body.push_str("  movq %rdi, 0(%rax)\n");
    body.push_str("  movq %rsi, 8(%rax)\n");
    body.push_str("  movq %rdx, 16(%rax)\n");
    body.push_str("  movq %rcx, 24(%rax)\n");

    body.push_str(&builder.save_state());

    body.push_str(&call_saved_arg(ARG_CTX_OFF, ARG_START_OFF));

    body.push_str(&builder.setup_env());

    body.push_str(&builder.branch(&start_label));
    body.push_str(&builder.label(&start_label));
    for line in lines {
        body.push_str("  ");
        body.push_str(line);
        body.push('\n');
    }
    body.push_str(&builder.branch(&end_label));
    body.push_str(&builder.label(&end_label));

    body.push_str(&builder.restore_env());
    body.push_str(&call_saved_arg(ARG_CTX_OFF, ARG_STOP_OFF));
    body.push_str(&builder.restore_state());

    body.push_str("  ret\n");

    HarnessFunction {
        name: name.to_string(),
        body,
    }
}

/// Reload the spilled `ctx` pointer into `rdi` and call the spilled
/// function pointer at `fn_off`.
fn call_saved_arg(ctx_off: usize, fn_off: usize) -> String {
    format!(
        "  movq ${ARG_SAVE_BASE:#x}, %rax\n  movq {ctx_off}(%rax), %rdi\n  call *{fn_off}(%rax)\n"
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::asm_builder::X86AsmBuilder;

    #[test]
    fn baseline_body_has_no_unrolled_instructions() {
        let module = create_cpu_test_harness("add %rax, %rbx\n", 5, &X86AsmBuilder).unwrap();
        assert!(!module.baseline.body.contains("add %rax, %rbx"));
        assert!(module.baseline.body.contains("ret"));
        assert!(module.workload.body.contains("workload_start_workload"));
    }

    #[test]
    fn workload_repeats_the_block_num_repeat_times() {
        let module = create_cpu_test_harness("add %rax, %rbx\n", 3, &X86AsmBuilder).unwrap();
        assert_eq!(module.workload.body.matches("add %rax, %rbx").count(), 3);
    }

    #[test]
    fn dollar_signs_are_doubled() {
        let module = create_cpu_test_harness("movq $5, %rax\n", 1, &X86AsmBuilder).unwrap();
        assert!(module.workload.body.contains("movq $$5, %rax"));
    }

    #[test]
    fn comment_and_blank_lines_are_dropped() {
        let module =
            create_cpu_test_harness("nop\n; a comment\n\nnop\n", 1, &X86AsmBuilder).unwrap();
        assert_eq!(module.workload.body.matches("nop").count(), 2);
    }
}
