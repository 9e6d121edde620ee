//! Harness Generator: wraps a basic block in a measurable save/restore
//! shell.

pub mod asm_builder;
pub mod error;
pub mod generator;

pub use asm_builder::{InlineAsmBuilder, X86AsmBuilder};
pub use error::HarnessError;
pub use generator::{create_cpu_test_harness, AsmModule, HarnessFunction};
