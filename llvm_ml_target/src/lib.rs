//! Target-specific capability implementations.
//!
//! Provides the x86-64 [`MLTarget`](llvm_ml_common::MLTarget) impl, a
//! minimal AT&T-syntax assembler, and an `iced-x86`-backed linear decoder —
//! together standing in for an LLVM MC assembler/disassembler collaborator
//! this workspace does not reimplement.

pub mod asm;
pub mod decode;
pub mod error;
pub mod opcode;
pub mod regs;
pub mod x86;

pub use error::TargetError;
pub use x86::X86Target;
