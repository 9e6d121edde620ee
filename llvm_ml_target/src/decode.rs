//! Linear machine-code decoder, backed by `iced-x86`.
//!
//! Stands in for an LLVM MC disassembler collaborator this workspace
//! doesn't link against. Used by the Basic-Block Extractor to walk an
//! executable section instruction-by-instruction without following
//! control flow.

use iced_x86::{Decoder, DecoderOptions, Formatter, Instruction as IcedInstruction, NasmFormatter};
use llvm_ml_common::{Instruction, MemOperand, Operand};

use crate::error::TargetError;
use crate::opcode::opcode_for_mnemonic;
use crate::regs::id_for_iced;

/// One decoded instruction plus its byte offset from the start of `bytes`
/// and its length, so callers can terminate a block mid-section.
pub struct DecodedInstruction {
    pub offset: u64,
    pub len: u32,
    pub instruction: Instruction,
}

/// Linearly decode every instruction in `bytes`, which begins at `base_rip`
/// in the target's virtual address space (used for RIP-relative operand
/// decoding only; this function does not follow branches).
pub fn decode_section(
    bytes: &[u8],
    base_rip: u64,
) -> Result<Vec<DecodedInstruction>, TargetError> {
    let mut decoder = Decoder::with_ip(64, bytes, base_rip, DecoderOptions::NONE);
    let mut out = Vec::new();

    while decoder.can_decode() {
        let offset = decoder.ip() - base_rip;
        let mut iced_inst = IcedInstruction::default();
        decoder.decode_out(&mut iced_inst);

        if iced_inst.is_invalid() {
            return Err(TargetError::DecodeFailed(
                offset,
                "invalid opcode encoding".to_string(),
            ));
        }

        out.push(DecodedInstruction {
            offset,
            len: iced_inst.len() as u32,
            instruction: convert(&iced_inst),
        });
    }

    Ok(out)
}

/// Render an instruction's mnemonic via iced's NASM formatter; used only
/// when classification needs the textual mnemonic rather than its id.
pub fn format_mnemonic(inst: &IcedInstruction) -> String {
    let mut formatter = NasmFormatter::new();
    let mut out = String::new();
    formatter.format_mnemonic(inst, &mut out);
    out
}

fn convert(inst: &IcedInstruction) -> Instruction {
    let mnemonic = format_mnemonic(inst);
    let mut operands = Vec::new();

    for i in 0..inst.op_count() {
        match inst.op_kind(i) {
            iced_x86::OpKind::Register => {
                if let Some(id) = id_for_iced(inst.op_register(i)) {
                    operands.push(Operand::Reg(id));
                }
            }
            iced_x86::OpKind::Immediate8
            | iced_x86::OpKind::Immediate16
            | iced_x86::OpKind::Immediate32
            | iced_x86::OpKind::Immediate64
            | iced_x86::OpKind::Immediate8to16
            | iced_x86::OpKind::Immediate8to32
            | iced_x86::OpKind::Immediate8to64
            | iced_x86::OpKind::Immediate32to64 => {
                operands.push(Operand::Imm(inst.immediate(i) as i64));
            }
            iced_x86::OpKind::Memory => {
                operands.push(Operand::Mem(MemOperand {
                    base: id_for_iced(inst.memory_base()),
                    index: id_for_iced(inst.memory_index()),
                    scale: inst.memory_index_scale() as u8,
                    disp: inst.memory_displacement64() as i64,
                    segment: id_for_iced(inst.segment_prefix()),
                }));
            }
            _ => {}
        }
    }

    Instruction {
        opcode: opcode_for_mnemonic(&mnemonic),
        mnemonic: mnemonic.to_ascii_lowercase(),
        operands,
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn decodes_ret() {
        // `ret` (0xc3).
        let decoded = decode_section(&[0xc3], 0x1000).unwrap();
        assert_eq!(decoded.len(), 1);
        assert_eq!(decoded[0].instruction.mnemonic, "ret");
    }

    #[test]
    fn decodes_nop_and_add() {
        // `nop` (0x90), then `add eax, ebx` (0x01 d8).
        let decoded = decode_section(&[0x90, 0x01, 0xd8], 0x2000).unwrap();
        assert_eq!(decoded.len(), 2);
        assert_eq!(decoded[0].instruction.mnemonic, "nop");
        assert_eq!(decoded[1].offset, 1);
    }
}
