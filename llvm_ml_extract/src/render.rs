//! Render a decoded [`Instruction`] back to AT&T text, the inverse of
//! `llvm_ml_target::asm::parse`. Extracted blocks are written as `.s`
//! files and later re-parsed by the text assembler during postprocessing,
//! so this renderer only needs to produce text the parser accepts — not
//! byte-identical disassembly.

use llvm_ml_common::instruction::{Instruction, MemOperand, Operand};
use llvm_ml_target::regs::name_for_id;

pub fn render_instruction(inst: &Instruction) -> String {
    if inst.operands.is_empty() {
        return inst.mnemonic.clone();
    }
    let operands: Vec<String> = inst.operands.iter().map(render_operand).collect();
    format!("{} {}", inst.mnemonic, operands.join(", "))
}

fn render_operand(op: &Operand) -> String {
    match op {
        Operand::Reg(id) => format!("%{}", name_for_id(*id).unwrap_or("r?")),
        Operand::Imm(v) => format!("${v:#x}"),
        Operand::Mem(mem) => render_mem(mem),
    }
}

fn render_mem(mem: &MemOperand) -> String {
    let mut out = String::new();
    if let Some(seg) = mem.segment {
        out.push_str(&format!("%{}:", name_for_id(seg).unwrap_or("r?")));
    }
    if mem.disp != 0 || (mem.base.is_none() && mem.index.is_none()) {
        out.push_str(&format!("{:#x}", mem.disp));
    }
    if mem.base.is_some() || mem.index.is_some() {
        out.push('(');
        if let Some(base) = mem.base {
            out.push_str(&format!("%{}", name_for_id(base).unwrap_or("r?")));
        }
        if let Some(index) = mem.index {
            out.push_str(&format!(",%{},{}", name_for_id(index).unwrap_or("r?"), mem.scale.max(1)));
        }
        out.push(')');
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn renders_register_to_register() {
        let inst = Instruction {
            opcode: 1,
            mnemonic: "add".into(),
            operands: vec![Operand::Reg(1), Operand::Reg(0)],
        };
        assert_eq!(render_instruction(&inst), "add %rcx, %rax");
    }

    #[test]
    fn renders_memory_with_base_and_index() {
        let inst = Instruction {
            opcode: 2,
            mnemonic: "mov".into(),
            operands: vec![
                Operand::Mem(MemOperand {
                    base: Some(0),
                    index: Some(1),
                    scale: 4,
                    disp: 8,
                    segment: None,
                }),
                Operand::Reg(2),
            ],
        };
        assert_eq!(render_instruction(&inst), "mov 0x8(%rax,%rcx,4), %rdx");
    }
}
