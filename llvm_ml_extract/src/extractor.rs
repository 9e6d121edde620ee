//! Basic-Block Extractor: walk every executable, non-virtual section of
//! an object file and split it into basic blocks on any
//! terminator/call/syscall instruction, dropping `nop`s, writing one file
//! per block.

use std::path::Path;

use object::{Object, ObjectSection, SectionFlags, SectionKind};

use llvm_ml_common::instruction::Instruction;
use llvm_ml_common::target::MLTarget;
use llvm_ml_target::decode::decode_section;

use crate::error::ExtractError;
use crate::render::render_instruction;

/// One extracted basic block: the surviving (non-`nop`) instructions and
/// the rendered source text written to disk.
pub struct ExtractedBlock {
    pub instructions: Vec<Instruction>,
    pub source_text: String,
}

/// Walk `object_bytes`, splitting every executable section into basic
/// blocks. A block ends on any instruction the target classifies as
/// `terminator || call || is_syscall`; that instruction is included in the
/// block. `nop`-classified instructions are dropped from the output.
pub fn extract_blocks(
    object_bytes: &[u8],
    target: &dyn MLTarget,
) -> Result<Vec<ExtractedBlock>, ExtractError> {
    let file = object::File::parse(object_bytes)?;
    let mut blocks = Vec::new();

    for section in file.sections() {
        if section.kind() != SectionKind::Text || is_virtual(&section) {
            continue;
        }
        let base = section.address();
        let data = match section.data() {
            Ok(d) => d,
            Err(_) => continue,
        };

        let decoded = decode_section(data, base)?;
        let mut current: Vec<Instruction> = Vec::new();

        for d in decoded {
            let inst = d.instruction;
            if target.is_nop(&inst) {
                continue;
            }

            let ends_block = target.is_terminator(&inst) || target.is_call(&inst) || target.is_syscall(&inst);
            current.push(inst);

            if ends_block {
                let source_text = render_block(&current);
                blocks.push(ExtractedBlock {
                    instructions: std::mem::take(&mut current),
                    source_text,
                });
            }
        }

        if !current.is_empty() {
            let source_text = render_block(&current);
            blocks.push(ExtractedBlock {
                instructions: current,
                source_text,
            });
        }
    }

    Ok(blocks)
}

fn is_virtual(section: &object::Section) -> bool {
    matches!(section.flags(), SectionFlags::Elf { sh_flags } if sh_flags & object::elf::SHF_ALLOC as u64 == 0)
}

fn render_block(instructions: &[Instruction]) -> String {
    instructions
        .iter()
        .map(render_instruction)
        .collect::<Vec<_>>()
        .join("\n")
        + "\n"
}

/// Write each block to `<dir>/<prefix><counter>.s`, the counter
/// incrementing per block across the whole run.
pub fn write_blocks(
    blocks: &[ExtractedBlock],
    dir: &Path,
    prefix: &str,
    start_counter: u32,
) -> Result<u32, ExtractError> {
    let mut counter = start_counter;
    for block in blocks {
        let path = dir.join(format!("{prefix}{counter}.s"));
        std::fs::write(path, &block.source_text)?;
        counter += 1;
    }
    Ok(counter)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llvm_ml_target::X86Target;

    #[test]
    fn nop_is_dropped_and_block_splits_on_ret() {
        // nop ; add eax,ebx ; ret
        let bytes = [0x90u8, 0x01, 0xd8, 0xc3];
        let blocks = extract_blocks_from_decoded(&bytes);
        assert_eq!(blocks.len(), 1);
        assert_eq!(blocks[0].instructions.len(), 2);
        assert_eq!(blocks[0].instructions[1].mnemonic, "ret");
    }

    fn extract_blocks_from_decoded(bytes: &[u8]) -> Vec<ExtractedBlock> {
        let target = X86Target;
        let decoded = decode_section(bytes, 0x1000).unwrap();
        let mut blocks = Vec::new();
        let mut current = Vec::new();
        for d in decoded {
            let inst = d.instruction;
            if target.is_nop(&inst) {
                continue;
            }
            let ends = target.is_terminator(&inst) || target.is_call(&inst) || target.is_syscall(&inst);
            current.push(inst);
            if ends {
                blocks.push(ExtractedBlock {
                    source_text: render_block(&current),
                    instructions: std::mem::take(&mut current),
                });
            }
        }
        blocks
    }
}
