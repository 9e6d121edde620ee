//! Minimal AT&T-syntax text assembler.
//!
//! Stands in for an LLVM MC assembler collaborator (`parseAssembly`) this
//! workspace doesn't link against. Accepts exactly the operand forms the
//! harness generator and extractor round-trip:
//! registers (`%rax`), immediates (`$5`), and `disp(base,index,scale)`
//! memory operands with an optional segment override. Anything it can't
//! parse is an error, not a best-effort guess.

use llvm_ml_common::{Instruction, MemOperand, Operand};

use crate::error::TargetError;
use crate::opcode::opcode_for_mnemonic;
use crate::regs::id_for_name;

/// Parse a trimmed basic-block assembly string into an instruction
/// sequence. Blank lines and `#`/`;`-prefixed comment lines are skipped.
/// Line numbers in errors are 1-based.
pub fn parse(text: &str) -> Result<Vec<Instruction>, TargetError> {
    let mut out = Vec::new();
    for (idx, raw_line) in text.lines().enumerate() {
        let line_no = idx + 1;
        let line = strip_comment(raw_line).trim();
        if line.is_empty() {
            continue;
        }
        out.push(parse_line(line, line_no)?);
    }
    Ok(out)
}

fn strip_comment(line: &str) -> &str {
    let cut = line
        .find('#')
        .into_iter()
        .chain(line.find(';'))
        .min()
        .unwrap_or(line.len());
    &line[..cut]
}

fn parse_line(line: &str, line_no: usize) -> Result<Instruction, TargetError> {
    let (mnemonic, rest) = match line.split_once(char::is_whitespace) {
        Some((m, r)) => (m, r.trim()),
        None => (line, ""),
    };

    let operands = if rest.is_empty() {
        Vec::new()
    } else {
        split_operands(rest)
            .into_iter()
            .map(|raw| parse_operand(raw.trim(), line_no))
            .collect::<Result<Vec<_>, _>>()?
    };

    Ok(Instruction {
        opcode: opcode_for_mnemonic(mnemonic),
        mnemonic: mnemonic.to_ascii_lowercase(),
        operands,
    })
}

/// Split a comma-separated operand list, respecting commas nested inside
/// `(...)` index-scale groups.
fn split_operands(rest: &str) -> Vec<&str> {
    let mut parts = Vec::new();
    let mut depth = 0i32;
    let mut start = 0usize;
    for (i, ch) in rest.char_indices() {
        match ch {
            '(' => depth += 1,
            ')' => depth -= 1,
            ',' if depth == 0 => {
                parts.push(&rest[start..i]);
                start = i + 1;
            }
            _ => {}
        }
    }
    parts.push(&rest[start..]);
    parts
}

fn parse_operand(raw: &str, line_no: usize) -> Result<Operand, TargetError> {
    if let Some(reg) = raw.strip_prefix('%') {
        let id = id_for_name(reg)
            .ok_or_else(|| TargetError::UnknownRegister(reg.to_string(), line_no))?;
        return Ok(Operand::Reg(id));
    }
    if let Some(imm) = raw.strip_prefix('$') {
        let value = parse_immediate(imm)
            .ok_or_else(|| TargetError::MalformedOperand(raw.to_string(), line_no))?;
        return Ok(Operand::Imm(value));
    }
    if raw.contains('(') {
        return parse_memory(raw, line_no).map(Operand::Mem);
    }
    // Bare displacement with no base/index, e.g. a RIP-relative constant.
    if let Some(disp) = parse_immediate(raw) {
        return Ok(Operand::Mem(MemOperand {
            disp,
            ..Default::default()
        }));
    }
    Err(TargetError::MalformedOperand(raw.to_string(), line_no))
}

fn parse_immediate(raw: &str) -> Option<i64> {
    let raw = raw.trim();
    if let Some(hex) = raw.strip_prefix("0x").or_else(|| raw.strip_prefix("-0x")) {
        let value = i64::from_str_radix(hex, 16).ok()?;
        return Some(if raw.starts_with('-') { -value } else { value });
    }
    raw.parse::<i64>().ok()
}

/// Parse `[seg:]disp(base,index,scale)`, where `base`/`index` are `%reg`
/// and all of `disp`, `index`, `scale` are optional.
fn parse_memory(raw: &str, line_no: usize) -> Result<MemOperand, TargetError> {
    let (seg, raw) = match raw.split_once(':') {
        Some((seg, rest)) => (Some(seg.trim()), rest),
        None => (None, raw),
    };
    let open = raw
        .find('(')
        .ok_or_else(|| TargetError::MalformedOperand(raw.to_string(), line_no))?;
    let close = raw
        .rfind(')')
        .ok_or_else(|| TargetError::MalformedOperand(raw.to_string(), line_no))?;
    let disp_str = raw[..open].trim();
    let disp = if disp_str.is_empty() {
        0
    } else {
        parse_immediate(disp_str)
            .ok_or_else(|| TargetError::MalformedOperand(raw.to_string(), line_no))?
    };

    let inner = &raw[open + 1..close];
    let fields: Vec<&str> = inner.split(',').map(str::trim).collect();

    let reg_field = |field: &str| -> Result<Option<u32>, TargetError> {
        if field.is_empty() {
            return Ok(None);
        }
        let name = field
            .strip_prefix('%')
            .ok_or_else(|| TargetError::MalformedOperand(field.to_string(), line_no))?;
        id_for_name(name)
            .map(Some)
            .ok_or_else(|| TargetError::UnknownRegister(name.to_string(), line_no))
    };

    let base = fields.first().copied().map(reg_field).transpose()?.flatten();
    let index = fields.get(1).copied().map(reg_field).transpose()?.flatten();
    let scale = match fields.get(2).copied() {
        Some(s) if !s.is_empty() => s
            .parse::<u8>()
            .map_err(|_| TargetError::MalformedOperand(raw.to_string(), line_no))?,
        _ => 1,
    };
    let segment = match seg {
        Some(s) => {
            let name = s.strip_prefix('%').unwrap_or(s);
            Some(
                id_for_name(name)
                    .ok_or_else(|| TargetError::UnknownRegister(name.to_string(), line_no))?,
            )
        }
        None => None,
    };

    Ok(MemOperand {
        base,
        index,
        scale,
        disp,
        segment,
    })
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_register_to_register() {
        let insts = parse("add %rax, %rbx\n").unwrap();
        assert_eq!(insts.len(), 1);
        assert_eq!(insts[0].mnemonic, "add");
        assert_eq!(insts[0].operand_regs().count(), 2);
    }

    #[test]
    fn skips_blank_and_comment_lines() {
        let insts = parse("\n# a comment\nnop\n  \nret\n").unwrap();
        assert_eq!(insts.len(), 2);
    }

    #[test]
    fn parses_memory_operand_with_base_index_scale() {
        let insts = parse("mov -8(%rbp,%rax,4), %rcx\n").unwrap();
        let mem = insts[0]
            .operands
            .iter()
            .find_map(|op| match op {
                Operand::Mem(m) => Some(*m),
                _ => None,
            })
            .unwrap();
        assert_eq!(mem.disp, -8);
        assert_eq!(mem.scale, 4);
        assert!(mem.base.is_some() && mem.index.is_some());
    }

    #[test]
    fn parses_immediate_with_dollar_sign() {
        let insts = parse("mov $0x10, %rax\n").unwrap();
        assert!(insts[0]
            .operands
            .iter()
            .any(|op| matches!(op, Operand::Imm(16))));
    }

    #[test]
    fn rejects_unknown_register() {
        let err = parse("mov %notareg, %rax\n").unwrap_err();
        assert!(matches!(err, TargetError::UnknownRegister(_, 1)));
    }

    #[test]
    fn empty_input_yields_empty_block() {
        assert_eq!(parse("").unwrap(), Vec::new());
    }
}
