//! Mnemonic-to-opcode mapping.
//!
//! LLVM's `MCInstrInfo` table gets a dense opcode id for free; without that
//! collaborator, a mnemonic is the only stable handle both the text
//! assembler and the iced-x86 decoder agree on, so this assigns a fixed id
//! to every mnemonic this target's classifiers care about and falls back
//! to a deterministic hash for everything else. Opcode ids are only ever
//! compared for equality within one run; they are not a stable wire
//! format.

/// Mnemonics with classification-relevant behavior get a fixed, readable
/// opcode id. Order matters only for readability.
const KNOWN_MNEMONICS: &[&str] = &[
    "nop", "mov", "movq", "movl", "movw", "movb", "movzx", "movsx", "movaps", "movups", "vmovaps",
    "vmovups", "lea", "push", "pushq", "pop", "popq", "add", "sub", "and", "or", "xor", "cmp",
    "test", "imul", "mul", "idiv", "div", "shl", "shr", "sar", "sal", "inc", "dec", "not", "neg",
    "jmp", "je", "jne", "jz", "jnz", "jg", "jge", "jl", "jle", "ja", "jb", "jae", "jbe", "call",
    "ret", "retq", "leave", "syscall", "int", "sqrtsd", "sqrtss", "rsqrtss", "cpuid",
    "rep", "repe", "repne", "movsb", "movsd", "stosb", "lodsb", "scasb", "prefetcht0",
    "prefetcht1", "prefetcht2", "prefetchnta", "vgatherdpd", "vgatherqpd", "vscatterdpd",
    "vpgatherdd", "lock", "xadd", "xchg", "cmpxchg", "vbroadcastsd", "vbroadcastss",
];

/// FNV-1a over the lowercased mnemonic, offset above the fixed table so the
/// two id spaces never collide.
fn hash_mnemonic(mnemonic: &str) -> u32 {
    let mut hash: u32 = 0x811c_9dc5;
    for byte in mnemonic.to_ascii_lowercase().bytes() {
        hash ^= byte as u32;
        hash = hash.wrapping_mul(0x0100_0193);
    }
    (KNOWN_MNEMONICS.len() as u32) + (hash % 1_000_000)
}

/// Opcode id for a mnemonic, case-insensitive.
pub fn opcode_for_mnemonic(mnemonic: &str) -> u32 {
    let lower = mnemonic.to_ascii_lowercase();
    match KNOWN_MNEMONICS.iter().position(|m| *m == lower) {
        Some(idx) => idx as u32,
        None => hash_mnemonic(&lower),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn known_mnemonics_are_case_insensitive() {
        assert_eq!(opcode_for_mnemonic("MOV"), opcode_for_mnemonic("mov"));
    }

    #[test]
    fn unknown_mnemonics_are_deterministic() {
        assert_eq!(
            opcode_for_mnemonic("vpxyzzy"),
            opcode_for_mnemonic("vpxyzzy")
        );
    }

    #[test]
    fn unknown_mnemonics_do_not_collide_with_known_ids() {
        let known_max = KNOWN_MNEMONICS.len() as u32;
        assert!(opcode_for_mnemonic("notarealmnemonic") >= known_max);
    }
}
