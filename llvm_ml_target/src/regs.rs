//! Dense x86-64 register ids.
//!
//! [`llvm_ml_common::RegId`] is target-opaque; this module is where
//! `llvm_ml_target` fixes what the bits mean. Ids are partitioned into
//! contiguous bands so [`is_vector_reg`]/[`is_tile_reg`] are a single range
//! check rather than a table lookup, matching the cheap, branch-free style
//! of the classification queries in the original `X86Target`.

use llvm_ml_common::RegId;

/// 64-bit general-purpose registers, `rax..r15`, ids `0..16`.
pub const GPR_BASE: RegId = 0;
pub const GPR_COUNT: RegId = 16;
/// AVX/AVX2 vector registers, `ymm0..ymm15`, ids `100..116`.
pub const VECTOR_BASE: RegId = 100;
pub const VECTOR_COUNT: RegId = 16;
/// AMX tile registers, `tmm0..tmm7`, ids `200..208`.
pub const TILE_BASE: RegId = 200;
pub const TILE_COUNT: RegId = 8;
/// Segment override registers, `es/cs/ss/ds/fs/gs`, ids `300..306`.
pub const SEGMENT_BASE: RegId = 300;
/// Flags pseudo-register, used only for implicit-use/def bookkeeping.
pub const RFLAGS: RegId = 400;

const GPR_NAMES: [&str; 16] = [
    "rax", "rcx", "rdx", "rbx", "rsp", "rbp", "rsi", "rdi", "r8", "r9", "r10", "r11", "r12",
    "r13", "r14", "r15",
];
const SEGMENT_NAMES: [&str; 6] = ["es", "cs", "ss", "ds", "fs", "gs"];

/// Look up the dense id for a bare register name (no leading `%`), in any
/// of the 8/16/32/64-bit GPR aliases, `ymmN`, `xmmN`, `tmmN`, or a segment
/// name. Returns `None` for anything not in that vocabulary.
pub fn id_for_name(name: &str) -> Option<RegId> {
    let lower = name.to_ascii_lowercase();

    if let Some(idx) = GPR_NAMES.iter().position(|n| *n == lower) {
        return Some(GPR_BASE + idx as RegId);
    }
    if let Some(rest) = lower.strip_prefix('e') {
        if let Some(idx) = GPR_NAMES.iter().position(|n| n.trim_start_matches('r') == rest) {
            return Some(GPR_BASE + idx as RegId);
        }
    }
    for (idx, base) in GPR_NAMES.iter().enumerate() {
        let stem = base.trim_start_matches('r');
        if lower == format!("{stem}d") || lower == format!("{stem}w") || lower == format!("{stem}b")
        {
            return Some(GPR_BASE + idx as RegId);
        }
    }

    if let Some(rest) = lower.strip_prefix("ymm").or_else(|| lower.strip_prefix("xmm")) {
        if let Ok(n) = rest.parse::<RegId>() {
            if n < VECTOR_COUNT {
                return Some(VECTOR_BASE + n);
            }
        }
    }
    if let Some(rest) = lower.strip_prefix("tmm") {
        if let Ok(n) = rest.parse::<RegId>() {
            if n < TILE_COUNT {
                return Some(TILE_BASE + n);
            }
        }
    }
    if let Some(idx) = SEGMENT_NAMES.iter().position(|n| *n == lower) {
        return Some(SEGMENT_BASE + idx as RegId);
    }
    if lower == "rflags" || lower == "eflags" {
        return Some(RFLAGS);
    }

    None
}

/// Inverse of [`id_for_name`]: the canonical 64-bit/full-width name for a
/// dense id, used by the Basic-Block Extractor to render decoded
/// instructions back to AT&T text. Returns `None` for ids outside any
/// known band.
pub fn name_for_id(id: RegId) -> Option<&'static str> {
    if (GPR_BASE..GPR_BASE + GPR_COUNT).contains(&id) {
        return Some(GPR_NAMES[(id - GPR_BASE) as usize]);
    }
    if is_vector_reg(id) {
        return match id - VECTOR_BASE {
            0 => Some("ymm0"),
            1 => Some("ymm1"),
            2 => Some("ymm2"),
            3 => Some("ymm3"),
            4 => Some("ymm4"),
            5 => Some("ymm5"),
            6 => Some("ymm6"),
            7 => Some("ymm7"),
            8 => Some("ymm8"),
            9 => Some("ymm9"),
            10 => Some("ymm10"),
            11 => Some("ymm11"),
            12 => Some("ymm12"),
            13 => Some("ymm13"),
            14 => Some("ymm14"),
            15 => Some("ymm15"),
            _ => None,
        };
    }
    if is_tile_reg(id) {
        return match id - TILE_BASE {
            0 => Some("tmm0"),
            1 => Some("tmm1"),
            2 => Some("tmm2"),
            3 => Some("tmm3"),
            4 => Some("tmm4"),
            5 => Some("tmm5"),
            6 => Some("tmm6"),
            7 => Some("tmm7"),
            _ => None,
        };
    }
    if (SEGMENT_BASE..SEGMENT_BASE + 6).contains(&id) {
        return Some(SEGMENT_NAMES[(id - SEGMENT_BASE) as usize]);
    }
    if id == RFLAGS {
        return Some("rflags");
    }
    None
}

/// Map an `iced_x86::Register` onto the same dense id space
/// [`id_for_name`] produces, via its textual name. Returns `None` for
/// registers this target doesn't track (debug/control/bounds registers).
pub fn id_for_iced(reg: iced_x86::Register) -> Option<RegId> {
    if reg == iced_x86::Register::None {
        return None;
    }
    id_for_name(&format!("{reg:?}"))
}

pub fn is_vector_reg(reg: RegId) -> bool {
    (VECTOR_BASE..VECTOR_BASE + VECTOR_COUNT).contains(&reg)
}

pub fn is_tile_reg(reg: RegId) -> bool {
    (TILE_BASE..TILE_BASE + TILE_COUNT).contains(&reg)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn gpr_aliases_resolve_to_same_id() {
        assert_eq!(id_for_name("rax"), id_for_name("eax"));
        assert_eq!(id_for_name("rax"), id_for_name("al"));
        assert_eq!(id_for_name("r15"), id_for_name("r15d"));
    }

    #[test]
    fn vector_and_tile_ranges_are_disjoint() {
        let v = id_for_name("ymm3").unwrap();
        let t = id_for_name("tmm1").unwrap();
        assert!(is_vector_reg(v) && !is_tile_reg(v));
        assert!(is_tile_reg(t) && !is_vector_reg(t));
    }

    #[test]
    fn unknown_register_is_none() {
        assert_eq!(id_for_name("cr0"), None);
    }
}
