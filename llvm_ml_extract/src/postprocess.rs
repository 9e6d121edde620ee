//! Post-processing pass: drop degenerate blocks and dedup
//! structurally-identical ones, optionally run standalone over an existing
//! directory of `.s` files.

use std::path::{Path, PathBuf};

use llvm_ml_common::target::MLTarget;
use llvm_ml_graph::{build_graph, BuildOptions};
use llvm_ml_target::asm::parse;

use crate::error::ExtractError;

const NON_COMPUTE_MNEMONICS: &[&str] = &["mov", "lea", "push", "pop"];

/// Filter reasons, used only for logging — disjunctive drop conditions,
/// not distinct error types.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DropReason {
    TooFewInstructions,
    NoComputeInstructions,
    VariableLatency,
}

/// Walk every `.s` file directly under `dir`, re-parse it, and drop
/// (delete) files matching any degenerate-block condition. Returns the
/// surviving file paths.
pub fn filter_directory(dir: &Path, target: &dyn MLTarget) -> Result<Vec<PathBuf>, ExtractError> {
    let mut survivors = Vec::new();

    for entry in std::fs::read_dir(dir)? {
        let path = entry?.path();
        if path.extension().and_then(|e| e.to_str()) != Some("s") {
            continue;
        }

        let text = std::fs::read_to_string(&path)?;
        let instructions = match parse(&text) {
            Ok(i) => i,
            Err(err) => {
                tracing::warn!(path = %path.display(), %err, "dropping unparsable block");
                std::fs::remove_file(&path)?;
                continue;
            }
        };

        if let Some(reason) = drop_reason(&instructions, target) {
            tracing::debug!(path = %path.display(), ?reason, "dropping block");
            std::fs::remove_file(&path)?;
            continue;
        }

        survivors.push(path);
    }

    dedup_by_graph(&survivors, target)
}

fn drop_reason(
    instructions: &[llvm_ml_common::Instruction],
    target: &dyn MLTarget,
) -> Option<DropReason> {
    if instructions.len() < 2 {
        return Some(DropReason::TooFewInstructions);
    }
    let has_compute = instructions.iter().any(|inst| {
        !NON_COMPUTE_MNEMONICS.contains(&inst.mnemonic.as_str()) && target.is_compute(inst)
    });
    if !has_compute {
        return Some(DropReason::NoComputeInstructions);
    }
    if instructions.iter().any(|inst| target.is_var_latency(inst)) {
        return Some(DropReason::VariableLatency);
    }
    None
}

/// Build each surviving block's graph with `has_virtual_root=false`,
/// compare pairwise by structural equality, and delete duplicates,
/// keeping the first-seen representative of each equivalence class.
fn dedup_by_graph(paths: &[PathBuf], target: &dyn MLTarget) -> Result<Vec<PathBuf>, ExtractError> {
    let mut kept: Vec<(PathBuf, llvm_ml_common::Graph)> = Vec::new();

    for path in paths {
        let text = std::fs::read_to_string(path)?;
        let instructions = parse(&text)?;
        let graph = build_graph(
            target,
            &instructions,
            path.to_string_lossy(),
            BuildOptions {
                add_virtual_root: false,
                in_order_links: true,
                max_opcodes: 0,
            },
        )?;

        let is_duplicate = kept.iter().any(|(_, g)| g.structurally_equals(&graph));
        if is_duplicate {
            std::fs::remove_file(path)?;
        } else {
            kept.push((path.clone(), graph));
        }
    }

    Ok(kept.into_iter().map(|(p, _)| p).collect())
}
