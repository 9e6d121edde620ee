//! Graph Builder.
//!
//! Grounded directly on `convertMCInstructionsToGraph` in
//! `lib/graph/Graph.cpp`; edge construction order is reproduced exactly —
//! in-order link, virtual-root link, then the register-dependency pass
//! with its `last_write` map and self-edge case, using the corrected
//! `writeRegs`-based self-edge rule (an older `readRegs`-based version of
//! this rule is a known historical bug this builder does not reproduce).

use std::collections::HashMap;

use llvm_ml_common::consts::HARNESS_SCRATCH_BASE;
use llvm_ml_common::graph::{EdgeFeatures, Graph, NodeFeatures};
use llvm_ml_common::instruction::{Instruction, MemOperand, Operand, RegId};
use llvm_ml_common::target::MLTarget;

use crate::error::GraphError;

/// Options controlling graph construction.
#[derive(Debug, Clone, Copy)]
pub struct BuildOptions {
    pub add_virtual_root: bool,
    pub in_order_links: bool,
    pub max_opcodes: u32,
}

impl Default for BuildOptions {
    fn default() -> Self {
        Self {
            add_virtual_root: true,
            in_order_links: true,
            max_opcodes: 0,
        }
    }
}

/// Build the data-flow graph for one basic block.
pub fn build_graph(
    target: &dyn MLTarget,
    instructions: &[Instruction],
    source: impl Into<String>,
    opts: BuildOptions,
) -> Result<Graph, GraphError> {
    reject_reserved_addresses(instructions)?;

    let mut graph = Graph::new(source);
    graph.has_virtual_root = opts.add_virtual_root;
    graph.max_opcodes = opts.max_opcodes;

    if opts.add_virtual_root {
        graph.add_node(NodeFeatures {
            is_virtual_root: true,
            opcode: 0,
            node_id: 0,
            ..Default::default()
        });
    }

    let offset = u32::from(opts.add_virtual_root);

    for (i, inst) in instructions.iter().enumerate() {
        let idx = i as u32 + offset;
        graph.add_node(NodeFeatures {
            opcode: inst.opcode,
            node_id: idx,
            is_load: target.is_load(inst),
            is_store: target.is_store(inst),
            is_barrier: target.is_barrier(inst),
            is_atomic: target.is_atomic(inst),
            is_vector: target.is_vector(inst),
            is_compute: target.is_compute(inst),
            is_float: target.is_float(inst),
            is_virtual_root: false,
        });

        if i > 0 && opts.in_order_links {
            graph.add_edge(idx - 1, idx, EdgeFeatures::default());
        }
        if opts.add_virtual_root {
            graph.add_edge(0, idx, EdgeFeatures::default());
        }
    }

    let mut last_write: HashMap<RegId, usize> = HashMap::new();

    for (i, inst) in instructions.iter().enumerate() {
        let read_regs = target.reads_regs(inst);
        let write_regs = target.writes_regs(inst);

        for &reg in &read_regs {
            let ef = EdgeFeatures {
                is_data: true,
                is_implicit: target.is_implicit_reg(inst, reg),
                is_vector: target.is_vector_reg(reg),
                is_tile: target.is_tile_reg(reg),
            };

            if let Some(&writer) = last_write.get(&reg) {
                graph.add_edge(writer as u32 + offset, i as u32 + offset, ef);
            } else if write_regs.contains(&reg) {
                graph.add_edge(i as u32 + offset, i as u32 + offset, ef);
            }
        }

        for &reg in &write_regs {
            last_write.insert(reg, i);
        }
    }

    Ok(graph)
}

/// The harness's scratch/saved-state addresses must never appear as a
/// literal immediate or displacement in benchmarked code, since the
/// harness itself owns that memory.
fn reject_reserved_addresses(instructions: &[Instruction]) -> Result<(), GraphError> {
    let saved_state = llvm_ml_common::consts::HARNESS_SAVED_STATE_ADDR as i64;
    let scratch_base = HARNESS_SCRATCH_BASE as i64;

    for inst in instructions {
        for op in &inst.operands {
            match op {
                Operand::Imm(v) if *v == saved_state || *v == scratch_base => {
                    return Err(GraphError::ReservedAddressReferenced(*v));
                }
                Operand::Mem(MemOperand { disp, .. })
                    if *disp == saved_state || *disp == scratch_base =>
                {
                    return Err(GraphError::ReservedAddressReferenced(*disp));
                }
                _ => {}
            }
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use llvm_ml_target::X86Target;

    fn add(dst: RegId, src: RegId) -> Instruction {
        Instruction {
            opcode: 1,
            mnemonic: "add".into(),
            operands: vec![Operand::Reg(src), Operand::Reg(dst)],
        }
    }

    #[test]
    fn virtual_root_links_to_every_node_and_offsets_ids() {
        let target = X86Target;
        let instructions = vec![add(0, 1), add(0, 2)];
        let graph = build_graph(
            &target,
            &instructions,
            "block",
            BuildOptions {
                add_virtual_root: true,
                in_order_links: true,
                max_opcodes: 0,
            },
        )
        .unwrap();

        assert_eq!(graph.nodes.len(), 3);
        assert!(graph.nodes[0].is_virtual_root);
        assert!(graph.edges.iter().any(|e| e.from == 0 && e.to == 1));
        assert!(graph.edges.iter().any(|e| e.from == 0 && e.to == 2));
        assert!(graph.edges.iter().any(|e| e.from == 1 && e.to == 2));
    }

    #[test]
    fn read_after_write_links_to_the_last_writer() {
        let target = X86Target;
        // rax = rax + rbx ; rcx = rax + rdx -- second reads rax written by first.
        let instructions = vec![add(0, 1), add(0, 3)];
        let graph = build_graph(
            &target,
            &instructions,
            "block",
            BuildOptions {
                add_virtual_root: false,
                in_order_links: false,
                max_opcodes: 0,
            },
        )
        .unwrap();

        let data_edges: Vec<_> = graph
            .edges
            .iter()
            .filter(|e| e.features.is_data && e.from == 0 && e.to == 1)
            .collect();
        assert!(!data_edges.is_empty());
    }

    #[test]
    fn read_of_never_written_register_that_is_also_written_gets_self_edge() {
        let target = X86Target;
        // add %rax, %rax: reads and writes rax, never written before -> self edge.
        let instructions = vec![add(0, 0)];
        let graph = build_graph(
            &target,
            &instructions,
            "block",
            BuildOptions {
                add_virtual_root: false,
                in_order_links: false,
                max_opcodes: 0,
            },
        )
        .unwrap();

        assert!(graph
            .edges
            .iter()
            .any(|e| e.from == 0 && e.to == 0 && e.features.is_data));
    }

    #[test]
    fn reserved_address_immediate_is_rejected() {
        let target = X86Target;
        let instructions = vec![Instruction {
            opcode: 2,
            mnemonic: "mov".into(),
            operands: vec![
                Operand::Imm(llvm_ml_common::consts::HARNESS_SCRATCH_BASE as i64),
                Operand::Reg(0),
            ],
        }];
        let result = build_graph(&target, &instructions, "block", BuildOptions::default());
        assert!(result.is_err());
    }
}
