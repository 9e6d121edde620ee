use thiserror::Error;

/// Failure modes of graph construction. Construction itself cannot fail on
/// well-formed input; this exists for the one input-validation rule that
/// rejects a reserved-address reference.
#[derive(Debug, Error)]
pub enum GraphError {
    #[error("instruction disassembly references a reserved harness address (0x{0:x}); this block cannot be safely benchmarked")]
    ReservedAddressReferenced(i64),
}
