//! Human-readable JSON mirror of the packed binary records, for
//! debugging. Every record type already derives `Serialize`, so this
//! module is a thin, explicitly-named wrapper rather than asking callers
//! to reach for `serde_json` directly — and a place to note that, unlike
//! the binary form, round-tripping through JSON is not guaranteed (float
//! formatting, field order, and future schema growth are not contractual
//! here).

use serde::Serialize;

use crate::error::CodecError;

pub fn to_json_pretty<T: Serialize>(value: &T) -> Result<String, CodecError> {
    Ok(serde_json::to_string_pretty(value)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use llvm_ml_common::graph::Graph;

    #[test]
    fn emits_readable_json() {
        let g = Graph::new("block0.s");
        let text = to_json_pretty(&g).unwrap();
        assert!(text.contains("\"source\""));
        assert!(text.contains("block0.s"));
    }
}
