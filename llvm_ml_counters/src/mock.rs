//! A constant-valued [`CounterGroup`], selected by `LLVM_ML_BENCH_MOCK`.
//!
//! Used by tests and by any run where the mock environment variable is
//! set, so the rest of the pipeline can be exercised without a real PMU
//! (containers, CI, non-Linux dev machines).

use llvm_ml_common::consts::MOCK_ENV_VAR;

use crate::error::CounterError;
use crate::group::{CounterGroup, CounterKind, CounterSample};

/// Returns `true` when [`MOCK_ENV_VAR`] is set to any non-empty value.
pub fn mock_requested() -> bool {
    std::env::var_os(MOCK_ENV_VAR)
        .map(|v| !v.is_empty())
        .unwrap_or(false)
}

/// Fixed per-invocation counter values. `start`/`stop` are no-ops; `flush`
/// always reports the same five samples.
#[derive(Debug, Clone, Copy)]
pub struct MockCounterGroup {
    pub cycles: u64,
    pub instructions: u64,
    pub cache_misses: u64,
    pub context_switches: u64,
    pub micro_ops: u64,
}

impl Default for MockCounterGroup {
    /// Cheap, stable values: enough to exercise saturating subtraction and
    /// aggregation without claiming any quantitative meaning.
    fn default() -> Self {
        Self {
            cycles: 10,
            instructions: 4,
            cache_misses: 0,
            context_switches: 0,
            micro_ops: 4,
        }
    }
}

impl CounterGroup for MockCounterGroup {
    fn start(&mut self) -> Result<(), CounterError> {
        Ok(())
    }

    fn stop(&mut self) -> Result<(), CounterError> {
        Ok(())
    }

    fn flush(&mut self, callback: &mut dyn FnMut(&[CounterSample])) {
        let samples = [
            CounterSample {
                kind: CounterKind::Cycles,
                value: self.cycles,
            },
            CounterSample {
                kind: CounterKind::Instructions,
                value: self.instructions,
            },
            CounterSample {
                kind: CounterKind::CacheMisses,
                value: self.cache_misses,
            },
            CounterSample {
                kind: CounterKind::ContextSwitches,
                value: self.context_switches,
            },
            CounterSample {
                kind: CounterKind::MicroOps,
                value: self.micro_ops,
            },
        ];
        callback(&samples);
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flush_reports_all_five_kinds() {
        let mut group = MockCounterGroup::default();
        group.start().unwrap();
        group.stop().unwrap();
        let mut seen = Vec::new();
        group.flush(&mut |samples| {
            seen = samples.iter().map(|s| s.kind).collect();
        });
        assert_eq!(seen.len(), 5);
    }
}
