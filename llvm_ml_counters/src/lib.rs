//! PMU Counter Group: a `perf_event_open`-backed group of hardware/software
//! counters, plus a mock for tests and non-Linux runs.

pub mod error;
pub mod group;
pub mod mock;
pub mod perf;
pub mod perf_sys;

pub use error::CounterError;
pub use group::{CounterGroup, CounterKind, CounterSample};
pub use mock::{mock_requested, MockCounterGroup};
pub use perf::PerfCounterGroup;
