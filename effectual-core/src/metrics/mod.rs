//! Metric definitions, recording validation, and in-process collection

use std::time::Instant;

use once_cell::sync::Lazy;

mod exposition;
mod memory;
mod registry;

pub use exposition::render_prometheus;
pub use memory::InMemoryCollector;
pub use registry::{
    CounterDefinition, GaugeDefinition, HistogramDefinition, MetricKind, MetricsRegistry,
    Rejection, RegistryError, SummaryDefinition,
};

static PROCESS_START: Lazy<Instant> = Lazy::new(Instant::now);

/// Seconds elapsed since the process-wide monotonic origin.
///
/// Recording timestamps come from here rather than the wall clock so they
/// never jump backwards.
pub fn monotonic_now_seconds() -> f64 {
    PROCESS_START.elapsed().as_secs_f64()
}
