//! Metric instrument factories for simpleq.
//!
//! Uses the OTel Meter API with the globally-registered `MeterProvider`.
//! Without a provider installed every instrument is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

/// Returns the shared meter for simpleq instruments.
fn meter() -> Meter {
    opentelemetry::global::meter("simpleq")
}

/// Counter: queue-level operations.
/// Labels: `queue`, `operation` ("enqueue" | "dequeue" | "close" | "rejected").
pub fn queue_operations() -> Counter<u64> {
    meter()
        .u64_counter("simpleq.queue.operations")
        .with_description("Number of queue operations")
        .build()
}

/// Counter: items handled by workload threads.
/// Labels: `role` ("producer" | "consumer").
pub fn items_processed() -> Counter<u64> {
    meter()
        .u64_counter("simpleq.workload.items")
        .with_description("Number of items pushed or emitted by workload threads")
        .build()
}

/// Histogram: wall-clock duration of a workload run in milliseconds.
pub fn run_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("simpleq.workload.duration_ms")
        .with_description("Workload run duration in milliseconds")
        .with_unit("ms")
        .build()
}
