//! Producer and consumer span helpers.

use tracing::Span;
use uuid::Uuid;

/// Start a span for one workload thread.
///
/// The `worker.items` field is declared empty and filled in by
/// [`record_finished`] when the thread is done.
pub fn start_worker_span(run_id: &Uuid, role: &str, index: usize) -> Span {
    tracing::info_span!(
        "worker",
        "run.id" = %run_id,
        "worker.role" = role,
        "worker.index" = index,
        "worker.items" = tracing::field::Empty,
    )
}

/// Record how many items the thread handled and emit a `finished` event.
pub fn record_finished(span: &Span, items: u64) {
    span.record("worker.items", items);
    span.in_scope(|| {
        tracing::debug!(items, "finished");
    });
}
