//! Metric instrument factories for coach-rs.
//!
//! Instruments come from the `"coach-rs"` meter on the globally registered
//! `MeterProvider`. Without an OTLP endpoint the global provider is a no-op.

use opentelemetry::metrics::{Counter, Histogram, Meter};

fn meter() -> Meter {
    opentelemetry::global::meter("coach-rs")
}

/// Counter: tasks handed to the dispatcher.
/// Labels: `task`.
pub fn tasks_submitted() -> Counter<u64> {
    meter()
        .u64_counter("coach.tasks.submitted")
        .with_description("Number of background tasks submitted")
        .build()
}

/// Counter: tasks that ran to completion without error.
/// Labels: `task`.
pub fn tasks_completed() -> Counter<u64> {
    meter()
        .u64_counter("coach.tasks.completed")
        .with_description("Number of background tasks completed")
        .build()
}

/// Counter: tasks that did not complete.
/// Labels: `task`, `reason` ("error" | "panic" | "timeout").
pub fn tasks_failed() -> Counter<u64> {
    meter()
        .u64_counter("coach.tasks.failed")
        .with_description("Number of background tasks that failed")
        .build()
}

/// Counter: queued tasks dropped when the worker was shut down.
pub fn tasks_discarded() -> Counter<u64> {
    meter()
        .u64_counter("coach.tasks.discarded")
        .with_description("Number of queued tasks discarded at shutdown")
        .build()
}

/// Counter: worker loops started.
pub fn worker_starts() -> Counter<u64> {
    meter()
        .u64_counter("coach.worker.starts")
        .with_description("Number of dispatcher worker loops started")
        .build()
}

/// Histogram: task execution time in milliseconds.
/// Labels: `task`.
pub fn task_duration_ms() -> Histogram<f64> {
    meter()
        .f64_histogram("coach.tasks.duration_ms")
        .with_description("Background task execution time")
        .with_unit("ms")
        .build()
}

/// Counter: notes written by extraction.
pub fn notes_upserted() -> Counter<u64> {
    meter()
        .u64_counter("coach.notes.upserted")
        .with_description("Number of user notes inserted or overwritten")
        .build()
}
