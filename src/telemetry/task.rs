//! Task execution span helpers.

use tracing::Span;

/// Start a span covering one background task execution.
///
/// `task.outcome` is declared empty and filled by [`record_outcome`].
pub fn start_task_span(kind: &str, user_id: &str) -> Span {
    tracing::info_span!(
        "task.execute",
        "task.kind" = kind,
        "user.id" = user_id,
        "task.outcome" = tracing::field::Empty,
    )
}

/// Record how the task ended ("completed", "error", "panic", "timeout").
pub fn record_outcome(span: &Span, outcome: &str) {
    span.record("task.outcome", outcome);
}
