//! GenAI semantic convention spans for model calls.

use tracing::Span;

/// Start a span for a chat completion.
///
/// `gen_ai.response.length` is left empty and filled by
/// [`record_response_length`] once the completion text is back.
pub fn start_chat_span(model: &str, provider: &str, purpose: &str) -> Span {
    tracing::info_span!(
        "gen_ai.chat",
        "gen_ai.operation.name" = "chat",
        "gen_ai.request.model" = model,
        "gen_ai.provider.name" = provider,
        "coach.purpose" = purpose,
        "gen_ai.response.length" = tracing::field::Empty,
    )
}

/// Record the size of the completion text (in chars) on a chat span.
pub fn record_response_length(span: &Span, chars: usize) {
    span.record("gen_ai.response.length", chars as u64);
}
