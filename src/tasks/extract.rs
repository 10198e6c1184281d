//! Note extraction: the background half of every coach reply.
//!
//! After the user has their answer, the latest exchange plus a window of
//! prior messages is sent to a cheaper model that returns the facts worth
//! remembering (goals, restrictions, metrics, habits) as JSON. Each fact is
//! upserted as a note keyed by `(user_id, key)`.

use std::sync::Arc;

use serde_json::{Map, Value};
use tracing::{debug, info};

use super::{Task, TaskHandler};
use crate::db::Db;
use crate::error::{Error, Result};
use crate::llm::{ChatModel, ChatRequest, Completion};
use crate::model::{ConversationEntry, NewNote, UserId};

/// How many stored messages give context to the extraction.
pub const HISTORY_WINDOW: i64 = 10;

const EXTRACTION_SYSTEM: &str = "You extract structured information from conversations.";

/// Categories the extraction model is asked to use.
pub const NOTE_CATEGORIES: &[&str] = &[
    "dietary_preference",
    "dietary_restriction",
    "fitness_goal",
    "exercise_habit",
    "physical_metric",
    "health_metric",
    "lifestyle_factor",
    "health_concern",
];

const DEFAULT_CATEGORY: &str = "other";
const DEFAULT_KEY: &str = "unknown";
const DEFAULT_SOURCE: &str = "inferred";
const DEFAULT_CONFIDENCE: f64 = 0.5;

/// [`TaskHandler`] that turns conversations into stored notes.
pub struct NoteExtractor<M = ChatModel> {
    db: Arc<Db>,
    model: M,
}

impl<M: Completion> NoteExtractor<M> {
    pub fn new(db: Arc<Db>, model: M) -> Self {
        Self { db, model }
    }

    /// Extract and store notes for one exchange. Returns how many were written.
    pub async fn extract(&self, user_id: UserId, prompt: &str, response: &str) -> Result<usize> {
        let history = self.db.recent_messages(user_id, HISTORY_WINDOW).await?;
        let transcript = render_transcript(&history, prompt, response);
        let request_text = extraction_prompt(&transcript);

        let raw = self
            .model
            .complete(
                ChatRequest::new(EXTRACTION_SYSTEM, &request_text)
                    .temperature(0.3)
                    .max_tokens(1000)
                    .purpose("extract_notes"),
            )
            .await?;

        let notes = parse_notes(&raw)?;
        if notes.is_empty() {
            debug!(%user_id, "extraction returned no notes");
            return Ok(0);
        }

        for note in &notes {
            self.db.upsert_note(user_id, note).await?;
        }
        info!(%user_id, count = notes.len(), "stored extracted notes");
        Ok(notes.len())
    }
}

impl<M: Completion> TaskHandler for NoteExtractor<M> {
    async fn handle(&self, task: Task) -> Result<()> {
        match task {
            Task::ExtractNotes {
                user_id,
                prompt,
                response,
            } => self.extract(user_id, &prompt, &response).await.map(|_| ()),
        }
    }
}

/// Render stored history and the new exchange as `ROLE: content` lines.
pub fn render_transcript(history: &[ConversationEntry], prompt: &str, response: &str) -> String {
    let mut lines: Vec<String> = history
        .iter()
        .map(|m| format!("{}: {}", m.role.as_str().to_uppercase(), m.content))
        .collect();
    lines.push(format!("USER: {prompt}"));
    lines.push(format!("ASSISTANT: {response}"));
    lines.join("\n")
}

/// The instruction sent to the extraction model.
pub fn extraction_prompt(transcript: &str) -> String {
    let categories = NOTE_CATEGORIES
        .iter()
        .map(|c| format!("- {c}"))
        .collect::<Vec<_>>()
        .join("\n");

    format!(
        r#"Read the conversation between a client and their nutrition and fitness coach.
List what it reveals about the client: diet patterns and restrictions, fitness goals,
exercise habits, body measurements, health metrics (BMR, BMI, body fat), lifestyle
factors such as sleep, stress or schedule, and health concerns or limitations.

Reply with JSON only, shaped like:
{{"notes": [{{"category": "fitness_goal", "key": "weight_loss", "value": "10 pounds in 3 months", "confidence": 0.8, "source": "user_stated"}}]}}

Use one of these categories:
{categories}

Only include what was said or can reasonably be inferred. Lower the confidence
(0.0 to 1.0) when unsure.

Conversation:
{transcript}"#
    )
}

/// Parse the extraction model's reply.
///
/// Accepts bare JSON or JSON wrapped in a markdown code fence. A reply
/// without a `notes` list yields no notes. Entries that are not objects are
/// skipped; missing fields fall back to defaults.
///
/// # Errors
/// [`Error::Extraction`] if the reply is not valid JSON.
pub fn parse_notes(text: &str) -> Result<Vec<NewNote>> {
    let body = strip_code_fence(text).trim();
    let value: Value = serde_json::from_str(body).map_err(|e| {
        Error::Extraction(format!("{e}; raw reply: {}", truncate(text, 200)))
    })?;

    let Some(items) = value.get("notes").and_then(Value::as_array) else {
        return Ok(Vec::new());
    };
    Ok(items.iter().filter_map(note_from_json).collect())
}

fn strip_code_fence(text: &str) -> &str {
    if let Some(rest) = text.split("```json").nth(1) {
        return rest.split("```").next().unwrap_or(rest);
    }
    text.split("```").nth(1).unwrap_or(text)
}

fn note_from_json(item: &Value) -> Option<NewNote> {
    let obj = item.as_object()?;

    let value = match obj.get("value") {
        None | Some(Value::Null) => String::new(),
        Some(Value::String(s)) => s.clone(),
        Some(other) => other.to_string(),
    };
    let confidence = obj
        .get("confidence")
        .and_then(Value::as_f64)
        .unwrap_or(DEFAULT_CONFIDENCE)
        .clamp(0.0, 1.0);

    Some(NewNote {
        category: str_field(obj, "category", DEFAULT_CATEGORY),
        key: str_field(obj, "key", DEFAULT_KEY),
        value,
        confidence,
        source: str_field(obj, "source", DEFAULT_SOURCE),
    })
}

fn str_field(obj: &Map<String, Value>, name: &str, default: &str) -> String {
    match obj.get(name).and_then(Value::as_str) {
        Some(s) => s.to_string(),
        None => default.to_string(),
    }
}

fn truncate(text: &str, max_chars: usize) -> String {
    match text.char_indices().nth(max_chars) {
        Some((idx, _)) => format!("{}...", &text[..idx]),
        None => text.to_string(),
    }
}
