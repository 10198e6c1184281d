//! Chat completion via rig-core's OpenAI provider.
//!
//! [`Completion`] is the seam the coach and the note extractor call through.
//! [`ChatModel`] implements it by pairing a provider client with a model name
//! and turning a [`ChatRequest`] (system prompt, prior turns, new prompt,
//! sampling settings) into completion text. Each call runs inside a GenAI span.
//!
//! # Example
//! ```no_run
//! use coach_rs::llm::{ChatModel, ChatRequest, Completion};
//! use secrecy::SecretString;
//!
//! # async fn run() -> coach_rs::error::Result<()> {
//! let key = SecretString::from("sk-...");
//! let model = ChatModel::openai(&key, "gpt-4o-mini")?;
//! let text = model
//!     .complete(ChatRequest::new("You are terse.", "Say hi."))
//!     .await?;
//! # Ok(())
//! # }
//! ```

use crate::error::{Error, Result};
use crate::model::{ConversationEntry, Role};
use crate::telemetry::genai::{record_response_length, start_chat_span};
use rig::client::CompletionClient;
use rig::completion::{Chat, Message};
use rig::providers::openai;
use secrecy::{ExposeSecret, SecretString};
use std::future::Future;
use tracing::Instrument;

const PROVIDER: &str = "openai";

/// One completion call.
#[derive(Debug, Clone)]
pub struct ChatRequest<'a> {
    pub system: &'a str,
    pub history: &'a [ConversationEntry],
    pub prompt: &'a str,
    pub temperature: f64,
    pub max_tokens: u64,
    /// Short label for the span ("reply", "extract_notes").
    pub purpose: &'a str,
}

impl<'a> ChatRequest<'a> {
    pub fn new(system: &'a str, prompt: &'a str) -> Self {
        Self {
            system,
            history: &[],
            prompt,
            temperature: 0.7,
            max_tokens: 500,
            purpose: "chat",
        }
    }

    pub fn history(mut self, history: &'a [ConversationEntry]) -> Self {
        self.history = history;
        self
    }

    pub fn temperature(mut self, temperature: f64) -> Self {
        self.temperature = temperature;
        self
    }

    pub fn max_tokens(mut self, max_tokens: u64) -> Self {
        self.max_tokens = max_tokens;
        self
    }

    pub fn purpose(mut self, purpose: &'a str) -> Self {
        self.purpose = purpose;
        self
    }
}

/// Something that answers a [`ChatRequest`] with text.
pub trait Completion: Send + Sync + 'static {
    fn complete(&self, request: ChatRequest<'_>) -> impl Future<Output = Result<String>> + Send;
}

/// A provider client bound to one model.
pub struct ChatModel {
    client: openai::Client,
    model: String,
}

impl ChatModel {
    /// Build an OpenAI-backed model from a secret API key.
    ///
    /// # Errors
    /// Returns [`Error::Llm`] if the underlying HTTP client cannot be constructed.
    pub fn openai(api_key: &SecretString, model: impl Into<String>) -> Result<Self> {
        let client = openai::Client::new(api_key.expose_secret())
            .map_err(|e| Error::Llm(format!("failed to create OpenAI client: {e}")))?;
        Ok(Self {
            client,
            model: model.into(),
        })
    }

    pub fn model(&self) -> &str {
        &self.model
    }
}

impl Completion for ChatModel {
    async fn complete(&self, request: ChatRequest<'_>) -> Result<String> {
        let span = start_chat_span(&self.model, PROVIDER, request.purpose);

        let agent = self
            .client
            .agent(&self.model)
            .preamble(request.system)
            .temperature(request.temperature)
            .max_tokens(request.max_tokens)
            .build();

        let history: Vec<Message> = request.history.iter().map(to_message).collect();

        let text = agent
            .chat(request.prompt, history)
            .instrument(span.clone())
            .await
            .map_err(|e| Error::Llm(e.to_string()))?;

        record_response_length(&span, text.chars().count());
        Ok(text)
    }
}

fn to_message(entry: &ConversationEntry) -> Message {
    match entry.role {
        Role::User => Message::user(entry.content.clone()),
        Role::Assistant => Message::assistant(entry.content.clone()),
    }
}
