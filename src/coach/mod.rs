//! The request path: answer the user, then defer note extraction.
//!
//! [`Coach::reply`] is what an HTTP handler calls for a chat message. It
//! returns as soon as the answer is stored; learning from the exchange
//! happens later on the [`Dispatcher`].

pub mod context;
pub mod html;

use std::sync::Arc;

use tracing::{error, info};

use crate::db::Db;
use crate::error::Result;
use crate::llm::{ChatModel, ChatRequest, Completion};
use crate::model::{ConversationEntry, UserId};
use crate::tasks::{Dispatcher, Task, TaskHandler};

/// Shown to the user when the model can't be reached.
pub const UNAVAILABLE_REPLY: &str =
    "I'm having trouble connecting to my knowledge base right now. Could you please try again in a moment?";

pub struct Coach<H, M = ChatModel> {
    db: Arc<Db>,
    model: M,
    tasks: Dispatcher<H>,
}

impl<H: TaskHandler, M: Completion> Coach<H, M> {
    pub fn new(db: Arc<Db>, model: M, tasks: Dispatcher<H>) -> Self {
        Self { db, model, tasks }
    }

    /// Answer `prompt` for `user_id` and return the reply as HTML.
    ///
    /// The exchange is appended to the conversation before returning. When
    /// the model answered, a [`Task::ExtractNotes`] is submitted for it.
    pub async fn reply(&self, user_id: UserId, prompt: &str) -> Result<String> {
        let history = self.db.conversation(user_id).await?;
        let profile = self.db.get_profile(user_id).await?;
        let notes = self.db.list_notes(user_id).await?;

        let system = context::system_prompt(profile.as_ref(), &notes);
        info!(
            %user_id,
            history = history.len(),
            notes = notes.len(),
            has_profile = profile.is_some(),
            "generating coach reply"
        );

        let answer = self
            .model
            .complete(
                ChatRequest::new(&system, prompt)
                    .history(&history)
                    .temperature(0.7)
                    .max_tokens(500)
                    .purpose("reply"),
            )
            .await;

        let (text, answered) = match answer {
            Ok(text) => (text, true),
            Err(e) => {
                error!(%user_id, error = %e, "coach model call failed");
                (UNAVAILABLE_REPLY.to_string(), false)
            }
        };

        let reply = html::format_response_as_html(&text);
        self.db.append_exchange(user_id, prompt, &reply).await?;

        if answered {
            self.tasks.submit(Task::ExtractNotes {
                user_id,
                prompt: prompt.to_string(),
                response: text,
            });
        }

        Ok(reply)
    }

    /// Stored conversation, oldest first.
    pub async fn history(&self, user_id: UserId) -> Result<Vec<ConversationEntry>> {
        self.db.conversation(user_id).await
    }

    pub fn tasks(&self) -> &Dispatcher<H> {
        &self.tasks
    }
}
