//! Deferred background work.
//!
//! Request-path code hands a [`Task`] to a [`Dispatcher`] and returns to the
//! client immediately. A single worker loop drains the queue in submission
//! order and hands each task to a [`TaskHandler`]. Execution is best-effort:
//! failures are logged and counted, never retried, never surfaced to the
//! submitter.

pub mod dispatcher;
pub mod extract;

pub use dispatcher::{Dispatcher, DispatcherConfig, DispatcherStats};
pub use extract::NoteExtractor;

use crate::error::Result;
use crate::model::UserId;
use serde::{Deserialize, Serialize};
use std::future::Future;

/// A unit of deferred work.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Task {
    /// Distill structured notes from the latest exchange with the coach.
    ExtractNotes {
        user_id: UserId,
        prompt: String,
        response: String,
    },
}

impl Task {
    /// Stable label for logs and metrics.
    pub fn kind(&self) -> &'static str {
        match self {
            Task::ExtractNotes { .. } => "extract_notes",
        }
    }

    /// The user the task acts on.
    pub fn user_id(&self) -> UserId {
        match self {
            Task::ExtractNotes { user_id, .. } => *user_id,
        }
    }
}

/// Executes tasks taken off the queue.
///
/// The dispatcher runs every call in its own Tokio task, so implementations
/// must be shareable across threads.
pub trait TaskHandler: Send + Sync + 'static {
    fn handle(&self, task: Task) -> impl Future<Output = Result<()>> + Send;
}
