//! Structured notes about a user, keyed by `(user_id, key)`.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::UserId;

/// A stored note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UserNote {
    pub user_id: UserId,
    pub category: String,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub source: String,
    pub updated_at: DateTime<Utc>,
}

/// Parameters for inserting or overwriting a note.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct NewNote {
    pub category: String,
    pub key: String,
    pub value: String,
    pub confidence: f64,
    pub source: String,
}
