//! Conversation history: append-only user/assistant messages.

use crate::error::{Error, Result};
use crate::model::{ConversationEntry, Role, UserId};
use chrono::{DateTime, Utc};

impl super::Db {
    /// Full conversation for a user, oldest first. Empty if none exists yet.
    pub async fn conversation(&self, user_id: UserId) -> Result<Vec<ConversationEntry>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT role, content, created_at FROM conversation_messages
             WHERE user_id = $1
             ORDER BY id",
        )
        .bind(user_id.0)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ConversationEntry::try_from).collect()
    }

    /// The last `limit` messages, oldest first.
    pub async fn recent_messages(
        &self,
        user_id: UserId,
        limit: i64,
    ) -> Result<Vec<ConversationEntry>> {
        let rows: Vec<MessageRow> = sqlx::query_as(
            "SELECT role, content, created_at FROM (
                 SELECT id, role, content, created_at FROM conversation_messages
                 WHERE user_id = $1
                 ORDER BY id DESC
                 LIMIT $2
             ) recent
             ORDER BY id",
        )
        .bind(user_id.0)
        .bind(limit)
        .fetch_all(&self.pool)
        .await?;

        rows.into_iter().map(ConversationEntry::try_from).collect()
    }

    /// Append one user message and the coach's reply, stamped with the same time.
    pub async fn append_exchange(
        &self,
        user_id: UserId,
        user_message: &str,
        assistant_message: &str,
    ) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        for (role, content) in [
            (Role::User, user_message),
            (Role::Assistant, assistant_message),
        ] {
            sqlx::query(
                "INSERT INTO conversation_messages (user_id, role, content, created_at)
                 VALUES ($1, $2, $3, $4)",
            )
            .bind(user_id.0)
            .bind(role.as_str())
            .bind(content)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        tx.commit().await?;
        Ok(())
    }
}

#[derive(sqlx::FromRow)]
struct MessageRow {
    role: String,
    content: String,
    created_at: DateTime<Utc>,
}

impl TryFrom<MessageRow> for ConversationEntry {
    type Error = Error;

    fn try_from(row: MessageRow) -> Result<Self> {
        Ok(Self {
            role: row.role.parse().map_err(Error::Other)?,
            content: row.content,
            timestamp: row.created_at,
        })
    }
}
